use anyhow::Result;
use synaptix::app::App;
use synaptix::logging::{log, log_failure, obj, v_str, Category, Level};
use synaptix::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env();
    let app = App::bootstrap(settings)?;
    let loops = app.spawn_loops();

    tokio::select! {
        res = app.serve() => {
            if let Err(err) = &res {
                log_failure(Category::System, "feed_server_exited", err);
            }
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            log(Level::Info, Category::System, "shutdown", obj(&[("msg", v_str("interrupt received"))]));
        }
    }

    for handle in loops {
        handle.abort();
    }
    Ok(())
}
