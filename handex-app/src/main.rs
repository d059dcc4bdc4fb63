mod app;
mod plugins;

pub use app::App;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = app::AppOptions::from_args(std::env::args().skip(1))?;
    let app = App::new(options)?;
    app.run()?;

    Ok(())
}
