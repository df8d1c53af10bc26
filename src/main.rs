mod app;
mod core;
mod events;
mod media;
mod models;
mod ui;
mod utils;

use eframe::NativeOptions;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

fn main() -> eyre::Result<()> {
    let file_appender = tracing_appender::rolling::never(".", "incident-chat.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .init();

    let runtime = Runtime::new()?;
    let _enter = runtime.enter();

    tracing::info!("Starting Incident Chat {}", env!("CARGO_PKG_VERSION"));
    eframe::run_native(
        "Incident Chat",
        NativeOptions::default(),
        Box::new(|cc| Ok(Box::new(ui::app_layout::App::new(cc)))),
    )
    .map_err(|e| eyre::eyre!("Window failed: {e}"))
}
