//! voicenote: record voice notes from the terminal.

mod app;
mod commands;
mod config;
mod export;
mod logging;
mod recorder;
mod ui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
