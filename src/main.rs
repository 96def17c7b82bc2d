// Main entry point for the reelfeed terminal video feed
// Sets up config, logging and storage, then hands the terminal to the UI

use anyhow::anyhow;

use reelfeed::config::{app_dir, FeedConfig};
use reelfeed::feed::registry::VideoRegistry;
use reelfeed::feed::storage::{FileStore, KeyValueStore};
use reelfeed::logging::init_logging;
use reelfeed::ui::app::FeedApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dir = app_dir().map_err(|e| anyhow!(e))?;
    init_logging(&dir);

    let config = FeedConfig::load_from(&dir);
    tracing::info!(dir = %dir.display(), ?config, "starting feed");

    // Videos live in <dir>/video-store.json
    let store: Box<dyn KeyValueStore> = Box::new(FileStore::new(&dir));
    let registry = VideoRegistry::load(store);

    let mut app = FeedApp::new(config, registry);
    app.run().await?;

    tracing::info!("feed closed");
    Ok(())
}
