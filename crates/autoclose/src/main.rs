use std::sync::Arc;

use autoclose_core::{config::Config, store::JsonFileStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autoclose_core::logging::init("autoclose")?;

    let cfg = Arc::new(Config::load()?);
    for w in cfg.autoclose.validate() {
        warn!("{w}");
    }

    let store = Arc::new(JsonFileStore::new(cfg.state_file()));
    info!("State file: {}", store.path().display());

    autoclose_telegram::router::run_polling(cfg, store).await
}
