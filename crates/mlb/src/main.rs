use std::{path::Path, sync::Arc};

use mlb_core::{
    bot::Bot,
    config::{load_dotenv_if_present, Config},
};
use mlb_mailman::MailmanClient;

fn main() -> Result<(), mlb_core::Error> {
    // Environment writes happen before the runtime starts its worker threads.
    load_dotenv_if_present(Path::new(".env"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> Result<(), mlb_core::Error> {
    mlb_core::logging::init("mlb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        api = %cfg.api.url,
        store = %cfg.store_path.display(),
        prefix = %cfg.command_prefix,
        "configuration loaded"
    );

    let service = Arc::new(MailmanClient::new(&cfg.api)?);
    let core = Arc::new(Bot::new(cfg.clone(), service)?);

    mlb_telegram::router::run_polling(cfg, core)
        .await
        .map_err(|e| mlb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
