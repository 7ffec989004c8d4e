//! media-dl server binary
//!
//! Configuration comes from `MEDIA_DL_CONFIG` (a JSON file), `MEDIA_DL_OUTPUT_DIR` and
//! `PORT`. Logging is controlled by `RUST_LOG` and `MEDIA_DL_LOG_FORMAT=json`.

use media_dl::{Config, MediaDownloader, Result, api, wait_for_signal};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Selects JSON log output when set to `json`
const LOG_FORMAT_ENV: &str = "MEDIA_DL_LOG_FORMAT";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "media-dl exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let downloader = Arc::new(MediaDownloader::new(config).await?);
    let config = downloader.get_config();

    let sweeper = downloader.start_sweeper();

    let stop_server = CancellationToken::new();
    let mut server = tokio::spawn(api::serve(
        downloader.clone(),
        config,
        stop_server.clone().cancelled_owned(),
    ));

    tokio::select! {
        _ = wait_for_signal() => {}
        result = &mut server => {
            // The server only returns early when it fails to start or crashes
            downloader.shutdown().await?;
            return match result {
                Ok(outcome) => outcome,
                Err(e) => Err(media_dl::Error::ApiServerError(e.to_string())),
            };
        }
    }

    downloader.shutdown().await?;
    stop_server.cancel();

    match server.await {
        Ok(outcome) => outcome?,
        Err(e) => return Err(media_dl::Error::ApiServerError(e.to_string())),
    }
    sweeper.await.ok();
    Ok(())
}
