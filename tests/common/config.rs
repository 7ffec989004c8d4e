//! Test configuration helpers for creating downloaders around a fake tool

use media_dl::environment::{PosixNativeStrategy, ToolCommand};
use media_dl::{Config, MediaDownloader, ProcessJobRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Config rooted in `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.tools.search_path = false;
    config
}

/// Write the fake tool script into `temp_dir`
pub fn write_tool(temp_dir: &TempDir, script: &str) -> PathBuf {
    let path = temp_dir.path().join("fake-yt-dlp.sh");
    std::fs::write(&path, script).expect("Failed to write fake tool");
    path
}

/// Downloader running the real process runner against a fake tool
///
/// The script is run through `/bin/sh`, so it never needs the executable bit.
pub async fn create_downloader_with(
    body: &str,
    configure: impl FnOnce(&mut Config),
) -> (Arc<MediaDownloader>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let tool = write_tool(&temp_dir, &super::fixtures::script(body));

    let mut config = test_config(&temp_dir);
    configure(&mut config);

    let strategy = Arc::new(PosixNativeStrategy::new(
        ToolCommand {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec![tool.display().to_string()],
        },
        Vec::new(),
    ));
    let downloader =
        MediaDownloader::with_components(config, strategy, Arc::new(ProcessJobRunner::new()))
            .await
            .expect("Failed to create downloader");
    (Arc::new(downloader), temp_dir)
}

/// Downloader with default config whose tool is the given fake script body
pub async fn create_downloader(body: &str) -> (Arc<MediaDownloader>, TempDir) {
    create_downloader_with(body, |_| {}).await
}
