//! Downloads and refreshes the IMDb `title.basics.tsv` dataset `TitleIndex`
//! reads. Runs once at startup; `TitleIndex` itself opens a fresh file
//! handle per lookup, so swapping the file out from under it is safe.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_URL: &str = "https://datasets.imdbws.com/title.basics.tsv.gz";
const STALE_AFTER: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, thiserror::Error)]
pub enum ImdbRefreshError {
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("filesystem error at {path}: {error}")]
    FileSystem { path: String, error: std::io::Error },
}

pub struct ImdbRefresher {
    tsv_path: PathBuf,
    refresh_url: String,
}

impl ImdbRefresher {
    pub fn new(tsv_path: impl Into<PathBuf>, refresh_url: Option<String>) -> Self {
        Self {
            tsv_path: tsv_path.into(),
            refresh_url: refresh_url.unwrap_or_else(|| DEFAULT_REFRESH_URL.to_string()),
        }
    }

    fn is_stale(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.tsv_path) else {
            return true;
        };
        let Ok(modified) = metadata.modified() else {
            return true;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age > STALE_AFTER,
            Err(_) => false,
        }
    }

    /// Refreshes the dataset if missing or stale. Failures are logged and
    /// swallowed -- a stale or absent TSV degrades `TitleIndex` to all-nil
    /// lookups, which is non-fatal.
    pub async fn refresh_if_stale(&self) {
        if !self.is_stale() {
            debug!(path = %self.tsv_path.display(), "imdb dataset is fresh");
            return;
        }

        info!(url = %self.refresh_url, path = %self.tsv_path.display(), "refreshing imdb dataset");
        if let Err(error) = self.refresh().await {
            warn!(%error, "imdb dataset refresh failed, continuing with existing data");
        }
    }

    async fn refresh(&self) -> Result<(), ImdbRefreshError> {
        let bytes = reqwest::get(&self.refresh_url).await?.bytes().await?;

        let tsv = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut decoder = GzDecoder::new(bytes.as_ref());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        })
        .await
        .map_err(|e| ImdbRefreshError::Decompress(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        .map_err(ImdbRefreshError::Decompress)?;

        if let Some(parent) = self.tsv_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ImdbRefreshError::FileSystem {
                path: parent.display().to_string(),
                error: e,
            })?;
        }

        let tmp_path = tmp_path_for(&self.tsv_path);
        write_atomic(&tmp_path, &self.tsv_path, &tsv)?;
        info!(path = %self.tsv_path.display(), bytes = tsv.len(), "imdb dataset refreshed");
        Ok(())
    }
}

fn tmp_path_for(target: &Path) -> PathBuf {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".download");
    PathBuf::from(tmp)
}

fn write_atomic(tmp_path: &Path, target: &Path, data: &[u8]) -> Result<(), ImdbRefreshError> {
    let mut file = std::fs::File::create(tmp_path).map_err(|e| ImdbRefreshError::FileSystem {
        path: tmp_path.display().to_string(),
        error: e,
    })?;
    file.write_all(data).map_err(|e| ImdbRefreshError::FileSystem {
        path: tmp_path.display().to_string(),
        error: e,
    })?;
    std::fs::rename(tmp_path, target).map_err(|e| ImdbRefreshError::FileSystem {
        path: target.display().to_string(),
        error: e,
    })
}
