// Concurrent image download into self-deleting temporary files.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tempfile::{Builder, TempPath};

use crate::config::FetchConfig;
use crate::errors::{RelayError, RelayResult};

/// A downloaded file. The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct TempAsset {
    pub origin_url: String,
    path: TempPath,
}

impl TempAsset {
    pub fn local_path(&self) -> &Path {
        &self.path
    }
}

pub struct AssetFetcher {
    client: reqwest::Client,
    max_concurrency: usize,
    temp_dir: Option<PathBuf>,
}

const EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".bmp"];

/// First known image extension found anywhere in the URL, `.jpg` otherwise.
pub fn extension_for(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    EXTENSIONS
        .iter()
        .copied()
        .find(|ext| lower.contains(ext))
        .unwrap_or(".jpg")
}

impl AssetFetcher {
    pub fn new(config: &FetchConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_concurrency: config.max_concurrency.max(1),
            temp_dir: None,
        })
    }

    /// Place downloads under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Download every URL, at most `max_concurrency` at a time.
    ///
    /// Failed URLs are logged and left out; the returned paths follow request
    /// order. The paths stay valid for as long as the returned assets live.
    pub async fn resolve(&self, urls: &[String]) -> (Vec<PathBuf>, Vec<TempAsset>) {
        if urls.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut fetched: Vec<(usize, TempAsset)> = stream::iter(urls.iter().enumerate())
            .map(|(i, url)| async move { (i, url, self.fetch_one(url).await) })
            .buffer_unordered(self.max_concurrency)
            .filter_map(|(i, url, result)| async move {
                match result {
                    Ok(asset) => Some((i, asset)),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "image download failed, skipped");
                        None
                    }
                }
            })
            .collect()
            .await;
        fetched.sort_by_key(|(i, _)| *i);

        tracing::info!(requested = urls.len(), fetched = fetched.len(), "images resolved");
        let assets: Vec<TempAsset> = fetched.into_iter().map(|(_, a)| a).collect();
        let paths = assets.iter().map(|a| a.local_path().to_path_buf()).collect();
        (paths, assets)
    }

    async fn fetch_one(&self, url: &str) -> RelayResult<TempAsset> {
        let fail = |reason: String| RelayError::AssetFetch {
            url: url.to_owned(),
            reason,
        };

        let mut builder = Builder::new();
        builder.prefix("wxdispatch-").suffix(extension_for(url));
        // Created up front; dropping it on any error below removes the file.
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| fail(format!("temp file: {e}")))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?;

        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(|e| fail(e.to_string()))? {
            file.as_file_mut()
                .write_all(&chunk)
                .map_err(|e| fail(format!("write: {e}")))?;
            written += chunk.len();
        }
        file.as_file_mut()
            .flush()
            .map_err(|e| fail(format!("flush: {e}")))?;

        tracing::debug!(url = %url, bytes = written, path = %file.path().display(), "image downloaded");
        Ok(TempAsset {
            origin_url: url.to_owned(),
            path: file.into_temp_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extension_is_guessed_from_the_url() {
        assert_eq!(extension_for("http://h/a.PNG"), ".png");
        assert_eq!(extension_for("http://h/photo.jpeg?x=1"), ".jpeg");
        // The first listed extension wins, wherever it appears.
        assert_eq!(extension_for("http://h.jpg.cdn/x.png"), ".jpg");
        assert_eq!(extension_for("http://h/x.gif"), ".gif");
        assert_eq!(extension_for("http://h/x.bmp"), ".bmp");
        assert_eq!(extension_for("http://h/download?id=7"), ".jpg");
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn failed_urls_are_dropped_and_files_cleaned_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.gif"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 32]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = AssetFetcher::new(&FetchConfig::default())
            .unwrap()
            .with_temp_dir(dir.path());
        let urls = vec![
            format!("{}/a.png", server.uri()),
            format!("{}/missing.jpg", server.uri()),
            "http://127.0.0.1:1/unreachable.png".to_string(),
            format!("{}/b.gif", server.uri()),
        ];

        let (paths, assets) = fetcher.resolve(&urls).await;
        assert_eq!(paths.len(), 2);
        assert!(paths[0].to_string_lossy().ends_with(".png"));
        assert!(paths[1].to_string_lossy().ends_with(".gif"));
        assert_eq!(std::fs::read(&paths[0]).unwrap().len(), 64);
        assert_eq!(assets[1].origin_url, urls[3]);
        // Failed downloads leave nothing behind.
        assert_eq!(entries(dir.path()), 2);

        drop(assets);
        assert_eq!(entries(dir.path()), 0);
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn no_urls_means_no_requests() {
        let fetcher = AssetFetcher::new(&FetchConfig::default()).unwrap();
        let (paths, assets) = fetcher.resolve(&[]).await;
        assert!(paths.is_empty() && assets.is_empty());
    }
}
