use std::{
    path::Path,
    sync::{Arc, Mutex},
    thread,
};

use serde::{Deserialize, Serialize};

use crate::{Result, VisualizerError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "ogv", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a URL by its file extension, ignoring query and fragment.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

/// Fetches the bytes behind a media URL. Runs on a background thread.
pub trait AssetLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<()>;
}

/// Loads local paths and `file://` URLs from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileAssetLoader;

impl AssetLoader for FileAssetLoader {
    fn load(&self, url: &str) -> Result<()> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        if url.contains("://") && !url.starts_with("file://") {
            return Err(VisualizerError::AssetLoadFailure {
                url: url.to_string(),
                reason: "only local files are supported".into(),
            });
        }

        let metadata = std::fs::metadata(path).map_err(|err| VisualizerError::AssetLoadFailure {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        if !metadata.is_file() || metadata.len() == 0 {
            return Err(VisualizerError::AssetLoadFailure {
                url: url.to_string(),
                reason: "not a non-empty file".into(),
            });
        }
        Ok(())
    }
}

/// One media item. The load state is shared with its background loader.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub url: String,
    pub kind: MediaKind,
    state: Arc<Mutex<LoadState>>,
}

impl MediaItem {
    pub fn state(&self) -> LoadState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|_| LoadState::Failed("loader state poisoned".into()))
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }
}

/// Ordered media list with a rotating "current" item.
#[derive(Default)]
pub struct MediaLibrary {
    items: Vec<MediaItem>,
    rejected: Vec<VisualizerError>,
    current: usize,
    shown_since: f64,
    loader: Option<Arc<dyn AssetLoader>>,
}

impl MediaLibrary {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            loader: Some(loader),
            ..Default::default()
        }
    }

    /// Replaces the item list and starts loading every accepted URL in the
    /// background. URLs of unknown type are rejected up front.
    pub fn set_urls(&mut self, urls: &[String]) {
        self.items.clear();
        self.rejected.clear();
        self.current = 0;

        let loader: Arc<dyn AssetLoader> = self
            .loader
            .clone()
            .unwrap_or_else(|| Arc::new(FileAssetLoader));

        for url in urls {
            let Some(kind) = MediaKind::from_url(url) else {
                tracing::warn!(url = %url, "unsupported media type");
                self.rejected.push(VisualizerError::AssetLoadFailure {
                    url: url.clone(),
                    reason: "unsupported media type".into(),
                });
                continue;
            };

            let state = Arc::new(Mutex::new(LoadState::Pending));
            let item = MediaItem {
                url: url.clone(),
                kind,
                state: state.clone(),
            };

            let loader = loader.clone();
            let url = url.clone();
            thread::spawn(move || {
                let outcome = match loader.load(&url) {
                    Ok(()) => LoadState::Loaded,
                    Err(err) => {
                        tracing::warn!(%url, error = %err, "media item failed to load");
                        LoadState::Failed(err.to_string())
                    }
                };
                if let Ok(mut slot) = state.lock() {
                    *slot = outcome;
                }
            });

            self.items.push(item);
        }
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// URLs refused before loading.
    pub fn rejected(&self) -> &[VisualizerError] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.items.get(self.current)
    }

    /// Advances to the next item once `interval` seconds have passed.
    pub fn rotate(&mut self, time: f64, interval: f64) {
        if self.items.len() < 2 {
            self.shown_since = time;
            return;
        }

        if time - self.shown_since >= interval {
            self.current = (self.current + 1) % self.items.len();
            self.shown_since = time;
        }
    }

    /// Advances immediately, e.g. on a strong beat.
    pub fn skip(&mut self, time: f64) {
        if !self.items.is_empty() {
            self.current = (self.current + 1) % self.items.len();
            self.shown_since = time;
        }
    }
}

impl std::fmt::Debug for MediaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLibrary")
            .field("items", &self.items.len())
            .field("rejected", &self.rejected.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    struct StubLoader;

    impl AssetLoader for StubLoader {
        fn load(&self, url: &str) -> Result<()> {
            if url.contains("broken") {
                Err(VisualizerError::AssetLoadFailure {
                    url: url.to_string(),
                    reason: "stub failure".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn wait_settled(library: &MediaLibrary) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while library.items().iter().any(|i| i.state() == LoadState::Pending) {
            assert!(Instant::now() < deadline, "loads did not settle");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaKind::from_url("photo.JPG"), Some(MediaKind::Image));
        assert_eq!(
            MediaKind::from_url("https://host/clip.mp4?token=1"),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_url("notes.txt"), None);
        assert_eq!(MediaKind::from_url("no-extension"), None);
    }

    #[test]
    fn loads_in_background_and_reports_failures() {
        let mut library = MediaLibrary::new(Arc::new(StubLoader));
        library.set_urls(&[
            "a.png".to_string(),
            "broken.mp4".to_string(),
            "readme.md".to_string(),
        ]);

        assert_eq!(library.items().len(), 2);
        assert_eq!(library.rejected().len(), 1);

        wait_settled(&library);
        assert!(library.items()[0].is_loaded());
        assert!(matches!(library.items()[1].state(), LoadState::Failed(_)));
    }

    #[test]
    fn rotates_on_interval() {
        let mut library = MediaLibrary::new(Arc::new(StubLoader));
        library.set_urls(&["a.png".to_string(), "b.png".to_string()]);

        library.rotate(0.0, 5.0);
        assert_eq!(library.current().unwrap().url, "a.png");
        library.rotate(4.9, 5.0);
        assert_eq!(library.current().unwrap().url, "a.png");
        library.rotate(5.0, 5.0);
        assert_eq!(library.current().unwrap().url, "b.png");
        library.skip(5.1);
        assert_eq!(library.current().unwrap().url, "a.png");
    }

    #[test]
    fn file_loader_rejects_missing_and_remote() {
        assert!(FileAssetLoader.load("/no/such/image.png").is_err());
        assert!(FileAssetLoader.load("https://example.com/a.png").is_err());
    }
}
