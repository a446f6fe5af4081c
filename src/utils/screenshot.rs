use crate::core::PageDriver;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{error, info};

/// Directory that receives diagnostic screenshots.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.png`, with the prefix reduced to
    /// filename-safe characters.
    pub fn artifact_path(&self, prefix: &str, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.png",
            sanitize(prefix),
            at.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Writes `bytes` under a fresh name. An existing file with the same
    /// timestamp gets a numeric suffix instead of being overwritten.
    pub async fn save(&self, prefix: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let base = self.artifact_path(prefix, Utc::now());
        let mut path = base.clone();
        let mut n = 1;
        while tokio::fs::try_exists(&path).await? {
            path = base.with_extension(format!("{}.png", n));
            n += 1;
        }

        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Writes `bytes` to exactly `<dir>/<name>.png`, replacing any previous run.
    pub async fn save_named(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.png", sanitize(name)));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Best effort: screenshot failures are logged and yield `None`.
    pub async fn capture<D: PageDriver + ?Sized>(&self, driver: &D, prefix: &str) -> Option<PathBuf> {
        let saved = match driver.take_screenshot().await {
            Ok(bytes) => self.save(prefix, &bytes).await,
            Err(e) => Err(e),
        };

        match saved {
            Ok(path) => {
                info!("Saved screenshot: {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to save screenshot: {}", e);
                None
            }
        }
    }
}

fn sanitize(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "screenshot".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTodoPage;
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    #[test]
    fn path_uses_utc_timestamp_and_safe_prefix() {
        let store = ArtifactStore::new("artifacts/screenshots");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            store.artifact_path("test add/task", at),
            PathBuf::from("artifacts/screenshots/test_add_task_20240309_140507.png")
        );
        assert_eq!(
            store.artifact_path("", at),
            PathBuf::from("artifacts/screenshots/screenshot_20240309_140507.png")
        );
    }

    #[tokio::test]
    async fn same_second_saves_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));

        let first = assert_ok!(store.save("failure", b"one").await);
        let second = assert_ok!(store.save("failure", b"two").await);

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn capture_writes_driver_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let page = FakeTodoPage::new();

        let path = store.capture(&page, "test_add_task_failure").await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(std::fs::read(&path).unwrap().starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn capture_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let page = FakeTodoPage::new().with_screenshot_failure();

        assert_eq!(store.capture(&page, "failure").await, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
