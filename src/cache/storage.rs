use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs;

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Directory of normalized reference images. Files are only ever added by
/// [`ReferenceCache::put`] and removed by eviction.
#[derive(Clone, Debug)]
pub struct ReferenceCache {
    base_dir: PathBuf,
}

impl ReferenceCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .await
            .with_context(|| format!("failed to create cache dir {}", self.base_dir.display()))
    }

    /// Writes `data` under `file_name` through a temporary sibling so readers
    /// never observe a partial file.
    pub async fn put(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.resolve_path(file_name);
        let partial = self.resolve_path(&format!(".{file_name}.part"));
        if let Err(err) = fs::write(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(err).with_context(|| format!("failed to write {}", partial.display()));
        }
        if let Err(err) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(err).with_context(|| format!("failed to move into {}", path.display()));
        }
        Ok(path)
    }

    pub async fn exists(path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    pub fn resolve_path(&self, file_name: &str) -> PathBuf {
        let normalized = file_name.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }

    /// `{subject}-{source}-{millis}{ext}` where `ext` keeps its leading dot.
    pub fn entry_name(subject: &str, source: &str, extension: &str) -> String {
        format!(
            "{}-{}-{}{}",
            sanitize_name(subject),
            source,
            next_stamp(),
            extension
        )
    }
}

/// Lowercases and replaces everything outside `[a-z0-9]` with `-`.
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_lowercase() || ch.is_ascii_digit() { ch } else { '-' })
        .collect()
}

// Millisecond timestamp, bumped when two entries land in the same millisecond.
fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("Oprah Winfrey"), "oprah-winfrey");
        assert_eq!(sanitize_name("J.A.R.V.I.S."), "j-a-r-v-i-s-");
        assert_eq!(sanitize_name("C-3PO"), "c-3po");
    }

    #[test]
    fn entry_names_are_distinct_for_identical_inputs() {
        let first = ReferenceCache::entry_name("Ada Lovelace", "google", ".jpg");
        let second = ReferenceCache::entry_name("Ada Lovelace", "google", ".jpg");
        assert_ne!(first, second);
        assert!(first.starts_with("ada-lovelace-google-"));
        assert!(first.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn put_writes_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path().join("nested"));
        let path = cache.put("a.jpg", b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        let names: Vec<_> = std::fs::read_dir(cache.base_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(ReferenceCache::exists(&path).await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let device_full = Path::new("/dev/full");
        if !device_full.exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path().to_path_buf());
        // every write through this link fails with ENOSPC
        let partial = cache.resolve_path(".a.jpg.part");
        std::os::unix::fs::symlink(device_full, &partial).unwrap();

        assert!(cache.put("a.jpg", b"bytes").await.is_err());

        assert!(std::fs::symlink_metadata(&partial).is_err());
        assert!(!cache.resolve_path("a.jpg").exists());
    }
}
