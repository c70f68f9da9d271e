use std::time::{Duration, SystemTime};

use anyhow::Result;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ReferenceCache;

pub const MAX_ENTRY_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

impl ReferenceCache {
    /// Deletes regular files whose modification time is more than `max_age`
    /// before `now`. Returns how many were removed.
    pub async fn evict_older_than(&self, max_age: Duration, now: SystemTime) -> Result<usize> {
        let mut dir = match fs::read_dir(self.base_dir()).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %entry.path().display(), "evicted cached reference image");
                }
                Err(err) => {
                    warn!(
                        path = %entry.path().display(),
                        error = %err,
                        "failed to evict cached file"
                    )
                }
            }
        }
        Ok(removed)
    }

    pub async fn evict_expired(&self) -> usize {
        match self.evict_older_than(MAX_ENTRY_AGE, SystemTime::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "cleaned up old reference images");
                }
                removed
            }
            Err(err) => {
                warn!(error = %err, "reference cache cleanup failed");
                0
            }
        }
    }
}

/// Runs one sweep immediately, then spawns a task that sweeps every `interval`.
pub async fn start_eviction(cache: ReferenceCache, interval: Duration) -> JoinHandle<()> {
    cache.evict_expired().await;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately and the startup sweep already ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache.evict_expired().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(path: &std::path::Path, modified: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[tokio::test]
    async fn removes_only_entries_past_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let old = dir.path().join("old-google-1.jpg");
        let fresh = dir.path().join("fresh-google-2.jpg");
        touch(&old, now - Duration::from_secs(25 * 60 * 60));
        touch(&fresh, now - Duration::from_secs(60 * 60));

        let cache = ReferenceCache::new(dir.path().to_path_buf());
        let removed = cache.evict_older_than(MAX_ENTRY_AGE, now).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn startup_sweep_runs_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let old = dir.path().join("old-pexels-1.jpg");
        let fresh = dir.path().join("fresh-pexels-2.jpg");
        touch(&old, now - Duration::from_secs(25 * 60 * 60));
        touch(&fresh, now);

        let cache = ReferenceCache::new(dir.path().to_path_buf());
        let handle = start_eviction(cache, SWEEP_INTERVAL).await;

        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn periodic_sweep_removes_entries_that_age_out_later() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start_eviction(
            ReferenceCache::new(dir.path().to_path_buf()),
            Duration::from_millis(20),
        )
        .await;

        // written after the startup sweep, so only an interval tick can remove it
        let stale = dir.path().join("stale-google-3.jpg");
        touch(&stale, SystemTime::now() - Duration::from_secs(25 * 60 * 60));

        let mut removed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !stale.exists() {
                removed = true;
                break;
            }
        }
        handle.abort();
        assert!(removed, "interval sweep never removed the stale entry");
    }

    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path().join("absent"));
        assert_eq!(cache.evict_expired().await, 0);
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();
        let cache = ReferenceCache::new(dir.path().to_path_buf());
        let later = SystemTime::now() + Duration::from_secs(48 * 60 * 60);
        let removed = cache.evict_older_than(MAX_ENTRY_AGE, later).await.unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("keep").exists());
    }
}
