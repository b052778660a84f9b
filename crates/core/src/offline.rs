//! Local queue of narratives generated while the database was unreachable.
//!
//! Layout: `{root}/{user_id}/{kind}_narrative_{YYYYmmddHHMMSSmmm}.json`, one record per file.
//! Files are replayed in filename order and removed once the database accepts them.

use crate::constants::CACHE_FILE_TIMESTAMP_FORMAT;
use crate::repositories::narratives::NewNarrative;
use crate::repositories::NarrativeStore;
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// Outcome of replaying a user's cached narratives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub uploaded: u32,
    pub failed: u32,
    /// Files still on disk afterwards, including unparseable ones.
    pub remaining: u32,
}

impl From<ReplayReport> for pb::SyncOfflineCacheRes {
    fn from(r: ReplayReport) -> Self {
        pb::SyncOfflineCacheRes {
            uploaded: r.uploaded,
            failed: r.failed,
            remaining: r.remaining,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfflineCache {
    root: PathBuf,
    /// One replay at a time per user directory.
    replays: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl OfflineCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            replays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-user directory. Characters outside `[A-Za-z0-9_-]` are replaced so an id can never
    /// escape the cache root.
    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = if safe.is_empty() { "anonymous".to_string() } else { safe };
        self.root.join(safe)
    }

    /// Write `narrative` to the user's cache directory and return the file path.
    pub async fn store(
        &self,
        narrative: &NewNarrative,
        now: NaiveDateTime,
    ) -> NarrativeResult<PathBuf> {
        let dir = self.user_dir(&narrative.user_id);
        tokio::fs::create_dir_all(&dir).await?;

        let stem = format!(
            "{}_narrative_{}",
            narrative.kind,
            now.format(CACHE_FILE_TIMESTAMP_FORMAT)
        );
        let bytes = serde_json::to_vec_pretty(narrative)?;

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt:03}.json")
            };
            let path = dir.join(name);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&bytes).await?;
                    file.flush().await?;
                    tracing::info!(path = %path.display(), "narrative cached offline");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cached files for a user, sorted by filename.
    pub async fn pending(&self, user_id: &str) -> NarrativeResult<Vec<PathBuf>> {
        let dir = self.user_dir(user_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Upload every cached narrative for `user`, deleting each file the store accepts.
    ///
    /// Replays for the same user run one after another; a file already gone counts as handled.
    pub async fn replay(
        &self,
        store: &dyn NarrativeStore,
        user: &UserContext,
    ) -> NarrativeResult<ReplayReport> {
        let gate = self.replay_gate(user.user_id());
        let _guard = gate.lock().await;
        let mut report = ReplayReport::default();

        for path in self.pending(user.user_id()).await? {
            let narrative = match read_cached(&path).await {
                Ok(n) => n,
                Err(NarrativeError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable cache file: {e}");
                    report.remaining += 1;
                    continue;
                }
            };

            match store.insert(user, &narrative).await {
                Ok(record) => {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                    tracing::info!(id = %record.id, path = %path.display(), "uploaded cached narrative");
                    report.uploaded += 1;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "failed to upload cached narrative: {e}");
                    report.failed += 1;
                    report.remaining += 1;
                }
            }
        }

        Ok(report)
    }

    fn replay_gate(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.replays.lock().unwrap_or_else(|p| p.into_inner());
        gates.entry(self.user_dir(user_id)).or_default().clone()
    }
}

async fn read_cached(path: &Path) -> NarrativeResult<NewNarrative> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryNarrativeStore;
    use chrono::NaiveDate;
    use ezn_types::NarrativeKind;
    use serde_json::json;

    fn at(ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_milli_opt(14, 5, 9, ms)
            .unwrap()
    }

    fn narrative(user_id: &str, kind: NarrativeKind, title: &str) -> NewNarrative {
        NewNarrative {
            user_id: user_id.into(),
            kind,
            title: title.into(),
            content: "text".into(),
            form_data: json!({ "unit": "Medic 1" }),
            created_at: "2025-03-04T14:05:09".into(),
        }
    }

    #[tokio::test]
    async fn store_names_files_by_kind_and_millisecond() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());

        let path = cache
            .store(&narrative("u1", NarrativeKind::Ems, "a"), at(7))
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "ems_narrative_20250304140509007.json"
        );
        assert_eq!(path.parent().unwrap(), dir.path().join("u1"));
    }

    #[tokio::test]
    async fn same_millisecond_gets_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());

        let first = cache.store(&narrative("u1", NarrativeKind::Fire, "a"), at(1)).await.unwrap();
        let second = cache.store(&narrative("u1", NarrativeKind::Fire, "b"), at(1)).await.unwrap();
        assert_ne!(first, second);
        assert!(second.to_str().unwrap().ends_with("_001.json"));
        assert_eq!(cache.pending("u1").await.unwrap().len(), 2);
    }

    #[test]
    fn user_dir_cannot_escape_root() {
        let cache = OfflineCache::new("/cache");
        assert_eq!(cache.user_dir("../etc"), PathBuf::from("/cache/___etc"));
        assert_eq!(cache.user_dir(""), PathBuf::from("/cache/anonymous"));
    }

    #[tokio::test]
    async fn pending_for_unknown_user_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        assert!(cache.pending("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_uploads_in_filename_order_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        cache.store(&narrative("u1", NarrativeKind::Ems, "second"), at(500)).await.unwrap();
        cache.store(&narrative("u1", NarrativeKind::Ems, "first"), at(100)).await.unwrap();

        let store = InMemoryNarrativeStore::default();
        let user = UserContext::new("u1", "jwt");
        let report = cache.replay(&store, &user).await.unwrap();

        assert_eq!(report, ReplayReport { uploaded: 2, failed: 0, remaining: 0 });
        let titles: Vec<_> = store.rows().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert!(cache.pending("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_uploads_and_corrupt_files_stay_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        cache.store(&narrative("u1", NarrativeKind::Fire, "kept"), at(1)).await.unwrap();
        tokio::fs::write(dir.path().join("u1").join("ems_narrative_0.json"), b"{not json")
            .await
            .unwrap();

        let store = InMemoryNarrativeStore::default();
        store.set_online(false);
        let report = cache.replay(&store, &UserContext::new("u1", "jwt")).await.unwrap();

        assert_eq!(report, ReplayReport { uploaded: 0, failed: 1, remaining: 2 });
        assert_eq!(cache.pending("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn many_collisions_keep_generation_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        for n in 0..12 {
            let title = format!("n{n:02}");
            cache.store(&narrative("u1", NarrativeKind::Ems, &title), at(3)).await.unwrap();
        }

        let store = InMemoryNarrativeStore::default();
        cache.replay(&store, &UserContext::new("u1", "jwt")).await.unwrap();
        let titles: Vec<_> = store.rows().into_iter().map(|r| r.title).collect();
        let expected: Vec<_> = (0..12).map(|n| format!("n{n:02}")).collect();
        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn concurrent_replays_upload_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        for ms in 0..5 {
            cache.store(&narrative("u1", NarrativeKind::Fire, "x"), at(ms)).await.unwrap();
        }

        let store = InMemoryNarrativeStore::default();
        let user = UserContext::new("u1", "jwt");
        let (a, b) = tokio::join!(cache.replay(&store, &user), cache.replay(&store, &user));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.uploaded + b.uploaded, 5);
        assert_eq!(a.remaining + b.remaining, 0);
        assert_eq!(store.rows().len(), 5);
        assert!(cache.pending("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_replay_after_partial_failure_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());
        cache.store(&narrative("u1", NarrativeKind::Ems, "a"), at(1)).await.unwrap();
        cache.store(&narrative("u1", NarrativeKind::Ems, "b"), at(2)).await.unwrap();
        tokio::fs::write(dir.path().join("u1").join("ems_narrative_0.json"), b"{not json")
            .await
            .unwrap();
        let store = InMemoryNarrativeStore::default();
        let user = UserContext::new("u1", "jwt");

        store.set_online(false);
        let first = cache.replay(&store, &user).await.unwrap();
        assert_eq!(first, ReplayReport { uploaded: 0, failed: 2, remaining: 3 });

        store.set_online(true);
        let second = cache.replay(&store, &user).await.unwrap();
        assert_eq!(second, ReplayReport { uploaded: 2, failed: 0, remaining: 1 });

        let third = cache.replay(&store, &user).await.unwrap();
        assert_eq!(third, ReplayReport { uploaded: 0, failed: 0, remaining: 1 });
        assert_eq!(store.rows().len(), 2);
    }
}
