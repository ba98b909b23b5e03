/// Result caching in front of the resolver
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::transcript::TranscriptResult;
use crate::video_id::VideoId;

/// Cache key: one entry per (video, language)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: VideoId,
    pub language: String,
}

impl CacheKey {
    pub fn new(video_id: VideoId, language: &str) -> Self {
        Self {
            video_id,
            language: language.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.video_id, self.language)
    }
}

/// Read-through / write-through cache injected into the resolver.
///
/// Implementations swallow their own I/O failures: a broken cache degrades
/// to a miss, never to a failed resolution.
#[async_trait]
pub trait TranscriptCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<TranscriptResult>;
    async fn put(&self, key: &CacheKey, result: &TranscriptResult, ttl: Duration);
}

struct MemoryEntry {
    result: TranscriptResult,
    expires_at: Instant,
}

/// Entry count that triggers the first sweep of expired entries on `put`
const DEFAULT_SWEEP_THRESHOLD: usize = 256;

struct MemoryState {
    entries: HashMap<CacheKey, MemoryEntry>,
    next_sweep: usize,
    sweep_threshold: usize,
}

impl MemoryState {
    fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        // Live entries only move the next sweep further out
        self.next_sweep = self.sweep_threshold.max(self.entries.len().saturating_mul(2));
        before - self.entries.len()
    }
}

/// Process-local cache.
///
/// Expired entries are dropped lazily on `get` and swept in bulk whenever a
/// `put` grows the map past the sweep threshold, so keys that are never read
/// again do not accumulate.
pub struct MemoryCache {
    state: RwLock<MemoryState>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            state: RwLock::new(MemoryState {
                entries: HashMap::new(),
                next_sweep: threshold,
                sweep_threshold: threshold,
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.state.write().await.purge_expired()
    }
}

#[async_trait]
impl TranscriptCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<TranscriptResult> {
        {
            let state = self.state.read().await;
            match state.entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => return Some(entry.result.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        debug!("⏰ Memory cache entry expired: {}", key);
        self.state.write().await.entries.remove(key);
        None
    }

    async fn put(&self, key: &CacheKey, result: &TranscriptResult, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(Duration::from_secs(365 * 24 * 3600)))
            .unwrap_or(now);
        let mut state = self.state.write().await;
        state.entries.insert(
            key.clone(),
            MemoryEntry {
                result: result.clone(),
                expires_at,
            },
        );
        if state.entries.len() >= state.next_sweep {
            let removed = state.purge_expired();
            if removed > 0 {
                debug!("🧹 Swept {} expired memory cache entries", removed);
            }
        }
    }
}

/// On-disk cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTranscript {
    pub video_id: VideoId,
    pub language: String,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub result: TranscriptResult,
}

impl CachedTranscript {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    fn age_hours(&self) -> u64 {
        (Utc::now() - self.stored_at).num_hours().max(0) as u64
    }
}

/// JSON files in a directory, one per cache key
#[derive(Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Initialize cache directory
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        info!("📁 Transcript cache directory initialized: {}", self.cache_dir.display());
        Ok(())
    }

    fn file_name(key: &CacheKey) -> String {
        let digest = format!("{:x}", md5::compute(key.language.as_bytes()));
        format!("{}_{}.json", key.video_id, &digest[..8])
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(Self::file_name(key))
    }

    async fn read_entry(path: &Path) -> Option<CachedTranscript> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read cache file {}: {}", path.display(), e);
                }
                return None;
            }
        };
        match serde_json::from_str::<CachedTranscript>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Every readable entry with its path
    async fn entries(&self) -> Result<Vec<(PathBuf, CachedTranscript)>> {
        let mut found = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(cached) = Self::read_entry(&path).await {
                    found.push((path, cached));
                }
            }
        }
        Ok(found)
    }

    async fn write_entry(&self, key: &CacheKey, result: &TranscriptResult, ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let stored_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CachedTranscript {
            video_id: key.video_id.clone(),
            language: key.language.clone(),
            stored_at,
            expires_at,
            result: result.clone(),
        };

        let json_content = serde_json::to_string_pretty(&entry)?;
        tokio::fs::write(self.path_for(key), json_content).await?;
        Ok(())
    }

    /// Clean up expired cache files
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let mut cleaned_count = 0;
        for (path, entry) in self.entries().await? {
            if !entry.is_valid() && tokio::fs::remove_file(&path).await.is_ok() {
                cleaned_count += 1;
                debug!("🗑️ Removed expired cache: {}", path.display());
            }
        }

        if cleaned_count > 0 {
            info!("🧹 Cleaned up {} expired cache files", cleaned_count);
        }
        Ok(cleaned_count)
    }

    /// Get cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for (_, entry) in self.entries().await? {
            stats.total_files += 1;
            if !entry.is_valid() {
                stats.expired_files += 1;
                continue;
            }
            stats.valid_files += 1;
            if entry.result.is_available() {
                stats.available_transcripts += 1;
                stats.total_segments += entry.result.segments().len();
            } else {
                stats.unavailable_results += 1;
            }
        }
        Ok(stats)
    }

    /// Remove the entry for one language, or every language when `language` is `None`
    pub async fn invalidate(&self, video_id: &VideoId, language: Option<&str>) -> Result<usize> {
        if let Some(language) = language {
            let path = self.path_for(&CacheKey::new(video_id.clone(), language));
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("🗑️ Invalidated cache for {}:{}", video_id, language);
                    Ok(1)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Cache file not found for {}:{}", video_id, language);
                    Ok(0)
                }
                Err(e) => Err(e.into()),
            };
        }

        let mut removed = 0;
        for (path, entry) in self.entries().await? {
            if &entry.video_id == video_id && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("🗑️ Invalidated {} cache entries for {}", removed, video_id);
        }
        Ok(removed)
    }

    /// Remove every cache file
    pub async fn clear(&self) -> Result<usize> {
        let mut cleared_count = 0;
        for (path, _) in self.entries().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                cleared_count += 1;
                debug!("🗑️ Removed cache file: {}", path.display());
            }
        }

        if cleared_count > 0 {
            info!("🧹 Cleared {} cache files", cleared_count);
        }
        Ok(cleared_count)
    }

    /// List cached entries, newest first
    pub async fn list(&self) -> Result<Vec<CachedEntryInfo>> {
        let mut listed: Vec<CachedEntryInfo> = self
            .entries()
            .await?
            .into_iter()
            .map(|(_, entry)| CachedEntryInfo {
                is_valid: entry.is_valid(),
                age_hours: entry.age_hours(),
                available: entry.result.is_available(),
                segment_count: entry.result.segments().len(),
                video_id: entry.video_id,
                language: entry.language,
                stored_at: entry.stored_at,
            })
            .collect();

        listed.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(listed)
    }
}

#[async_trait]
impl TranscriptCache for FileCache {
    async fn get(&self, key: &CacheKey) -> Option<TranscriptResult> {
        let path = self.path_for(key);
        let entry = Self::read_entry(&path).await?;

        if entry.is_valid() {
            debug!("📚 Cache hit for {}", key);
            Some(entry.result)
        } else {
            info!("⏰ Cache expired for key: {}", key);
            let _ = tokio::fs::remove_file(&path).await;
            None
        }
    }

    async fn put(&self, key: &CacheKey, result: &TranscriptResult, ttl: Duration) {
        match self.write_entry(key, result, ttl).await {
            Ok(()) => debug!("💾 Cached result for {}", key),
            Err(e) => warn!("Failed to write cache entry for {}: {}", key, e),
        }
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub valid_files: usize,
    pub expired_files: usize,
    pub available_transcripts: usize,
    pub unavailable_results: usize,
    pub total_segments: usize,
}

/// Information about one cached entry
#[derive(Debug, Clone, Serialize)]
pub struct CachedEntryInfo {
    pub video_id: VideoId,
    pub language: String,
    pub available: bool,
    pub segment_count: usize,
    pub is_valid: bool,
    pub age_hours: u64,
    pub stored_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptSegment;
    use std::collections::BTreeMap;

    fn id() -> VideoId {
        "dQw4w9WgXcQ".parse().unwrap()
    }

    fn available() -> TranscriptResult {
        TranscriptResult::Available {
            video_id: id(),
            segments: vec![TranscriptSegment::new("hello", 0.0, 1.0)],
            language: "en".to_string(),
            is_auto_generated: false,
            source: "timedtext".to_string(),
        }
    }

    fn unavailable() -> TranscriptResult {
        TranscriptResult::Unavailable {
            video_id: id(),
            reason: "no strategy produced a transcript".to_string(),
            diagnostics: BTreeMap::new(),
        }
    }

    #[test]
    fn test_key_normalizes_language() {
        let key = CacheKey::new(id(), " EN ");
        assert_eq!(key.to_string(), "dQw4w9WgXcQ:en");
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip_and_expiry() {
        let cache = MemoryCache::new();
        let key = CacheKey::new(id(), "en");

        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &available(), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key).await, Some(available()));

        cache.put(&key, &available(), Duration::ZERO).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_purge() {
        let cache = MemoryCache::new();
        cache.put(&CacheKey::new(id(), "en"), &available(), Duration::ZERO).await;
        cache.put(&CacheKey::new(id(), "de"), &available(), Duration::from_secs(60)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_keys_never_read_are_reclaimed_on_put() {
        let cache = MemoryCache::with_sweep_threshold(4);
        for n in 0..100 {
            let key = CacheKey::new(id(), &format!("lang-{}", n));
            cache.put(&key, &available(), Duration::ZERO).await;
        }
        assert!(cache.len().await < 4);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let cache = MemoryCache::with_sweep_threshold(2);
        for n in 0..10 {
            let key = CacheKey::new(id(), &format!("live-{}", n));
            cache.put(&key, &available(), Duration::from_secs(60)).await;
        }
        assert_eq!(cache.len().await, 10);
        let key = CacheKey::new(id(), "live-3");
        assert_eq!(cache.get(&key).await, Some(available()));
    }

    #[tokio::test]
    async fn test_file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("transcripts"));
        let key = CacheKey::new(id(), "en");

        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &available(), Duration::from_secs(3600)).await;
        assert_eq!(cache.get(&key).await, Some(available()));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.valid_files, 1);
        assert_eq!(stats.available_transcripts, 1);
        assert_eq!(stats.total_segments, 1);
    }

    #[tokio::test]
    async fn test_file_cache_expiry_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());

        cache.put(&CacheKey::new(id(), "en"), &available(), Duration::ZERO).await;
        cache.put(&CacheKey::new(id(), "de"), &unavailable(), Duration::from_secs(3600)).await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.expired_files, 1);
        assert_eq!(stats.unavailable_results, 1);

        assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
        assert_eq!(cache.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_cache_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let other: VideoId = "abcdefghijk".parse().unwrap();

        for lang in ["en", "de", "fr"] {
            cache.put(&CacheKey::new(id(), lang), &available(), Duration::from_secs(60)).await;
        }
        cache.put(&CacheKey::new(other.clone(), "en"), &available(), Duration::from_secs(60)).await;

        assert_eq!(cache.invalidate(&id(), Some("de")).await.unwrap(), 1);
        assert_eq!(cache.invalidate(&id(), Some("de")).await.unwrap(), 0);
        assert_eq!(cache.invalidate(&id(), None).await.unwrap(), 2);
        assert!(cache.get(&CacheKey::new(other, "en")).await.is_some());

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let key = CacheKey::new(id(), "en");
        tokio::fs::write(cache.path_for(&key), "{not json").await.unwrap();
        assert!(cache.get(&key).await.is_none());
    }
}
