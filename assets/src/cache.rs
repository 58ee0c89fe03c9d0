//! Memoizing caches for impulse and HRTF assets.
//!
//! Both caches share the same discipline: the manifest is fetched once
//! and memoized (substituting an empty catalog, with a single warning,
//! if it cannot be fetched); each binary asset is fetched once per key;
//! concurrent requests for one key share a single load; a failed load
//! is not cached and is retried on the next request.

use async_trait::async_trait;
use engine_core::{AudioData, Error};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

use crate::manifest::{HrtfManifest, HrtfPositionDescriptor, ImpulseManifest, ImpulsePresetDescriptor};

/// Source of raw asset bytes, keyed by a path relative to the asset
/// base. Abstracted so tests can substitute failures and counters.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, Error>;
}

/// Fetches assets from a directory on disk.
pub struct FsFetcher {
    base: PathBuf,
}

impl FsFetcher {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl AssetFetcher for FsFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, Error> {
        let full = self.base.join(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| Error::Asset(format!("failed to read {}: {}", full.display(), e)))
    }
}

/// Per-key cache entry. The async mutex serializes concurrent loads of
/// the same key; `None` means not yet (successfully) loaded.
type Slot = Arc<AsyncMutex<Option<Arc<AudioData>>>>;

fn slot_for(entries: &Mutex<HashMap<String, Slot>>, key: &str) -> Slot {
    let mut map = entries.lock().unwrap();
    map.entry(key.to_string()).or_default().clone()
}

async fn fetch_and_decode(fetcher: &dyn AssetFetcher, file: &str) -> Result<AudioData, Error> {
    let bytes = fetcher.fetch(file).await?;
    let ext = file.rsplit('.').next().filter(|e| e.len() <= 4);
    audio_io::decode_bytes(bytes, ext)
}

/// Cache for room impulse responses.
pub struct ImpulseCache {
    fetcher: Arc<dyn AssetFetcher>,
    manifest_file: String,
    catalog: OnceCell<Vec<ImpulsePresetDescriptor>>,
    entries: Mutex<HashMap<String, Slot>>,
    sample_rate: u32,
    fallback: OnceLock<Arc<AudioData>>,
}

impl ImpulseCache {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, manifest_file: &str, sample_rate: u32) -> Self {
        Self {
            fetcher,
            manifest_file: manifest_file.to_string(),
            catalog: OnceCell::new(),
            entries: Mutex::new(HashMap::new()),
            sample_rate,
            fallback: OnceLock::new(),
        }
    }

    /// The preset catalog; empty (with a one-time warning) if the
    /// manifest could not be fetched or parsed.
    pub async fn catalog(&self) -> &[ImpulsePresetDescriptor] {
        self.catalog
            .get_or_init(|| async {
                match self.fetcher.fetch(&self.manifest_file).await.and_then(|b| {
                    serde_json::from_slice::<ImpulseManifest>(&b)
                        .map_err(|e| Error::Asset(format!("bad impulse manifest: {}", e)))
                }) {
                    Ok(manifest) => manifest.presets,
                    Err(e) => {
                        warn!("impulse manifest unavailable, reverb presets disabled: {}", e);
                        Vec::new()
                    }
                }
            })
            .await
    }

    pub async fn preset(&self, id: &str) -> Option<ImpulsePresetDescriptor> {
        self.catalog().await.iter().find(|p| p.id == id).cloned()
    }

    /// The deterministic procedural impulse used when a real one is
    /// unavailable.
    pub fn fallback_impulse(&self) -> Arc<AudioData> {
        self.fallback
            .get_or_init(|| Arc::new(dsp::noise::procedural_impulse(self.sample_rate)))
            .clone()
    }

    /// Obtain the impulse for a preset. Never fails: unknown presets
    /// and fetch/decode errors yield the procedural fallback, and a
    /// failed load is retried on the next request.
    pub async fn impulse(&self, id: &str) -> Arc<AudioData> {
        let Some(desc) = self.preset(id).await else {
            warn!("unknown reverb preset '{}', using procedural impulse", id);
            return self.fallback_impulse();
        };

        let slot = slot_for(&self.entries, &desc.file);
        let mut guard = slot.lock().await;
        if let Some(data) = guard.as_ref() {
            return data.clone();
        }
        match fetch_and_decode(self.fetcher.as_ref(), &desc.file).await {
            Ok(data) => {
                debug!("loaded impulse '{}' ({} frames)", id, data.frames());
                let data = Arc::new(data);
                *guard = Some(data.clone());
                data
            }
            Err(e) => {
                warn!("impulse '{}' failed to load, using fallback: {}", id, e);
                self.fallback_impulse()
            }
        }
    }
}

/// Cache for HRTF impulse pairs. Unlike impulses there is no per-asset
/// fallback: a failure here disables the HRTF path for the session.
pub struct HrtfCache {
    fetcher: Arc<dyn AssetFetcher>,
    manifest_file: String,
    catalog: OnceCell<Vec<HrtfPositionDescriptor>>,
    entries: Mutex<HashMap<String, Slot>>,
}

impl HrtfCache {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, manifest_file: &str) -> Self {
        Self {
            fetcher,
            manifest_file: manifest_file.to_string(),
            catalog: OnceCell::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The measured-position catalog; empty (with a one-time warning)
    /// if the manifest could not be fetched or parsed.
    pub async fn catalog(&self) -> &[HrtfPositionDescriptor] {
        self.catalog
            .get_or_init(|| async {
                match self.fetcher.fetch(&self.manifest_file).await.and_then(|b| {
                    serde_json::from_slice::<HrtfManifest>(&b)
                        .map_err(|e| Error::Asset(format!("bad HRTF manifest: {}", e)))
                }) {
                    Ok(manifest) => manifest.positions,
                    Err(e) => {
                        warn!("HRTF manifest unavailable, falling back to panner: {}", e);
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Fetch one stereo impulse pair. Errors propagate so the caller
    /// can disable the HRTF path; the failed key stays uncached and
    /// would be retried in a later session.
    pub async fn pair(&self, file: &str) -> Result<Arc<AudioData>, Error> {
        let slot = slot_for(&self.entries, file);
        let mut guard = slot.lock().await;
        if let Some(data) = guard.as_ref() {
            return Ok(data.clone());
        }
        let data = Arc::new(fetch_and_decode(self.fetcher.as_ref(), file).await?);
        if data.channels.len() < 2 {
            return Err(Error::Asset(format!("HRTF pair '{}' is not stereo", file)));
        }
        *guard = Some(data.clone());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher that counts requests and can be primed to fail.
    struct ScriptedFetcher {
        files: HashMap<String, Vec<u8>>,
        fail_first: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(files: HashMap<String, Vec<u8>>) -> Self {
            Self {
                files,
                fail_first: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AssetFetcher for ScriptedFetcher {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Asset("scripted failure".to_string()));
            }
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::Asset(format!("missing {}", path)))
        }
    }

    fn manifest_bytes() -> Vec<u8> {
        serde_json::to_vec(&ImpulseManifest {
            presets: vec![ImpulsePresetDescriptor {
                id: "hall".to_string(),
                label: "Hall".to_string(),
                description: String::new(),
                file: "irs/hall.wav".to_string(),
                decay_seconds: 1.0,
                recommended_pre_delay: 0.02,
                default_early_mix: 0.5,
                default_reverb_mix: 0.7,
                default_width: 1.0,
            }],
        })
        .unwrap()
    }

    fn wav_bytes(frames: usize) -> Vec<u8> {
        let samples = vec![0.25f32; frames];
        audio_io::encode_stereo_pcm16(&samples, &samples, 48000)
    }

    #[test_log::test(tokio::test)]
    async fn impulse_is_memoized() {
        let mut files = HashMap::new();
        files.insert("impulses.json".to_string(), manifest_bytes());
        files.insert("irs/hall.wav".to_string(), wav_bytes(256));
        let fetcher = Arc::new(ScriptedFetcher::new(files));
        let cache = ImpulseCache::new(fetcher.clone(), "impulses.json", 48000);

        let a = cache.impulse("hall").await;
        let b = cache.impulse("hall").await;
        assert!(Arc::ptr_eq(&a, &b));
        // One manifest fetch plus one asset fetch.
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    }

    #[test_log::test(tokio::test)]
    async fn failed_load_falls_back_and_is_retried() {
        let mut files = HashMap::new();
        files.insert("impulses.json".to_string(), manifest_bytes());
        files.insert("irs/hall.wav".to_string(), wav_bytes(256));
        let fetcher = Arc::new(ScriptedFetcher::new(files));
        let cache = ImpulseCache::new(fetcher.clone(), "impulses.json", 48000);

        // Manifest loads, then the asset fetch fails once.
        cache.catalog().await;
        fetcher.fail_first.store(1, Ordering::SeqCst);

        let fallback = cache.impulse("hall").await;
        assert!(Arc::ptr_eq(&fallback, &cache.fallback_impulse()));

        // The failure was not cached: the next request succeeds.
        let real = cache.impulse("hall").await;
        assert!(!Arc::ptr_eq(&real, &fallback));
        assert_eq!(real.frames(), 256);
    }

    #[test_log::test(tokio::test)]
    async fn missing_manifest_yields_empty_catalog() {
        let fetcher = Arc::new(ScriptedFetcher::new(HashMap::new()));
        let cache = ImpulseCache::new(fetcher.clone(), "impulses.json", 48000);
        assert!(cache.catalog().await.is_empty());
        assert!(cache.catalog().await.is_empty());
        // Manifest fetch attempted only once.
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        // Unknown presets still resolve to the fallback impulse.
        let imp = cache.impulse("anything").await;
        assert_eq!(imp.channels.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn hrtf_errors_propagate() {
        let mut files = HashMap::new();
        files.insert(
            "hrtf.json".to_string(),
            serde_json::to_vec(&HrtfManifest {
                positions: vec![HrtfPositionDescriptor {
                    azimuth: 0.0,
                    elevation: 0.0,
                    file: "hrtf/front.wav".to_string(),
                }],
            })
            .unwrap(),
        );
        files.insert("hrtf/front.wav".to_string(), wav_bytes(128));
        let fetcher = Arc::new(ScriptedFetcher::new(files));
        let cache = HrtfCache::new(fetcher.clone(), "hrtf.json");

        assert_eq!(cache.catalog().await.len(), 1);
        assert!(cache.pair("hrtf/front.wav").await.is_ok());
        assert!(cache.pair("hrtf/absent.wav").await.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn fs_fetcher_reads_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.bin"), b"hello")
            .await
            .unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("a.bin").await.unwrap(), b"hello");
        assert!(fetcher.fetch("missing.bin").await.is_err());
    }
}
