//! Compatibility Store
//!
//! Loads per-feature, per-platform compatibility datasets from disk and serves
//! them to the checkers. Datasets are loaded once and never mutated.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::platform::{canonical_platform_id, Feature, TargetPlatform};
use crate::{Error, Result};

/// Compatibility status of a feature on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Yes,
    No,
    Maybe,
    Unknown,
}

impl Status {
    /// Decode a support marker; a missing marker means supported
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            None | Some("y") => Status::Yes,
            Some("n") => Status::No,
            Some("m") => Status::Maybe,
            Some(_) => Status::Unknown,
        }
    }

    pub fn is_supported(self) -> bool {
        self == Status::Yes
    }
}

/// Status carried by a dataset entry.
///
/// An entry is either a bare marker string or an object whose `_supported`
/// (or `supported`) member holds the marker.
pub fn status_of(entry: &Value) -> Status {
    match entry {
        Value::String(marker) => Status::from_marker(Some(marker.as_str())),
        Value::Object(map) => {
            let marker = map.get("_supported").or_else(|| map.get("supported"));
            match marker {
                None => Status::Yes,
                Some(Value::String(marker)) => Status::from_marker(Some(marker.as_str())),
                Some(_) => Status::Unknown,
            }
        }
        _ => Status::Unknown,
    }
}

/// Public member of a dataset entry; `_`-prefixed keys are reserved
pub fn member<'a>(entry: &'a Value, key: &str) -> Option<&'a Value> {
    if key.starts_with('_') {
        return None;
    }
    entry.as_object()?.get(key)
}

/// One compatibility dataset (a feature on a canonical platform)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(rename = "compatibility-data", default)]
    entries: Map<String, Value>,
}

impl Dataset {
    pub fn from_entries(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    /// Parse a dataset file's contents
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Top-level entry (property, tag or media type)
    pub fn entry(&self, key: &str) -> Option<&Value> {
        if key.starts_with('_') {
            return None;
        }
        self.entries.get(key)
    }

    /// Walk nested entries, e.g. `["video", "preload", "auto"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter().try_fold(self.entry(first)?, |entry, key| member(entry, key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owned dataset cache plus the platform resolution memo
#[derive(Debug)]
pub struct CompatStore {
    data_root: PathBuf,
    /// lowercased raw platform id -> canonical id
    resolved: RwLock<HashMap<String, String>>,
    datasets: RwLock<HashMap<(Feature, String), Arc<Dataset>>>,
}

/// A dataset that still has to be read
struct PendingLoad {
    feature: Feature,
    canonical: String,
    original: String,
}

impl CompatStore {
    /// Create a store reading `<data_root>/<feature>/data-<platform>.json`
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            resolved: RwLock::new(HashMap::new()),
            datasets: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Resolve a user platform id to its canonical catalog id (memoized)
    pub fn resolve(&self, raw: &str) -> Result<String> {
        let key = raw.to_lowercase();
        if let Some(canonical) = self.resolved.read().get(&key) {
            return Ok(canonical.clone());
        }

        let canonical = canonical_platform_id(&key).ok_or_else(|| Error::NoMatch {
            platform: raw.to_string(),
        })?;
        tracing::debug!("Resolved platform {} to {}", raw, canonical);
        self.resolved.write().insert(key, canonical.clone());
        Ok(canonical)
    }

    /// Load every (feature, platform) dataset not cached yet.
    ///
    /// All platforms are resolved before any file is read. Pending files are
    /// read concurrently and committed only if every one of them loads.
    pub async fn load(&self, features: &[Feature], platforms: &[TargetPlatform]) -> Result<()> {
        let mut canonical_ids = Vec::with_capacity(platforms.len());
        for platform in platforms {
            canonical_ids.push(self.resolve(&platform.platform_id)?);
        }

        let mut pending: Vec<PendingLoad> = Vec::new();
        {
            let datasets = self.datasets.read();
            for &feature in features {
                for (platform, canonical) in platforms.iter().zip(&canonical_ids) {
                    let cached = datasets.contains_key(&(feature, canonical.clone()));
                    let queued = pending
                        .iter()
                        .any(|p| p.feature == feature && &p.canonical == canonical);
                    if cached || queued {
                        continue;
                    }
                    pending.push(PendingLoad {
                        feature,
                        canonical: canonical.clone(),
                        original: platform.platform_id.clone(),
                    });
                }
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        tracing::debug!("Loading {} compatibility datasets", pending.len());
        let loaded = futures::future::try_join_all(pending.iter().map(|p| self.read_dataset(p))).await?;

        let mut datasets = self.datasets.write();
        for (p, dataset) in pending.into_iter().zip(loaded) {
            tracing::info!("Loaded {} data for {} ({} entries)", p.feature, p.canonical, dataset.len());
            datasets.insert((p.feature, p.canonical), Arc::new(dataset));
        }
        Ok(())
    }

    /// Blocking wrapper around [`CompatStore::load`]
    pub fn load_blocking(&self, features: &[Feature], platforms: &[TargetPlatform]) -> Result<()> {
        smol::block_on(self.load(features, platforms))
    }

    async fn read_dataset(&self, pending: &PendingLoad) -> Result<Dataset> {
        let path = self
            .data_root
            .join(pending.feature.as_str())
            .join(format!("data-{}.json", pending.canonical));

        let text = smol::fs::read_to_string(&path).await.map_err(|source| Error::DataLoad {
            feature: pending.feature,
            platform: pending.original.clone(),
            path: path.clone(),
            source,
        })?;

        Dataset::from_json(&text).map_err(|source| Error::DataParse {
            feature: pending.feature,
            platform: pending.original.clone(),
            source,
        })
    }

    /// Dataset for a raw platform id, if it was loaded
    pub fn get(&self, feature: Feature, raw: &str) -> Option<Arc<Dataset>> {
        let canonical = self.resolve(raw).ok()?;
        self.datasets.read().get(&(feature, canonical)).cloned()
    }

    /// Like [`CompatStore::get`], but a missing dataset is an error
    pub fn require(&self, feature: Feature, raw: &str) -> Result<Arc<Dataset>> {
        self.get(feature, raw).ok_or_else(|| Error::DataNotLoaded {
            feature,
            platform: raw.to_string(),
        })
    }

    pub fn is_loaded(&self, feature: Feature, raw: &str) -> bool {
        self.get(feature, raw).is_some()
    }

    /// Install an in-memory dataset for a raw platform id
    pub fn insert_dataset(&self, feature: Feature, raw: &str, dataset: Dataset) -> Result<()> {
        let canonical = self.resolve(raw)?;
        self.datasets.write().insert((feature, canonical), Arc::new(dataset));
        Ok(())
    }
}
