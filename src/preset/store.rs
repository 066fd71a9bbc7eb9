//! Preset file store
//! Keeps the preset bundle in one JSON file and handles import/export of bundles.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{error, info, warn};
use tokio::fs;
use uuid::Uuid;

use crate::preset::{BUNDLE_VERSION, PresetBundle, PresetConfig, PresetRecord};
use crate::utils::ensure_directory_exists;

pub struct PresetStore {
    path: PathBuf,
    bundle: PresetBundle,
}

/// Parses a bundle, migrating legacy preset shapes on the way in.
pub fn parse_bundle(json: &str) -> Result<PresetBundle> {
    let mut bundle: PresetBundle = serde_json::from_str(json).context("Invalid preset bundle")?;
    if bundle.version > BUNDLE_VERSION {
        bail!(
            "Preset bundle version {} is newer than supported version {}",
            bundle.version,
            BUNDLE_VERSION
        );
    }
    if bundle.version < BUNDLE_VERSION {
        info!(
            "Migrating preset bundle from version {} to {}",
            bundle.version, BUNDLE_VERSION
        );
        bundle.version = BUNDLE_VERSION;
    }
    Ok(bundle)
}

impl PresetStore {
    /// Loads the store at `path`. A missing file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            warn!("Preset file not found at {:?}, starting empty.", path);
            return Ok(Self {
                path,
                bundle: PresetBundle::default(),
            });
        }

        let json = fs::read_to_string(&path).await?;
        let bundle = parse_bundle(&json).with_context(|| format!("Failed to load {:?}", path))?;
        info!("Loaded {} preset(s) from {:?}", bundle.presets.len(), path);
        Ok(Self { path, bundle })
    }

    /// Writes the store back, always in the current bundle format.
    pub async fn save(&self) -> Result<()> {
        write_bundle(&self.path, &self.bundle).await?;
        info!("Presets saved to {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn presets(&self) -> &[PresetRecord] {
        &self.bundle.presets
    }

    pub fn get(&self, id: &str) -> Option<&PresetRecord> {
        self.bundle.presets.iter().find(|p| p.id == id)
    }

    /// Adds a new preset under a fresh id and returns it.
    pub fn add(&mut self, name: impl Into<String>, config: PresetConfig) -> &PresetRecord {
        let record = PresetRecord::new(name, config);
        info!("Adding preset {:?} ({})", record.name, record.id);
        self.bundle.presets.push(record);
        &self.bundle.presets[self.bundle.presets.len() - 1]
    }

    pub fn remove(&mut self, id: &str) -> Option<PresetRecord> {
        let index = self.bundle.presets.iter().position(|p| p.id == id)?;
        Some(self.bundle.presets.remove(index))
    }

    /// Merges the presets of another bundle file. Records whose id is already
    /// taken are kept under a new id. Returns the number of imported presets.
    pub async fn import(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let incoming = parse_bundle(&json)?;

        let count = incoming.presets.len();
        for mut record in incoming.presets {
            if self.get(&record.id).is_some() {
                let id = Uuid::new_v4().to_string();
                warn!("Preset id {} already exists, importing {:?} as {}", record.id, record.name, id);
                record.id = id;
            }
            self.bundle.presets.push(record);
        }
        info!("Imported {} preset(s) from {:?}", count, path);
        Ok(count)
    }

    pub async fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_bundle(path, &self.bundle).await?;
        info!("Exported {} preset(s) to {:?}", self.bundle.presets.len(), path);
        Ok(())
    }
}

async fn write_bundle(path: &Path, bundle: &PresetBundle) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        ensure_directory_exists(dir).await?;
    }
    let json = match serde_json::to_string_pretty(bundle) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize presets to JSON: {}", e);
            return Err(e.into());
        }
    };
    fs::write(path, json).await?;
    Ok(())
}
