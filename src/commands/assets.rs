use crate::commands::settings::load_effective_settings;
use crate::offline::cache::{AssetCache, AssetRequest, CachedAsset, DirOrigin, FetchOutcome};
use crate::offline::manifest::{AssetManifest, DEFAULT_PATTERNS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "desktop")]
use std::collections::HashMap;
#[cfg(feature = "desktop")]
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatus {
    pub enabled: bool,
    pub cache_name: String,
    pub installed: usize,
    pub removed_caches: Vec<String>,
}

/// Answers asset requests for one data directory and one asset root. Opened
/// once at startup and shared between the commands and the `offline://`
/// protocol.
pub struct OfflineAssets {
    data_dir: String,
    cache: AssetCache,
    manifest: AssetManifest,
    origin: DirOrigin,
    enabled: bool,
}

fn scan_manifest(data_dir: &str, root: &Path) -> Result<(AssetManifest, bool), String> {
    let settings = load_effective_settings(data_dir)?;
    let manifest = AssetManifest::scan(root, &settings.asset_cache_version, DEFAULT_PATTERNS)
        .map_err(|e| format!("Manifest error: {e}"))?;
    Ok((manifest, settings.offline_cache_enabled))
}

impl OfflineAssets {
    pub fn open(data_dir: &str, assets_dir: &str) -> Result<Self, String> {
        let (manifest, enabled) = scan_manifest(data_dir, Path::new(assets_dir))?;
        let cache = AssetCache::open(data_dir).map_err(|e| format!("Asset cache error: {e}"))?;

        Ok(Self {
            data_dir: data_dir.to_string(),
            cache,
            origin: DirOrigin::new(manifest.root.clone()),
            manifest,
            enabled,
        })
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Rereads the settings and rescans the asset root, so a bumped
    /// `assetCacheVersion` or new files are picked up by the next install.
    pub fn reload(&mut self) -> Result<(), String> {
        let root: PathBuf = self.manifest.root.clone();
        let (manifest, enabled) = scan_manifest(&self.data_dir, &root)?;
        self.origin = DirOrigin::new(manifest.root.clone());
        self.manifest = manifest;
        self.enabled = enabled;
        Ok(())
    }

    /// Install followed by activate.
    pub fn refresh(&self) -> Result<OfflineStatus, String> {
        let cache_name = self.manifest.cache_name();
        if !self.enabled {
            return Ok(OfflineStatus {
                enabled: false,
                cache_name,
                installed: 0,
                removed_caches: Vec::new(),
            });
        }

        let installed = self
            .cache
            .install(&self.manifest, &self.origin)
            .map_err(|e| format!("Install error: {e}"))?;
        let removed_caches = self.activate()?;

        Ok(OfflineStatus {
            enabled: true,
            cache_name,
            installed,
            removed_caches,
        })
    }

    pub fn activate(&self) -> Result<Vec<String>, String> {
        self.cache
            .activate(&self.manifest)
            .map_err(|e| format!("Activate error: {e}"))
    }

    /// `None` means the request is not served from the offline cache.
    pub fn fetch(&self, request: &AssetRequest) -> Result<Option<CachedAsset>, String> {
        if !self.enabled {
            return Ok(None);
        }
        match self
            .cache
            .handle_fetch(&self.manifest, request, &self.origin)
            .map_err(|e| format!("Fetch error: {e}"))?
        {
            FetchOutcome::Served(asset) => Ok(Some(asset)),
            FetchOutcome::Passthrough => Ok(None),
        }
    }
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn install_offline_assets(
    state: tauri::State<'_, Mutex<OfflineAssets>>,
) -> Result<OfflineStatus, String> {
    let mut offline = state.lock().map_err(|_| "Offline cache lock error".to_string())?;
    offline.reload()?;
    offline.refresh()
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn activate_offline_assets(
    state: tauri::State<'_, Mutex<OfflineAssets>>,
) -> Result<Vec<String>, String> {
    let offline = state.lock().map_err(|_| "Offline cache lock error".to_string())?;
    offline.activate()
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn fetch_offline_asset(
    method: String,
    path: String,
    headers: Option<HashMap<String, String>>,
    state: tauri::State<'_, Mutex<OfflineAssets>>,
) -> Result<Option<CachedAsset>, String> {
    let offline = state.lock().map_err(|_| "Offline cache lock error".to_string())?;
    offline.fetch(&AssetRequest {
        method,
        path,
        headers: headers.unwrap_or_default(),
    })
}
