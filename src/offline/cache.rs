//! Cache-first storage for the application shell.
//!
//! Assets are grouped into named caches (`cache-<version>`). Installing a
//! manifest fills its cache in one go, activating it drops every other cache,
//! and fetches are answered from any cache before falling back to the origin.

use crate::error::{Result, VidaError};
use crate::offline::manifest::{normalize_path, AssetManifest};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

const ASSET_DB_FILE_NAME: &str = "assets.db";
const ASSET_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Where assets come from when they are not cached yet.
pub trait AssetOrigin {
    fn fetch(&self, path: &str) -> Result<FetchedAsset>;
}

/// Serves assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirOrigin {
    root: PathBuf,
}

impl DirOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetOrigin for DirOrigin {
    fn fetch(&self, path: &str) -> Result<FetchedAsset> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(VidaError::invalid("path", format!("`{path}` escapes the asset root")));
        }

        let body = std::fs::read(self.root.join(relative))?;
        Ok(FetchedAsset {
            body,
            content_type: content_type_for(path).to_string(),
        })
    }
}

pub fn content_type_for(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("webmanifest") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl AssetRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAsset {
    pub path: String,
    pub cache_name: String,
    pub content_type: String,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not ours to answer; the caller should go to the network as usual.
    Passthrough,
    Served(CachedAsset),
}

pub struct AssetCache {
    conn: Connection,
}

impl AssetCache {
    pub fn open(data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(Path::new(data_dir).join(ASSET_DB_FILE_NAME))?;
        initialize_asset_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_asset_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn cache_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT cache_name FROM asset_cache ORDER BY cache_name ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    /// Fetches every manifest asset and stores them under the manifest's
    /// cache. Nothing is written unless every fetch succeeds.
    pub fn install(&self, manifest: &AssetManifest, origin: &dyn AssetOrigin) -> Result<usize> {
        let cache_name = manifest.cache_name();
        let mut fetched = Vec::with_capacity(manifest.assets.len());
        for path in &manifest.assets {
            fetched.push((path, origin.fetch(path)?));
        }

        let tx = self.conn.unchecked_transaction()?;
        for (path, asset) in &fetched {
            put_asset(&tx, &cache_name, path, asset)?;
        }
        tx.commit()?;

        log::info!("installed {} assets into {cache_name}", fetched.len());
        Ok(fetched.len())
    }

    /// Drops every cache but the manifest's own and returns the removed names.
    pub fn activate(&self, manifest: &AssetManifest) -> Result<Vec<String>> {
        let current = manifest.cache_name();
        let stale: Vec<String> = self
            .cache_names()?
            .into_iter()
            .filter(|name| *name != current)
            .collect();

        for name in &stale {
            self.conn
                .execute("DELETE FROM asset_cache WHERE cache_name = ?1", params![name])?;
        }

        if !stale.is_empty() {
            log::info!("activated {current}, removed {}", stale.join(", "));
        }
        Ok(stale)
    }

    /// Looks `path` up in every cache, newest entry first.
    pub fn lookup(&self, path: &str) -> Result<Option<CachedAsset>> {
        let path = normalize_path(path);
        let found = self
            .conn
            .query_row(
                "SELECT cache_name, content_type, body FROM asset_cache WHERE path = ?1 ORDER BY stored_at DESC LIMIT 1",
                params![&path],
                |row| {
                    Ok(CachedAsset {
                        path: path.clone(),
                        cache_name: row.get(0)?,
                        content_type: row.get(1)?,
                        body: row.get(2)?,
                        from_cache: true,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    /// Cache-first answer for `request`. Only plain `GET`s for manifest assets
    /// are handled; anything else passes through untouched.
    pub fn handle_fetch(
        &self,
        manifest: &AssetManifest,
        request: &AssetRequest,
        origin: &dyn AssetOrigin,
    ) -> Result<FetchOutcome> {
        if !request.method.eq_ignore_ascii_case("GET") || request.has_header("range") {
            return Ok(FetchOutcome::Passthrough);
        }
        let Some(path) = manifest.resolve(&request.path) else {
            return Ok(FetchOutcome::Passthrough);
        };

        if let Some(cached) = self.lookup(&path)? {
            return Ok(FetchOutcome::Served(cached));
        }

        let cache_name = manifest.cache_name();
        let asset = origin.fetch(&path)?;
        put_asset(&self.conn, &cache_name, &path, &asset)?;
        log::debug!("cached {path} into {cache_name} on first fetch");

        Ok(FetchOutcome::Served(CachedAsset {
            path,
            cache_name,
            content_type: asset.content_type,
            body: asset.body,
            from_cache: false,
        }))
    }
}

fn initialize_asset_schema(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version < 1 {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS asset_cache (
                cache_name TEXT NOT NULL,
                path TEXT NOT NULL,
                content_type TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL,
                PRIMARY KEY (cache_name, path)
            );
            CREATE INDEX IF NOT EXISTS idx_asset_cache_path ON asset_cache(path);
            ",
        )?;
        conn.pragma_update(None, "user_version", ASSET_SCHEMA_VERSION)?;
    }
    Ok(())
}

fn put_asset(conn: &Connection, cache_name: &str, path: &str, asset: &FetchedAsset) -> rusqlite::Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO asset_cache (cache_name, path, content_type, body, stored_at) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(cache_name, path) DO UPDATE SET
            content_type = excluded.content_type,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![cache_name, path, &asset.content_type, &asset.body, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Origin backed by a map that records every path it serves.
    struct MapOrigin {
        files: HashMap<String, &'static str>,
        hits: RefCell<Vec<String>>,
    }

    impl MapOrigin {
        fn new(files: &[(&str, &'static str)]) -> Self {
            Self {
                files: files.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                hits: RefCell::new(Vec::new()),
            }
        }
    }

    impl AssetOrigin for MapOrigin {
        fn fetch(&self, path: &str) -> Result<FetchedAsset> {
            self.hits.borrow_mut().push(path.to_string());
            let body = self
                .files
                .get(path)
                .ok_or_else(|| VidaError::not_found("asset", path))?;
            Ok(FetchedAsset {
                body: body.as_bytes().to_vec(),
                content_type: content_type_for(path).to_string(),
            })
        }
    }

    fn manifest(version: &str) -> AssetManifest {
        AssetManifest::new(
            version,
            "/srv/app",
            vec!["/index.html".to_string(), "/app.js".to_string()],
        )
    }

    #[test]
    fn install_is_all_or_nothing() {
        let cache = AssetCache::open_in_memory().unwrap();
        let origin = MapOrigin::new(&[("/index.html", "<html>")]);

        assert!(cache.install(&manifest("1"), &origin).is_err());
        assert!(cache.cache_names().unwrap().is_empty());
    }

    #[test]
    fn activate_drops_caches_from_older_versions() {
        let cache = AssetCache::open_in_memory().unwrap();
        let origin = MapOrigin::new(&[("/index.html", "<html>"), ("/app.js", "main()")]);
        cache.install(&manifest("1"), &origin).unwrap();
        cache.install(&manifest("2"), &origin).unwrap();

        let removed = cache.activate(&manifest("2")).unwrap();

        assert_eq!(removed, vec!["cache-1".to_string()]);
        assert_eq!(cache.cache_names().unwrap(), vec!["cache-2".to_string()]);
    }

    #[test]
    fn fetch_serves_cached_copy_without_touching_origin() {
        let cache = AssetCache::open_in_memory().unwrap();
        let origin = MapOrigin::new(&[("/index.html", "<html>"), ("/app.js", "main()")]);
        cache.install(&manifest("1"), &origin).unwrap();
        origin.hits.borrow_mut().clear();

        let outcome = cache
            .handle_fetch(&manifest("1"), &AssetRequest::get("/"), &origin)
            .unwrap();

        match outcome {
            FetchOutcome::Served(asset) => {
                assert!(asset.from_cache);
                assert_eq!(asset.body, b"<html>".to_vec());
                assert_eq!(asset.content_type, "text/html; charset=utf-8");
            }
            FetchOutcome::Passthrough => panic!("expected a cached answer"),
        }
        assert!(origin.hits.borrow().is_empty());
    }

    #[test]
    fn fetch_miss_goes_to_origin_and_fills_cache() {
        let cache = AssetCache::open_in_memory().unwrap();
        let origin = MapOrigin::new(&[("/app.js", "main()")]);

        let first = cache
            .handle_fetch(&manifest("3"), &AssetRequest::get("/app.js"), &origin)
            .unwrap();
        assert!(matches!(first, FetchOutcome::Served(ref a) if !a.from_cache && a.cache_name == "cache-3"));

        let second = cache
            .handle_fetch(&manifest("3"), &AssetRequest::get("/app.js"), &origin)
            .unwrap();
        assert!(matches!(second, FetchOutcome::Served(ref a) if a.from_cache));
        assert_eq!(origin.hits.borrow().len(), 1);
    }

    #[test]
    fn non_get_range_and_unknown_paths_pass_through() {
        let cache = AssetCache::open_in_memory().unwrap();
        let origin = MapOrigin::new(&[]);
        let m = manifest("1");

        let post = AssetRequest {
            method: "POST".to_string(),
            ..AssetRequest::get("/index.html")
        };
        let ranged = AssetRequest::get("/app.js").with_header("Range", "bytes=0-10");
        let api = AssetRequest::get("/api/bills");

        for request in [post, ranged, api] {
            assert_eq!(cache.handle_fetch(&m, &request, &origin).unwrap(), FetchOutcome::Passthrough);
        }
        assert!(origin.hits.borrow().is_empty());
    }

    #[test]
    fn dir_origin_refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "ok").unwrap();
        let origin = DirOrigin::new(dir.path());

        assert_eq!(origin.fetch("/index.html").unwrap().body, b"ok".to_vec());
        assert!(matches!(origin.fetch("/../secret"), Err(VidaError::Invalid { .. })));
    }
}
