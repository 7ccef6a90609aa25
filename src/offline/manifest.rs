use crate::error::Result;
use std::path::{Component, Path, PathBuf};

/// Everything under the asset root.
pub const DEFAULT_PATTERNS: &[&str] = &["**/*"];

/// The versioned list of application-shell assets to keep offline.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetManifest {
    pub version: String,
    pub root: PathBuf,
    pub assets: Vec<String>, // "/"-prefixed, sorted
}

impl AssetManifest {
    pub fn new(version: impl Into<String>, root: impl Into<PathBuf>, assets: Vec<String>) -> Self {
        let mut assets: Vec<String> = assets.iter().map(|a| normalize_path(a)).collect();
        assets.sort();
        assets.dedup();
        Self {
            version: version.into(),
            root: root.into(),
            assets,
        }
    }

    /// Builds the manifest from the files under `root` matching `patterns`.
    pub fn scan(root: &Path, version: &str, patterns: &[&str]) -> Result<Self> {
        let mut assets = Vec::new();

        // The root is taken literally; only `patterns` may carry wildcards.
        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        for pattern in patterns {
            let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);
            for entry in glob::glob(&full)? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        log::warn!("skipping unreadable asset entry: {e}");
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                if let Some(relative) = relative_url(root, &path) {
                    assets.push(relative);
                }
            }
        }

        let manifest = Self::new(version, root, assets);
        log::debug!(
            "scanned {} offline assets for {}",
            manifest.assets.len(),
            manifest.cache_name()
        );
        Ok(manifest)
    }

    pub fn cache_name(&self) -> String {
        format!("cache-{}", self.version)
    }

    /// The manifest entry a request path maps to, if any. Directory paths
    /// resolve to their `index.html`.
    pub fn resolve(&self, request_path: &str) -> Option<String> {
        let mut path = normalize_path(request_path);
        if path.ends_with('/') {
            path.push_str("index.html");
        }
        self.assets.binary_search(&path).ok().map(|_| path)
    }
}

fn relative_url(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}

/// Strips query and fragment and forces a leading slash.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_collects_nested_files_as_url_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("_app/immutable")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("_app/immutable/start.js"), "export {}").unwrap();

        let manifest = AssetManifest::scan(dir.path(), "42", DEFAULT_PATTERNS).unwrap();

        assert_eq!(
            manifest.assets,
            vec!["/_app/immutable/start.js".to_string(), "/index.html".to_string()]
        );
        assert_eq!(manifest.cache_name(), "cache-42");
    }

    #[test]
    fn resolve_handles_queries_and_directory_index() {
        let manifest = AssetManifest::new("1", "/srv", vec!["index.html".to_string(), "/app.css".to_string()]);
        assert_eq!(manifest.resolve("/"), Some("/index.html".to_string()));
        assert_eq!(manifest.resolve("/app.css?v=3"), Some("/app.css".to_string()));
        assert_eq!(manifest.resolve("/api/bills"), None);
    }

    #[test]
    fn scan_treats_wildcard_characters_in_the_root_literally() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("app [beta]");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::create_dir_all(dir.path().join("app b")).unwrap();
        fs::write(dir.path().join("app b/stray.js"), "nope").unwrap();

        let manifest = AssetManifest::scan(&root, "1", DEFAULT_PATTERNS).unwrap();

        assert_eq!(manifest.assets, vec!["/index.html".to_string()]);
    }
}
