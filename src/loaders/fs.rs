//! loaders::fs
//!
//! Data files under a root directory.
//!
//! The content format follows the file extension:
//!
//! | Extension | Delivered as |
//! |-----------|--------------|
//! | `.json`   | parsed JSON value |
//! | `.toml`   | parsed TOML table, as a JSON value |
//! | other     | file contents as a string |
//!
//! Targets are relative paths; absolute paths and `..` components are
//! refused. Units of declarations cannot be loaded from disk.

use std::path::{Component, Path, PathBuf};

use crate::core::value::Value;
use crate::engine::fetch::{Content, FetchError, FetchKind, FetchRequest, FetchStatus, Loader};

#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `target` to a path below the root.
    fn path_for(&self, target: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(target);
        let invalid = |reason: &str| FetchError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };

        if target.is_empty() {
            return Err(invalid("empty path"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("path escapes the root")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute paths are not allowed"))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    fn read(&self, target: &str) -> Result<Value, FetchError> {
        let path = self.path_for(target)?;
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound {
                target: target.to_string(),
            },
            _ => FetchError::Io {
                target: target.to_string(),
                message: e.to_string(),
            },
        })?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "read data file");

        let parse_error = |message: String| FetchError::Parse {
            target: target.to_string(),
            message,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string())),
            Some("toml") => toml::from_str::<Value>(&text).map_err(|e| parse_error(e.to_string())),
            _ => Ok(Value::String(text)),
        }
    }
}

impl Loader for FsLoader {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn fetch(&mut self, request: &FetchRequest) -> FetchStatus {
        let result = match request.kind {
            FetchKind::Data => self.read(&request.target).map(Content::Data),
            FetchKind::Unit => Err(FetchError::Unsupported { kind: request.kind }),
        };
        FetchStatus::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::json;
    use tempfile::TempDir;

    fn read(loader: &FsLoader, target: &str) -> Result<Value, FetchError> {
        loader.read(target)
    }

    #[test]
    fn formats_follow_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"port": 80}"#).unwrap();
        std::fs::write(dir.path().join("b.toml"), "name = \"x\"\n").unwrap();
        std::fs::write(dir.path().join("c.txt"), "plain").unwrap();

        let loader = FsLoader::new(dir.path());
        assert_eq!(read(&loader, "a.json").unwrap(), json!({"port": 80}));
        assert_eq!(read(&loader, "b.toml").unwrap(), json!({"name": "x"}));
        assert_eq!(read(&loader, "c.txt").unwrap(), json!("plain"));
    }

    #[test]
    fn escaping_targets_are_refused() {
        let dir = TempDir::new().unwrap();
        let loader = FsLoader::new(dir.path());
        assert!(matches!(
            read(&loader, "../secret"),
            Err(FetchError::InvalidTarget { .. })
        ));
        assert!(matches!(
            read(&loader, "/etc/passwd"),
            Err(FetchError::InvalidTarget { .. })
        ));
        assert!(matches!(read(&loader, ""), Err(FetchError::InvalidTarget { .. })));
    }

    #[test]
    fn missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{").unwrap();
        let loader = FsLoader::new(dir.path());

        assert!(matches!(read(&loader, "nope.txt"), Err(FetchError::NotFound { .. })));
        assert!(matches!(read(&loader, "bad.json"), Err(FetchError::Parse { .. })));
    }

    #[test]
    fn units_are_unsupported() {
        let dir = TempDir::new().unwrap();
        let mut loader = FsLoader::new(dir.path());
        let status = loader.fetch(&FetchRequest {
            target: "a.js".to_string(),
            kind: FetchKind::Unit,
            module: None,
        });
        assert!(matches!(
            status,
            FetchStatus::Ready(Err(FetchError::Unsupported { kind: FetchKind::Unit }))
        ));
    }
}
