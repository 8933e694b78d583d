//! Resolution of response bodies and kafka message values.

use super::error::ContractError;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Where a resolved payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BodySource {
    Inline,
    File,
}

impl BodySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodySource::Inline => "INLINE",
            BodySource::File => "FILE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBody {
    pub bytes: Bytes,
    pub source: BodySource,
}

impl ResolvedBody {
    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
            source: BodySource::Inline,
        }
    }

    pub fn inline(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            source: BodySource::Inline,
        }
    }
}

/// Resolves inline values and workspace-relative files into bytes.
#[derive(Debug, Clone)]
pub struct BodyResolver {
    workspace_root: PathBuf,
}

impl BodyResolver {
    /// Relative roots are anchored at the current directory so the escape
    /// check always compares absolute paths.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let root = workspace_root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self {
            workspace_root: normalize(&root),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// `file` wins over `inline`. Inline strings are taken verbatim, other
    /// inline values are serialized as JSON. Neither present yields an
    /// empty payload.
    pub fn resolve(
        &self,
        inline: Option<&Value>,
        file: Option<&str>,
    ) -> Result<ResolvedBody, ContractError> {
        if let Some(file) = file {
            return self.read_file(file);
        }
        match inline {
            None | Some(Value::Null) => Ok(ResolvedBody::empty()),
            Some(Value::String(s)) => Ok(ResolvedBody::inline(s.clone())),
            Some(other) => {
                let json = serde_json::to_vec(other).map_err(|e| {
                    ContractError::invalid("value", format!("cannot serialize inline value: {e}"))
                })?;
                Ok(ResolvedBody::inline(json))
            }
        }
    }

    /// Resolve a workspace-relative file path, rejecting escapes.
    pub fn resolve_path(&self, file: &str) -> Result<PathBuf, ContractError> {
        let candidate = Path::new(file);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace_root.join(candidate)
        };
        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.workspace_root) {
            return Err(ContractError::PayloadFile {
                path: file.to_string(),
                reason: "path escapes the workspace root".to_string(),
            });
        }
        Ok(normalized)
    }

    fn read_file(&self, file: &str) -> Result<ResolvedBody, ContractError> {
        let path = self.resolve_path(file)?;
        if !path.is_file() {
            return Err(ContractError::PayloadFile {
                path: file.to_string(),
                reason: "file not found".to_string(),
            });
        }
        let bytes = std::fs::read(&path).map_err(|e| ContractError::PayloadFile {
            path: file.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ResolvedBody {
            bytes: Bytes::from(bytes),
            source: BodySource::File,
        })
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_inline_string_verbatim() {
        let resolver = BodyResolver::new("/ws");
        let body = resolver.resolve(Some(&json!("hello")), None).unwrap();
        assert_eq!(body.bytes, Bytes::from("hello"));
        assert_eq!(body.source, BodySource::Inline);
    }

    #[test]
    fn test_inline_structured_is_json() {
        let resolver = BodyResolver::new("/ws");
        let body = resolver
            .resolve(Some(&json!({"id": 1, "tags": ["a"]})), None)
            .unwrap();
        let parsed: Value = serde_json::from_slice(&body.bytes).unwrap();
        assert_eq!(parsed, json!({"id": 1, "tags": ["a"]}));
    }

    #[test]
    fn test_absent_is_empty() {
        let resolver = BodyResolver::new("/ws");
        let body = resolver.resolve(None, None).unwrap();
        assert!(body.bytes.is_empty());
    }

    #[test]
    fn test_file_wins_over_inline() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("payloads")).unwrap();
        std::fs::write(dir.path().join("payloads/user.json"), b"{\"id\":7}").unwrap();

        let resolver = BodyResolver::new(dir.path());
        let body = resolver
            .resolve(Some(&json!("ignored")), Some("payloads/user.json"))
            .unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"{\"id\":7}"));
        assert_eq!(body.source, BodySource::File);
    }

    #[test]
    fn test_escaping_workspace_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = BodyResolver::new(dir.path());
        let err = resolver.resolve(None, Some("../../etc/passwd")).unwrap_err();
        assert!(matches!(err, ContractError::PayloadFile { ref reason, .. } if reason.contains("escapes")));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = BodyResolver::new(dir.path());
        let err = resolver.resolve(None, Some("nope.json")).unwrap_err();
        assert!(matches!(err, ContractError::PayloadFile { ref reason, .. } if reason == "file not found"));
    }

    #[test]
    fn test_normalize_folds_parent_dirs() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
