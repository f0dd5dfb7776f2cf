//! Plugin descriptor documents.
//!
//! TOML:
//!
//! ```toml
//! [[plugin]]
//! type = "git"
//! args = ["plugins/datasets", "datasets", "https://example.com/ml/datasets.git"]
//! kwargs = { tag = "v0.3.0" }
//! ```
//!
//! JSON is a top-level array of the same records. The format follows the
//! file extension; anything other than `.json` is read as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::PluginError;

/// One `{type, args, kwargs}` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub args: Vec<Value>,

    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlDocument {
    #[serde(default)]
    plugin: Vec<PluginDescriptor>,
}

/// Read descriptors from `path`. A missing file means no plugins.
pub fn read_descriptors(path: &Path) -> Result<Vec<PluginDescriptor>, PluginError> {
    if !path.exists() {
        debug!(path = %path.display(), "no plugin document");
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| PluginError::Document {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    parse_descriptors(&content, is_json).map_err(|message| PluginError::Document {
        path: path.display().to_string(),
        message,
    })
}

/// Parse a descriptor document. Blank input yields no descriptors.
pub fn parse_descriptors(content: &str, is_json: bool) -> Result<Vec<PluginDescriptor>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    if is_json {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        toml::from_str::<TomlDocument>(content)
            .map(|doc| doc.plugin)
            .map_err(|e| e.to_string())
    }
}

/// Positional argument `position`, or keyword `key`, as a string.
pub(crate) fn string_arg(
    loader: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
    position: usize,
    key: &str,
) -> Result<Option<String>, PluginError> {
    let value = kwargs.get(key).or_else(|| args.get(position));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(PluginError::config(
            loader,
            format!("'{}' must be a string, got {}", key, other),
        )),
    }
}

/// Like [`string_arg`] but missing values are a configuration error.
pub(crate) fn required_string_arg(
    loader: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
    position: usize,
    key: &str,
) -> Result<String, PluginError> {
    string_arg(loader, args, kwargs, position, key)?.ok_or_else(|| {
        PluginError::config(
            loader,
            format!("missing '{}' (argument {} or keyword)", key, position + 1),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_toml_document() {
        let descriptors = parse_descriptors(
            r#"
[[plugin]]
type = "local"
args = ["/opt/plugins/notes", "notes"]

[[plugin]]
type = "git"
args = ["datasets", "datasets", "https://example.com/datasets.git"]
kwargs = { tag = "v1.0" }
"#,
            false,
        )
        .unwrap();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].kind, "local");
        assert_eq!(descriptors[0].args, vec![json!("/opt/plugins/notes"), json!("notes")]);
        assert!(descriptors[0].kwargs.is_empty());
        assert_eq!(descriptors[1].kwargs["tag"], json!("v1.0"));
    }

    #[test]
    fn test_json_document() {
        let descriptors = parse_descriptors(
            r#"[{"type": "local", "kwargs": {"path": "p", "exported_name": "E"}}]"#,
            true,
        )
        .unwrap();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].args.is_empty());
        assert_eq!(descriptors[0].kwargs["exported_name"], json!("E"));
    }

    #[test]
    fn test_missing_and_empty_documents() {
        let temp = TempDir::new().unwrap();
        assert!(read_descriptors(&temp.path().join("absent.toml")).unwrap().is_empty());

        let empty = temp.path().join("plugins.toml");
        std::fs::write(&empty, "\n").unwrap();
        assert!(read_descriptors(&empty).unwrap().is_empty());

        let empty_json = temp.path().join("plugins.json");
        std::fs::write(&empty_json, "[]").unwrap();
        assert!(read_descriptors(&empty_json).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plugins.toml");
        std::fs::write(&path, "[[plugin]]\nargs = []\n").unwrap();
        let err = read_descriptors(&path).unwrap_err();
        assert!(matches!(err, PluginError::Document { .. }));
        assert!(err.to_string().contains("plugins.toml"));
    }

    #[test]
    fn test_string_args_prefer_keywords() {
        let args = vec![json!("positional")];
        let mut kwargs = Map::new();
        assert_eq!(
            string_arg("local", &args, &kwargs, 0, "path").unwrap().as_deref(),
            Some("positional")
        );
        kwargs.insert("path".into(), json!("keyword"));
        assert_eq!(
            string_arg("local", &args, &kwargs, 0, "path").unwrap().as_deref(),
            Some("keyword")
        );
        assert!(string_arg("local", &args, &kwargs, 1, "missing").unwrap().is_none());
        assert!(required_string_arg("local", &args, &kwargs, 1, "missing").is_err());
        kwargs.insert("bad".into(), json!(3));
        assert!(string_arg("local", &args, &kwargs, 5, "bad").is_err());
    }
}
