//! Loader for plugins fetched from a git repository into a local cache.

use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::descriptor::{required_string_arg, string_arg};
use super::{LoadStatus, LocalLoader, PluginError, PluginLoader, RegistryWriter};
use crate::cli::command::CommandNode;
use crate::git::{self, GitRef};

const LOADER: &str = "git";

/// Cache directory for `url` below `cache_root`:
/// `<repo-stem>-<first 16 hex digits of sha256(url)>`.
pub fn cache_dir_for(cache_root: &Path, url: &str) -> PathBuf {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':', '\\'])
        .next()
        .unwrap_or(trimmed);
    let stem: String = last
        .strip_suffix(".git")
        .unwrap_or(last)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "repo".to_string() } else { stem };

    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    cache_root.join(format!("{}-{}", stem, &digest[..16]))
}

/// A [`LocalLoader`] whose source is a pinned checkout of a repository.
#[derive(Debug)]
pub struct CacheLoader {
    url: String,
    reference: GitRef,
    cache_dir: PathBuf,
    inner: LocalLoader,
}

impl CacheLoader {
    /// `path` is relative to the repository root.
    pub fn new(
        path: &str,
        export: String,
        url: String,
        reference: GitRef,
        cache_root: &Path,
    ) -> Self {
        let cache_dir = cache_dir_for(cache_root, &url);
        let inner = LocalLoader::new(cache_dir.join(path), export);
        Self {
            url,
            reference,
            cache_dir,
            inner,
        }
    }

    /// `args = [path, exportedName, repositoryUrl]` (or the matching
    /// keywords) plus exactly one of the `tag` / `commit` keywords.
    pub fn from_descriptor(
        args: &[Value],
        kwargs: &Map<String, Value>,
        cache_root: &Path,
    ) -> Result<Self, PluginError> {
        let path = required_string_arg(LOADER, args, kwargs, 0, "path")?;
        let export = required_string_arg(LOADER, args, kwargs, 1, "exported_name")?;
        let url = required_string_arg(LOADER, args, kwargs, 2, "repository_url")?;
        if Path::new(&path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(PluginError::config(
                LOADER,
                format!("path '{}' must stay inside the repository", path),
            ));
        }
        let tag = string_arg(LOADER, &[], kwargs, 0, "tag")?;
        let commit = string_arg(LOADER, &[], kwargs, 0, "commit")?;

        let reference = match (tag, commit) {
            (Some(tag), None) => GitRef::Tag(tag),
            (None, Some(commit)) => GitRef::Commit(commit),
            (Some(_), Some(_)) => {
                return Err(PluginError::config(
                    LOADER,
                    "'tag' and 'commit' are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(PluginError::config(LOADER, "one of 'tag' or 'commit' is required"));
            }
        };

        match kwargs.get("local") {
            None | Some(Value::Bool(_)) => {}
            Some(other) => {
                return Err(PluginError::config(
                    LOADER,
                    format!("'local' must be a boolean, got {}", other),
                ));
            }
        }

        Ok(Self::new(&path, export, url, reference, cache_root))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn reference(&self) -> &GitRef {
        &self.reference
    }
}

impl PluginLoader for CacheLoader {
    fn load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<LoadStatus, PluginError> {
        if !self.cache_dir.exists() {
            warn!(
                url = %self.url,
                cache = %self.cache_dir.display(),
                "plugin cache is empty; run `plugin update` to fetch it"
            );
        }
        self.inner.load(registry, root)
    }

    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        debug!(url = %self.url, reference = %self.reference, "refreshing plugin cache");
        Ok(git::fetch_and_checkout(
            &self.url,
            &self.reference,
            &self.cache_dir,
        )?)
    }

    fn describe(&self) -> String {
        format!("git {} @ {} ({})", self.url, self.reference, self.inner.export())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginTypeRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    const ARGS: [&str; 3] = ["plugins/notes", "Notes", "https://example.com/ml/notes.git"];

    fn args() -> Vec<Value> {
        ARGS.iter().map(|a| json!(a)).collect()
    }

    #[test]
    fn test_cache_dir_is_deterministic() {
        let root = Path::new("/cache");
        let a = cache_dir_for(root, "https://example.com/ml/notes.git");
        let b = cache_dir_for(root, "https://example.com/ml/notes.git");
        let other = cache_dir_for(root, "https://example.org/ml/notes.git");

        assert_eq!(a, b);
        assert_ne!(a, other);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("notes-"), "{name}");
        assert_eq!(name.len(), "notes-".len() + 16);
        assert!(cache_dir_for(root, "git@example.com:ml/notes.git/")
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("notes-"));
    }

    #[test]
    fn test_tag_and_commit_are_exclusive() {
        let err = CacheLoader::from_descriptor(
            &args(),
            &kwargs(json!({"tag": "v1", "commit": "abc123"})),
            Path::new("/cache"),
        )
        .unwrap_err();
        assert!(matches!(err, PluginError::Config { .. }));
        assert!(err.to_string().contains("mutually exclusive"));

        let err = CacheLoader::from_descriptor(&args(), &Map::new(), Path::new("/cache")).unwrap_err();
        assert!(matches!(err, PluginError::Config { .. }));
    }

    #[test]
    fn test_path_must_stay_in_checkout() {
        for path in ["/etc/plugins", "../outside", "plugins/../../outside"] {
            let err = CacheLoader::from_descriptor(
                &[json!(path), json!(ARGS[1]), json!(ARGS[2])],
                &kwargs(json!({"tag": "v1"})),
                Path::new("/cache"),
            )
            .unwrap_err();
            assert!(matches!(err, PluginError::Config { .. }), "{path}: {err}");
        }
    }

    #[test]
    fn test_descriptor_forms() {
        let loader = CacheLoader::from_descriptor(
            &args(),
            &kwargs(json!({"commit": "abc123", "local": true})),
            Path::new("/cache"),
        )
        .unwrap();
        assert_eq!(loader.reference(), &GitRef::Commit("abc123".into()));
        assert!(loader.cache_dir().starts_with("/cache"));

        let loader = CacheLoader::from_descriptor(
            &[],
            &kwargs(json!({
                "path": ARGS[0],
                "exported_name": ARGS[1],
                "repository_url": ARGS[2],
                "tag": "v2",
            })),
            Path::new("/cache"),
        )
        .unwrap();
        assert_eq!(loader.reference(), &GitRef::Tag("v2".into()));
        assert!(loader.describe().contains("tag v2"));
    }

    #[test]
    fn test_empty_cache_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut registry = PluginTypeRegistry::with_builtins(temp.path().to_path_buf());
        let root = CommandNode::new("root", "r");

        let mut loader = registry
            .instantiate("git", &args(), &kwargs(json!({"tag": "v1"})))
            .unwrap();
        assert_eq!(
            loader.load(&mut registry.writer(), &root).unwrap(),
            LoadStatus::Skipped
        );
    }

    #[test]
    fn test_unreachable_repository_update_warns() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("no-such-repo");
        let mut loader = CacheLoader::new(
            ".",
            "Notes".into(),
            missing.display().to_string(),
            GitRef::Tag("v1".into()),
            &temp.path().join("cache"),
        );
        let warnings = loader.update().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_update_then_load_grafts_commands() {
        use std::os::unix::fs::PermissionsExt;
        use std::process::Command;

        let source = TempDir::new().unwrap();
        let git = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(source.path())
                .output()
                .unwrap()
                .status;
            assert!(status.success(), "git {args:?}");
        };
        let plugin_dir = source.path().join("plugins").join("notes");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        let entry = plugin_dir.join("plugin");
        std::fs::write(
            &entry,
            "#!/bin/sh\necho '{\"commands\":[{\"name\":\"notes\",\"description\":\"take notes\",\"runnable\":true}]}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&entry, std::fs::Permissions::from_mode(0o755)).unwrap();
        git(&["init", "--quiet"]);
        git(&["config", "user.email", "test@test.com"]);
        git(&["config", "user.name", "Test User"]);
        git(&["add", "."]);
        git(&["commit", "--quiet", "-m", "notes plugin"]);
        git(&["tag", "v1"]);

        let cache = TempDir::new().unwrap();
        let mut loader = CacheLoader::new(
            "plugins/notes",
            "Notes".into(),
            source.path().display().to_string(),
            GitRef::Tag("v1".into()),
            cache.path(),
        );
        let mut registry = PluginTypeRegistry::new();
        let root = CommandNode::new("root", "r");
        assert_eq!(
            loader.load(&mut registry.writer(), &root).unwrap(),
            LoadStatus::Skipped
        );

        let warnings = loader.update().unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(loader.cache_dir().join("plugins/notes/plugin").is_file());

        assert_eq!(
            loader.load(&mut registry.writer(), &root).unwrap(),
            LoadStatus::Loaded
        );
        let notes = root.lookup_child("notes").unwrap();
        assert!(notes.has_handler());
        assert_eq!(notes.description(), "take notes");
    }
}
