//! Bundle sources: manifest files and bundle directories.

use super::{assemble, Bundle};
use crate::decode::{Decoder, Mark, Node};
use crate::errors::{Diagnostics, LoadError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest looked up inside a bundle directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Load a bundle from a manifest file or a bundle directory.
///
/// The document root is the directory itself, or the manifest's parent
/// directory. It is canonicalized so host paths derived from it are absolute.
pub fn load_path(path: &Path, diags: &mut Diagnostics) -> Result<Bundle, LoadError> {
    let (manifest, root) = if path.is_dir() {
        (path.join(MANIFEST_FILE), path.to_path_buf())
    } else {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (path.to_path_buf(), parent)
    };

    let root = std::fs::canonicalize(&root).map_err(|source| LoadError::Io {
        path: root.clone(),
        source,
    })?;
    let text = std::fs::read_to_string(&manifest).map_err(|source| LoadError::Io {
        path: manifest.clone(),
        source,
    })?;

    tracing::debug!(manifest = %manifest.display(), root = %root.display(), "loading bundle");
    load_str(&text, &manifest.display().to_string(), &root, diags)
}

/// Load every document of a YAML stream and fold them left to right.
pub fn load_str(
    text: &str,
    source_name: &str,
    root: &Path,
    diags: &mut Diagnostics,
) -> Result<Bundle, LoadError> {
    let decoder = Decoder::new(root);
    let source: Arc<str> = Arc::from(source_name);
    let mut bundle = Bundle::new();

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document).map_err(|source| LoadError::Yaml {
            source_name: source_name.to_string(),
            source,
        })?;
        let node = Node::from_yaml(&value, Mark::root(Some(source.clone()), index));
        bundle.merge_from(assemble(&node, &decoder, diags)?);
    }

    tracing::info!(
        source = source_name,
        files = bundle.files.len(),
        globs = bundle.bundled_globs.len() + bundle.remote_globs.len(),
        packages = bundle.packages.len(),
        users = bundle.users.len(),
        "loaded bundle"
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Declared, Entry};
    use std::fs;

    #[test]
    fn documents_fold_left_to_right() {
        let text = "files:\n  - /etc/passwd\n---\nfiles:\n  - /etc/passwd: {state: absent}\n";
        let mut diags = Diagnostics::new();
        let bundle = load_str(text, "inline", Path::new("/bundle"), &mut diags).unwrap();
        assert_eq!(bundle.files[Path::new("/etc/passwd")], Declared::Absent);
    }

    #[test]
    fn diagnostics_carry_document_index() {
        let text = "files: []\n---\nservices: []\n";
        let mut diags = Diagnostics::new();
        load_str(text, "inline", Path::new("/bundle"), &mut diags).unwrap();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.mark.as_ref().unwrap().document, 1);
        assert_eq!(
            diag.location.as_deref(),
            Some("inline, document 1, at services")
        );
    }

    #[test]
    fn syntax_errors_are_fatal() {
        let mut diags = Diagnostics::new();
        let err = load_str("files: [", "broken.yaml", Path::new("/"), &mut diags).unwrap_err();
        assert!(matches!(err, LoadError::Yaml { ref source_name, .. } if source_name == "broken.yaml"));
    }

    #[test]
    fn directory_uses_manifest_and_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "files:\n  - /etc/motd\n").unwrap();

        let mut diags = Diagnostics::new();
        let bundle = load_path(dir.path(), &mut diags).unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        match &bundle.files[Path::new("/etc/motd")] {
            Declared::Present(Entry::Bundled(entry)) => {
                assert_eq!(entry.source, root.join("etc/motd"))
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut diags = Diagnostics::new();
        let err = load_path(dir.path(), &mut diags).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
