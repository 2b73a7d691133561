//! Host glob expansion for bundled templates.

use crate::errors::{codes, Diagnostic, Diagnostics};
use crate::model::BundledEntry;
use std::path::{Path, PathBuf};

/// Expand `pattern` below the template's source directory.
///
/// Each match becomes a bundled entry keyed by its position relative to the
/// source directory, re-rooted at `/`, and carrying the template's metadata.
/// Invalid patterns and unreadable directories are reported and skipped.
pub fn expand(
    pattern: &str,
    template: &BundledEntry,
    diags: &mut Diagnostics,
) -> Vec<(PathBuf, BundledEntry)> {
    let Some(root) = template.source.to_str() else {
        diags.push(Diagnostic::new(
            codes::W_GLOB_FAILED,
            format!(
                "pattern {}: source {} is not valid UTF-8",
                pattern,
                template.source.display()
            ),
        ));
        return Vec::new();
    };
    let host_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(root.trim_end_matches('/')),
        pattern.trim_start_matches('/')
    );

    let paths = match glob::glob(&host_pattern) {
        Ok(paths) => paths,
        Err(e) => {
            diags.push(Diagnostic::new(
                codes::W_GLOB_FAILED,
                format!("invalid pattern {}: {}", pattern, e),
            ));
            return Vec::new();
        }
    };

    let mut expanded = Vec::new();
    for matched in paths {
        let host_path = match matched {
            Ok(path) => path,
            Err(e) => {
                diags.push(Diagnostic::new(
                    codes::W_GLOB_FAILED,
                    format!("pattern {}: {}", pattern, e),
                ));
                continue;
            }
        };
        let Ok(relative) = host_path.strip_prefix(&template.source) else {
            tracing::debug!(path = %host_path.display(), "match outside of template source");
            continue;
        };
        let target = Path::new("/").join(relative);
        tracing::debug!(pattern, target = %target.display(), "glob match");
        expanded.push((
            target,
            BundledEntry {
                source: host_path,
                meta: template.meta.clone(),
            },
        ));
    }

    if expanded.is_empty() {
        tracing::info!(pattern, source = %template.source.display(), "pattern matched nothing");
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, Principal};
    use std::fs;

    #[test]
    fn matches_are_rerooted_with_template_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/a.conf"), "a").unwrap();
        fs::write(dir.path().join("etc/b.conf"), "b").unwrap();
        fs::write(dir.path().join("etc/c.txt"), "c").unwrap();

        let template = BundledEntry {
            source: dir.path().to_path_buf(),
            meta: Metadata {
                owner: Some(Principal::new("app", 100)),
                mode: Some(0o600),
                ..Metadata::default()
            },
        };
        let mut diags = Diagnostics::new();
        let mut expanded = expand("/etc/*.conf", &template, &mut diags);
        expanded.sort_by(|a, b| a.0.cmp(&b.0));

        let targets: Vec<_> = expanded.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            targets,
            vec![PathBuf::from("/etc/a.conf"), PathBuf::from("/etc/b.conf")]
        );
        assert_eq!(expanded[0].1.source, dir.path().join("etc/a.conf"));
        assert_eq!(expanded[1].1.meta, template.meta);
        assert!(diags.is_empty());
    }

    #[test]
    fn metacharacters_in_source_are_literal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bundle[1]");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("motd"), "hi").unwrap();

        let template = BundledEntry {
            source: root,
            meta: Metadata::default(),
        };
        let mut diags = Diagnostics::new();
        let expanded = expand("/m*", &template, &mut diags);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].0, PathBuf::from("/motd"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let template = BundledEntry {
            source: PathBuf::from("/nonexistent"),
            meta: Metadata::default(),
        };
        let mut diags = Diagnostics::new();
        assert!(expand("/etc/***", &template, &mut diags).is_empty());
        assert_eq!(diags.codes(), vec![codes::W_GLOB_FAILED]);
    }
}
