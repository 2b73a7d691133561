//! The bundle store: identity-keyed declarations folded across documents.

pub mod assemble;
pub mod load;

pub use assemble::assemble;
pub use load::{load_path, load_str, MANIFEST_FILE};

use crate::model::{BundledEntry, Declared, Entry, Package, RemoteEntry, User};
use indexmap::IndexMap;
use std::hash::Hash;
use std::ops::Add;
use std::path::PathBuf;

/// Declared filesystem, package and user state.
///
/// Every mapping keeps insertion order. Replacing a key keeps its original
/// position, so [`Bundle::merge`] is associative in content and in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub files: IndexMap<PathBuf, Declared<Entry>>,
    pub bundled_globs: IndexMap<String, BundledEntry>,
    pub remote_globs: IndexMap<String, RemoteEntry>,
    pub packages: IndexMap<String, Declared<Package>>,
    pub users: IndexMap<String, Declared<User>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.bundled_globs.is_empty()
            && self.remote_globs.is_empty()
            && self.packages.is_empty()
            && self.users.is_empty()
    }

    /// Right-biased union of every mapping: `other` wins on key collision.
    pub fn merge(mut self, other: Bundle) -> Bundle {
        self.merge_from(other);
        self
    }

    pub fn merge_from(&mut self, other: Bundle) {
        overlay(&mut self.files, other.files);
        overlay(&mut self.bundled_globs, other.bundled_globs);
        overlay(&mut self.remote_globs, other.remote_globs);
        overlay(&mut self.packages, other.packages);
        overlay(&mut self.users, other.users);
    }

    /// Fold bundles left to right.
    pub fn fold(bundles: impl IntoIterator<Item = Bundle>) -> Bundle {
        bundles.into_iter().fold(Bundle::new(), Bundle::merge)
    }
}

impl Add for Bundle {
    type Output = Bundle;

    fn add(self, other: Bundle) -> Bundle {
        self.merge(other)
    }
}

fn overlay<K: Hash + Eq, V>(into: &mut IndexMap<K, V>, from: IndexMap<K, V>) {
    for (key, value) in from {
        into.insert(key, value);
    }
}
