//! Declared state summary of a merged bundle.
//!
//! A [`Plan`] is built from the bundle alone; it never touches the host
//! filesystem. Entries keep merge order.

use crate::bundle::Bundle;
use crate::model::{
    BundledEntry, Declared, Device, Directory, Entry, InlineFile, Pipe, Principal, RemoteEntry,
    SymbolicLink,
};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct Plan<'b> {
    pub files: Vec<FilePlan<'b>>,
    pub globs: Vec<GlobPlan<'b>>,
    pub remote_globs: Vec<GlobPlan<'b>>,
    pub packages: Vec<NamedPlan<'b>>,
    pub users: Vec<NamedPlan<'b>>,
}

#[derive(Debug, Serialize)]
pub struct FilePlan<'b> {
    pub path: &'b Path,
    pub state: &'static str,
    #[serde(flatten)]
    pub detail: Option<EntryDetail<'b>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EntryDetail<'b> {
    Bundled(&'b BundledEntry),
    Remote(&'b RemoteEntry),
    File(&'b InlineFile),
    Directory(&'b Directory),
    Pipe(&'b Pipe),
    Device(&'b Device),
    Symlink(&'b SymbolicLink),
}

#[derive(Debug, Serialize)]
pub struct GlobPlan<'b> {
    pub pattern: &'b str,
    pub source: &'b Path,
}

#[derive(Debug, Serialize)]
pub struct NamedPlan<'b> {
    pub name: &'b str,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "no_groups")]
    pub groups: &'b [Principal],
}

fn no_groups(groups: &&[Principal]) -> bool {
    groups.is_empty()
}

impl<'b> Plan<'b> {
    pub fn new(bundle: &'b Bundle) -> Self {
        let files = bundle
            .files
            .iter()
            .map(|(path, declared)| match declared {
                Declared::Absent => FilePlan {
                    path,
                    state: "absent",
                    detail: None,
                },
                Declared::Present(entry) => FilePlan {
                    path,
                    state: entry.state(),
                    detail: Some(EntryDetail::of(entry)),
                },
            })
            .collect();

        let globs = bundle
            .bundled_globs
            .iter()
            .map(|(pattern, template)| GlobPlan {
                pattern,
                source: &template.source,
            })
            .collect();
        let remote_globs = bundle
            .remote_globs
            .iter()
            .map(|(pattern, template)| GlobPlan {
                pattern,
                source: &template.source,
            })
            .collect();

        let packages = bundle
            .packages
            .iter()
            .map(|(name, declared)| NamedPlan {
                name,
                state: if declared.is_absent() { "absent" } else { "installed" },
                id: None,
                groups: &[],
            })
            .collect();

        let users = bundle
            .users
            .iter()
            .map(|(name, declared)| match declared.as_present() {
                Some(user) => NamedPlan {
                    name: &user.name,
                    state: "present",
                    id: user.id,
                    groups: &user.groups,
                },
                None => NamedPlan {
                    name,
                    state: "absent",
                    id: None,
                    groups: &[],
                },
            })
            .collect();

        Self {
            files,
            globs,
            remote_globs,
            packages,
            users,
        }
    }
}

impl<'b> EntryDetail<'b> {
    fn of(entry: &'b Entry) -> Self {
        match entry {
            Entry::Bundled(e) => EntryDetail::Bundled(e),
            Entry::Remote(e) => EntryDetail::Remote(e),
            Entry::File(e) => EntryDetail::File(e),
            Entry::Directory(e) => EntryDetail::Directory(e),
            Entry::Pipe(e) => EntryDetail::Pipe(e),
            Entry::Device(e) => EntryDetail::Device(e),
            Entry::Symlink(e) => EntryDetail::Symlink(e),
        }
    }

    fn describe(&self) -> Option<String> {
        match self {
            EntryDetail::Bundled(e) => Some(format!("source={}", e.source.display())),
            EntryDetail::Remote(e) => Some(format!("source={}", e.source.display())),
            EntryDetail::File(e) => Some(format!("length={}", e.content.len())),
            EntryDetail::Device(e) => Some(format!("{}:{}", e.major, e.minor)),
            EntryDetail::Symlink(e) => Some(format!("-> {}", e.destination.display())),
            EntryDetail::Directory(_) | EntryDetail::Pipe(_) => None,
        }
    }
}

impl fmt::Display for Plan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "files:")?;
        for file in &self.files {
            write!(f, "  {:<18} {}", file.state, file.path.display())?;
            if let Some(detail) = file.detail.as_ref().and_then(EntryDetail::describe) {
                write!(f, " {}", detail)?;
            }
            writeln!(f)?;
        }
        if !self.globs.is_empty() {
            writeln!(f, "globs:")?;
            for glob in &self.globs {
                writeln!(f, "  {} from {}", glob.pattern, glob.source.display())?;
            }
        }
        if !self.remote_globs.is_empty() {
            writeln!(f, "remote patterns:")?;
            for glob in &self.remote_globs {
                writeln!(f, "  {}", glob.pattern)?;
            }
        }
        writeln!(f, "packages:")?;
        for package in &self.packages {
            writeln!(f, "  {:<18} {}", package.state, package.name)?;
        }
        writeln!(f, "users:")?;
        for user in &self.users {
            write!(f, "  {:<18} {}", user.state, user.name)?;
            if let Some(id) = user.id {
                write!(f, " id={}", id)?;
            }
            if !user.groups.is_empty() {
                let groups: Vec<&str> = user.groups.iter().map(|g| g.name.as_str()).collect();
                write!(f, " groups={}", groups.join(","))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
