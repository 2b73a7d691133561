//! Resolution: flatten a merged bundle into an ordered, typed entry stream.
//!
//! Explicit `files` come first, then glob expansions. The combined list is
//! stably sorted by path and deduplicated keeping the first entry per path, so
//! explicit declarations always win over glob matches and earlier templates
//! win over later ones. Bundled entries are typed against the host only when
//! the stream reaches them.

pub mod expand;
pub mod host;

pub use expand::expand;
pub use host::resolve_bundled;

use crate::bundle::Bundle;
use crate::errors::{codes, Diagnostic, Diagnostics, ResolveError, Severity};
use crate::model::{
    BundledEntry, Declared, Device, Directory, Entry, Metadata, Pipe, RemoteEntry, SymbolicLink,
};
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// A regular file with an exclusively owned content stream.
pub struct File {
    content: Box<dyn Read>,
    length: u64,
    pub meta: Metadata,
}

impl File {
    /// A file whose stream yields `length` bytes.
    pub fn new(content: impl Read + 'static, length: u64, meta: Metadata) -> Self {
        Self {
            content: Box::new(content),
            length,
            meta,
        }
    }

    /// A file whose length is the number of bytes left in a seekable stream.
    pub fn from_seekable<R: Read + Seek + 'static>(mut content: R, meta: Metadata) -> io::Result<Self> {
        let position = content.stream_position()?;
        let end = content.seek(SeekFrom::End(0))?;
        content.seek(SeekFrom::Start(position))?;
        Ok(Self::new(content, end.saturating_sub(position), meta))
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn content(&mut self) -> &mut dyn Read {
        self.content.as_mut()
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("length", &self.length)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// A concrete entry ready for encoding.
#[derive(Debug)]
pub enum Resolved {
    File(File),
    Directory(Directory),
    Pipe(Pipe),
    Device(Device),
    Symlink(SymbolicLink),
    /// Expected on the target; never materialized.
    Remote(RemoteEntry),
    Absent,
}

impl Resolved {
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Resolved::File(f) => Some(&f.meta),
            Resolved::Directory(d) => Some(&d.meta),
            Resolved::Pipe(p) => Some(&p.meta),
            Resolved::Device(d) => Some(&d.meta),
            Resolved::Symlink(s) => Some(&s.meta),
            Resolved::Remote(r) => Some(&r.meta),
            Resolved::Absent => None,
        }
    }
}

/// Sorted, duplicate-free entries of a bundle, typed lazily on iteration.
///
/// Each item owns its resources; a file's handle is closed when the item is
/// dropped.
pub struct ResolvedFiles<'b> {
    pending: std::vec::IntoIter<(PathBuf, Cow<'b, Declared<Entry>>)>,
}

/// Flatten `bundle` into its resolution order.
///
/// Globs are expanded here; host inspection of bundled entries is deferred to
/// iteration. Remote patterns are reported as unresolved.
pub fn resolve<'b>(bundle: &'b Bundle, diags: &mut Diagnostics) -> ResolvedFiles<'b> {
    let mut pending: Vec<(PathBuf, Cow<'b, Declared<Entry>>)> = bundle
        .files
        .iter()
        .map(|(path, declared)| (path.clone(), Cow::Borrowed(declared)))
        .collect();

    for (pattern, template) in &bundle.bundled_globs {
        pending.extend(expand(pattern, template, diags).into_iter().map(
            |(path, entry): (PathBuf, BundledEntry)| {
                (path, Cow::Owned(Declared::Present(Entry::Bundled(entry))))
            },
        ));
    }

    for pattern in bundle.remote_globs.keys() {
        diags.push(
            Diagnostic::new(
                codes::W_REMOTE_UNRESOLVED,
                format!("remote pattern {} is not expanded", pattern),
            )
            .with_severity(Severity::Info),
        );
    }

    pending.sort_by(|a, b| a.0.cmp(&b.0));
    pending.dedup_by(|later, earlier| later.0 == earlier.0);

    tracing::info!(entries = pending.len(), "resolution order fixed");
    ResolvedFiles {
        pending: pending.into_iter(),
    }
}

impl Iterator for ResolvedFiles<'_> {
    type Item = Result<(PathBuf, Resolved), ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (path, declared) = self.pending.next()?;
        Some(resolve_declared(&declared).map(|resolved| (path, resolved)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

fn resolve_declared(declared: &Declared<Entry>) -> Result<Resolved, ResolveError> {
    let entry = match declared {
        Declared::Absent => return Ok(Resolved::Absent),
        Declared::Present(entry) => entry,
    };

    Ok(match entry {
        Entry::Bundled(bundled) => return resolve_bundled(bundled),
        Entry::Remote(remote) => Resolved::Remote(remote.clone()),
        Entry::File(inline) => Resolved::File(File::new(
            Cursor::new(inline.content.clone()),
            inline.content.len() as u64,
            inline.meta.clone(),
        )),
        Entry::Directory(directory) => Resolved::Directory(directory.clone()),
        Entry::Pipe(pipe) => Resolved::Pipe(pipe.clone()),
        Entry::Device(device) => Resolved::Device(device.clone()),
        Entry::Symlink(symlink) => Resolved::Symlink(symlink.clone()),
    })
}
