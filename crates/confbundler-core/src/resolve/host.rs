//! Typing bundled entries against the host filesystem.

use super::{File, Resolved};
use crate::errors::ResolveError;
use crate::model::{BundledEntry, Device, DeviceKind, Directory, Pipe, SymbolicLink, Timespec};
use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

/// Inspect the source of `entry` without following symlinks.
///
/// Declared metadata is kept; only undeclared timestamps are taken from the
/// host. Regular files are opened here and closed when the returned record is
/// dropped.
pub fn resolve_bundled(entry: &BundledEntry) -> Result<Resolved, ResolveError> {
    let source = &entry.source;
    let stat = fs::symlink_metadata(source).map_err(|e| ResolveError::Stat {
        path: source.clone(),
        source: e,
    })?;

    let mut meta = entry.meta.clone();
    meta.atime
        .get_or_insert_with(|| Timespec::new(stat.atime(), stat.atime_nsec() as u32));
    meta.mtime
        .get_or_insert_with(|| Timespec::new(stat.mtime(), stat.mtime_nsec() as u32));

    let file_type = stat.file_type();
    let resolved = if file_type.is_file() {
        let handle = fs::File::open(source).map_err(|e| ResolveError::Open {
            path: source.clone(),
            source: e,
        })?;
        Resolved::File(File::new(handle, stat.len(), meta))
    } else if file_type.is_dir() {
        Resolved::Directory(Directory { meta })
    } else if file_type.is_block_device() || file_type.is_char_device() {
        let kind = if file_type.is_block_device() {
            DeviceKind::Block
        } else {
            DeviceKind::Character
        };
        let rdev = stat.rdev() as libc::dev_t;
        Resolved::Device(Device {
            kind,
            major: libc::major(rdev) as u32,
            minor: libc::minor(rdev) as u32,
            meta,
        })
    } else if file_type.is_fifo() {
        Resolved::Pipe(Pipe { meta })
    } else if file_type.is_symlink() {
        let destination = fs::read_link(source).map_err(|e| ResolveError::ReadLink {
            path: source.clone(),
            source: e,
        })?;
        Resolved::Symlink(SymbolicLink { destination, meta })
    } else {
        return Err(ResolveError::UnsupportedKind {
            path: source.clone(),
        });
    };

    Ok(resolved)
}
