//! Archive encoder.
//!
//! Writes resolved entries as POSIX ustar headers with PAX extended records.
//! Timestamps with sub-second precision and extended attributes only fit in
//! PAX records; symbolic owner/group names go there when the header field is
//! too short.

mod content;

use crate::errors::{codes, Diagnostic, Diagnostics, EncodeError, ResolveError, Severity};
use crate::model::{DeviceKind, Metadata, DEFAULT_DIRECTORY_MODE, DEFAULT_MODE};
use crate::resolve::Resolved;
use content::ExactReader;
use flate2::write::GzEncoder;
use flate2::GzBuilder;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};

/// Whole-stream compression of the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub compression: Compression,
}

/// Counts of what reached the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub written: usize,
    pub skipped: usize,
}

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Sink<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Sink::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Sink::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Streams entries into a tar archive, one header per entry, in call order.
pub struct ArchiveWriter<W: Write> {
    builder: Builder<Sink<W>>,
    summary: Summary,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W, options: &BuildOptions) -> Self {
        let sink = match options.compression {
            Compression::None => Sink::Plain(writer),
            Compression::Gzip => Sink::Gzip(
                GzBuilder::new()
                    .mtime(0)
                    .write(writer, flate2::Compression::default()),
            ),
        };
        Self {
            builder: Builder::new(sink),
            summary: Summary::default(),
        }
    }

    /// Encode one resolved entry. Absent and remote entries are reported and
    /// skipped.
    pub fn append(
        &mut self,
        path: &Path,
        resolved: Resolved,
        diags: &mut Diagnostics,
    ) -> Result<(), EncodeError> {
        let entry_err = |source: io::Error| EncodeError::Entry {
            path: path.to_path_buf(),
            source,
        };

        let (entry_type, meta) = match &resolved {
            Resolved::Absent => {
                diags.push(
                    Diagnostic::new(
                        codes::W_ABSENT_SKIPPED,
                        format!("{} not materialized, declared absent", path.display()),
                    )
                    .with_severity(Severity::Info),
                );
                self.summary.skipped += 1;
                return Ok(());
            }
            Resolved::Remote(remote) => {
                diags.push(Diagnostic::new(
                    codes::W_REMOTE_SKIPPED,
                    format!(
                        "{} not materialized, expected on target at {}",
                        path.display(),
                        remote.source.display()
                    ),
                ));
                self.summary.skipped += 1;
                return Ok(());
            }
            Resolved::File(file) => (EntryType::Regular, &file.meta),
            Resolved::Directory(dir) => (EntryType::Directory, &dir.meta),
            Resolved::Pipe(pipe) => (EntryType::Fifo, &pipe.meta),
            Resolved::Device(device) => (
                match device.kind {
                    DeviceKind::Block => EntryType::Block,
                    DeviceKind::Character => EntryType::Char,
                },
                &device.meta,
            ),
            Resolved::Symlink(symlink) => (EntryType::Symlink, &symlink.meta),
        };

        let default_mode = if entry_type == EntryType::Directory {
            DEFAULT_DIRECTORY_MODE
        } else {
            DEFAULT_MODE
        };
        let mode = meta.mode_or(default_mode);
        let mut header = Header::new_ustar();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(0);
        let pax = fill_metadata(&mut header, meta);

        if !pax.is_empty() {
            self.builder
                .append_pax_extensions(pax.iter().map(|(k, v)| (k.as_str(), v.as_bytes())))
                .map_err(entry_err)?;
        }

        let name = entry_name(path);
        match resolved {
            Resolved::File(mut file) => {
                let declared = file.length();
                header.set_size(declared);
                let mut reader = ExactReader::new(file.content(), declared);
                let appended = self.builder.append_data(&mut header, &name, &mut reader);
                if reader.is_short() {
                    return Err(EncodeError::ShortContent {
                        path: path.to_path_buf(),
                        written: reader.read_so_far(),
                        declared,
                    });
                }
                appended.map_err(entry_err)?;
            }
            Resolved::Device(device) => {
                header.set_device_major(device.major).map_err(entry_err)?;
                header.set_device_minor(device.minor).map_err(entry_err)?;
                self.builder
                    .append_data(&mut header, &name, io::empty())
                    .map_err(entry_err)?;
            }
            Resolved::Symlink(symlink) => {
                self.builder
                    .append_link(&mut header, &name, &symlink.destination)
                    .map_err(entry_err)?;
            }
            _ => {
                self.builder
                    .append_data(&mut header, &name, io::empty())
                    .map_err(entry_err)?;
            }
        }

        tracing::info!(path = %path.display(), "archived");
        tracing::debug!(
            path = %path.display(),
            kind = ?entry_type,
            mode = %format!("{:o}", mode),
            "entry header written"
        );
        self.summary.written += 1;
        Ok(())
    }

    /// Write the archive trailer and return the underlying writer.
    pub fn finish(self) -> Result<(Summary, W), EncodeError> {
        let sink = self.builder.into_inner().map_err(EncodeError::Finish)?;
        let writer = sink.finish().map_err(EncodeError::Finish)?;
        tracing::info!(
            written = self.summary.written,
            skipped = self.summary.skipped,
            "archive complete"
        );
        Ok((self.summary, writer))
    }
}

/// Encode a resolved entry stream. The first resolution or encoding error
/// aborts the run.
pub fn encode<W, I>(
    entries: I,
    writer: W,
    options: &BuildOptions,
    diags: &mut Diagnostics,
) -> Result<(Summary, W), EncodeError>
where
    W: Write,
    I: IntoIterator<Item = Result<(PathBuf, Resolved), ResolveError>>,
{
    let mut archive = ArchiveWriter::new(writer, options);
    for item in entries {
        let (path, resolved) = item?;
        archive.append(&path, resolved, diags)?;
    }
    archive.finish()
}

/// Archive member name: the absolute path without its leading `/`.
pub fn entry_name(path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        Ok(_) => PathBuf::from("."),
        Err(_) => path.to_path_buf(),
    }
}

/// Set ownership and mtime on `header`; return the PAX records the header
/// cannot carry.
fn fill_metadata(header: &mut Header, meta: &Metadata) -> Vec<(String, String)> {
    let mut pax = Vec::new();
    let owner = meta.owner();
    let group = meta.group();

    header.set_uid(u64::from(owner.id));
    header.set_gid(u64::from(group.id));
    if header.set_username(&owner.name).is_err() {
        pax.push(("uname".to_string(), owner.name.clone()));
    }
    if header.set_groupname(&group.name).is_err() {
        pax.push(("gname".to_string(), group.name.clone()));
    }

    header.set_mtime(meta.mtime.map_or(0, |t| u64::try_from(t.secs).unwrap_or(0)));
    if let Some(atime) = meta.atime {
        pax.push(("atime".to_string(), atime.to_string()));
    }
    if let Some(mtime) = meta.mtime {
        pax.push(("mtime".to_string(), mtime.to_string()));
    }
    for (key, value) in &meta.xattrs {
        pax.push((format!("SCHILY.xattr.{}", key), value.clone()));
    }
    pax
}
