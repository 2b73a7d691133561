use std::io::{self, Read};

/// Yields exactly `declared` bytes of the inner stream.
///
/// Bytes past the declared length are never read. A stream that ends early
/// fails the read with `UnexpectedEof` so the archive never holds a header
/// whose size disagrees with its content.
pub(crate) struct ExactReader<'a> {
    inner: &'a mut dyn Read,
    remaining: u64,
    read: u64,
    short: bool,
}

impl<'a> ExactReader<'a> {
    pub(crate) fn new(inner: &'a mut dyn Read, declared: u64) -> Self {
        Self {
            inner,
            remaining: declared,
            read: 0,
            short: false,
        }
    }

    pub(crate) fn is_short(&self) -> bool {
        self.short
    }

    pub(crate) fn read_so_far(&self) -> u64 {
        self.read
    }
}

impl Read for ExactReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let limit = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..limit])?;
        if n == 0 {
            self.short = true;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended {} bytes early", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        self.read += n as u64;
        Ok(n)
    }
}
