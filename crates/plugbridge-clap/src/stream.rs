//! `std::io` adapters over the host's state streams.

use clap_sys::stream::{clap_istream, clap_ostream};
use std::ffi::c_void;
use std::io::{self, Read, Write};

/// Reads from a host `clap_istream`.
pub struct ClapInputStream<'a> {
    stream: &'a clap_istream,
}

impl<'a> ClapInputStream<'a> {
    /// # Safety
    ///
    /// `stream` must be valid for `'a`.
    pub unsafe fn new(stream: &'a clap_istream) -> Self {
        Self { stream }
    }
}

impl Read for ClapInputStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let read = self
            .stream
            .read
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "stream has no read"))?;
        let n = unsafe { read(self.stream, buf.as_mut_ptr() as *mut c_void, buf.len() as u64) };
        match usize::try_from(n) {
            Ok(n) if n <= buf.len() => Ok(n),
            Ok(n) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("host reported {} bytes for a {} byte read", n, buf.len()),
            )),
            Err(_) => Err(io::Error::other("host stream read failed")),
        }
    }
}

/// Writes to a host `clap_ostream`.
pub struct ClapOutputStream<'a> {
    stream: &'a clap_ostream,
}

impl<'a> ClapOutputStream<'a> {
    /// # Safety
    ///
    /// `stream` must be valid for `'a`.
    pub unsafe fn new(stream: &'a clap_ostream) -> Self {
        Self { stream }
    }
}

impl Write for ClapOutputStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let write = self
            .stream
            .write
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "stream has no write"))?;
        let n = unsafe { write(self.stream, buf.as_ptr() as *const c_void, buf.len() as u64) };
        match usize::try_from(n) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "host stream accepted no bytes",
            )),
            Ok(n) => Ok(n.min(buf.len())),
            Err(_) => Err(io::Error::other("host stream write failed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
