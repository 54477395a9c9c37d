//! Little-endian byte stream primitives.
//!
//! Integers and floats are fixed-width little-endian; strings and byte blobs
//! are prefixed with a `u32` length. [`StreamWriter`] keeps the first error
//! and turns every later write into a no-op, so a sequence of writes can be
//! checked once with [`StreamWriter::finish`].

use crate::error::{Result, StateError};
use crate::state::Parameter;
use std::io::{self, Read, Write};

pub struct StreamWriter<W: Write> {
    inner: W,
    error: Option<io::Error>,
    written: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            error: None,
            written: 0,
        }
    }

    fn put(&mut self, bytes: &[u8]) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        match self.inner.write_all(bytes) {
            Ok(()) => self.written += bytes.len() as u64,
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let Ok(len) = u32::try_from(bytes.len()) else {
            if self.error.is_none() {
                self.error = Some(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("blob of {} bytes exceeds u32 length prefix", bytes.len()),
                ));
            }
            return self;
        };
        self.write_u32(len).put(bytes)
    }

    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_bytes(s.as_bytes())
    }

    /// `u32 id`, `f64 value`, `str name`.
    pub fn write_parameter(&mut self, parameter: &Parameter) -> &mut Self {
        self.write_u32(parameter.id)
            .write_f64(parameter.value)
            .write_str(&parameter.name)
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub struct StreamReader<R: Read> {
    inner: R,
    read: u64,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, read: 0 }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(StateError::from)?;
        self.read += buf.len() as u64;
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(f64::from_le_bytes(b))
    }

    /// Reads through `take` so a corrupt length prefix cannot force a huge allocation.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as u64;
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(StateError::from)?;
        if (buf.len() as u64) < len {
            return Err(StateError::UnexpectedEof);
        }
        self.read += len;
        Ok(buf)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| StateError::Corrupt(format!("invalid UTF-8: {e}")))
    }

    pub fn read_parameter(&mut self) -> Result<Parameter> {
        let id = self.read_u32()?;
        let value = self.read_f64()?;
        let name = self.read_string()?;
        Ok(Parameter { id, value, name })
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
