//! Views over the buffer a caller passed to `read`/`write`.
//!
//! The host copies to and from the caller's memory through these types, so a
//! file operation can only touch the range the caller handed in.

use crate::{code::EFAULT, error::KernelResult as Result};

/// Writes into the caller's buffer, front to back.
pub struct UserSliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> UserSliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        UserSliceWriter { buf, pos: 0 }
    }

    /// Returns the number of bytes that can still be written.
    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` if `self.len()` is 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bytes written so far.
    pub fn written(&self) -> usize {
        self.pos
    }

    /// Writes `data` at the current position.
    ///
    /// Fails with [`EFAULT`] if `data` is larger than what is left, in which
    /// case nothing is written.
    pub fn write(&mut self, data: &[u8]) -> Result {
        if data.len() > self.len() {
            return Err(EFAULT);
        }
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }
}

/// Reads from the caller's buffer, front to back.
pub struct UserSliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> UserSliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        UserSliceReader { buf, pos: 0 }
    }

    /// Returns the number of bytes left to be read.
    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `out` from the current position.
    ///
    /// Fails with [`EFAULT`] if fewer than `out.len()` bytes are left.
    pub fn read_slice(&mut self, out: &mut [u8]) -> Result {
        if out.len() > self.len() {
            return Err(EFAULT);
        }
        out.copy_from_slice(&self.buf[self.pos..self.pos + out.len()]);
        self.pos += out.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_rejects_overflow_without_writing() {
        let mut storage = [0u8; 4];
        let mut writer = UserSliceWriter::new(&mut storage);
        writer.write(b"ab").unwrap();
        assert_eq!(writer.write(b"cde"), Err(EFAULT));
        assert_eq!(writer.written(), 2);
        assert_eq!(writer.len(), 2);
        writer.write(b"cd").unwrap();
        assert!(writer.is_empty());
        assert_eq!(&storage, b"abcd");
    }

    #[test]
    fn reader_advances() {
        let data = *b"hello";
        let mut reader = UserSliceReader::new(&data);
        let mut head = [0u8; 2];
        reader.read_slice(&mut head).unwrap();
        assert_eq!(&head, b"he");
        let mut too_big = [0u8; 4];
        assert_eq!(reader.read_slice(&mut too_big), Err(EFAULT));
        let mut rest = [0u8; 3];
        reader.read_slice(&mut rest).unwrap();
        assert_eq!(&rest, b"llo");
        assert!(reader.is_empty());
    }
}
