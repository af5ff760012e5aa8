//! File operations of character devices.
//!
//! C header: `include/linux/fs.h`

use crate::{
    buf::{UserSliceReader, UserSliceWriter},
    chrdev::DeviceNumber,
    code::{EINVAL, ENOTTY},
    error::KernelResult,
};

bitflags::bitflags! {
    /// Flags an open file was created with (`O_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FileFlags: u32 {
        const WRONLY = 0o1;
        const RDWR = 0o2;
        const APPEND = 0o2000;
        const NONBLOCK = 0o4000;
        const CLOEXEC = 0o2000000;
    }
}

/// How an open file may be accessed (`O_ACCMODE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl FileFlags {
    /// `O_RDONLY` is the absence of both access bits.
    pub const RDONLY: FileFlags = FileFlags::empty();

    pub fn access_mode(&self) -> AccessMode {
        if self.contains(FileFlags::RDWR) {
            AccessMode::ReadWrite
        } else if self.contains(FileFlags::WRONLY) {
            AccessMode::WriteOnly
        } else {
            AccessMode::ReadOnly
        }
    }
}

/// The context a file operation runs in: one open instance of a device node.
#[derive(Debug)]
pub struct File {
    dev: DeviceNumber,
    flags: FileFlags,
}

impl File {
    pub fn new(dev: DeviceNumber, flags: FileFlags) -> Self {
        File { dev, flags }
    }

    /// The device number of the node this file was opened through.
    pub fn device(&self) -> DeviceNumber {
        self.dev
    }

    pub fn flags(&self) -> FileFlags {
        self.flags
    }
}

/// The operations the host dispatches to a registered character device.
///
/// Operations a driver leaves unset keep the default body, which answers the
/// way the host does for a missing `file_operations` entry.
pub trait FileOperations: Sync {
    /// Called on every `open(2)` of the device node.
    fn open(&self, file: &File) -> KernelResult;

    /// Called when the last reference to an open file goes away.
    fn release(&self, file: &File) -> KernelResult;

    /// Reads into `buf` starting at `offset`, returning the number of bytes
    /// written. Zero means end-of-stream.
    fn read(&self, file: &File, buf: &mut UserSliceWriter<'_>, offset: u64) -> KernelResult<usize>;

    fn write(
        &self,
        _file: &File,
        _buf: &mut UserSliceReader<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        Err(EINVAL)
    }

    fn ioctl(&self, _file: &File, _cmd: u32, _arg: usize) -> KernelResult<i32> {
        Err(ENOTTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    impl FileOperations for ReadOnly {
        fn open(&self, _file: &File) -> KernelResult {
            Ok(())
        }

        fn release(&self, _file: &File) -> KernelResult {
            Ok(())
        }

        fn read(
            &self,
            _file: &File,
            buf: &mut UserSliceWriter<'_>,
            _offset: u64,
        ) -> KernelResult<usize> {
            buf.write(b"x")?;
            Ok(1)
        }
    }

    #[test]
    fn unset_operations_use_host_defaults() {
        let file = File::new(DeviceNumber::new(240, 0), FileFlags::RDWR);
        let mut reader = UserSliceReader::new(b"data");
        assert_eq!(ReadOnly.write(&file, &mut reader, 0), Err(EINVAL));
        assert_eq!(ReadOnly.ioctl(&file, 0x5401, 0), Err(ENOTTY));
    }

    #[test]
    fn access_mode_from_flags() {
        assert_eq!(FileFlags::RDONLY.access_mode(), AccessMode::ReadOnly);
        assert_eq!(FileFlags::WRONLY.access_mode(), AccessMode::WriteOnly);
        assert_eq!(
            (FileFlags::RDWR | FileFlags::NONBLOCK).access_mode(),
            AccessMode::ReadWrite
        );
    }
}
