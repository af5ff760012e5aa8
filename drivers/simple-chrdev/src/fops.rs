use kernel::{
    buf::UserSliceWriter,
    error::KernelResult,
    fs::{File, FileOperations},
    pr_info,
};

use crate::config::DEVICE_NAME;

/// The device's file operations: `open`, `release` and `read`.
///
/// Keeps no state, so any number of callers may be inside it at once. Every
/// read is end-of-stream.
pub struct SimpleFile;

/// The dispatch table handed to the registration facility.
pub static SIMPLE_FOPS: SimpleFile = SimpleFile;

impl FileOperations for SimpleFile {
    fn open(&self, _file: &File) -> KernelResult {
        pr_info!("{}: open()\n", DEVICE_NAME);
        Ok(())
    }

    fn release(&self, _file: &File) -> KernelResult {
        pr_info!("{}: release()\n", DEVICE_NAME);
        Ok(())
    }

    // The offset is ignored and `buf` is never written.
    fn read(
        &self,
        _file: &File,
        buf: &mut UserSliceWriter<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        pr_info!("{}: read({})\n", DEVICE_NAME, buf.written() + buf.len());
        Ok(0)
    }
}
