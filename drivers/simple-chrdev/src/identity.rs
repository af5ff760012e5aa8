use core::fmt;

use kernel::{
    chrdev::{DeviceNumber, NumberingAuthority},
    error::Error,
    pr_err,
};

/// The numbering authority refused to hand out a device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationError(Error);

impl AllocationError {
    /// The status the authority returned, unchanged.
    pub fn code(&self) -> Error {
        self.0
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device number allocation failed: {}", self.0)
    }
}

/// A device number range obtained from a [`NumberingAuthority`].
///
/// Must be handed back with [`DeviceIdentity::release`]; dropping it leaks the
/// range, which is reported on the console and trips a debug assertion.
#[must_use = "the device number range leaks unless it is released"]
pub struct DeviceIdentity<'a, A: NumberingAuthority + ?Sized> {
    authority: &'a A,
    dev: DeviceNumber,
    count: u32,
    released: bool,
}

impl<'a, A: NumberingAuthority + ?Sized> DeviceIdentity<'a, A> {
    /// Asks `authority` for a free major with `count` minors from `first_minor`.
    ///
    /// Failures are not retried.
    pub fn acquire(
        authority: &'a A,
        name: &str,
        first_minor: u32,
        count: u32,
    ) -> Result<Self, AllocationError> {
        let dev = authority
            .alloc_region(name, first_minor, count)
            .map_err(AllocationError)?;
        Ok(DeviceIdentity {
            authority,
            dev,
            count,
            released: false,
        })
    }

    pub fn device(&self) -> DeviceNumber {
        self.dev
    }

    pub fn minor_count(&self) -> u32 {
        self.count
    }

    /// Returns the range to the authority.
    pub fn release(mut self) {
        self.authority.unregister_region(self.dev, self.count);
        self.released = true;
    }
}

impl<A: NumberingAuthority + ?Sized> Drop for DeviceIdentity<'_, A> {
    fn drop(&mut self) {
        if !self.released {
            pr_err!(
                "device number {} (+{}) dropped without release\n",
                self.dev,
                self.count
            );
        }
        debug_assert!(self.released, "device number {} leaked", self.dev);
    }
}
