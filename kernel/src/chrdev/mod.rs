//! Character devices.
//!
//! A character device is reachable from user space once two host facilities
//! agree on it: the numbering authority has handed out its device number
//! (`alloc_chrdev_region`) and the registration facility routes that number
//! to a [`FileOperations`] table (`cdev_add`). Teardown runs in the reverse
//! order.
//!
//! C header: `include/linux/cdev.h`

mod table;

use core::fmt;

pub use table::{CharDeviceTable, OpenFile};

use crate::{error::KernelResult, fs::FileOperations, ThisModule};

pub const MINORBITS: u32 = 20;
pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Number of majors the host tracks.
pub const CHRDEV_MAJOR_MAX: u32 = 512;
/// Dynamic majors are handed out from 254 down to this value...
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;
/// ...then from 511 down to this one.
pub const CHRDEV_MAJOR_DYN_EXT_START: u32 = 511;
pub const CHRDEV_MAJOR_DYN_EXT_END: u32 = 384;

/// Longest name a device number region may be registered under.
pub const MAX_NAME_LEN: usize = 64;

/// A `dev_t`: major and minor packed into one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceNumber(u32);

impl DeviceNumber {
    /// Equivalent to `MKDEV(major, minor)`.
    pub const fn new(major: u32, minor: u32) -> Self {
        DeviceNumber((major << MINORBITS) | (minor & MINORMASK))
    }

    pub const fn from_raw(dev: u32) -> Self {
        DeviceNumber(dev)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }

    pub const fn major(&self) -> u32 {
        self.0 >> MINORBITS
    }

    pub const fn minor(&self) -> u32 {
        self.0 & MINORMASK
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Proof that a device number range is routed to a file operations table.
///
/// Only the facility that issued it can take it back, through
/// [`RegistrationFacility::cdev_del`], which consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct CdevHandle {
    dev: DeviceNumber,
    id: u64,
}

impl CdevHandle {
    /// Creates a handle. Meant for [`RegistrationFacility`] implementations.
    pub fn new(dev: DeviceNumber, id: u64) -> Self {
        CdevHandle { dev, id }
    }

    /// The first device number the registration routes.
    pub fn device(&self) -> DeviceNumber {
        self.dev
    }

    /// The facility's identifier for the registration.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Hands out and takes back device numbers.
pub trait NumberingAuthority: Sync {
    /// Reserves `count` minors starting at `first_minor` under a free major.
    ///
    /// Equivalent to `alloc_chrdev_region`.
    fn alloc_region(&self, name: &str, first_minor: u32, count: u32)
        -> KernelResult<DeviceNumber>;

    /// Returns a range obtained from [`NumberingAuthority::alloc_region`].
    ///
    /// Equivalent to `unregister_chrdev_region`. The range must not be routed
    /// anywhere anymore.
    fn unregister_region(&self, first: DeviceNumber, count: u32);
}

/// Routes device numbers to file operations tables.
pub trait RegistrationFacility: Sync {
    /// Makes `count` device numbers starting at `dev` live, dispatching to `fops`.
    ///
    /// Equivalent to `cdev_init`, setting `cdev.owner`, then `cdev_add`. While a
    /// file is open on the device it holds a reference on `owner`.
    fn cdev_add(
        &self,
        dev: DeviceNumber,
        count: u32,
        fops: &'static dyn FileOperations,
        owner: Option<&'static ThisModule>,
    ) -> KernelResult<CdevHandle>;

    /// Removes a registration. Equivalent to `cdev_del`.
    fn cdev_del(&self, handle: CdevHandle);
}
