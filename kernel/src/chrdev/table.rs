use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use hashbrown::HashMap;
use spin::Mutex;

use super::{
    CdevHandle, DeviceNumber, NumberingAuthority, RegistrationFacility,
    CHRDEV_MAJOR_DYN_END, CHRDEV_MAJOR_DYN_EXT_END, CHRDEV_MAJOR_DYN_EXT_START, MAX_NAME_LEN,
    MINORMASK,
};
use crate::{
    buf::{UserSliceReader, UserSliceWriter},
    code::{EBADF, EBUSY, EINVAL, ENXIO},
    error::KernelResult,
    fs::{AccessMode, File, FileFlags, FileOperations},
    ThisModule,
};

struct Region {
    major: u32,
    first_minor: u32,
    count: u32,
    name: String,
}

impl Region {
    fn covers(&self, dev: DeviceNumber, count: u32) -> bool {
        dev.major() == self.major
            && dev.minor() >= self.first_minor
            && dev.minor() as u64 + count as u64 <= self.first_minor as u64 + self.count as u64
    }
}

struct Cdev {
    dev: DeviceNumber,
    count: u32,
    fops: &'static dyn FileOperations,
    owner: Option<&'static ThisModule>,
}

impl Cdev {
    fn overlaps(&self, dev: DeviceNumber, count: u32) -> bool {
        let start = self.dev.into_raw() as u64;
        let end = start + self.count as u64;
        let other = dev.into_raw() as u64;
        other < end && start < other + count as u64
    }
}

struct Inner {
    regions: Vec<Region>,
    cdevs: HashMap<u64, Cdev>,
    next_id: u64,
}

/// An in-memory character device host.
///
/// Plays both the numbering authority and the registration facility, and
/// lets callers act as user space against the nodes it routes.
pub struct CharDeviceTable {
    dynamic_majors: Vec<u32>,
    inner: Mutex<Inner>,
}

impl Default for CharDeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CharDeviceTable {
    /// Creates a table handing out dynamic majors in the order Linux does.
    pub fn new() -> Self {
        let majors = (CHRDEV_MAJOR_DYN_END..=254)
            .rev()
            .chain((CHRDEV_MAJOR_DYN_EXT_END..=CHRDEV_MAJOR_DYN_EXT_START).rev());
        Self::with_dynamic_majors(majors)
    }

    /// Creates a table that only hands out the given majors, in order.
    pub fn with_dynamic_majors(majors: impl IntoIterator<Item = u32>) -> Self {
        CharDeviceTable {
            dynamic_majors: majors.into_iter().collect(),
            inner: Mutex::new(Inner {
                regions: Vec::new(),
                cdevs: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of device number regions currently allocated.
    pub fn allocated_regions(&self) -> usize {
        self.inner.lock().regions.len()
    }

    /// Number of live `cdev` registrations.
    pub fn live_registrations(&self) -> usize {
        self.inner.lock().cdevs.len()
    }

    /// Whether `dev` is routed to a file operations table.
    pub fn is_bound(&self, dev: DeviceNumber) -> bool {
        self.inner.lock().cdevs.values().any(|c| c.overlaps(dev, 1))
    }

    /// The name of the region `dev` belongs to.
    pub fn region_name(&self, dev: DeviceNumber) -> Option<String> {
        self.inner
            .lock()
            .regions
            .iter()
            .find(|r| r.covers(dev, 1))
            .map(|r| r.name.clone())
    }

    /// Opens the node for `dev`, as `open(2)` on it would.
    ///
    /// The file holds a reference on the owning module until it is released.
    /// Fails with [`ENXIO`] if nothing is registered for `dev` or its owner is
    /// unloading, or with whatever the driver's `open` returns.
    pub fn open(&self, dev: DeviceNumber, flags: FileFlags) -> KernelResult<OpenFile> {
        let (fops, owner) = {
            let inner = self.inner.lock();
            let cdev = inner
                .cdevs
                .values()
                .find(|c| c.overlaps(dev, 1))
                .ok_or(ENXIO)?;
            if let Some(owner) = cdev.owner {
                if !owner.try_get() {
                    return Err(ENXIO);
                }
            }
            (cdev.fops, cdev.owner)
        };
        // The lock is not held across driver code.
        let file = File::new(dev, flags);
        if let Err(e) = fops.open(&file) {
            if let Some(owner) = owner {
                owner.put();
            }
            return Err(e);
        }
        Ok(OpenFile {
            fops,
            owner,
            file,
            pos: 0,
            released: false,
        })
    }

    fn validate_name(name: &str) -> KernelResult {
        if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
            return Err(EINVAL);
        }
        Ok(())
    }
}

impl NumberingAuthority for CharDeviceTable {
    fn alloc_region(
        &self,
        name: &str,
        first_minor: u32,
        count: u32,
    ) -> KernelResult<DeviceNumber> {
        Self::validate_name(name)?;
        if count == 0 || first_minor > MINORMASK || count > MINORMASK + 1 - first_minor {
            return Err(EINVAL);
        }
        let mut inner = self.inner.lock();
        let major = self
            .dynamic_majors
            .iter()
            .copied()
            .find(|major| inner.regions.iter().all(|r| r.major != *major))
            .ok_or_else(|| {
                log::warn!("no free dynamic major for {}", name);
                EBUSY
            })?;
        inner.regions.push(Region {
            major,
            first_minor,
            count,
            name: name.to_string(),
        });
        log::debug!(
            "allocated {}..{} minors under major {} for {}",
            first_minor,
            first_minor + count,
            major,
            name
        );
        Ok(DeviceNumber::new(major, first_minor))
    }

    fn unregister_region(&self, first: DeviceNumber, count: u32) {
        let mut inner = self.inner.lock();
        if inner.cdevs.values().any(|c| c.overlaps(first, count)) {
            log::error!("freeing region {} while it is still registered", first);
        }
        let pos = inner.regions.iter().position(|r| {
            r.major == first.major() && r.first_minor == first.minor() && r.count == count
        });
        match pos {
            Some(pos) => {
                let region = inner.regions.swap_remove(pos);
                log::debug!("freed region {} of {}", first, region.name);
            }
            None => log::error!("freeing unknown region {} (+{})", first, count),
        }
    }
}

impl RegistrationFacility for CharDeviceTable {
    fn cdev_add(
        &self,
        dev: DeviceNumber,
        count: u32,
        fops: &'static dyn FileOperations,
        owner: Option<&'static ThisModule>,
    ) -> KernelResult<CdevHandle> {
        if count == 0 {
            return Err(EINVAL);
        }
        let mut inner = self.inner.lock();
        if !inner.regions.iter().any(|r| r.covers(dev, count)) {
            return Err(ENXIO);
        }
        if inner.cdevs.values().any(|c| c.overlaps(dev, count)) {
            return Err(EBUSY);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.cdevs.insert(
            id,
            Cdev {
                dev,
                count,
                fops,
                owner,
            },
        );
        log::debug!("cdev {} live for {} (+{})", id, dev, count);
        Ok(CdevHandle::new(dev, id))
    }

    fn cdev_del(&self, handle: CdevHandle) {
        match self.inner.lock().cdevs.remove(&handle.id()) {
            Some(_) => log::debug!("cdev {} removed", handle.id()),
            None => log::error!("removing unknown cdev {} for {}", handle.id(), handle.device()),
        }
    }
}

/// A device node opened through a [`CharDeviceTable`].
///
/// Dropping it releases the file like the last `close(2)` would, and drops
/// the reference it holds on the owning module.
pub struct OpenFile {
    fops: &'static dyn FileOperations,
    owner: Option<&'static ThisModule>,
    file: File,
    pos: u64,
    released: bool,
}

impl OpenFile {
    /// Reads into `buf` at the current position, advancing it by the amount read.
    pub fn read(&mut self, buf: &mut [u8]) -> KernelResult<usize> {
        if self.file.flags().access_mode() == AccessMode::WriteOnly {
            return Err(EBADF);
        }
        let mut writer = UserSliceWriter::new(buf);
        let read = self.fops.read(&self.file, &mut writer, self.pos)?;
        self.pos += read as u64;
        Ok(read)
    }

    /// Writes `data` at the current position, advancing it by the amount written.
    pub fn write(&mut self, data: &[u8]) -> KernelResult<usize> {
        if self.file.flags().access_mode() == AccessMode::ReadOnly {
            return Err(EBADF);
        }
        let mut reader = UserSliceReader::new(data);
        let written = self.fops.write(&self.file, &mut reader, self.pos)?;
        self.pos += written as u64;
        Ok(written)
    }

    pub fn ioctl(&self, cmd: u32, arg: usize) -> KernelResult<i32> {
        self.fops.ioctl(&self.file, cmd, arg)
    }

    /// The file position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Releases the file and reports what the driver's `release` returned.
    pub fn close(mut self) -> KernelResult {
        self.release()
    }

    fn release(&mut self) -> KernelResult {
        self.released = true;
        let ret = self.fops.release(&self.file);
        // The owner's code must not run past this point.
        if let Some(owner) = self.owner {
            owner.put();
        }
        ret
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            log::warn!("release of {} failed: {:?}", self.file.device(), e);
        }
    }
}
