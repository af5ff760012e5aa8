//! Instrumented host doubles: a numbering authority and a registration
//! facility that record every call into one shared log.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use kernel::{
    chrdev::{CdevHandle, DeviceNumber, NumberingAuthority, RegistrationFacility},
    code::EBUSY,
    error::{Error, KernelResult},
    fs::FileOperations,
    ThisModule,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Alloc { name: String, count: u32 },
    Free(DeviceNumber, u32),
    Bind(DeviceNumber, u32),
    Unbind(DeviceNumber),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct RecordingAuthority {
    log: CallLog,
    free_majors: Mutex<Vec<u32>>,
    allocated: Mutex<Vec<(DeviceNumber, u32)>>,
    fail_with: Option<Error>,
}

impl RecordingAuthority {
    /// An authority with the given majors free, handed out front to back.
    pub fn new(log: &CallLog, free_majors: &[u32]) -> Self {
        RecordingAuthority {
            log: log.clone(),
            free_majors: Mutex::new(free_majors.iter().rev().copied().collect()),
            allocated: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// An authority that refuses every allocation with `err`.
    pub fn failing(log: &CallLog, err: Error) -> Self {
        RecordingAuthority {
            fail_with: Some(err),
            ..Self::new(log, &[])
        }
    }

    pub fn allocated(&self) -> Vec<(DeviceNumber, u32)> {
        self.allocated.lock().unwrap().clone()
    }

    pub fn free_majors(&self) -> Vec<u32> {
        self.free_majors.lock().unwrap().clone()
    }
}

impl NumberingAuthority for RecordingAuthority {
    fn alloc_region(
        &self,
        name: &str,
        first_minor: u32,
        count: u32,
    ) -> KernelResult<DeviceNumber> {
        self.log.lock().unwrap().push(Call::Alloc {
            name: name.to_string(),
            count,
        });
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        let major = self.free_majors.lock().unwrap().pop().ok_or(EBUSY)?;
        let dev = DeviceNumber::new(major, first_minor);
        self.allocated.lock().unwrap().push((dev, count));
        Ok(dev)
    }

    fn unregister_region(&self, first: DeviceNumber, count: u32) {
        self.log.lock().unwrap().push(Call::Free(first, count));
        let mut allocated = self.allocated.lock().unwrap();
        let pos = allocated
            .iter()
            .position(|entry| *entry == (first, count))
            .expect("freeing a region that was never allocated");
        allocated.remove(pos);
        self.free_majors.lock().unwrap().push(first.major());
    }
}

pub struct RecordingFacility {
    log: CallLog,
    bound: Mutex<Vec<(u64, DeviceNumber, &'static dyn FileOperations)>>,
    next_id: Mutex<u64>,
    fail_with: Option<Error>,
}

impl RecordingFacility {
    pub fn new(log: &CallLog) -> Self {
        RecordingFacility {
            log: log.clone(),
            bound: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            fail_with: None,
        }
    }

    /// A facility that refuses every binding with `err`.
    pub fn failing(log: &CallLog, err: Error) -> Self {
        RecordingFacility {
            fail_with: Some(err),
            ..Self::new(log)
        }
    }

    pub fn bound(&self) -> Vec<DeviceNumber> {
        self.bound.lock().unwrap().iter().map(|b| b.1).collect()
    }

    /// The table user-space operations on `dev` would be dispatched to.
    pub fn dispatch(&self, dev: DeviceNumber) -> Option<&'static dyn FileOperations> {
        self.bound
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.1 == dev)
            .map(|b| b.2)
    }
}

impl RegistrationFacility for RecordingFacility {
    fn cdev_add(
        &self,
        dev: DeviceNumber,
        count: u32,
        fops: &'static dyn FileOperations,
        _owner: Option<&'static ThisModule>,
    ) -> KernelResult<CdevHandle> {
        self.log.lock().unwrap().push(Call::Bind(dev, count));
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.bound.lock().unwrap().push((id, dev, fops));
        Ok(CdevHandle::new(dev, id))
    }

    fn cdev_del(&self, handle: CdevHandle) {
        self.log.lock().unwrap().push(Call::Unbind(handle.device()));
        let mut bound = self.bound.lock().unwrap();
        let pos = bound
            .iter()
            .position(|b| b.0 == handle.id())
            .expect("unbinding a handle this facility never issued");
        bound.remove(pos);
    }
}

/// The position of the first call matching `pred`.
pub fn position(log: &CallLog, pred: impl Fn(&Call) -> bool) -> Option<usize> {
    log.lock().unwrap().iter().position(pred)
}
