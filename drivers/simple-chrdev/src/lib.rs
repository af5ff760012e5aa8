//! A character device with a single node that opens, releases and reads
//! end-of-stream.
//!
//! Loading the module allocates a device number and registers the node;
//! unloading removes the node and frees the number.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod controller;
pub mod fops;
pub mod identity;

use core::ffi::c_int;

use kernel::{
    chrdev::{DeviceNumber, NumberingAuthority, RegistrationFacility},
    error::KernelResult,
    pr_info, Module, ModuleSlot, ThisModule,
};

pub use crate::{
    config::DriverConfig,
    controller::{ActivationError, DeviceController, State},
    fops::{SimpleFile, SIMPLE_FOPS},
    identity::{AllocationError, DeviceIdentity},
};

type HostController = DeviceController<'static, dyn NumberingAuthority, dyn RegistrationFacility>;

pub struct SimpleChrdev {
    controller: HostController,
}

impl SimpleChrdev {
    /// The number of the device node.
    pub fn device(&self) -> Option<DeviceNumber> {
        self.controller.device()
    }

    pub fn state(&self) -> State {
        self.controller.state()
    }
}

impl Module for SimpleChrdev {
    fn init(module: &'static ThisModule) -> KernelResult<Self> {
        kernel::logger::init_logger();
        let mut controller = DeviceController::new(
            module.numbering(),
            module.registry(),
            &SIMPLE_FOPS,
            DriverConfig::default(),
        )
        .with_owner(module);
        controller.activate()?;
        pr_info!("{}: module loaded\n", config::DEVICE_NAME);
        Ok(SimpleChrdev { controller })
    }
}

impl Drop for SimpleChrdev {
    fn drop(&mut self) {
        self.controller.deactivate();
        pr_info!("{}: module unloaded\n", config::DEVICE_NAME);
    }
}

static MODULE: ModuleSlot<SimpleChrdev> = ModuleSlot::new();

/// `module_init`: activates the device. Returns 0 or the negative status the
/// activation failed with, after everything it acquired has been given back.
pub fn load(module: &'static ThisModule) -> c_int {
    MODULE.load(module)
}

/// `module_exit`: deactivates the device.
///
/// Returns `-EBUSY` and leaves the device active while any file on it is
/// still open.
pub fn unload() -> c_int {
    MODULE.unload()
}

/// The device number of the loaded module.
pub fn loaded_device() -> Option<DeviceNumber> {
    MODULE.with(SimpleChrdev::device).flatten()
}
