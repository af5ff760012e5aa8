//! Lifecycle of the device: number allocation, registration and their undo.
//!
//! `activate` walks `Unregistered -> IdentityAcquired -> Active` and, if
//! registration fails, gives the number back before returning so a failed
//! activation holds nothing. `deactivate` undoes an activation in the
//! opposite order: the registration goes first, then the number.
//!
//! Activation and deactivation are serialized by the host's module
//! load/unload path; the controller takes no locks of its own.

use core::{ffi::c_int, fmt};

use kernel::{
    chrdev::{CdevHandle, DeviceNumber, NumberingAuthority, RegistrationFacility},
    code::EBUSY,
    error::Error,
    fs::FileOperations,
    pr_err, pr_info, pr_warn, ThisModule,
};

use crate::{
    config::DriverConfig,
    identity::{AllocationError, DeviceIdentity},
};

/// The registration facility refused to bind the device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationError(Error);

impl RegistrationError {
    /// The status the facility returned, unchanged.
    pub fn code(&self) -> Error {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationError {
    /// No device number could be obtained. Nothing is held.
    AllocationFailed(Error),
    /// The number was obtained but could not be registered. It has been
    /// released again.
    RegistrationFailed(Error),
    /// `activate` was called on a controller that already holds a number.
    AlreadyActive,
}

impl ActivationError {
    /// The raw status to report as the module load result.
    pub fn status(&self) -> c_int {
        Error::from(*self).to_errno()
    }
}

impl From<AllocationError> for ActivationError {
    fn from(e: AllocationError) -> Self {
        ActivationError::AllocationFailed(e.code())
    }
}

impl From<RegistrationError> for ActivationError {
    fn from(e: RegistrationError) -> Self {
        ActivationError::RegistrationFailed(e.code())
    }
}

impl From<ActivationError> for Error {
    fn from(e: ActivationError) -> Error {
        match e {
            ActivationError::AllocationFailed(code) | ActivationError::RegistrationFailed(code) => {
                code
            }
            ActivationError::AlreadyActive => EBUSY,
        }
    }
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::AllocationFailed(code) => {
                write!(f, "device number allocation failed: {}", code)
            }
            ActivationError::RegistrationFailed(code) => {
                write!(f, "device registration failed: {}", code)
            }
            ActivationError::AlreadyActive => f.write_str("device is already active"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Unregistered,
    IdentityAcquired,
    Active,
}

/// Owns the device number and its registration.
///
/// # Invariants
///
/// `registration` is only `Some` while `identity` is `Some`, and refers to
/// `identity`'s device number.
pub struct DeviceController<'a, A, R>
where
    A: NumberingAuthority + ?Sized,
    R: RegistrationFacility + ?Sized,
{
    authority: &'a A,
    registry: &'a R,
    fops: &'static dyn FileOperations,
    owner: Option<&'static ThisModule>,
    config: DriverConfig,
    identity: Option<DeviceIdentity<'a, A>>,
    registration: Option<CdevHandle>,
}

impl<'a, A, R> DeviceController<'a, A, R>
where
    A: NumberingAuthority + ?Sized,
    R: RegistrationFacility + ?Sized,
{
    /// Creates an `Unregistered` controller that will route its device to `fops`.
    pub fn new(
        authority: &'a A,
        registry: &'a R,
        fops: &'static dyn FileOperations,
        config: DriverConfig,
    ) -> Self {
        DeviceController {
            authority,
            registry,
            fops,
            owner: None,
            config,
            identity: None,
            registration: None,
        }
    }

    /// Makes `owner` the module every open file on the device pins.
    pub fn with_owner(mut self, owner: &'static ThisModule) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn state(&self) -> State {
        match (&self.identity, &self.registration) {
            (None, _) => State::Unregistered,
            (Some(_), None) => State::IdentityAcquired,
            (Some(_), Some(_)) => State::Active,
        }
    }

    /// The device number, while one is held.
    pub fn device(&self) -> Option<DeviceNumber> {
        self.identity.as_ref().map(DeviceIdentity::device)
    }

    /// Acquires a device number and registers the device under it.
    ///
    /// On error the controller is back in `Unregistered` and holds nothing.
    pub fn activate(&mut self) -> Result<(), ActivationError> {
        let name = self.config.name;
        if self.identity.is_some() {
            pr_warn!("{}: activate() while {:?}\n", name, self.state());
            return Err(ActivationError::AlreadyActive);
        }

        let identity = DeviceIdentity::acquire(
            self.authority,
            name,
            self.config.first_minor,
            self.config.minor_count,
        )
        .map_err(|e| {
            pr_err!("{}: alloc_chrdev_region failed: {}\n", name, e.code().to_errno());
            ActivationError::from(e)
        })?;
        let dev = identity.device();
        let count = identity.minor_count();
        pr_info!(
            "{}: allocated major={} minor={}\n",
            name,
            dev.major(),
            dev.minor()
        );
        self.identity = Some(identity);
        log::debug!("{}: {:?}", name, self.state());

        match self.register(dev, count) {
            Ok(handle) => {
                self.registration = Some(handle);
                log::debug!("{}: {:?}", name, self.state());
                Ok(())
            }
            Err(e) => {
                pr_err!("{}: cdev_add failed: {}\n", name, e.code().to_errno());
                if let Some(identity) = self.identity.take() {
                    identity.release();
                }
                Err(e.into())
            }
        }
    }

    fn register(&self, dev: DeviceNumber, count: u32) -> Result<CdevHandle, RegistrationError> {
        self.registry
            .cdev_add(dev, count, self.fops, self.owner)
            .map_err(RegistrationError)
    }

    /// Unregisters the device, then gives its number back.
    ///
    /// Only meaningful on an `Active` controller. Anywhere else nothing is
    /// touched and the misuse is reported on the console.
    pub fn deactivate(&mut self) {
        let Some(handle) = self.registration.take() else {
            pr_err!(
                "{}: deactivate() while {:?}, nothing to tear down\n",
                self.config.name,
                self.state()
            );
            return;
        };
        self.registry.cdev_del(handle);
        if let Some(identity) = self.identity.take() {
            identity.release();
        }
        log::debug!("{}: {:?}", self.config.name, self.state());
    }
}

impl<A, R> Drop for DeviceController<'_, A, R>
where
    A: NumberingAuthority + ?Sized,
    R: RegistrationFacility + ?Sized,
{
    fn drop(&mut self) {
        if self.state() == State::Active {
            pr_warn!("{}: dropped while active, deactivating\n", self.config.name);
            self.deactivate();
        }
    }
}
