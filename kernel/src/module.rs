use core::{
    ffi::c_int,
    sync::atomic::{AtomicUsize, Ordering},
};

use spin::Mutex;

use crate::{
    chrdev::{NumberingAuthority, RegistrationFacility},
    code::EBUSY,
    error::KernelResult as Result,
};

/// The top level entrypoint to implementing a kernel module.
///
/// For any teardown or cleanup operations, your type may implement [`Drop`].
pub trait Module: Sized + Sync {
    /// Called at module initialization time.
    ///
    /// Use this method to perform whatever setup or registration your module
    /// should do.
    ///
    /// Equivalent to the `module_init` macro in the C API.
    fn init(module: &'static ThisModule) -> Result<Self>;
}

// `refcnt` value once unloading has begun; no new references can be taken.
const GOING: usize = usize::MAX;

/// Equivalent to `THIS_MODULE` in the C API, together with the host
/// facilities the module was loaded against.
///
/// Carries the module reference count: every file opened on a device the
/// module owns holds one reference, and the module cannot be unloaded while
/// any are held.
pub struct ThisModule {
    name: &'static str,
    numbering: &'static dyn NumberingAuthority,
    registry: &'static dyn RegistrationFacility,
    refcnt: AtomicUsize,
}

impl ThisModule {
    pub const fn new(
        name: &'static str,
        numbering: &'static dyn NumberingAuthority,
        registry: &'static dyn RegistrationFacility,
    ) -> ThisModule {
        ThisModule {
            name,
            numbering,
            registry,
            refcnt: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The authority device numbers are allocated from.
    pub fn numbering(&self) -> &'static dyn NumberingAuthority {
        self.numbering
    }

    /// The facility character devices are registered with.
    pub fn registry(&self) -> &'static dyn RegistrationFacility {
        self.registry
    }

    /// Takes a reference on the module. Equivalent to `try_module_get`.
    ///
    /// Fails once the module has started unloading.
    pub fn try_get(&self) -> bool {
        self.refcnt
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n != GOING).then(|| n + 1)
            })
            .is_ok()
    }

    /// Drops a reference taken with [`ThisModule::try_get`]. Equivalent to
    /// `module_put`.
    pub fn put(&self) {
        let prev = self.refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev != 0 && prev != GOING, "unbalanced module_put");
    }

    /// Number of references currently held.
    pub fn refcount(&self) -> usize {
        match self.refcnt.load(Ordering::Acquire) {
            GOING => 0,
            n => n,
        }
    }

    // Marks the module as going if nobody holds a reference.
    fn begin_unload(&self) -> bool {
        self.refcnt
            .compare_exchange(0, GOING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish_unload(&self) {
        self.refcnt.store(0, Ordering::Release);
    }
}

/// Holds a loaded module between its `module_init` and `module_exit`.
pub struct ModuleSlot<M: Module> {
    module: Mutex<Option<(M, &'static ThisModule)>>,
}

impl<M: Module> Default for ModuleSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Module> ModuleSlot<M> {
    pub const fn new() -> Self {
        ModuleSlot {
            module: Mutex::new(None),
        }
    }

    /// Runs `M::init` and keeps the module on success.
    ///
    /// Returns 0 or the negative errno `init` failed with; a failed load
    /// leaves the slot empty. Loading an occupied slot fails with `EBUSY`.
    pub fn load(&self, this: &'static ThisModule) -> c_int {
        let mut slot = self.module.lock();
        if slot.is_some() {
            return EBUSY.to_errno();
        }
        match M::init(this) {
            Ok(module) => {
                *slot = Some((module, this));
                0
            }
            Err(e) => e.to_errno(),
        }
    }

    /// Drops the loaded module, if any. Equivalent to `delete_module`.
    ///
    /// Fails with `EBUSY`, leaving the module loaded and untouched, while
    /// references to it are held. Unloading an empty slot is a no-op.
    pub fn unload(&self) -> c_int {
        let mut slot = self.module.lock();
        let Some((_, this)) = slot.as_ref() else {
            return 0;
        };
        let this = *this;
        if !this.begin_unload() {
            log::warn!(
                "{}: unload refused, {} references held",
                this.name(),
                this.refcount()
            );
            return EBUSY.to_errno();
        }
        let module = slot.take();
        drop(slot);
        drop(module);
        this.finish_unload();
        0
    }

    pub fn is_loaded(&self) -> bool {
        self.module.lock().is_some()
    }

    /// Calls `f` with the loaded module.
    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> Option<R> {
        self.module.lock().as_ref().map(|(module, _)| f(module))
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{chrdev::CharDeviceTable, code::ENODEV};

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Probe;

    impl Module for Probe {
        fn init(module: &'static ThisModule) -> Result<Self> {
            if module.name() == "broken" {
                return Err(ENODEV);
            }
            Ok(Probe)
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn this_module(name: &'static str) -> &'static ThisModule {
        let table: &'static CharDeviceTable = Box::leak(Box::new(CharDeviceTable::new()));
        Box::leak(Box::new(ThisModule::new(name, table, table)))
    }

    #[test]
    fn load_and_unload() {
        let slot = ModuleSlot::<Probe>::new();
        let this = this_module("probe");
        assert_eq!(slot.load(this), 0);
        assert!(slot.is_loaded());
        assert_eq!(slot.load(this), EBUSY.to_errno());
        assert_eq!(slot.with(|_| 1), Some(1));

        let before = DROPS.load(Ordering::SeqCst);
        assert_eq!(slot.unload(), 0);
        assert!(!slot.is_loaded());
        assert!(DROPS.load(Ordering::SeqCst) > before);
        assert_eq!(slot.unload(), 0);
    }

    #[test]
    fn unload_refused_while_referenced() {
        let slot = ModuleSlot::<Probe>::new();
        let this = this_module("probe");
        assert_eq!(slot.load(this), 0);

        assert!(this.try_get());
        assert_eq!(this.refcount(), 1);
        assert_eq!(slot.unload(), EBUSY.to_errno());
        assert!(slot.is_loaded());

        this.put();
        assert_eq!(this.refcount(), 0);
        assert_eq!(slot.unload(), 0);
        assert!(!slot.is_loaded());
        assert!(this.try_get());
        this.put();
    }

    #[test]
    fn no_references_once_going() {
        let this = this_module("probe");
        assert!(this.begin_unload());
        assert!(!this.try_get());
        assert_eq!(this.refcount(), 0);
        this.finish_unload();
        assert!(this.try_get());
        this.put();
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let slot = ModuleSlot::<Probe>::new();
        assert_eq!(slot.load(this_module("broken")), ENODEV.to_errno());
        assert!(!slot.is_loaded());
        assert_eq!(slot.with(|_| ()), None);
    }
}
