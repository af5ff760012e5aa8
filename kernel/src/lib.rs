#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod buf;
pub mod chrdev;
pub mod error;
pub mod fs;
pub mod logger;
pub mod module;
pub mod print;

pub use error::linux_err as code;
pub use module::{Module, ModuleSlot, ThisModule};
