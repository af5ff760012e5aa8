/// Name the device number region is registered under; also prefixes every
/// status line.
pub const DEVICE_NAME: &str = "mydevice";
pub const FIRST_MINOR: u32 = 0;
/// Single-instance driver: one minor.
pub const MINOR_COUNT: u32 = 1;

/// What the controller asks the host for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    pub name: &'static str,
    pub first_minor: u32,
    pub minor_count: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            name: DEVICE_NAME,
            first_minor: FIRST_MINOR,
            minor_count: MINOR_COUNT,
        }
    }
}

impl DriverConfig {
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}
