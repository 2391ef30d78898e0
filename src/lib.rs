// Coding with Chrome robot driver - shared library
// Config loading, CLI parameter parsing and device target selection

pub mod args;
pub mod config;
pub mod target;

pub use config::Config;
pub use target::DeviceTarget;
