pub mod logging;
pub mod spans;
