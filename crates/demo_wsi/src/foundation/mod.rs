//! Foundation module - logging shared by the library and its drivers

pub mod logging;
