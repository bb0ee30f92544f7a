//! Utils module - Logging setup and string helpers

pub mod logging;
pub mod string;
