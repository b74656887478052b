//! The `utils` module collects the shared error types and the logging
//! bootstrap used across `chanlink`.

pub mod error;
pub mod logging;
