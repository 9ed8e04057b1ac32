//! logmask CLI support library.
//!
//! The binary in `main.rs` wires these pieces together: exit codes, the
//! stderr logging stack, and the error type every command returns.

pub mod error;
pub mod exit_codes;
pub mod logging;

pub use error::{CliError, CliResult};
pub use exit_codes::ExitCode;
