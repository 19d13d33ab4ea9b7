//! Output formatting module
//!
//! Renders VirtualMachine documents and runner results.

mod formatter;

pub use formatter::OutputFormat;
