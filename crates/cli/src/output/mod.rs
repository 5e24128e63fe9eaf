//! Output formatting

mod formatter;

pub use formatter::{Formatter, Theme};

/// Output settings taken from the global flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Strict JSON on stdout
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
