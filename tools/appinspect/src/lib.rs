//! Host-side inspection of application images.
//!
//! [`inspect`] decodes an image header and dry-runs the relocating loader
//! into a host arena; [`Formatter`] prints the resulting [`Report`] either
//! as colored text or as JSON.

mod format;
mod report;

pub use format::Formatter;
pub use report::{inspect, inspect_bytes, InspectError, InspectOptions, LoadSummary, Report};

#[cfg(test)]
mod tests;
