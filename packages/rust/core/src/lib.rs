//! Conversion pipeline and domain logic for c2md.
//!
//! Maps parsed records to collision-free paths, writes them under the output
//! root, and generates an index mirroring the resulting tree (`convert_file`).

pub mod index;
pub mod mapper;
pub mod organizer;
pub mod pipeline;
pub mod tree;

pub use pipeline::{ConvertReport, ProgressReporter, SilentProgress, convert_file, convert_str};
