//! Conversion jobs: run the external tool and report progress.

mod events;
mod filename;
mod progress;
mod runner;

pub use events::{JobEvent, ProgressUpdate, StreamPayload, COMPLETED_MESSAGE, FAILED_MESSAGE};
pub use filename::{artifact_stem, sanitize_filename};
pub use progress::{parse_percent, ProgressTracker};
pub use runner::{ConversionError, ConversionResult, ConversionRunner, ConversionSettings};
