mod downloads_sweep;

pub use downloads_sweep::{sweep_directory, DownloadsSweepJob, SweepStats};
