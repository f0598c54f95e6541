//! Host facts the update sources depend on: where files go and which
//! architecture is running.

mod host;
mod paths;

pub use host::{X86_64, detect_host_arch, normalize_arch};
pub use paths::{AppPaths, AppPathsError, default_download_dir};
