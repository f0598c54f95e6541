//! Contract shared by every update source.
//!
//! Sources are a closed set ([`SourceKind`]): a fixed static URL, a dynamic
//! URL resolved through redirects, and a GitHub release reference. Each one
//! implements [`UpdateSource`] and reports failures through [`SourceError`].

mod error;
mod traits;
mod types;

pub use error::{NetworkStage, SourceError};
pub use traits::{ProgressFn, UpdateSource};
pub use types::{
    ArtifactHandle, DownloadOutcome, GithubReleaseRef, ReleaseAsset, SourceKind, UpdateDescriptor,
};
