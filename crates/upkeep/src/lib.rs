//! Update resolution for self-contained application bundles.
//!
//! [`UpdateResolver`] inspects an installed artifact and its configured
//! update URL and hands back the [`UpdateSource`] able to check for and
//! download a newer version.

mod config;
mod error;
pub mod logging;
mod resolver;
mod settings;

pub use config::AppUpdateConfig;
pub use error::ResolverError;
pub use resolver::UpdateResolver;
pub use settings::ResolverSettings;

pub use upkeep_core::{MetadataReader, ReadelfReader, SourceContext};
pub use upkeep_github::{ReleaseClient, ReleaseClientOptions};
pub use upkeep_source::{
    ArtifactHandle, DownloadOutcome, GithubReleaseRef, ProgressFn, SourceError, SourceKind,
    UpdateDescriptor, UpdateSource,
};
