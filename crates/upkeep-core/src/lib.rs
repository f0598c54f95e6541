//! Building blocks shared by all update sources.
//!
//! This crate provides the pieces that do not depend on a particular release
//! host:
//! - Restricted `*`-only glob matching.
//! - Header probing that tolerates servers rejecting `HEAD`.
//! - Extraction of update descriptors embedded in an artifact.
//! - Cancellable streamed downloads into the shared download directory.
//! - The static and dynamic URL sources.

mod context;
mod dynamic_source;
mod glob;
mod metadata;
mod probe;
mod static_source;
mod transfer;

/// Shared HTTP client, download directory, and host facts for sources.
pub use context::SourceContext;
/// Source for URLs that redirect to the real artifact.
pub use dynamic_source::{DynamicSource, resolve_static_url};
/// `*`-only glob matcher used for asset and tag patterns.
pub use glob::{GlobError, GlobMatcher};
/// Embedded update descriptor extraction and the `readelf` reader.
pub use metadata::{MetadataReader, ReadelfReader, embedded_descriptor, extract_descriptor};
/// Header probing and header value helpers.
pub use probe::{HttpProbe, content_length, content_type, header_text};
/// Source for fixed direct-download URLs.
pub use static_source::{StaticSource, is_supported_content_type, strip_zsync_suffix};
/// Cancellable download transfer.
pub use transfer::{DOWNLOAD_BLOCK_SIZE, Transfer, remove_download_dir};
