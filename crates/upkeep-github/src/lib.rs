mod descriptor;
mod release;
mod selection;
mod source;

pub use descriptor::{DescriptorError, GH_RELEASES_TAG, parse_release_ref};
pub use release::{GitHubRelease, ReleaseClient, ReleaseClientOptions};
pub use selection::select_target_asset;
pub use source::GithubReleaseSource;
