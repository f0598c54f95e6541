use std::sync::LazyLock;

use log::{debug, error, info, warn};
use regex::Regex;
use upkeep_core::{GlobMatcher, strip_zsync_suffix};
use upkeep_platform::X86_64;
use upkeep_source::{GithubReleaseRef, ReleaseAsset};

use crate::release::GitHubRelease;

const ZSYNC_SUFFIX: &str = ".zsync";

static X86_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]x86[-_.]").expect("x86 marker pattern is valid"));

static ARM_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_.](?:arm64|aarch64|armv7l)[-_.]").expect("arm marker pattern is valid")
});

/// Pick the asset to download from `release`.
///
/// The release tag must match the reference's tag pattern. Embedded
/// references consider only the first `.zsync` asset matching the filename
/// glob; otherwise every match is a candidate. Several candidates are
/// narrowed by host architecture. The chosen name, minus `.zsync`, must then
/// name an asset of the release exactly.
#[must_use]
pub fn select_target_asset(
    release: &GitHubRelease,
    reference: &GithubReleaseRef,
    embedded: bool,
    host_arch: &str,
) -> Option<ReleaseAsset> {
    let tag_glob = compile(&reference.tag_pattern)?;
    let file_glob = compile(&reference.filename_pattern)?;

    if !tag_glob.is_match(&release.tag_name) {
        debug!(
            "Release {} does not match tag pattern {}",
            release.tag_name, reference.tag_pattern
        );
        return None;
    }

    let candidates = candidate_assets(&release.assets, &file_glob, embedded);
    let chosen = match candidates.as_slice() {
        [] => {
            warn!("No asset of {} matches {}", release.tag_name, reference.filename_pattern);
            return None;
        }
        [only] => *only,
        _ => {
            info!(
                "Found {} candidates for {}, picking by architecture",
                candidates.len(),
                reference.filename_pattern
            );
            pick_for_arch(&candidates, host_arch)?
        }
    };

    let target_name = strip_zsync_suffix(&chosen.name);
    let target = release
        .assets
        .iter()
        .find(|asset| asset.name == target_name)
        .cloned();
    if target.is_none() {
        warn!("Release {} has no asset named {target_name}", release.tag_name);
    }
    target
}

fn compile(pattern: &str) -> Option<GlobMatcher> {
    GlobMatcher::new(pattern)
        .inspect_err(|err| error!("{err}"))
        .ok()
}

fn candidate_assets<'a>(
    assets: &'a [ReleaseAsset],
    glob: &GlobMatcher,
    embedded: bool,
) -> Vec<&'a ReleaseAsset> {
    let mut matching = assets.iter().filter(|asset| glob.is_match(&asset.name));
    if embedded {
        matching
            .find(|asset| asset.name.ends_with(ZSYNC_SUFFIX))
            .into_iter()
            .collect()
    } else {
        matching.collect()
    }
}

// Only x86_64 hosts are disambiguated.
fn pick_for_arch<'a>(candidates: &[&'a ReleaseAsset], host_arch: &str) -> Option<&'a ReleaseAsset> {
    if host_arch != X86_64 {
        warn!("Cannot choose between candidates on {host_arch} host");
        return None;
    }

    candidates
        .iter()
        .copied()
        .find(|asset| X86_MARKER.is_match(&asset.name) || !ARM_MARKER.is_match(&asset.name))
}
