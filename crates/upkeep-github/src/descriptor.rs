use thiserror::Error;
use upkeep_source::GithubReleaseRef;

pub const GH_RELEASES_TAG: &str = "gh-releases-zsync";

const LATEST: &str = "latest";
const ANY_TAG: &str = "*";
const GITHUB_HOST: &str = "github.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("expected 5 '|'-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("descriptor must start with {GH_RELEASES_TAG}, found {found:?}")]
    Tag { found: String },

    #[error("empty {field} field")]
    EmptyField { field: &'static str },

    #[error("invalid URL {url}: {details}")]
    Url { url: String, details: String },

    #[error("not a {GITHUB_HOST} URL: {url}")]
    Host { url: String },

    #[error("not a release asset URL: {url}")]
    Path { url: String },
}

/// Parse either `gh-releases-zsync|owner|repo|release|filename-glob` or a
/// `https://github.com/<owner>/<repo>/releases/download/<tag>/<file>` URL.
///
/// The URL form always targets the latest release and keeps the tag as the
/// tag pattern; the pipe form accepts any tag.
///
/// # Errors
/// Returns an error describing which part of the grammar was violated.
pub fn parse_release_ref(input: &str) -> Result<GithubReleaseRef, DescriptorError> {
    let input = input.trim();
    if input.starts_with("https://") {
        parse_release_url(input)
    } else {
        parse_pipe_form(input)
    }
}

fn parse_pipe_form(input: &str) -> Result<GithubReleaseRef, DescriptorError> {
    let fields: Vec<&str> = input.split('|').collect();
    let [tag, owner, repo, release, filename] = fields.as_slice() else {
        return Err(DescriptorError::FieldCount {
            found: fields.len(),
        });
    };

    if *tag != GH_RELEASES_TAG {
        return Err(DescriptorError::Tag {
            found: (*tag).to_string(),
        });
    }

    for (field, value) in [
        ("owner", owner),
        ("repo", repo),
        ("release", release),
        ("filename", filename),
    ] {
        if value.is_empty() {
            return Err(DescriptorError::EmptyField { field });
        }
    }

    Ok(GithubReleaseRef {
        owner: (*owner).to_string(),
        repo: (*repo).to_string(),
        release_selector: (*release).to_string(),
        filename_pattern: (*filename).to_string(),
        tag_pattern: ANY_TAG.to_string(),
    })
}

fn parse_release_url(input: &str) -> Result<GithubReleaseRef, DescriptorError> {
    let url = reqwest::Url::parse(input).map_err(|error| DescriptorError::Url {
        url: input.to_string(),
        details: error.to_string(),
    })?;

    if url.host_str() != Some(GITHUB_HOST) {
        return Err(DescriptorError::Host {
            url: input.to_string(),
        });
    }

    let segments: Vec<&str> = url.path().split('/').collect();
    match segments.as_slice() {
        ["", owner, repo, "releases", "download", tag, filename]
            if [owner, repo, tag, filename].iter().all(|s| !s.is_empty()) =>
        {
            Ok(GithubReleaseRef {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
                release_selector: LATEST.to_string(),
                filename_pattern: (*filename).to_string(),
                tag_pattern: (*tag).to_string(),
            })
        }
        _ => Err(DescriptorError::Path {
            url: input.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_form_parses_all_fields() {
        let reference =
            parse_release_ref("gh-releases-zsync|probono|AppImages|latest|Subsurface-*x86_64.AppImage.zsync")
                .expect("pipe descriptor should parse");

        assert_eq!(reference.owner, "probono");
        assert_eq!(reference.repo, "AppImages");
        assert_eq!(reference.release_selector, "latest");
        assert_eq!(reference.filename_pattern, "Subsurface-*x86_64.AppImage.zsync");
        assert_eq!(reference.tag_pattern, "*");
    }

    #[test]
    fn pipe_form_requires_exactly_five_fields() {
        assert_eq!(
            parse_release_ref("gh-releases-zsync|a|b|latest"),
            Err(DescriptorError::FieldCount { found: 4 })
        );
        assert_eq!(
            parse_release_ref("gh-releases-zsync|a|b|latest|c|d"),
            Err(DescriptorError::FieldCount { found: 6 })
        );
        assert_eq!(
            parse_release_ref("https-ish text"),
            Err(DescriptorError::FieldCount { found: 1 })
        );
    }

    #[test]
    fn pipe_form_requires_tag_and_non_empty_fields() {
        assert!(matches!(
            parse_release_ref("bintray-zsync|a|b|latest|c"),
            Err(DescriptorError::Tag { .. })
        ));
        assert_eq!(
            parse_release_ref("gh-releases-zsync|a||latest|c"),
            Err(DescriptorError::EmptyField { field: "repo" })
        );
    }

    #[test]
    fn release_url_decomposes_into_reference() {
        let reference = parse_release_ref(
            "https://github.com/acme/widget/releases/download/v1.2.0/widget-1.2.0.AppImage",
        )
        .expect("release URL should parse");

        assert_eq!(reference.owner, "acme");
        assert_eq!(reference.repo, "widget");
        assert_eq!(reference.release_selector, "latest");
        assert_eq!(reference.filename_pattern, "widget-1.2.0.AppImage");
        assert_eq!(reference.tag_pattern, "v1.2.0");
        assert_eq!(
            reference.canonical_url(),
            "https://github.com/acme/widget/releases/download/v1.2.0/widget-1.2.0.AppImage"
        );
    }

    #[test]
    fn release_url_with_other_shape_is_rejected() {
        for url in [
            "https://github.com/acme/widget/releases/download/v1.2.0",
            "https://github.com/acme/widget/releases/download/v1/extra/file.AppImage",
            "https://github.com/acme/widget/archive/download/v1.2.0/file.AppImage",
            "https://github.com/acme/widget/releases/latest/v1.2.0/file.AppImage",
        ] {
            assert!(
                matches!(parse_release_ref(url), Err(DescriptorError::Path { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn release_url_on_other_host_is_rejected() {
        assert!(matches!(
            parse_release_ref("https://gitlab.com/acme/widget/releases/download/v1/file.AppImage"),
            Err(DescriptorError::Host { .. })
        ));
    }
}
