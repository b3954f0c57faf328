/// Candidate images for the displayed avatar, in priority order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvatarCandidates<'a> {
    /// Image the user uploaded explicitly
    pub uploaded_photo_url: Option<&'a str>,
    /// Image supplied by the identity provider
    pub identity_provider_avatar_url: Option<&'a str>,
}

impl<'a> AvatarCandidates<'a> {
    pub fn new(uploaded: Option<&'a str>, provider: Option<&'a str>) -> Self {
        Self {
            uploaded_photo_url: uploaded,
            identity_provider_avatar_url: provider,
        }
    }
}

/// Pick the avatar to display: an explicit upload always wins over the
/// identity-provider image.
pub fn resolve_avatar(candidates: AvatarCandidates<'_>) -> Option<String> {
    [
        candidates.uploaded_photo_url,
        candidates.identity_provider_avatar_url,
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|url| !url.is_empty())
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_wins() {
        let resolved = resolve_avatar(AvatarCandidates::new(Some("u1"), Some("g1")));
        assert_eq!(resolved.as_deref(), Some("u1"));
    }

    #[test]
    fn test_falls_back_to_provider() {
        assert_eq!(
            resolve_avatar(AvatarCandidates::new(None, Some("g1"))).as_deref(),
            Some("g1")
        );
        assert_eq!(
            resolve_avatar(AvatarCandidates::new(Some(""), Some("g1"))).as_deref(),
            Some("g1")
        );
    }

    #[test]
    fn test_absent_when_nothing_usable() {
        assert_eq!(resolve_avatar(AvatarCandidates::default()), None);
        assert_eq!(
            resolve_avatar(AvatarCandidates::new(Some("  "), Some(""))),
            None
        );
    }
}
