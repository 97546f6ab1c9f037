use bazaar_types::models::LOCKED_SENTINEL;

use crate::error::{ApiError, ApiResult};

/// Where an identity came from. Session identities remember the hashed
/// cookie token so sign-out can revoke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    BearerToken,
    Session { token_hash: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    /// Snapshot: for bearer tokens this is the value at issuance.
    pub is_subscribed: bool,
    pub source: IdentitySource,
}

/// The caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl Viewer {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(identity) => Some(identity),
        }
    }

    /// The identity, or `Unauthorized` for anonymous callers.
    pub fn require(&self) -> ApiResult<&Identity> {
        self.identity().ok_or(ApiError::Unauthorized)
    }
}

/// Whether `viewer` may read the contact details of user `target_id`:
/// the owner always can, other authenticated users only while subscribed.
pub fn can_view_contact(viewer: &Viewer, target_id: &str) -> bool {
    match viewer {
        Viewer::Anonymous => false,
        Viewer::Authenticated(identity) => identity.id == target_id || identity.is_subscribed,
    }
}

pub fn redact_contact(viewer: &Viewer, target_id: &str, value: Option<&str>) -> Option<String> {
    if can_view_contact(viewer, target_id) {
        value.map(str::to_owned)
    } else {
        Some(LOCKED_SENTINEL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(id: &str, is_subscribed: bool) -> Viewer {
        Viewer::Authenticated(Identity {
            id: id.into(),
            email: format!("{id}@x.com"),
            is_subscribed,
            source: IdentitySource::BearerToken,
        })
    }

    #[test]
    fn contact_visibility_truth_table() {
        let cases = [
            (Viewer::Anonymous, "t", false),
            (viewer("t", false), "t", true),
            (viewer("t", true), "t", true),
            (viewer("other", false), "t", false),
            (viewer("other", true), "t", true),
        ];

        for (v, target, expected) in cases {
            assert_eq!(can_view_contact(&v, target), expected, "{v:?} -> {target}");
        }
    }

    #[test]
    fn hidden_contact_returns_sentinel() {
        let value = redact_contact(&viewer("other", false), "t", Some("+15550100"));
        assert_eq!(value.as_deref(), Some(LOCKED_SENTINEL));
    }

    #[test]
    fn anonymous_sees_sentinel_even_without_a_number() {
        assert_eq!(redact_contact(&Viewer::Anonymous, "t", None).as_deref(), Some(LOCKED_SENTINEL));
    }

    #[test]
    fn visible_contact_passes_through() {
        let v = viewer("t", false);
        assert_eq!(redact_contact(&v, "t", Some("+15550100")).as_deref(), Some("+15550100"));
        assert_eq!(redact_contact(&v, "t", None), None);
    }

    #[test]
    fn anonymous_viewer_is_unauthorized() {
        assert!(matches!(Viewer::Anonymous.require(), Err(ApiError::Unauthorized)));
    }
}
