use std::collections::HashSet;

use crate::error::{ApiError, ApiResult};
use crate::viewer::{Identity, Viewer};

/// Decides who may run admin-only operations.
pub trait AdminPolicy: Send + Sync {
    fn is_admin(&self, identity: &Identity) -> bool;
}

/// Admins are the identities whose email is on a fixed list
/// (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct EmailAllowList {
    emails: HashSet<String>,
}

impl EmailAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// Comma separated list, as found in `BAZAAR_ADMIN_EMAILS`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl AdminPolicy for EmailAllowList {
    fn is_admin(&self, identity: &Identity) -> bool {
        self.emails.contains(&identity.email.to_lowercase())
    }
}

pub fn require_admin<'a>(policy: &dyn AdminPolicy, viewer: &'a Viewer) -> ApiResult<&'a Identity> {
    let identity = viewer.require()?;
    if policy.is_admin(identity) {
        Ok(identity)
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::IdentitySource;

    fn viewer(email: &str) -> Viewer {
        Viewer::Authenticated(Identity {
            id: "u1".into(),
            email: email.into(),
            is_subscribed: false,
            source: IdentitySource::BearerToken,
        })
    }

    #[test]
    fn parses_comma_separated_list() {
        let list = EmailAllowList::parse(" Admin@X.com, ,ops@x.com ");
        assert_eq!(list.len(), 2);
        assert!(list.is_admin(viewer("admin@x.com").identity().unwrap()));
        assert!(list.is_admin(viewer("OPS@x.com").identity().unwrap()));
    }

    #[test]
    fn non_admin_is_forbidden_and_anonymous_unauthorized() {
        let list = EmailAllowList::parse("admin@x.com");
        assert!(require_admin(&list, &viewer("admin@x.com")).is_ok());
        assert!(matches!(require_admin(&list, &viewer("user@x.com")), Err(ApiError::Forbidden)));
        assert!(matches!(require_admin(&list, &Viewer::Anonymous), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn empty_list_has_no_admins() {
        let list = EmailAllowList::parse("");
        assert!(list.is_empty());
        assert!(matches!(require_admin(&list, &viewer("admin@x.com")), Err(ApiError::Forbidden)));
    }
}
