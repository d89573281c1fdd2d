//! Identity extraction from request headers.
//!
//! Authentication is handled upstream. A request is identified when it
//! carries a non-blank `x-identity-id`; `x-identity-name` supplies the
//! optional display name used for attribution.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pikfic_core::identity::{Identity, OwnerId};

/// Header carrying the owner key.
pub const IDENTITY_ID_HEADER: &str = "x-identity-id";

/// Header carrying the display name.
pub const IDENTITY_NAME_HEADER: &str = "x-identity-name";

/// The current identity, or `None` for an anonymous request.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<Identity>);

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = header_value(parts, IDENTITY_ID_HEADER).map(|owner| {
            Identity::new(OwnerId::new(owner), header_value(parts, IDENTITY_NAME_HEADER))
        });
        Ok(Self(identity))
    }
}
