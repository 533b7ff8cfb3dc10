// Linkauth — Basic-Auth caller verification
//
// Privileged routes take a `SystemCaller`, which only extracts when the
// request carries Basic credentials of a system account. The decoded secret
// is zeroized as soon as the check is done.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use super::error::ApiError;
use super::routes::GatewayState;

/// Credentials decoded from an `Authorization: Basic` header.
pub struct BasicCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Decode a Basic header value. The password is everything after the
/// first `:`, so it may itself contain colons.
pub fn parse_basic(value: &str) -> Option<BasicCredentials> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).ok()?);
    let text = std::str::from_utf8(&decoded).ok()?;
    let (username, password) = text.split_once(':')?;

    Some(BasicCredentials {
        username: username.to_string(),
        password: Zeroizing::new(password.to_string()),
    })
}

/// A caller proven to hold a system account.
#[derive(Debug, Clone)]
pub struct SystemCaller {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<GatewayState> for SystemCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &GatewayState) -> Result<Self, Self::Rejection> {
        let unauthorized = || ApiError::Unauthorized {
            realm: state.realm.to_string(),
        };

        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_basic)
            .ok_or_else(unauthorized)?;

        if !state
            .manager
            .authenticate(&credentials.username, &credentials.password, true)
            .await?
        {
            tracing::warn!(caller = %credentials.username, "Rejected privileged request");
            return Err(unauthorized());
        }

        Ok(SystemCaller {
            username: credentials.username,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
