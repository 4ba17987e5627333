//! Caller identity
//!
//! Resolved in order: HTTP basic-auth username, `X-Forwarded-User`,
//! `X-Remote-User`, then [`DEFAULT_IDENTITY`]. Nothing is verified; the
//! identity only drives ownership tagging and list visibility.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::Engine;
use std::convert::Infallible;
use vcluster_types::DEFAULT_IDENTITY;

pub const FORWARDED_USER: &str = "x-forwarded-user";
pub const REMOTE_USER: &str = "x-remote-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let name = basic_auth_user(headers)
            .or_else(|| header_value(headers, FORWARDED_USER))
            .or_else(|| header_value(headers, REMOTE_USER))
            .unwrap_or_else(|| DEFAULT_IDENTITY.to_string());
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Username of a `Basic` authorization header, if non-empty.
fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(credentials.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let user = decoded.split_once(':').map_or(decoded.as_str(), |(user, _)| user);
    (!user.is_empty()).then(|| user.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
