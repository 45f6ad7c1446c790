//! Simulated HTTP Basic (RFC 7617) and Bearer (RFC 6750) authentication.
//!
//! Nothing is looked up: Basic credentials are compared with the ones in the
//! request path, and any syntactically valid Bearer token is accepted.

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;

pub const BASIC_CHALLENGE: &str = "Basic realm=\"blah\"";
pub const BEARER_CHALLENGE: &str = "Bearer";

/// Outcome of an authentication check, echoed back as the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuthResult {
    Basic {
        authorized: bool,
        username: Option<String>,
    },
    Bearer {
        authorized: bool,
        token: Option<String>,
    },
}

impl AuthResult {
    pub fn is_authorized(&self) -> bool {
        match self {
            AuthResult::Basic { authorized, .. } | AuthResult::Bearer { authorized, .. } => {
                *authorized
            }
        }
    }
}

/// Checks `Authorization: Basic <base64(user:pass)>` against the expected pair
pub fn check_basic(header: Option<&str>, user: &str, pass: &str) -> AuthResult {
    match header.and_then(basic_credentials) {
        Some((u, p)) if u == user && p == pass => AuthResult::Basic {
            authorized: true,
            username: Some(u),
        },
        _ => AuthResult::Basic {
            authorized: false,
            username: None,
        },
    }
}

/// Checks `Authorization: Bearer <token>`, accepting any token
pub fn check_bearer(header: Option<&str>) -> AuthResult {
    match header.and_then(|h| scheme_and_token(h, "Bearer")) {
        Some(token) => AuthResult::Bearer {
            authorized: true,
            token: Some(token.to_string()),
        },
        None => AuthResult::Bearer {
            authorized: false,
            token: None,
        },
    }
}

/// Exactly two space-separated tokens, the first being `scheme` (case-sensitive)
fn scheme_and_token<'a>(header: &'a str, scheme: &str) -> Option<&'a str> {
    let mut parts = header.split(' ');
    let (found, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || found != scheme {
        return None;
    }
    Some(token)
}

fn basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = scheme_and_token(header, "Basic")?;
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let mut parts = decoded.split(':');
    let (user, pass) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some((user.to_string(), pass.to_string()))
}
