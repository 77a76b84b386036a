//! Credential extraction for the sync trigger

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Deserialize;
use std::convert::Infallible;

/// Secret presented by the caller, from `Authorization: Bearer <secret>` or
/// the `secret` query parameter. The header wins when both are present.
/// Checking it is left to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCredential(pub Option<String>);

#[derive(Debug, Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for SyncCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            return Ok(Self(Some(token)));
        }

        let secret = Query::<SecretQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.secret)
            .filter(|s| !s.is_empty());
        Ok(Self(secret))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
