//! The API-key authentication wrapper: extracts `key` from the query
//! string, validates it through the key store, and attaches the resolved
//! org to the request. An `axum::extract::FromRequestParts` extractor.
//!
//! Two spellings of this parameter (`api_key` vs `key`) appear across
//! revisions of this system; `key` is the one the OpenAPI document uses,
//! so that's what this extractor honors.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use crate::error::AppError;

use super::state::AppState;

/// The organization resolved from a valid API key, attached to the request
/// by this extractor so downstream handlers can read it back without a
/// mutable global.
pub struct AuthenticatedOrg(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedOrg {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadParameter(format!("invalid query string: {e}")))?;

        let key = params.get("key").ok_or(AppError::AuthMissingKey)?;
        let org = state
            .key_store
            .validate_key(key)
            .await
            .map_err(|_| AppError::AuthInvalidKey)?;

        Ok(AuthenticatedOrg(org))
    }
}
