//! `POST /v0/node/delete` (authenticated): parses the hostname to derive its
//! org, deletes A/AAAA via the DNS manager, and deletes the liveness entry.

use std::collections::HashMap;

use axum::extract::{Query, State};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::http::authority::AuthenticatedOrg;
use crate::http::state::AppState;
use crate::http::Pretty;
use crate::naming::{org_zone, parse_hostname};

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedOrg(_caller_org): AuthenticatedOrg,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Pretty<DeleteResponse>, AppError> {
    let hostname = query
        .get("hostname")
        .ok_or_else(|| AppError::BadParameter("missing hostname".to_string()))?;

    let parts = parse_hostname(hostname)
        .map_err(|e| AppError::BadParameter(format!("hostname {hostname:?} could not be parsed: {e}")))?;

    let zone = org_zone(&parts.org, &state.project);
    let manager = crate::dns::DnsManager::new(state.project.clone(), zone, state.dns_provider.clone());
    let fqdn = format!("{hostname}.");
    manager.delete(&fqdn).await.map_err(AppError::DnsDelete)?;

    state.tracker.delete(hostname).await.map_err(AppError::TrackerGc)?;

    Ok(Pretty(DeleteResponse { deleted: hostname.clone() }))
}
