//! `GET /v0/node/list` (unauthenticated): the current fleet in one of
//! several consumer-specific formats.

use std::collections::{HashMap, HashSet};

use axum::extract::{Query, State};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::http::state::AppState;
use crate::http::Pretty;
use crate::naming::parse_hostname;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: TargetLabels,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TargetLabels {
    pub machine: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub deployment: String,
    pub managed: String,
    pub org: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Targets(Vec<TargetGroup>),
    Hostnames(Vec<String>),
    Sites(Vec<String>),
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Pretty<ListResponse>, AppError> {
    let (hostnames, ports) = state.tracker.list().await.map_err(AppError::TrackerGc)?;
    let org_filter = query.get("org");
    let format = query.get("format").map(String::as_str).unwrap_or("servers");

    let filtered: Vec<(String, Vec<String>)> = hostnames
        .into_iter()
        .zip(ports)
        .filter(|(hostname, _)| match (org_filter, parse_hostname(hostname)) {
            (Some(org), Ok(parts)) => &parts.org == org,
            (Some(_), Err(_)) => false,
            (None, _) => true,
        })
        .collect();

    let response = match format {
        "prometheus" | "blackbox" => ListResponse::Targets(build_target_groups(&filtered, true)),
        "script-exporter" => ListResponse::Targets(build_target_groups(&filtered, false)),
        "sites" => {
            let mut seen = HashSet::new();
            let mut sites = Vec::new();
            for (hostname, _) in &filtered {
                if let Ok(parts) = parse_hostname(hostname) {
                    if seen.insert(parts.site.clone()) {
                        sites.push(parts.site);
                    }
                }
            }
            ListResponse::Sites(sites)
        }
        _ => ListResponse::Hostnames(filtered.into_iter().map(|(h, _)| h).collect()),
    };

    Ok(Pretty(response))
}

fn build_target_groups(filtered: &[(String, Vec<String>)], with_ports: bool) -> Vec<TargetGroup> {
    filtered
        .iter()
        .filter_map(|(hostname, ports)| {
            let parts = parse_hostname(hostname).ok()?;
            let targets = if with_ports && !ports.is_empty() {
                ports.iter().map(|port| format!("{hostname}:{port}")).collect()
            } else {
                vec![hostname.clone()]
            };
            Some(TargetGroup {
                targets,
                labels: TargetLabels {
                    machine: parts.machine,
                    node_type: "virtual".to_string(),
                    deployment: "byos".to_string(),
                    managed: "none".to_string(),
                    org: parts.org,
                    service: Some(parts.service),
                },
            })
        })
        .collect()
}
