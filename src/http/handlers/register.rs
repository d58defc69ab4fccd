//! `POST /v0/node/register` (authenticated): validates parameters, resolves
//! geo/ASN/IATA, synthesizes the response, reconciles DNS, and records
//! liveness.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use tracing::instrument;

use crate::error::AppError;
use crate::http::authority::AuthenticatedOrg;
use crate::http::state::AppState;
use crate::http::Pretty;
use crate::http::validation::{
    parse_optional_ipv6, parse_version, resolve_ipv4, validate_iata_code_shape, validate_name,
    validate_node_type, validate_uplink,
};
use crate::naming;
use crate::registration::{synthesize, Registration, SynthesisInput};

#[instrument(skip(state, headers))]
pub async fn register(
    State(state): State<AppState>,
    AuthenticatedOrg(org): AuthenticatedOrg,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Pretty<Registration>, AppError> {
    let version = parse_version(query.get("version").map(String::as_str))?;
    if version < state.min_version {
        return Err(AppError::VersionOutdated(version.to_string()));
    }

    let service = query.get("service").ok_or_else(|| AppError::BadParameter("missing service".to_string()))?;
    validate_name("service", service)?;

    let node_type = query.get("type").ok_or_else(|| AppError::BadParameter("missing type".to_string()))?;
    validate_node_type(node_type)?;

    let uplink = query.get("uplink").ok_or_else(|| AppError::BadParameter("missing uplink".to_string()))?;
    validate_uplink(uplink)?;

    let iata_code = query.get("iata").ok_or_else(|| AppError::BadParameter("missing iata".to_string()))?;
    validate_iata_code_shape(iata_code)?;
    let iata_row = state.iata.find(iata_code).map_err(AppError::IataFind)?;

    let ipv4 = resolve_ipv4(query.get("ipv4").map(String::as_str), &headers, Some(remote))?;
    let ipv6 = parse_optional_ipv6(query.get("ipv6").map(String::as_str))?;

    let geo = state.geoip.city(ipv4.into()).map_err(AppError::MaxmindCity)?;
    let network = state.asn.annotate(ipv4).map_err(AppError::AsnLookup)?;

    let requested_probability: f64 = query
        .get("probability")
        .map(|raw| raw.parse::<f64>())
        .transpose()
        .map_err(|_| AppError::BadParameter("probability must be a number".to_string()))?
        .unwrap_or(1.0);

    // Probability multiplication proceeds even when the organization lookup
    // fails: the effective multiplier is 1.0 in that case.
    let multiplier = state
        .key_store
        .get_organization(&org)
        .await
        .map(|o| o.probability_multiplier)
        .unwrap_or(1.0);
    let probability = requested_probability * multiplier;

    let mut registration = synthesize(SynthesisInput {
        service,
        org: &org,
        project: &state.project,
        ipv4,
        ipv6,
        iata_row: &iata_row,
        geo: &geo,
        network: &network,
        probability,
        node_type,
        uplink,
    });

    registration.credentials = state
        .credential_store
        .load_or_create_key(&org)
        .await
        .map_err(AppError::LoadServiceAccountKey)?;

    let zone = naming::org_zone(&org, &state.project);
    let manager = crate::dns::DnsManager::new(state.project.clone(), zone, state.dns_provider.clone());
    let fqdn = format!("{}.", registration.hostname);
    manager
        .register(&fqdn, ipv4, ipv6)
        .await
        .map_err(AppError::DnsRegister)?;

    state
        .tracker
        .update(&registration.hostname, vec![])
        .await
        .map_err(AppError::TrackerGc)?;

    Ok(Pretty(registration))
}
