//! The HTTP-facing error envelope and the `AppError` kind table: an outer
//! enum that classifies for the HTTP layer, wrapping typed errors from each
//! subsystem.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::asn::AsnError;
use crate::dns::DnsError;
use crate::geoip::GeoError;
use crate::http::Pretty;
use crate::iata::IataError;
use crate::store::{KeyStoreError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadParameter(String),
    #[error("missing API key")]
    AuthMissingKey,
    #[error("invalid API key")]
    AuthInvalidKey,
    #[error("invalid client version: {0}")]
    VersionInvalid(String),
    #[error("client version {0} is below the minimum supported version")]
    VersionOutdated(String),
    #[error("IATA lookup failed: {0}")]
    IataFind(#[from] IataError),
    #[error("GeoIP lookup failed: {0}")]
    MaxmindCity(#[from] GeoError),
    #[error("ASN lookup failed: {0}")]
    AsnLookup(#[from] AsnError),
    #[error("DNS registration failed: {0}")]
    DnsRegister(DnsError),
    #[error("DNS delete failed: {0}")]
    DnsDelete(DnsError),
    #[error("failed to load or create service-account key: {0}")]
    LoadServiceAccountKey(KeyStoreError),
    #[error("liveness tracker failure: {0}")]
    TrackerGc(#[from] StoreError),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::BadParameter(_) => "bad-parameter",
            AppError::AuthMissingKey => "auth-missing-key",
            AppError::AuthInvalidKey => "auth-invalid-key",
            AppError::VersionInvalid(_) => "version-invalid",
            AppError::VersionOutdated(_) => "version-outdated",
            AppError::IataFind(_) => "iata-find",
            AppError::MaxmindCity(_) => "maxmind-city",
            // Same data-flow step as MaxmindCity (geo/network annotation of
            // the caller's address): classified under the same kind.
            AppError::AsnLookup(_) => "maxmind-city",
            AppError::DnsRegister(_) => "dns-register",
            AppError::DnsDelete(_) => "dns-delete",
            AppError::LoadServiceAccountKey(_) => "load-serviceaccount-key",
            AppError::TrackerGc(_) => "tracker-gc",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadParameter(_) => StatusCode::BAD_REQUEST,
            AppError::AuthMissingKey | AppError::AuthInvalidKey => StatusCode::UNAUTHORIZED,
            AppError::VersionInvalid(_) => StatusCode::BAD_REQUEST,
            AppError::VersionOutdated(_) => StatusCode::FORBIDDEN,
            AppError::IataFind(_)
            | AppError::MaxmindCity(_)
            | AppError::AsnLookup(_)
            | AppError::DnsRegister(_)
            | AppError::DnsDelete(_)
            | AppError::LoadServiceAccountKey(_)
            | AppError::TrackerGc(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: &'static str,
    title: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error serving request: {}", self);
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                title: status.canonical_reason().unwrap_or("error").to_string(),
                status: status.as_u16(),
                detail: Some(self.to_string()),
            },
        };

        (status, Pretty(body)).into_response()
    }
}
