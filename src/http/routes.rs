//! Router construction: one `Router::new()` with routes registered, then
//! CORS/tracing layered on top.

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

async fn livez() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(state): State<AppState>) -> StatusCode {
    if state.iata.is_loaded() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Builds the full router: unauthenticated lookup/list/health endpoints and
/// authenticated register/delete endpoints. `list`'s CORS is always wide
/// open — there is no per-deployment origin to restrict it to.
pub fn build_router(state: AppState) -> Router {
    let list_route = Router::new()
        .route("/v0/node/list", get(handlers::list))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(vec![Method::GET]));

    Router::new()
        .route("/v0/lookup", get(handlers::lookup))
        .route("/v0/node/register", post(handlers::register))
        .route("/v0/node/delete", post(handlers::delete))
        .merge(list_route)
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
