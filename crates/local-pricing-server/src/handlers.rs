//! HTTP Handlers
//!
//! One endpoint per checkout hook. Sessions are keyed by the
//! `pmpro_local_session` cookie or the `x-checkout-session` header.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{header, Extensions, HeaderMap, HeaderValue, StatusCode},
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};

use local_pricing::{
    discount::RegistrationCheck,
    hooks::{PolicyContent, ScriptAsset},
    CheckoutSession, CodeCheck, CostTextContext, LevelPriceTerms, LocalPricingHooks, SessionId,
};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "pmpro_local_session";
pub const SESSION_HEADER: &str = "x-checkout-session";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub geoip_provider: &'static str,
    pub app_id_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Default, Deserialize)]
pub struct PreheaderRequest {
    /// Visitor IP as seen by the host
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreheaderResponse {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostTextRequest {
    pub cost: String,
    pub level: LevelPriceTerms,
    #[serde(default)]
    pub context: CostTextContext,
}

#[derive(Debug, Serialize)]
pub struct CostTextResponse {
    pub cost: String,
}

fn default_okay() -> CodeCheck {
    CodeCheck::okay()
}

#[derive(Debug, Deserialize)]
pub struct CheckDiscountRequest {
    #[serde(default = "default_okay")]
    pub okay: CodeCheck,
    pub code: String,
    #[serde(default)]
    pub level_id: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CheckDiscountResponse {
    pub okay: CodeCheck,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default = "default_true")]
    pub okay: bool,
    #[serde(default)]
    pub level_id: Option<u32>,
    #[serde(default)]
    pub discount_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueQuery {
    #[serde(default)]
    pub is_checkout: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RowMetaBody {
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct LocalCostQuery {
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub discount_code: Option<String>,
}

// ============================================================================
// Session plumbing
// ============================================================================

fn session_id_from(headers: &HeaderMap) -> Option<SessionId> {
    if let Some(id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        let id = id.trim();
        if !id.is_empty() {
            return Some(SessionId::from_string(id));
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| SessionId::from_string(value))
}

fn store_error(e: &local_pricing::PricingError) -> ApiError {
    tracing::error!("Session store error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.user_message().into(),
            code: "SESSION_ERROR".into(),
        }),
    )
}

/// Load the caller's session, or start one when none is presented
fn open_session(state: &AppState, headers: &HeaderMap) -> Result<(CheckoutSession, HeaderMap), ApiError> {
    let (session, is_new) = match session_id_from(headers) {
        Some(id) => (state.sessions.load_or_create(&id).map_err(|e| store_error(&e))?, false),
        None => (CheckoutSession::new(), true),
    };

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(session.id.as_str()) {
        response_headers.insert(SESSION_HEADER, value);
    }
    if is_new {
        let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", session.id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response_headers.insert(header::SET_COOKIE, value);
        }
    }

    Ok((session, response_headers))
}

fn save_session(state: &AppState, session: &mut CheckoutSession) -> Result<(), ApiError> {
    session.touch();
    state.sessions.save(session).map_err(|e| store_error(&e))
}

/// Empty bodies fall back to defaults
fn parse_optional_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid request body: {e}"),
                code: "INVALID_BODY".into(),
            }),
        )
    })
}

/// Visitor IP: explicit value, then the first forwarded hop, then the peer
fn client_ip(explicit: Option<&str>, headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(ip) = explicit.map(str::trim).filter(|ip| !ip.is_empty()) {
        return ip.to_string();
    }

    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return forwarded.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        geoip_provider: state.hooks.geoip_provider(),
        app_id_configured: state.app_id_configured,
    })
}

/// Resolve the visitor's country before checkout renders
pub async fn checkout_preheader(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Result<(HeaderMap, Json<PreheaderResponse>), ApiError> {
    let request = parse_optional_body::<PreheaderRequest>(&body)?;
    let (mut session, response_headers) = open_session(&state, &headers)?;

    let ip = client_ip(request.ip.as_deref(), &headers, &extensions);
    let country = state.hooks.checkout_preheader(&mut session, &ip).await;
    save_session(&state, &mut session)?;

    Ok((response_headers, Json(PreheaderResponse { country })))
}

/// Level cost text filter
pub async fn level_cost_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CostTextRequest>,
) -> Result<(HeaderMap, Json<CostTextResponse>), ApiError> {
    let (session, response_headers) = open_session(&state, &headers)?;

    let cost = state
        .hooks
        .level_cost_text(&session, &payload.cost, &payload.level, &payload.context)
        .await;

    Ok((response_headers, Json(CostTextResponse { cost })))
}

/// Discount code check when a code is entered
pub async fn check_discount_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckDiscountRequest>,
) -> Result<(HeaderMap, Json<CheckDiscountResponse>), ApiError> {
    let (session, response_headers) = open_session(&state, &headers)?;

    let okay = state.hooks.check_discount_code(payload.okay, &session, &payload.code);
    if !okay.is_okay() {
        tracing::info!(
            "Discount code {} refused for level {:?}",
            payload.code.to_uppercase(),
            payload.level_id
        );
    }

    Ok((response_headers, Json(CheckDiscountResponse { okay })))
}

/// Registration check on checkout submit
pub async fn registration_checks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegistrationRequest>,
) -> Result<(HeaderMap, Json<RegistrationCheck>), ApiError> {
    let (session, response_headers) = open_session(&state, &headers)?;

    let checkout_level = state
        .hooks
        .host()
        .level_at_checkout(payload.level_id, payload.discount_code.as_deref());

    let result = state
        .hooks
        .registration_checks(payload.okay, &session, checkout_level.as_ref());

    Ok((response_headers, Json(result)))
}

/// Drop the visitor's session once checkout completes
///
/// Unknown ids are ignored; nothing is created here.
pub async fn after_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, StatusCode), ApiError> {
    let mut response_headers = HeaderMap::new();
    let Some(id) = session_id_from(&headers) else {
        return Ok((response_headers, StatusCode::NO_CONTENT));
    };

    if let Some(mut session) = state.sessions.load(&id).map_err(|e| store_error(&e))? {
        state.hooks.after_checkout(&mut session);
        state.sessions.delete(&session.id).map_err(|e| store_error(&e))?;
        tracing::debug!("Checkout session {} closed", session.id);
    }

    let expired = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response_headers.insert(header::SET_COOKIE, value);
    }

    Ok((response_headers, StatusCode::NO_CONTENT))
}

/// Checkout script descriptor
pub async fn enqueue_scripts(
    State(state): State<AppState>,
    Query(query): Query<EnqueueQuery>,
) -> Json<Option<ScriptAsset>> {
    Json(state.hooks.enqueue_scripts(query.is_checkout, &state.ajax_url))
}

/// Privacy policy content
pub async fn privacy_policy() -> Json<PolicyContent> {
    Json(LocalPricingHooks::privacy_policy_content())
}

/// Plugin list row links
pub async fn plugin_row_meta(Json(payload): Json<RowMetaBody>) -> Json<RowMetaBody> {
    let links = LocalPricingHooks::plugin_row_meta(payload.links, &payload.file);
    Json(RowMetaBody {
        links,
        file: payload.file,
    })
}

/// AJAX: localized price fragment for the checkout level (no auth)
pub async fn local_cost_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LocalCostQuery>,
) -> Result<(HeaderMap, Html<String>), ApiError> {
    let (session, response_headers) = open_session(&state, &headers)?;

    let html = state
        .hooks
        .local_cost_text(&session, query.level, query.discount_code.as_deref())
        .await;

    Ok((response_headers, Html(html)))
}
