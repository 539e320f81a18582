use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{BackendResponse, forwarded_auth};
use crate::error::GatewayError;
use crate::metrics::{
    BACKEND_RATE_LIMITED_TOTAL, MOCK_FALLBACK_TOTAL, RATE_LIMIT_SOURCES, RATE_LIMITED_TOTAL,
    REQUEST_TOTAL,
};
use crate::mock::{DEFAULT_PAGE_SIZE, mock_page, mock_record};
use crate::models::{BackendRateLimitedBody, PageQuery, RateLimitedBody};
use crate::rate_limit::{RateLimitDecision, client_source_id};
use crate::state::AppState;

const BASE_PATH: &str = "/api/ugrozena-lica";

// Used when a backend 429 carries no usable Retry-After
const DEFAULT_BACKEND_RETRY_SECS: u64 = 60;

const DATA_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-data-source");
const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// Backend answer to client response; 429s get retry guidance
pub(super) fn relay(res: BackendResponse) -> Response {
    if res.status == StatusCode::TOO_MANY_REQUESTS {
        return backend_rate_limited(res);
    }
    res.into_response()
}

fn backend_rate_limited(res: BackendResponse) -> Response {
    BACKEND_RATE_LIMITED_TOTAL.inc();

    let retry_after = res
        .retry_after
        .as_deref()
        .and_then(|v| retry_after_secs(v, Utc::now()))
        .unwrap_or(DEFAULT_BACKEND_RETRY_SECS);
    warn!(retry_after, "Backend reported rate limit");

    // backend's own value goes out untouched
    let header_value = res
        .retry_after
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from(retry_after));

    let body = BackendRateLimitedBody {
        error: "Backend rate limit exceeded".to_string(),
        retry_after,
        suggestion: format!("Wait {} seconds before retrying", retry_after),
    };
    (
        res.status,
        [(header::RETRY_AFTER, header_value)],
        Json(body),
    )
        .into_response()
}

// Retry-After is either delta-seconds or an HTTP-date
fn retry_after_secs(value: &str, now: DateTime<Utc>) -> Option<u64> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let ms = (date.with_timezone(&Utc) - now).num_milliseconds().max(0) as u64;
    Some(ms.div_ceil(1000))
}

// Record ids are numeric; anything else cannot name a record
fn record_id(raw: &str) -> Result<u64, GatewayError> {
    raw.parse().map_err(|_| GatewayError::NotFound)
}

fn rate_limited(limit: u32, reset_at: DateTime<Utc>, retry_after: u64) -> Response {
    let body = RateLimitedBody {
        error: "Too many requests. Please try again later.".to_string(),
        retry_after,
    };
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            (header::RETRY_AFTER, HeaderValue::from(retry_after)),
            (LIMIT_HEADER, HeaderValue::from(limit)),
            (REMAINING_HEADER, HeaderValue::from_static("0")),
            (RESET_HEADER, HeaderValue::from(reset_at.timestamp_millis())),
        ],
        Json(body),
    )
        .into_response()
}

fn from_mock(body: impl IntoResponse) -> Response {
    MOCK_FALLBACK_TOTAL.inc();
    (
        [(DATA_SOURCE_HEADER, HeaderValue::from_static("mock"))],
        body,
    )
        .into_response()
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let source = client_source_id(&headers);
    let decision = state.rate_limiter.check(&source);
    RATE_LIMIT_SOURCES.set(state.rate_limiter.tracked_sources() as f64);

    if let RateLimitDecision::Limited {
        limit,
        reset_at,
        retry_after_secs,
    } = decision
    {
        RATE_LIMITED_TOTAL.inc();
        return Ok(rate_limited(limit, reset_at, retry_after_secs));
    }

    match state
        .backend
        .get(BASE_PATH, query.as_deref(), forwarded_auth(&headers))
        .await
    {
        Ok(res) => Ok(relay(res)),
        Err(GatewayError::BackendUnavailable(reason)) if state.mock_fallback => {
            warn!(%reason, "Backend unreachable, serving mock listing");
            let paging = PageQuery::parse_lenient(query.as_deref());
            let page = mock_page(
                paging.page.unwrap_or(0),
                paging.size.unwrap_or(DEFAULT_PAGE_SIZE),
            );
            Ok(from_mock(Json(page)))
        }
        Err(e) => Err(e),
    }
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let id = record_id(&id)?;
    let path = format!("{}/{}", BASE_PATH, id);
    match state.backend.get(&path, None, forwarded_auth(&headers)).await {
        Ok(res) => Ok(relay(res)),
        Err(GatewayError::BackendUnavailable(reason)) if state.mock_fallback => {
            warn!(%reason, id, "Backend unreachable, serving mock record");
            let record = mock_record(id).ok_or(GatewayError::NotFound)?;
            Ok(from_mock(Json(record)))
        }
        Err(e) => Err(e),
    }
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();
    info!("Creating record");
    let res = state
        .backend
        .post(BASE_PATH, payload, forwarded_auth(&headers))
        .await?;
    Ok(relay(res))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();
    let id = record_id(&id)?;
    info!(id, "Updating record");
    let path = format!("{}/{}", BASE_PATH, id);
    let res = state
        .backend
        .put(&path, payload, forwarded_auth(&headers))
        .await?;
    Ok(relay(res))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();
    let id = record_id(&id)?;
    info!(id, "Deleting record");
    let path = format!("{}/{}", BASE_PATH, id);
    let res = state.backend.delete(&path, forwarded_auth(&headers)).await?;
    Ok(relay(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retry_after_forms() {
        let now = Utc.with_ymd_and_hms(2026, 10, 21, 7, 26, 0).unwrap();

        assert_eq!(retry_after_secs("17", now), Some(17));
        assert_eq!(retry_after_secs("Wed, 21 Oct 2026 07:28:00 GMT", now), Some(120));
        // a date already past means retry now
        assert_eq!(retry_after_secs("Wed, 21 Oct 2026 07:00:00 GMT", now), Some(0));
        assert_eq!(retry_after_secs("soon", now), None);
        assert_eq!(retry_after_secs("-5", now), None);
    }

    #[test]
    fn test_record_id_must_be_numeric() {
        assert_eq!(record_id("42").unwrap(), 42);
        assert!(matches!(record_id("../auth/login"), Err(GatewayError::NotFound)));
        assert!(matches!(record_id("1?x=2"), Err(GatewayError::NotFound)));
    }
}
