use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("euk_gateway_requests_total", "Total number of proxied requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("euk_gateway_rate_limited_total", "Requests rejected by the local rate limiter").unwrap();
    pub static ref BACKEND_RATE_LIMITED_TOTAL: Counter =
        register_counter!("euk_gateway_backend_rate_limited_total", "429 responses passed through from the backend").unwrap();
    pub static ref MOCK_FALLBACK_TOTAL: Counter =
        register_counter!("euk_gateway_mock_fallback_total", "Responses served from mock data").unwrap();
    pub static ref BACKEND_LATENCY: Histogram = register_histogram!(
        "euk_gateway_backend_latency_seconds",
        "Backend call latency in seconds"
    )
    .unwrap();
    pub static ref GOVERNOR_QUEUE_LENGTH: Gauge =
        register_gauge!("euk_gateway_governor_queue_length", "Outbound requests waiting to start").unwrap();
    pub static ref RATE_LIMIT_SOURCES: Gauge =
        register_gauge!("euk_gateway_rate_limit_sources", "Client addresses with a rate limit window").unwrap();
}

// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
