use crate::backend::BackendClient;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub backend: BackendClient,
    pub rate_limiter: RateLimiter, // guards the listing route
    pub mock_fallback: bool,       // serve mock data when backend is down
}
