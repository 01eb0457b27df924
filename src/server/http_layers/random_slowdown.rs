//! Random slowdown middleware, handy to watch progress streams in slow motion.
#![allow(dead_code)] // Feature-gated middleware

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

const MEAN_DELAY_MS: f64 = 800.0;
const DELAY_STD_DEV_MS: f64 = 600.0;

fn sample_delay() -> Duration {
    let millis = Normal::new(MEAN_DELAY_MS, DELAY_STD_DEV_MS)
        .map(|normal| normal.sample(&mut rand::rng()))
        .unwrap_or(MEAN_DELAY_MS);
    Duration::from_millis(millis.max(0.0) as u64)
}

/// Delays each request by a normally distributed amount, never negative.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    tokio::time::sleep(sample_delay()).await;
    next.run(request).await
}
