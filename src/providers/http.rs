//! Request discipline shared by the provider clients: token-bucket rate
//! limiting, retry on HTTP 429 honouring `Retry-After`, and status mapping.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::warn;

use super::{ProviderError, ProviderResult};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const MAX_RETRIES: u32 = 3;

pub(crate) type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub(crate) fn rate_limiter(requests_per_second: u32) -> DirectLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

pub(crate) fn build_client(user_agent: Option<&str>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    Ok(builder.build()?)
}

/// Send `request`, waiting on `limiter` before every attempt.
///
/// 404 maps to [`ProviderError::NotFound`]; transport errors, other non-2xx
/// statuses and exhausted 429 retries map to [`ProviderError::Unavailable`].
pub(crate) async fn send(
    limiter: &DirectLimiter,
    request: RequestBuilder,
    label: &str,
) -> ProviderResult<Response> {
    let mut retries = 0u32;
    loop {
        limiter.until_ready().await;

        let attempt = request
            .try_clone()
            .ok_or_else(|| ProviderError::unavailable(format!("{label}: request not cloneable")))?;

        let resp = attempt
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(format!("{label}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
            retries += 1;
            let wait = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            warn!(
                provider = label,
                retry = retries,
                wait_secs = wait,
                "Rate limited, backing off"
            );
            tokio::time::sleep(Duration::from_secs(wait)).await;
            continue;
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(format!("{label}: {}", resp.url())));
        }

        if !status.is_success() {
            return Err(ProviderError::unavailable(format!(
                "{label}: HTTP {status} for {}",
                resp.url()
            )));
        }

        return Ok(resp);
    }
}
