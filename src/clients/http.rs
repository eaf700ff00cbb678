use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::warn;

use crate::constants::http::MAX_RETRIES;

/// Send a request, retrying a bounded number of times when the server
/// answers 429. Honors `Retry-After` when present, otherwise waits one
/// second between attempts. Any other status is returned as-is.
pub(crate) async fn send_retrying(request: RequestBuilder) -> reqwest::Result<Response> {
    let mut attempt = 0;
    loop {
        let Some(cloned) = request.try_clone() else {
            return request.send().await;
        };
        let response = cloned.send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
            let delay = retry_after_seconds(&response).unwrap_or(1);
            warn!(
                attempt = attempt + 1,
                delay_secs = delay,
                "Rate limited, backing off before retry"
            );
            sleep(Duration::from_secs(delay)).await;
            attempt += 1;
            continue;
        }
        return Ok(response);
    }
}

fn retry_after_seconds(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
