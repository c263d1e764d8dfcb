use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};

/// HTTP client for image existence checks. The timeout is load-bearing: a
/// single unreachable CDN must not stall the whole batch.
pub fn create_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
    );

    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    Ok(client)
}

/// Whether a HEAD request to the URL comes back 2xx. Timeouts and transport
/// errors count as unreachable; the caller drops the image and moves on.
pub async fn url_is_reachable(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::debug!("Image check failed for {}: {}", url, e);
            false
        }
    }
}
