use crate::error::{Result, ScanError};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Try each candidate in priority order and return the first one that answers.
///
/// Any HTTP response counts as reachable, whatever its status. Connection
/// failures and timeouts move on to the next candidate. `None` means every
/// candidate failed.
pub async fn probe_sources(client: &Client, candidates: &[Url]) -> Option<Url> {
    for (idx, candidate) in candidates.iter().enumerate() {
        debug!(
            "Probing source {}/{}: {}",
            idx + 1,
            candidates.len(),
            candidate
        );

        let start = Instant::now();
        match client.get(candidate.as_str()).send().await {
            Ok(response) => {
                info!(
                    "Source {} is up (status {}, {} ms)",
                    candidate,
                    response.status().as_u16(),
                    start.elapsed().as_millis()
                );
                return Some(candidate.clone());
            }
            Err(e) => {
                warn!("Source {} is down: {}", candidate, e);
            }
        }
    }

    None
}

/// A fetched page and the URL it was served from after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// Fetch the page body of the resolved source.
///
/// Relative links on the page resolve against `Page::url`, which differs from
/// the requested URL when the mirror redirects.
pub async fn fetch_page(client: &Client, url: &Url) -> Result<Page> {
    debug!("Fetching {}", url);

    let response = client.get(url.as_str()).send().await?;
    let status = response.status();
    let final_url = response.url().clone();
    if !status.is_success() {
        return Err(ScanError::Status {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }
    if final_url != *url {
        info!("{} redirected to {}", url, final_url);
    }

    let body = response.text().await?;
    debug!("Fetched {} bytes from {}", body.len(), final_url);
    Ok(Page {
        url: final_url,
        body,
    })
}
