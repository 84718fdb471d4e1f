use crate::error::Result;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "relink/0.3 (https://github.com/trapdoorsec/relink)";

/// Builds the HTTP client shared by probing, fetching and notification.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}
