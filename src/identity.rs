//! Identity endpoint: obtain a fresh identity and token over HTTP before
//! opening a socket.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::ClientResult;
use crate::protocol::Identity;

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    identity: String,
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: Identity,
    pub token: String,
}

/// `POST /v1/identity` on the configured server.
pub async fn create_identity(config: &ConnectionConfig) -> ClientResult<Credentials> {
    let url = config.identity_url()?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    debug!("Requesting identity from {}", url);
    let response = client
        .post(url)
        .header(ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?;

    let body: IdentityResponse = response.json().await?;
    parse_credentials(body)
}

fn parse_credentials(body: IdentityResponse) -> ClientResult<Credentials> {
    Ok(Credentials {
        identity: Identity::from_hex(&body.identity)?,
        token: body.token,
    })
}
