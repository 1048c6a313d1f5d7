use reqwest::{Client, Response, StatusCode};

use crate::config::ApiSettings;

use super::error::InfraError;

/// Shared HTTP client for both directions of the item API.
pub fn build_client(api: &ApiSettings) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(api.user_agent.as_str())
        .timeout(api.timeout)
        .build()
        .map_err(InfraError::from)
}

/// Body of a finished response, split by outcome.
pub(crate) enum Body {
    Success(Vec<u8>),
    Failure { status: StatusCode, text: String },
}

pub(crate) async fn read_body(resp: Response) -> Result<Body, reqwest::Error> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        return Ok(Body::Failure { status, text });
    }
    Ok(Body::Success(bytes.to_vec()))
}
