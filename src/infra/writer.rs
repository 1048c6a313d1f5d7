//! HTTP transport for item writes.
//!
//! `POST {base}/{resource}` creates, `PATCH {base}/{resource}/{id}` updates.
//! When credentials are configured they travel as `key_identity` and
//! `key_credential` query parameters.

use async_trait::async_trait;
use omnia_types::ResourceId;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::application::repos::{ItemTransport, WriteError};
use crate::config::{ApiSettings, WriteCredentials, WriteSettings};

use super::client::{Body, build_client, read_body};
use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct HttpItemTransport {
    client: Client,
    base: Url,
    credentials: Option<WriteCredentials>,
}

impl HttpItemTransport {
    pub fn new(api: &ApiSettings, write: &WriteSettings) -> Result<Self, InfraError> {
        let base = write
            .base_url
            .clone()
            .ok_or_else(|| InfraError::configuration("write.base_url is not set"))?;
        Ok(Self::with_client(
            build_client(api)?,
            base,
            write.credentials.clone(),
        ))
    }

    pub fn with_client(client: Client, base: Url, credentials: Option<WriteCredentials>) -> Self {
        Self {
            client,
            base,
            credentials,
        }
    }

    pub fn resource_url(&self, segments: &[&str]) -> Result<Url, WriteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| WriteError::invalid(format!("`{}` cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if let Some(credentials) = self.credentials.as_ref() {
            url.query_pairs_mut()
                .append_pair("key_identity", &credentials.key_identity)
                .append_pair("key_credential", &credentials.key_credential);
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, payload: &Value) -> Result<Value, WriteError> {
        let resp = self
            .client
            .request(method, url)
            .json(payload)
            .send()
            .await
            .map_err(WriteError::from_transport)?;
        match read_body(resp).await.map_err(WriteError::from_transport)? {
            Body::Success(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| WriteError::Decode(format!("failed to parse body: {err}"))),
            Body::Failure { status, text } => Err(WriteError::Status {
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

#[async_trait]
impl ItemTransport for HttpItemTransport {
    async fn create(&self, resource: &str, payload: &Value) -> Result<Value, WriteError> {
        let url = self.resource_url(&[resource])?;
        debug!(resource, "Posting new item");
        self.send(Method::POST, url, payload).await
    }

    async fn update(
        &self,
        resource: &str,
        id: &ResourceId,
        payload: &Value,
    ) -> Result<Value, WriteError> {
        let url = self.resource_url(&[resource, id.as_str()])?;
        debug!(resource, id = %id, "Patching item");
        self.send(Method::PATCH, url, payload).await
    }
}
