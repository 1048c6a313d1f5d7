//! HTTP collection fetcher.
//!
//! Issues `GET {base}?helper=Query&action={action}&json=1` and expects a JSON
//! array of objects back.

use async_trait::async_trait;
use omnia_types::RawItem;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::repos::{CollectionFetcher, FetchError};
use crate::config::ApiSettings;

use super::client::{Body, build_client, read_body};
use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(api: &ApiSettings) -> Result<Self, InfraError> {
        let base = api
            .base_url
            .clone()
            .ok_or_else(|| InfraError::configuration("api.base_url is not set"))?;
        Ok(Self::with_client(build_client(api)?, base))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Query URL for one collection action.
    pub fn collection_url(&self, action: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("helper", "Query")
            .append_pair("action", action)
            .append_pair("json", "1");
        url
    }

    async fn request(&self, collection: &str, url: Url) -> Result<Vec<RawItem>, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;
        match read_body(resp).await.map_err(FetchError::from_transport)? {
            Body::Success(bytes) => decode_collection(&bytes),
            Body::Failure { status, text } => {
                debug!(collection, status = status.as_u16(), "Collection request rejected");
                Err(FetchError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
        }
    }
}

#[async_trait]
impl CollectionFetcher for HttpFetcher {
    async fn fetch(
        &self,
        collection: &str,
        action: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawItem>, FetchError> {
        let url = self.collection_url(action);
        debug!(collection, action, url = %url, "Requesting collection");
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.request(collection, url) => result,
        }
    }
}

/// Decode a collection payload: a JSON array whose every element is an object.
pub fn decode_collection(bytes: &[u8]) -> Result<Vec<RawItem>, FetchError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| FetchError::decode(format!("failed to parse body: {err}")))?;
    let Value::Array(elements) = value else {
        return Err(FetchError::decode("expected a JSON array of records"));
    };
    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            RawItem::try_from(element)
                .map_err(|_| FetchError::decode(format!("record {index} is not an object")))
        })
        .collect()
}
