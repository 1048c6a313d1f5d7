use std::sync::Arc;

use omnia_types::{RawItem, ResourceId};
use serde_json::Value;
use tracing::{info, warn};

use super::repos::{ItemTransport, WriteError};

/// Creates and updates items through the write API.
///
/// Writes do not touch the collection cache; call
/// [`Hydrator::invalidate`](super::hydrate::Hydrator::invalidate) to make a
/// write visible to later reads in the same session.
#[derive(Clone)]
pub struct ItemWriter {
    transport: Arc<dyn ItemTransport>,
}

impl ItemWriter {
    pub fn new(transport: Arc<dyn ItemTransport>) -> Self {
        Self { transport }
    }

    pub async fn create_item(&self, resource: &str, payload: Value) -> Result<RawItem, WriteError> {
        let resource = validate_resource(resource)?;
        require_object(&payload)?;

        let item = self.transport.create(resource, &payload).await.and_then(into_item);
        match &item {
            Ok(item) => info!(resource, id = ?item.id(), "Created item"),
            Err(err) => warn!(resource, error = %err, "Failed to create item"),
        }
        item
    }

    pub async fn update_item(
        &self,
        resource: &str,
        id: impl Into<ResourceId>,
        payload: Value,
    ) -> Result<RawItem, WriteError> {
        let resource = validate_resource(resource)?;
        let id = id.into();
        if id.is_empty() {
            return Err(WriteError::invalid("item id must not be empty"));
        }
        require_object(&payload)?;

        let item = self
            .transport
            .update(resource, &id, &payload)
            .await
            .and_then(into_item);
        match &item {
            Ok(_) => info!(resource, id = %id, "Updated item"),
            Err(err) => warn!(resource, id = %id, error = %err, "Failed to update item"),
        }
        item
    }
}

fn validate_resource(resource: &str) -> Result<&str, WriteError> {
    let trimmed = resource.trim();
    if trimmed.is_empty() {
        return Err(WriteError::invalid("resource name must not be empty"));
    }
    Ok(trimmed)
}

fn require_object(payload: &Value) -> Result<(), WriteError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(WriteError::invalid("payload must be a JSON object"))
    }
}

fn into_item(value: Value) -> Result<RawItem, WriteError> {
    RawItem::try_from(value)
        .map_err(|_| WriteError::Decode("expected the stored item as a JSON object".to_string()))
}
