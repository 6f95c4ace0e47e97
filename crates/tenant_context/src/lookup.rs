//! Remote name lookups used when the bundle lacks a cross-reference table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContextResult;

/// A client id and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientName {
    pub client_id: String,
    pub name: String,
}

impl ClientName {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
        }
    }
}

/// Listing of name-resolution tables from the remote management API.
///
/// Implementations handle pagination and retries themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// Every client on the tenant.
    async fn list_clients(&self) -> ContextResult<Vec<ClientName>>;
}

/// Lookup for runs without a remote service; knows no names.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLookup;

#[async_trait]
impl NameLookup for OfflineLookup {
    async fn list_clients(&self) -> ContextResult<Vec<ClientName>> {
        Ok(Vec::new())
    }
}
