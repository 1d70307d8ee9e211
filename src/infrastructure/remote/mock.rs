//! In-memory remote client for tests and local development
//!
//! Holds remote state behind a lock and supports scripting failures for
//! specific keys so partial-failure and retry paths can be exercised.

use super::{RemoteClient, RemoteContentType, RemoteError};
use crate::domain::content_type::ContentTypeDefinition;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredType {
    definition: ContentTypeDefinition,
    etag: String,
}

/// Scriptable in-memory implementation of [`RemoteClient`]
#[derive(Default)]
pub struct MockRemoteClient {
    types: Mutex<HashMap<String, StoredType>>,
    /// Failures to inject, consumed in order per key
    scripted_failures: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    etag_counter: AtomicU64,
    call_count: AtomicU64,
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> String {
        format!("etag-{}", self.etag_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of remote calls made (excluding list)
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Seed a type as already existing remotely; returns its etag
    pub async fn seed(&self, definition: ContentTypeDefinition) -> String {
        let etag = self.next_etag();
        self.types.lock().await.insert(
            definition.key.clone(),
            StoredType {
                definition,
                etag: etag.clone(),
            },
        );
        etag
    }

    /// Script a failure for the next call touching `key`
    pub async fn fail_next(&self, key: &str, error: RemoteError) {
        self.scripted_failures
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Overwrite a type out-of-band, simulating a concurrent remote editor.
    /// Existing etags become stale.
    pub async fn mutate_remotely(&self, definition: ContentTypeDefinition) {
        let etag = self.next_etag();
        self.types.lock().await.insert(
            definition.key.clone(),
            StoredType { definition, etag },
        );
    }

    pub async fn current_definition(&self, key: &str) -> Option<ContentTypeDefinition> {
        self.types
            .lock()
            .await
            .get(key)
            .map(|t| t.definition.clone())
    }

    async fn take_scripted_failure(&self, key: &str) -> Option<RemoteError> {
        let mut failures = self.scripted_failures.lock().await;
        let queue = failures.get_mut(key)?;
        let error = queue.pop_front();
        if queue.is_empty() {
            failures.remove(key);
        }
        error
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    async fn list_content_types(&self) -> Result<Vec<RemoteContentType>, RemoteError> {
        let types = self.types.lock().await;
        let mut out: Vec<RemoteContentType> = types
            .values()
            .map(|t| RemoteContentType {
                definition: t.definition.clone(),
                etag: t.etag.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.definition.key.cmp(&b.definition.key));
        Ok(out)
    }

    async fn get_content_type(&self, key: &str) -> Result<RemoteContentType, RemoteError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_scripted_failure(key).await {
            return Err(error);
        }
        let types = self.types.lock().await;
        types
            .get(key)
            .map(|t| RemoteContentType {
                definition: t.definition.clone(),
                etag: t.etag.clone(),
            })
            .ok_or_else(|| RemoteError::NotFound(key.to_string()))
    }

    async fn create_content_type(
        &self,
        definition: &ContentTypeDefinition,
    ) -> Result<RemoteContentType, RemoteError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_scripted_failure(&definition.key).await {
            return Err(error);
        }
        let etag = self.next_etag();
        self.types.lock().await.insert(
            definition.key.clone(),
            StoredType {
                definition: definition.clone(),
                etag: etag.clone(),
            },
        );
        Ok(RemoteContentType {
            definition: definition.clone(),
            etag,
        })
    }

    async fn update_content_type(
        &self,
        key: &str,
        definition: &ContentTypeDefinition,
        etag: &str,
    ) -> Result<RemoteContentType, RemoteError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_scripted_failure(key).await {
            return Err(error);
        }
        let mut types = self.types.lock().await;
        let existing = types
            .get(key)
            .ok_or_else(|| RemoteError::NotFound(key.to_string()))?;
        if existing.etag != etag {
            return Err(RemoteError::PreconditionFailed);
        }
        let new_etag = self.next_etag();
        types.insert(
            key.to_string(),
            StoredType {
                definition: definition.clone(),
                etag: new_etag.clone(),
            },
        );
        Ok(RemoteContentType {
            definition: definition.clone(),
            etag: new_etag,
        })
    }

    async fn delete_content_type(&self, key: &str) -> Result<(), RemoteError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_scripted_failure(key).await {
            return Err(error);
        }
        self.types
            .lock()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(key.to_string()))
    }
}
