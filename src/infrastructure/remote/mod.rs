//! Remote publishing-platform client seam
//!
//! The concrete HTTP transport lives outside this engine; the trait is the
//! boundary. Error variants keep 429 and 412 distinguishable from other
//! failures so the orchestrator can retry the former and route the latter
//! into conflict detection.

use crate::domain::content_type::ContentTypeDefinition;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

pub mod mock;

/// Errors surfaced by the remote platform
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// HTTP 429; the caller should back off and retry
    #[error("rate limited by remote platform")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 412; the remote changed since the etag was read
    #[error("remote content type changed since last read (etag mismatch)")]
    PreconditionFailed,

    /// The content type does not exist remotely
    #[error("remote content type not found: {0}")]
    NotFound(String),

    /// HTTP 5xx
    #[error("remote server error: HTTP {0}")]
    Server(u16),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),
}

impl RemoteError {
    /// Whether a retry with backoff is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server(_) | Self::Network(_)
        )
    }
}

/// A content type as the remote platform sees it, with its concurrency token
#[derive(Debug, Clone)]
pub struct RemoteContentType {
    pub definition: ContentTypeDefinition,
    /// Optimistic-concurrency token; required for updates
    pub etag: String,
}

/// Authenticated client for the remote publishing platform
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn list_content_types(&self) -> Result<Vec<RemoteContentType>, RemoteError>;

    async fn get_content_type(&self, key: &str) -> Result<RemoteContentType, RemoteError>;

    async fn create_content_type(
        &self,
        definition: &ContentTypeDefinition,
    ) -> Result<RemoteContentType, RemoteError>;

    /// Update with optimistic concurrency; a stale `etag` yields
    /// [`RemoteError::PreconditionFailed`]
    async fn update_content_type(
        &self,
        key: &str,
        definition: &ContentTypeDefinition,
        etag: &str,
    ) -> Result<RemoteContentType, RemoteError>;

    async fn delete_content_type(&self, key: &str) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteClient + ?Sized> RemoteClient for Arc<T> {
    async fn list_content_types(&self) -> Result<Vec<RemoteContentType>, RemoteError> {
        (**self).list_content_types().await
    }

    async fn get_content_type(&self, key: &str) -> Result<RemoteContentType, RemoteError> {
        (**self).get_content_type(key).await
    }

    async fn create_content_type(
        &self,
        definition: &ContentTypeDefinition,
    ) -> Result<RemoteContentType, RemoteError> {
        (**self).create_content_type(definition).await
    }

    async fn update_content_type(
        &self,
        key: &str,
        definition: &ContentTypeDefinition,
        etag: &str,
    ) -> Result<RemoteContentType, RemoteError> {
        (**self).update_content_type(key, definition, etag).await
    }

    async fn delete_content_type(&self, key: &str) -> Result<(), RemoteError> {
        (**self).delete_content_type(key).await
    }
}

/// Wrapper enforcing a bounded number of concurrent remote calls.
///
/// Platform rate limits apply regardless of batch size, so every call path
/// goes through the same permit pool.
pub struct BoundedClient<C> {
    inner: C,
    permits: Arc<Semaphore>,
}

impl<C: RemoteClient> BoundedClient<C> {
    pub fn new(inner: C, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl<C: RemoteClient> RemoteClient for BoundedClient<C> {
    async fn list_content_types(&self) -> Result<Vec<RemoteContentType>, RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            RemoteError::Network(format!("concurrency limiter closed: {}", e))
        })?;
        self.inner.list_content_types().await
    }

    async fn get_content_type(&self, key: &str) -> Result<RemoteContentType, RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            RemoteError::Network(format!("concurrency limiter closed: {}", e))
        })?;
        self.inner.get_content_type(key).await
    }

    async fn create_content_type(
        &self,
        definition: &ContentTypeDefinition,
    ) -> Result<RemoteContentType, RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            RemoteError::Network(format!("concurrency limiter closed: {}", e))
        })?;
        self.inner.create_content_type(definition).await
    }

    async fn update_content_type(
        &self,
        key: &str,
        definition: &ContentTypeDefinition,
        etag: &str,
    ) -> Result<RemoteContentType, RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            RemoteError::Network(format!("concurrency limiter closed: {}", e))
        })?;
        self.inner.update_content_type(key, definition, etag).await
    }

    async fn delete_content_type(&self, key: &str) -> Result<(), RemoteError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            RemoteError::Network(format!("concurrency limiter closed: {}", e))
        })?;
        self.inner.delete_content_type(key).await
    }
}
