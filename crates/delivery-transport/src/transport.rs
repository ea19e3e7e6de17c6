//! The transport seam.

use crate::{Batch, ResponseMeta, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers a batch of events to the collector.
///
/// Implementations perform exactly one attempt per call; retries are the
/// caller's concern. A returned error must carry a status so it can be
/// classified with [`TransportError::class`].
#[async_trait]
pub trait Transport<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// Send one batch.
    async fn post(&self, batch: &Batch<E>) -> Result<ResponseMeta, TransportError>;
}

#[async_trait]
impl<E, T> Transport<E> for Arc<T>
where
    E: Send + Sync + 'static,
    T: Transport<E> + ?Sized,
{
    async fn post(&self, batch: &Batch<E>) -> Result<ResponseMeta, TransportError> {
        (**self).post(batch).await
    }
}
