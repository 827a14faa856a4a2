//! Client for a remote pointer service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use vellum_core::PublicKeyHash;

use crate::error::{PointerError, Result};
use crate::service::MutablePointers;
use crate::transport::{Poster, Response};
use crate::wire::{decode_bool, GetPointerRequest, SetPointerRequest, SET_POINTER};

/// Configuration for the pointer client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for a reply before giving up.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`MutablePointers`] over a [`Poster`].
pub struct RemotePointers<P> {
    poster: P,
    config: ClientConfig,
}

impl<P: Poster> RemotePointers<P> {
    pub fn new(poster: P, config: ClientConfig) -> Self {
        Self { poster, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST with the configured timeout; non-2xx replies become errors.
    async fn call(&self, path: &str, body: Bytes) -> Result<Bytes> {
        let start = Instant::now();
        let response = tokio::time::timeout(self.config.request_timeout, self.poster.post(path, body))
            .await
            .map_err(|_| {
                PointerError::Timeout(format!("{} after {:?}", path, self.config.request_timeout))
            })??;
        info!(
            path,
            status = response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pointer call"
        );

        let Response { status, body } = response;
        if !(200..300).contains(&status) {
            return Err(PointerError::Remote {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl<P: Poster> MutablePointers for RemotePointers<P> {
    async fn set_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signed: Bytes,
    ) -> Result<bool> {
        let body = SetPointerRequest {
            owner: *owner,
            writer: *writer,
            payload: signed,
        }
        .encode()?;
        decode_bool(&self.call(SET_POINTER, body).await?)
    }

    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        let req = GetPointerRequest {
            owner: *owner,
            writer: *writer,
        };
        let body = self.call(&req.path(), req.body()?).await?;
        Ok(if body.is_empty() { None } else { Some(body) })
    }
}
