//! Server-side dispatch of pointer requests.
//!
//! [`PointerHandler`] turns a request target and body into a [`Response`],
//! independent of whatever listener delivers them.

use std::time::Instant;

use bytes::Bytes;
use tracing::{info, warn};

use crate::error::Result;
use crate::service::MutablePointers;
use crate::transport::Response;
use crate::wire::{
    encode_bool, split_target, GetPointerRequest, SetPointerRequest, GET_POINTER, SET_POINTER,
};

/// Dispatches wire requests to a [`MutablePointers`] implementation.
pub struct PointerHandler<M> {
    pointers: M,
}

impl<M: MutablePointers> PointerHandler<M> {
    pub fn new(pointers: M) -> Self {
        Self { pointers }
    }

    pub fn pointers(&self) -> &M {
        &self.pointers
    }

    /// Handle one request. Failures become 400 with a plain-text body.
    pub async fn handle(&self, target: &str, body: Bytes) -> Response {
        let start = Instant::now();
        let (method, query) = split_target(target);

        let result = match method {
            SET_POINTER => self.set_pointer(body).await,
            GET_POINTER => self.get_pointer(query, &body).await,
            other => {
                warn!(method = other, "unknown pointer method");
                return Response::bad_request(format!("Unknown method: {}", other));
            }
        };

        let response = match result {
            Ok(body) => Response::ok(body),
            Err(e) => {
                warn!(method, error = %e, "pointer request failed");
                Response::bad_request(e.to_string())
            }
        };
        info!(
            method,
            status = response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pointer request"
        );
        response
    }

    async fn set_pointer(&self, body: Bytes) -> Result<Bytes> {
        let req = SetPointerRequest::decode(body)?;
        let swapped = self
            .pointers
            .set_pointer(&req.owner, &req.writer, req.payload)
            .await?;
        Ok(encode_bool(swapped))
    }

    async fn get_pointer(&self, query: &str, body: &[u8]) -> Result<Bytes> {
        let req = GetPointerRequest::decode(query, body)?;
        Ok(self
            .pointers
            .get_pointer(&req.owner, &req.writer)
            .await?
            .unwrap_or_default())
    }
}
