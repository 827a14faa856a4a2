//! Transport abstraction for the pointer protocol.
//!
//! The protocol only needs request/response: POST a body to a path, get a
//! status and a body back. Implementations may use HTTP or anything else.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::wire::{STATUS_BAD_REQUEST, STATUS_OK};

/// A reply: status code and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn ok(body: Bytes) -> Self {
        Self {
            status: STATUS_OK,
            body,
        }
    }

    /// A 400 with a plain-text message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            body: Bytes::from(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// The body as text, for error replies.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Delivers one request and waits for its reply.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Poster: Send + Sync {
    /// POST `body` to `target` (a path with optional `?query`).
    async fn post(&self, target: &str, body: Bytes) -> Result<Response>;
}

/// An in-process transport for testing.
///
/// Hands requests straight to a [`PointerHandler`](crate::server::PointerHandler),
/// optionally after a fixed delay.
pub mod loopback {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::server::PointerHandler;
    use crate::service::MutablePointers;

    /// Loopback transport implementation.
    pub struct LoopbackPoster<M> {
        handler: Arc<PointerHandler<M>>,
        latency: Option<Duration>,
    }

    impl<M> Clone for LoopbackPoster<M> {
        fn clone(&self) -> Self {
            Self {
                handler: Arc::clone(&self.handler),
                latency: self.latency,
            }
        }
    }

    impl<M: MutablePointers> LoopbackPoster<M> {
        pub fn new(handler: Arc<PointerHandler<M>>) -> Self {
            Self {
                handler,
                latency: None,
            }
        }

        /// Delay every request by `latency` before handling it.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }
    }

    #[async_trait]
    impl<M: MutablePointers> Poster for LoopbackPoster<M> {
        async fn post(&self, target: &str, body: Bytes) -> Result<Response> {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            Ok(self.handler.handle(target, body).await)
        }
    }
}
