//! Common types shared across the gateway crates.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

/// The inbound HTTP request as seen by middleware and the gateway.
///
/// The body is fully collected before dispatch, so middleware and the
/// request parser can inspect it without streaming.
pub type Request = http::Request<Bytes>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
