//! # Mosaic Middleware
//!
//! Request middleware pipeline for the Mosaic gateway.
//!
//! Middleware runs before dispatch, strictly in registration order. Each
//! stage can enrich the [`MiddlewareContext`], add response headers, or
//! stop the request with a [`MiddlewareError`].
//!
//! ```text
//! Request → stage 1 → stage 2 → … → stage N → dispatch
//!              ↓ error   ↓ error        ↓ error
//!              └─────────┴──── error envelope (200 OK)
//! ```
//!
//! ## Example
//!
//! ```
//! use mosaic_middleware::stages::{CorsMiddleware, RequestIdMiddleware};
//! use mosaic_middleware::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(RequestIdMiddleware::new())
//!     .stage(CorsMiddleware::new())
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), ["request_id", "cors"]);
//! ```

#![doc(html_root_url = "https://docs.rs/mosaic-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use context::MiddlewareContext;
pub use error::MiddlewareError;
pub use middleware::{FnMiddleware, Middleware};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
