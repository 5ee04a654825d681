//! # Mosaic Core
//!
//! Core types and capability traits for the Mosaic schema aggregation
//! gateway.
//!
//! - [`RequestContext`] - Per-request context carrying the request ID,
//!   backend metadata and deadline
//! - [`GraphqlHandler`] - A backend contributing fields to the per-request schema
//! - [`QueryEngine`] - Builds schemas and executes queries against them
//! - [`FieldSet`] / [`SchemaConfig`] - Field sets and their merged form
//! - [`HeaderTranslator`] - Wire header ↔ backend metadata mapping
//! - [`GatewayError`] - The uniform error shape written to clients

#![doc(html_root_url = "https://docs.rs/mosaic-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod engine;
mod error;
pub mod fixtures;
mod handler;
pub mod headers;
mod metadata;
mod request;
mod response;
mod schema;
pub mod types;

pub use context::{RequestContext, RequestId};
pub use engine::{ExecutionResult, QueryEngine};
pub use error::{ConnectError, ErrorCode, GatewayError, Location, SchemaError};
pub use handler::{DynHandler, ErasedConnection, GraphqlHandler, Release, ReleaseGuard};
pub use headers::{HeaderMatcher, HeaderTranslator};
pub use metadata::{Metadata, MetadataAnnotator, ResponseMetadata};
pub use request::{parse_request, GraphqlRequest, RequestParseError};
pub use response::GraphqlResponse;
pub use schema::{FieldSet, ObjectConfig, SchemaConfig, MUTATION_ROOT, QUERY_ROOT};
pub use types::{BoxFuture, Request};
