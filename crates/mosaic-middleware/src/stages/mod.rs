//! Built-in middleware stages.
//!
//! | Stage | Name | Purpose |
//! |-------|------|---------|
//! | [`RequestIdMiddleware`] | `request_id` | Assign or propagate the request ID |
//! | [`CorsMiddleware`] | `cors` | Add CORS response headers |
//! | [`MetadataMiddleware`] | `metadata` | Register request-scoped metadata annotators |

pub mod cors;
pub mod metadata;
pub mod request_id;

pub use cors::CorsMiddleware;
pub use metadata::MetadataMiddleware;
pub use request_id::RequestIdMiddleware;
