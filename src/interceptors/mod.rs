//! Per-call middleware. Order on the way in: logging, then access.

pub mod access;
pub mod logging;

pub use access::{enforce, Access, AccessInterceptor, UnaryCall};
pub use logging::{log_calls, REQUEST_ID_HEADER};
