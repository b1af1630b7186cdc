//! Transport to the remote assistant service
//!
//! The session only needs ordered text fragments that can be cancelled by
//! dropping the stream. [`HttpTransport`] provides them over HTTP.

pub mod data_stream;
mod error;
mod http;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;

use futures::stream::BoxStream;

/// Ordered response fragments. Normal end of stream is `None`.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;
