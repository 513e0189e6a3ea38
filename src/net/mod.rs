//! Authenticated HTTP transport.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every API call in the client goes through [`Transport`], including calls
//! made by collaborators outside the session core (thread listings, events).
//! Callers get `Result` outputs; only the transport decides when a 401 means
//! the session is over.

pub mod backend;
pub mod transport;
pub mod types;

pub use backend::{HttpBackend, ReqwestBackend};
pub use transport::{ExpiryHook, SESSION_EXPIRED_MESSAGE, Transport, bearer_value};
pub use types::{ApiRequest, ApiResponse, ErrorBody, OutboundRequest, TransportError};
