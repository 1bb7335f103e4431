//! Adapters: the concrete HTTP and WebSocket transports and the auth
//! material parsers.

pub mod auth;
pub mod transport;

pub use transport::http::HttpTransport;
pub use transport::websocket::VspClient;
