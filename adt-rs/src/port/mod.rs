//! Port traits: the seams between the engine services and the concrete
//! transports. Tests substitute recording mocks here.

pub mod transport;

pub use transport::{AdtResponse, Method, RequestOptions, Transport};
