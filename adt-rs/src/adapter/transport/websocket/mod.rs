pub mod amdp;
pub mod client;
pub mod git;
pub mod messages;
pub mod report;
pub mod stream;

pub use client::{VspClient, DEFAULT_REQUEST_TIMEOUT_MS};
pub use messages::{WelcomeInfo, WsDomain, WsEvent, WsPayload, WsRequest, WsServerMessage};
pub use stream::StreamAssembler;
