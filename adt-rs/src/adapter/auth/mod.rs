//! Authentication material helpers: cookie-file and cookie-string ingestion.

pub mod cookies;

pub use cookies::{ensure_usercontext, parse_cookie_string, parse_netscape};
