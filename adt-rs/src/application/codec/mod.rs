//! Wire codecs: XML templating and namespace-free reading, the ABAP
//! serialization envelope, and line-ending canonicalization.

pub mod abap;
pub mod lines;
pub mod xml;
