//! Error codes shared with the surrounding UI
//!
//! The core classifies failures into codes; the UI is responsible for
//! localizing them and deciding whether to offer a retry.

mod codes;

pub use codes::ErrorCode;
