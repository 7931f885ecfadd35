//! Core types, payload decoding, and validation for the active sessions engine.

pub mod error;
pub mod payload;
pub mod session;
pub mod validation;

pub use error::{AuthErrorCode, Error, Result, ValidationErrorCode};
pub use payload::Vars;
pub use session::*;
pub use validation::*;
