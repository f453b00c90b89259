//! Errors surfaced to the guest by component methods.

use thiserror::Error;

pub type MethodResult = Result<Vec<crate::Value>, MethodError>;

/// A guest-level error. The bridge converts these into interpreter errors;
/// they never panic the host.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MethodError {
    /// Human-readable message, already phrased for the guest
    /// (e.g. `"fill(): invalid type of argument #3"`).
    #[error("{0}")]
    Call(String),

    #[error("{type_name}: no such method: {method}")]
    NoSuchMethod {
        type_name: &'static str,
        method: String,
    },
}

impl MethodError {
    pub fn call(msg: impl Into<String>) -> Self {
        MethodError::Call(msg.into())
    }

    pub fn no_such_method(type_name: &'static str, method: &str) -> Self {
        MethodError::NoSuchMethod {
            type_name,
            method: method.to_string(),
        }
    }

    pub fn bad_arity(method: &str) -> Self {
        MethodError::Call(format!("{method}(): invalid number of arguments"))
    }

    /// `pos` is the 1-based argument position shown to the guest.
    pub fn bad_arg(method: &str, pos: usize) -> Self {
        MethodError::Call(format!("{method}(): invalid type of argument #{pos}"))
    }
}
