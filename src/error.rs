//! Error taxonomy for the logging core.
//!
//! Construction-time errors (pattern parsing, builder validation, config
//! consumption) are represented here and propagate to the caller via
//! `Result`. Emission-time failures in a single sink are never allowed to
//! unwind past a handler boundary; see `crate::handler`.

use std::fmt;

/// Errors produced by the logging core.
///
/// Every variant carries enough context to build a useful message without
/// the caller having to reconstruct it from partial state.
#[derive(Debug)]
pub enum LoglyError {
    /// The string-pattern formatter's grammar was violated while parsing a
    /// pattern (unterminated placeholder, invalid name, unmatched brace).
    ParseError {
        /// 0-based byte offset into the pattern where the error was detected.
        pos: usize,
        /// Human-readable description of the problem.
        message: String,
        /// A short excerpt of the pattern around `pos`, for error messages.
        snippet: String,
    },
    /// A named placeholder had no matching attribute and no default.
    AttributeNotFound {
        /// The attribute key that could not be resolved.
        key: String,
    },
    /// A config node getter was called against a value of the wrong type.
    BadCast {
        /// The type the caller expected.
        expected: &'static str,
    },
    /// A config node getter or subscript was used on a missing/`none` node.
    BadOptionalAccess,
    /// An OS-level failure occurred inside a sink (open, connect, write,
    /// resolve).
    SystemError {
        /// Human-readable description of the failure.
        message: String,
        /// The platform error code, when one was available.
        code: Option<i32>,
    },
    /// A builder or factory received a missing/out-of-range/unrecognized
    /// argument.
    InvalidArgument {
        /// Human-readable description of the problem.
        message: String,
    },
}

impl fmt::Display for LoglyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoglyError::ParseError {
                pos,
                message,
                snippet,
            } => write!(f, "parse error at byte {pos}: {message} (near \"{snippet}\")"),
            LoglyError::AttributeNotFound { key } => {
                write!(f, "attribute not found: \"{key}\"")
            }
            LoglyError::BadCast { expected } => {
                write!(f, "config value is not a {expected}")
            }
            LoglyError::BadOptionalAccess => {
                write!(f, "accessed a missing config node")
            }
            LoglyError::SystemError { message, code } => match code {
                Some(code) => write!(f, "system error ({code}): {message}"),
                None => write!(f, "system error: {message}"),
            },
            LoglyError::InvalidArgument { message } => {
                write!(f, "invalid argument: {message}")
            }
        }
    }
}

impl std::error::Error for LoglyError {}

impl From<std::io::Error> for LoglyError {
    fn from(err: std::io::Error) -> Self {
        LoglyError::SystemError {
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LoglyError>;
