//! Define a general purpose RoofError struct.

use regex::Error as RegexError;
use std::{
    error::Error,
    fmt::{self, Debug},
    result,
};
use tokio::time::error::Elapsed;

pub type RoofResult<T> = result::Result<T, RoofError>;

/// Broad category of a failure, used by callers to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoofErrorKind {
    /// Socket write/read failure, or no answer in time.
    Communication,
    /// The unit answered with bytes outside of `'0'`/`'1'`.
    Validation,
    /// Invalid channel index, unmapped function or bad configuration file.
    Configuration,
    /// The roof did not reach its limit switch before the deadline.
    MotionTimeout,
}

#[derive(Debug)]
pub struct RoofError {
    kind: RoofErrorKind,
    err_msg: String,
}

impl Error for RoofError {}

impl fmt::Display for RoofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoofError::{:?}::{}", self.kind, self.err_msg)
    }
}

impl RoofError {
    pub fn new(kind: RoofErrorKind, err_msg: &str) -> RoofError {
        RoofError {
            kind,
            err_msg: String::from(err_msg),
        }
    }

    pub fn communication(err_msg: &str) -> RoofError {
        RoofError::new(RoofErrorKind::Communication, err_msg)
    }

    pub fn validation(err_msg: &str) -> RoofError {
        RoofError::new(RoofErrorKind::Validation, err_msg)
    }

    pub fn configuration(err_msg: &str) -> RoofError {
        RoofError::new(RoofErrorKind::Configuration, err_msg)
    }

    pub fn motion_timeout(err_msg: &str) -> RoofError {
        RoofError::new(RoofErrorKind::MotionTimeout, err_msg)
    }

    pub fn kind(&self) -> RoofErrorKind {
        self.kind
    }

    pub fn get_error_message(&self) -> &str {
        &self.err_msg
    }
}

impl From<std::io::Error> for RoofError {
    fn from(item: std::io::Error) -> RoofError {
        RoofError::communication(&item.to_string())
    }
}

impl From<Elapsed> for RoofError {
    fn from(item: Elapsed) -> RoofError {
        RoofError::communication(&format!("I/O unit did not answer in time: {item}"))
    }
}

impl From<RegexError> for RoofError {
    fn from(item: RegexError) -> RoofError {
        RoofError::configuration(&item.to_string())
    }
}

impl From<toml::de::Error> for RoofError {
    fn from(item: toml::de::Error) -> RoofError {
        RoofError::configuration(&item.to_string())
    }
}

impl From<toml::ser::Error> for RoofError {
    fn from(item: toml::ser::Error) -> RoofError {
        RoofError::configuration(&item.to_string())
    }
}
