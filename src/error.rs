//! Error types raised across the script boundary.
//!
//! ```text
//! ScriptError
//! ├── Runtime           - raised to script code, catchable by pcall
//! ├── UnknownReference  - registry inconsistency, raised to script code
//! ├── StackOverflow     - script stack could not grow
//! ├── ForeignReference  - reference handed to the wrong interpreter
//! └── Adapter           - adapter generation failed; never caught by pcall
//! ```

use std::fmt;

use hostbridge_core::NativeError;
use thiserror::Error;

/// A runtime error message, with where it was raised.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuntimeFailure {
    pub message: String,
    /// `chunk:` prefix of the script function that called into the host.
    pub location: Option<String>,
    pub traceback: Option<String>,
}

impl fmt::Display for RuntimeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location} ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(traceback) = &self.traceback {
            write!(f, "\n{traceback}")?;
        }
        Ok(())
    }
}

/// Adapter generation failures. These describe a misconfigured host type
/// rather than a script mistake.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("type not found: {0}")]
    UnknownType(String),

    #[error("type '{type_name}' has no parameterless constructor")]
    NoDefaultConstructor { type_name: String },

    #[error("type '{type_name}' cannot be extended: {reason}")]
    NotExtensible { type_name: String, reason: String },

    #[error("'{type_name}' is not a delegate type")]
    NotDelegate { type_name: String },

    #[error("constructing '{type_name}' failed: {source}")]
    Construction {
        type_name: String,
        #[source]
        source: NativeError,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("{0}")]
    Runtime(RuntimeFailure),

    #[error("unknown object reference {0}")]
    UnknownReference(i64),

    #[error("script stack overflow")]
    StackOverflow,

    #[error("script reference belongs to another interpreter")]
    ForeignReference,

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ScriptError {
    /// Runtime error without location information.
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime(RuntimeFailure {
            message: message.into(),
            ..RuntimeFailure::default()
        })
    }

    /// Not recoverable by a protected call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptError::Adapter(_))
    }

    /// The bare message, without location or traceback.
    pub fn message(&self) -> String {
        match self {
            ScriptError::Runtime(failure) => failure.message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;
