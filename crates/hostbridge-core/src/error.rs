//! Error types shared by the host model and native functions.
//!
//! ```text
//! RegistrationError - malformed assemblies or duplicate types
//! NativeError       - failures raised by host callables
//! └── ConversionError - value did not fit the requested Rust type
//! ```

use thiserror::Error;

/// Errors raised while converting a [`Dynamic`](crate::Dynamic) into a Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value had a different kind than expected.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer did not fit the target type.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// Float did not fit the target type.
    #[error("float {value} cannot be represented as {target_type}")]
    FloatConversion {
        value: f64,
        target_type: &'static str,
    },

    /// A host object payload was not of the requested Rust type.
    #[error("object payload is not a {target_type}")]
    PayloadMismatch { target_type: &'static str },

    /// Null where a value was required.
    #[error("null cannot be converted to {target_type}")]
    NullValue { target_type: &'static str },
}

/// Errors raised by native host callables.
///
/// Errors nested with [`NativeError::wrap`] keep their cause. The bridge
/// reports [`NativeError::root_cause`] to scripts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Argument index beyond what the caller supplied.
    #[error("argument index {index} out of bounds (count {count})")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// Argument conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The receiver was missing or of the wrong kind.
    #[error("invalid 'this': {message}")]
    InvalidThis { message: String },

    /// A virtual member with no script override and no base implementation.
    #[error("method '{name}' is not implemented")]
    NotImplemented { name: String },

    /// Lookup by key failed.
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },

    /// A callable was invoked outside of any interpreter.
    #[error("no script host is attached")]
    NoScriptHost,

    /// Script code raised an error while the host was calling into it.
    #[error("{message}")]
    Script { message: String },

    /// Generic host failure.
    #[error("{message}")]
    Failed { message: String },

    /// An error raised inside a nested invocation.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<NativeError>,
    },
}

impl NativeError {
    /// Generic failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        NativeError::Failed {
            message: message.into(),
        }
    }

    /// Receiver failure with a message.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Wrap this error with the context of an outer invocation.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        NativeError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping every [`NativeError::Wrapped`] layer.
    pub fn root_cause(&self) -> &NativeError {
        let mut current = self;
        while let NativeError::Wrapped { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Errors raised while registering assemblies and types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// An assembly with the same name is already registered.
    #[error("duplicate assembly: {0}")]
    DuplicateAssembly(String),

    /// A type with the same qualified name is already registered.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A referenced type does not exist.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// A duplicate enum value name.
    #[error("duplicate enum value: '{value_name}' in enum '{enum_name}'")]
    DuplicateEnumValue {
        enum_name: String,
        value_name: String,
    },

    /// The type definition is inconsistent.
    #[error("invalid type '{type_name}': {reason}")]
    InvalidType { type_name: String, reason: String },
}
