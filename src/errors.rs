use std::fmt;

/// Custom error type for index operations, including specific error codes.
///
/// Each variant represents a distinct error condition with a unique error code for easier debugging
/// and error handling in applications.
#[derive(Debug)]
pub enum Error {
    /// I/O-related error (e.g., snapshot file operations).
    /// Error code: 1000
    Io(std::io::Error),
    /// Insertion of a key that is already stored in the tree.
    /// Error code: 2000
    DuplicateKey(String),
    /// Deletion of a key that is not stored in the tree.
    /// Error code: 2001
    KeyNotExist(String),
    /// The tree was asked to act on a node in a structurally impossible state.
    /// Error code: 2002
    InnerInvariant(String),
    /// An index with the same name already exists.
    /// Error code: 3000
    DuplicateIndex(String),
    /// The named index does not exist.
    /// Error code: 3001
    IndexNotExist(String),
    /// Key type does not agree with the declared type of the index.
    /// Error code: 3002
    TypeMismatch(String),
    /// Keys and offsets of a batch insertion differ in length.
    /// Error code: 3003
    BatchSizeMismatch(String),
    /// Statement syntax error.
    /// Error code: 4000
    Syntax(String),
    /// Snapshot serialization/deserialization error.
    /// Error code: 5000
    Encoding(String),
    /// Invalid page size or degree.
    /// Error code: 6000
    Config(String),
    /// Miscellaneous uncategorized error.
    /// Error code: 9000
    Other(String),
}

impl Error {
    /// Returns the error code associated with this error variant.
    ///
    /// # Examples
    /// ```
    /// let err = Error::KeyNotExist("42".to_string());
    /// assert_eq!(err.code(), 2001);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            Error::Io(_) => 1000,
            Error::DuplicateKey(_) => 2000,
            Error::KeyNotExist(_) => 2001,
            Error::InnerInvariant(_) => 2002,
            Error::DuplicateIndex(_) => 3000,
            Error::IndexNotExist(_) => 3001,
            Error::TypeMismatch(_) => 3002,
            Error::BatchSizeMismatch(_) => 3003,
            Error::Syntax(_) => 4000,
            Error::Encoding(_) => 5000,
            Error::Config(_) => 6000,
            Error::Other(_) => 9000,
        }
    }

    /// Returns a human-readable error category for this error variant.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "I/O",
            Error::DuplicateKey(_) => "Duplicate Key",
            Error::KeyNotExist(_) => "Key Not Exist",
            Error::InnerInvariant(_) => "Inner Invariant",
            Error::DuplicateIndex(_) => "Duplicate Index",
            Error::IndexNotExist(_) => "Index Not Exist",
            Error::TypeMismatch(_) => "Type Mismatch",
            Error::BatchSizeMismatch(_) => "Batch Size",
            Error::Syntax(_) => "Syntax",
            Error::Encoding(_) => "Encoding",
            Error::Config(_) => "Config",
            Error::Other(_) => "Other",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "[{}] I/O Error: {}", self.code(), e),
            Error::DuplicateKey(msg) => write!(f, "[{}] Duplicate Key: {}", self.code(), msg),
            Error::KeyNotExist(msg) => write!(f, "[{}] Key Not Exist: {}", self.code(), msg),
            Error::InnerInvariant(msg) => {
                write!(f, "[{}] Inner Invariant Violation: {}", self.code(), msg)
            }
            Error::DuplicateIndex(msg) => {
                write!(f, "[{}] Duplicate Index: {}", self.code(), msg)
            }
            Error::IndexNotExist(msg) => write!(f, "[{}] Index Not Exist: {}", self.code(), msg),
            Error::TypeMismatch(msg) => write!(f, "[{}] Type Mismatch: {}", self.code(), msg),
            Error::BatchSizeMismatch(msg) => {
                write!(f, "[{}] Batch Size Mismatch: {}", self.code(), msg)
            }
            Error::Syntax(msg) => write!(f, "[{}] Syntax Error: {}", self.code(), msg),
            Error::Encoding(msg) => write!(f, "[{}] Encoding Error: {}", self.code(), msg),
            Error::Config(msg) => write!(f, "[{}] Config Error: {}", self.code(), msg),
            Error::Other(msg) => write!(f, "[{}] Unknown Error: {}", self.code(), msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(err: bincode::error::EncodeError) -> Self {
        Error::Encoding(format!("Failed to encode. {}", err))
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(err: bincode::error::DecodeError) -> Self {
        Error::Encoding(format!("Failed to decode. {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::Syntax(format!("Integer parsing error: {}", err))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::Syntax(format!("Float parsing error: {}", err))
    }
}

/// Convenience macro to create an `Error` with a formatted message.
///
/// # Examples
/// ```
/// use crate::errors::{Error, err};
/// let err = err!(KeyNotExist, "Key {} is not stored", 7);
/// assert_eq!(err.code(), 2001);
/// assert_eq!(err.to_string(), "[2001] Key Not Exist: Key 7 is not stored");
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident, $msg:expr) => {
        $crate::errors::Error::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($fmt, $($arg)*))
    };
}
