//! Error types for registry access operations.
//!
//! Every open, read, write, enumerate and delete reports failure through
//! [`RegistryError`]. The set is closed and maps one-to-one onto the native
//! status codes a registry implementation returns, so callers at the boundary
//! can translate in both directions with [`RegistryError::code`] and
//! [`RegistryError::from_code`].

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Native status code for success.
pub const ERROR_SUCCESS: i32 = 0;
/// Native status code for a missing key or value.
pub const ERROR_FILE_NOT_FOUND: i32 = 2;
/// Native status code for insufficient access rights.
pub const ERROR_ACCESS_DENIED: i32 = 5;
/// Native status code for a handle the store does not recognize.
pub const ERROR_INVALID_HANDLE: i32 = 6;
/// Native status code for an invalid parameter.
pub const ERROR_INVALID_PARAMETER: i32 = 87;
/// Native status code for a data type mismatch.
pub const ERROR_DATATYPE_MISMATCH: i32 = 1629;
/// Native status code for a directory (key) that is not empty.
pub const ERROR_DIR_NOT_EMPTY: i32 = 145;
/// Native status code for a buffer that is too small for the data.
pub const ERROR_MORE_DATA: i32 = 234;
/// Native status code for a value that cannot be decoded.
pub const ERROR_CANTREAD: i32 = 1012;
/// Native status code for an operation on a key marked for deletion.
pub const ERROR_KEY_DELETED: i32 = 1018;

/// Errors that can occur while accessing the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The key or value does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller lacks the rights required for the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A key could not be deleted because it still has children or values.
    #[error("Key is not empty: {0}")]
    NotEmpty(String),

    /// The stored type tag cannot be decoded as the requested type.
    #[error("Type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Value name.
        name: String,
        /// Type the caller asked for.
        expected: String,
        /// Type actually stored.
        found: String,
    },

    /// The type tag matches but the stored data is structurally invalid.
    #[error("Cannot read '{name}': {reason}")]
    CantRead {
        /// Value name.
        name: String,
        /// What was wrong with the data.
        reason: String,
    },

    /// The supplied buffer is too small; `required` is the exact size needed.
    #[error("Buffer too small: {required} bytes required")]
    BufferTooSmall {
        /// Size in bytes the operation needs.
        required: usize,
    },

    /// A parameter was rejected, e.g. a view qualifier mismatch.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An unrecognized native status passed through unchanged.
    #[error("Unknown registry status {0}")]
    Unknown(i32),
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_access::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// assert!(err.is_not_found());
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates an access denied error for an operation on a key.
    pub fn access_denied(operation: &str, name: &str) -> Self {
        Self::AccessDenied(format!("{} on '{}'", operation, name))
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(name: &str, expected: &str, found: &str) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a cant-read error.
    pub fn cant_read(name: &str, reason: impl Into<String>) -> Self {
        Self::CantRead {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error means the key or value is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the native status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => ERROR_FILE_NOT_FOUND,
            Self::AccessDenied(_) => ERROR_ACCESS_DENIED,
            Self::NotEmpty(_) => ERROR_DIR_NOT_EMPTY,
            Self::TypeMismatch { .. } => ERROR_DATATYPE_MISMATCH,
            Self::CantRead { .. } => ERROR_CANTREAD,
            Self::BufferTooSmall { .. } => ERROR_MORE_DATA,
            Self::InvalidArgument(_) => ERROR_INVALID_PARAMETER,
            Self::Unknown(code) => *code,
        }
    }

    /// Translates a native status code into a result.
    ///
    /// `ERROR_SUCCESS` maps to `Ok(())`; unrecognized codes become
    /// [`RegistryError::Unknown`]. Size information is not carried by a bare
    /// status, so `ERROR_MORE_DATA` reports `required: 0`.
    pub fn from_code(code: i32) -> Result<()> {
        match code {
            ERROR_SUCCESS => Ok(()),
            ERROR_FILE_NOT_FOUND => Err(Self::NotFound(String::new())),
            ERROR_ACCESS_DENIED => Err(Self::AccessDenied(String::new())),
            ERROR_DIR_NOT_EMPTY => Err(Self::NotEmpty(String::new())),
            ERROR_DATATYPE_MISMATCH => Err(Self::type_mismatch("", "", "")),
            ERROR_CANTREAD => Err(Self::cant_read("", "")),
            ERROR_MORE_DATA => Err(Self::BufferTooSmall { required: 0 }),
            ERROR_INVALID_PARAMETER => Err(Self::InvalidArgument(String::new())),
            other => Err(Self::Unknown(other)),
        }
    }

    /// Error reported for a raw handle the store does not recognize.
    pub fn invalid_handle() -> Self {
        Self::Unknown(ERROR_INVALID_HANDLE)
    }

    /// Error reported for operations through a handle whose key was deleted.
    pub fn key_deleted() -> Self {
        Self::Unknown(ERROR_KEY_DELETED)
    }
}
