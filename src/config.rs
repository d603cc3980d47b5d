//! Limits and encoding settings shared by every handle of a [`Registry`].
//!
//! [`Registry`]: crate::registry::Registry

/// How string payloads are laid out in value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    /// Narrow strings: UTF-8 bytes, one NUL byte terminator.
    #[default]
    Utf8,
    /// Wide strings: UTF-16LE code units, two-byte NUL terminator.
    Utf16Le,
}

impl TextEncoding {
    /// Size of one code unit in bytes.
    pub fn unit_size(&self) -> usize {
        match self {
            TextEncoding::Utf8 => 1,
            TextEncoding::Utf16Le => 2,
        }
    }
}

/// Registry access configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Largest string `read_string` returns, in code units including the
    /// terminator, after environment expansion.
    pub max_string_len: usize,

    /// Name capacity an iterator grows to after a short read.
    pub max_name_len: usize,

    /// Initial size of iterator name and value buffers.
    pub initial_buffer_len: usize,

    /// Encoding used for string, expandable string and multi-string values.
    pub text_encoding: TextEncoding,
}

impl RegistryConfig {
    /// Default `max_string_len`.
    pub const DEFAULT_MAX_STRING_LEN: usize = 1024;

    /// Default `max_name_len`.
    pub const DEFAULT_MAX_NAME_LEN: usize = 16384;

    /// Default `initial_buffer_len`.
    pub const DEFAULT_INITIAL_BUFFER_LEN: usize = 260;

    /// Sets the maximum expanded string length.
    pub fn with_max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }

    /// Sets the maximum value name length.
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Sets the initial iterator buffer length.
    pub fn with_initial_buffer_len(mut self, len: usize) -> Self {
        self.initial_buffer_len = len;
        self
    }

    /// Sets the text encoding.
    pub fn with_text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = encoding;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_string_len: Self::DEFAULT_MAX_STRING_LEN,
            max_name_len: Self::DEFAULT_MAX_NAME_LEN,
            initial_buffer_len: Self::DEFAULT_INITIAL_BUFFER_LEN,
            text_encoding: TextEncoding::Utf8,
        }
    }
}
