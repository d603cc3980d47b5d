//! Encoding and decoding of typed value data.
//!
//! Everything here is pure: the functions take bytes or typed values and
//! never touch a handle. Integers are little endian. Strings follow the
//! configured [`TextEncoding`] and carry a NUL terminator; multi-strings are a
//! run of NUL-terminated entries closed by an empty entry.

use crate::config::TextEncoding;
use crate::environment::Environment;
use crate::error::{RegistryError, Result};
use crate::types::ValueType;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use encoding_rs::UTF_16LE;
use std::fmt;

/// Encodes a 32-bit integer as dword data.
pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    buf
}

/// Decodes dword data. Returns `None` unless `data` is exactly 4 bytes.
pub fn decode_u32(data: &[u8]) -> Option<u32> {
    if data.len() != 4 {
        return None;
    }
    Some(LittleEndian::read_u32(data))
}

/// Encodes a 64-bit integer as qword data.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    LittleEndian::write_u64(&mut buf, value);
    buf
}

/// Decodes qword data. Returns `None` unless `data` is exactly 8 bytes.
pub fn decode_u64(data: &[u8]) -> Option<u64> {
    if data.len() != 8 {
        return None;
    }
    Some(LittleEndian::read_u64(data))
}

/// Encodes a string with its terminator.
pub fn encode_string(value: &str, encoding: TextEncoding) -> Vec<u8> {
    let mut buf = Vec::with_capacity((value.len() + 1) * encoding.unit_size());
    push_encoded(&mut buf, value, encoding);
    push_nul(&mut buf, encoding);
    buf
}

/// Decodes string data, stopping at the first terminator or buffer end.
///
/// Invalid sequences are replaced rather than rejected.
pub fn decode_string(data: &[u8], encoding: TextEncoding) -> String {
    let unit = encoding.unit_size();
    let end = find_nul(data, 0, unit);
    decode_units(&data[..end], encoding)
}

/// Decodes a double-NUL-terminated list of strings.
///
/// Decoding stops at the first empty entry or at the end of `data`,
/// whichever comes first, so a list missing its final terminator still
/// yields every complete entry without reading past the slice. A trailing
/// partial code unit is ignored.
///
/// # Examples
///
/// ```rust
/// use reg_access::codec::decode_multi_string;
/// use reg_access::TextEncoding;
///
/// assert_eq!(decode_multi_string(b"a\0b\0\0", TextEncoding::Utf8), vec!["a", "b"]);
/// assert_eq!(decode_multi_string(b"a\0b", TextEncoding::Utf8), vec!["a", "b"]);
/// ```
pub fn decode_multi_string(data: &[u8], encoding: TextEncoding) -> Vec<String> {
    let unit = encoding.unit_size();
    let mut values = Vec::new();
    let mut entry = 0;

    while entry + unit <= data.len() {
        let entry_end = find_nul(data, entry, unit);
        if entry_end == entry {
            break;
        }
        values.push(decode_units(&data[entry..entry_end], encoding));
        entry = entry_end + unit;
    }

    values
}

/// Encodes a list of strings as multi-string data.
///
/// # Errors
///
/// Returns `InvalidArgument` if an entry is empty or contains a NUL, since
/// either would end the list early when read back.
pub fn encode_multi_string<S: AsRef<str>>(values: &[S], encoding: TextEncoding) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for value in values {
        let value = value.as_ref();
        if value.is_empty() || value.contains('\0') {
            return Err(RegistryError::invalid_argument(
                "multi-string entries must be non-empty and NUL-free",
            ));
        }
        push_encoded(&mut buf, value, encoding);
        push_nul(&mut buf, encoding);
    }
    if values.is_empty() {
        push_nul(&mut buf, encoding);
    }
    push_nul(&mut buf, encoding);
    Ok(buf)
}

/// Expands `%NAME%` placeholders using `env`.
///
/// Names that are not defined are kept verbatim, including their percent
/// signs. `max_len` bounds the result in code units of `encoding`, counting
/// the terminator.
///
/// # Errors
///
/// Returns `BufferTooSmall` with the required length when the expansion does
/// not fit in `max_len`.
pub fn expand_environment_placeholders(
    raw: &str,
    env: &dyn Environment,
    max_len: usize,
    encoding: TextEncoding,
) -> Result<String> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('%') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => match env.var(&after[..end]) {
                Some(value) => {
                    expanded.push_str(&value);
                    rest = &after[end + 1..];
                }
                None => {
                    // The closing percent may open the next placeholder.
                    expanded.push('%');
                    rest = after;
                }
            },
            Some(_) => {
                expanded.push_str("%%");
                rest = &after[1..];
            }
            None => {
                expanded.push('%');
                rest = after;
            }
        }
    }
    expanded.push_str(rest);

    let required = unit_count(&expanded, encoding) + 1;
    if required > max_len {
        return Err(RegistryError::BufferTooSmall { required });
    }
    Ok(expanded)
}

fn unit_count(value: &str, encoding: TextEncoding) -> usize {
    match encoding {
        TextEncoding::Utf8 => value.len(),
        TextEncoding::Utf16Le => value.encode_utf16().count(),
    }
}

fn push_encoded(buf: &mut Vec<u8>, value: &str, encoding: TextEncoding) {
    match encoding {
        TextEncoding::Utf8 => buf.extend_from_slice(value.as_bytes()),
        TextEncoding::Utf16Le => {
            for unit in value.encode_utf16() {
                buf.extend_from_slice(&unit.to_le_bytes());
            }
        }
    }
}

fn push_nul(buf: &mut Vec<u8>, encoding: TextEncoding) {
    buf.extend(std::iter::repeat(0u8).take(encoding.unit_size()));
}

/// Returns the offset of the first NUL unit at or after `start`, or the end
/// of the last whole unit if there is none.
fn find_nul(data: &[u8], start: usize, unit: usize) -> usize {
    let mut pos = start;
    while pos + unit <= data.len() {
        if data[pos..pos + unit].iter().all(|&b| b == 0) {
            return pos;
        }
        pos += unit;
    }
    pos
}

fn decode_units(data: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
        TextEncoding::Utf16Le => {
            let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(data);
            decoded.into_owned()
        }
    }
}

/// Decoded registry value data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    /// No data.
    None,

    /// String value.
    String(String),

    /// Expandable string value, unexpanded.
    ExpandString(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 64-bit integer.
    Qword(u64),

    /// Any other type, kept raw.
    Unknown(ValueType, Vec<u8>),
}

impl ValueData {
    /// Decodes value data according to its type tag.
    ///
    /// # Errors
    ///
    /// Returns `CantRead` when an integer type has the wrong size.
    pub fn parse(data: &[u8], value_type: ValueType, encoding: TextEncoding) -> Result<Self> {
        match value_type {
            ValueType::None => Ok(ValueData::None),
            ValueType::String => Ok(ValueData::String(decode_string(data, encoding))),
            ValueType::ExpandString => Ok(ValueData::ExpandString(decode_string(data, encoding))),
            ValueType::Binary => Ok(ValueData::Binary(data.to_vec())),
            ValueType::Dword => decode_u32(data)
                .map(ValueData::Dword)
                .ok_or_else(|| size_error(value_type, 4, data.len())),
            ValueType::DwordBigEndian => {
                if data.len() != 4 {
                    return Err(size_error(value_type, 4, data.len()));
                }
                Ok(ValueData::DwordBigEndian(BigEndian::read_u32(data)))
            }
            ValueType::Qword => decode_u64(data)
                .map(ValueData::Qword)
                .ok_or_else(|| size_error(value_type, 8, data.len())),
            ValueType::MultiString => Ok(ValueData::MultiString(decode_multi_string(data, encoding))),
            other => Ok(ValueData::Unknown(other, data.to_vec())),
        }
    }

    /// Encodes the value back into its type tag and bytes.
    ///
    /// # Errors
    ///
    /// Fails only for multi-strings with entries that cannot be encoded.
    pub fn encode(&self, encoding: TextEncoding) -> Result<(ValueType, Vec<u8>)> {
        Ok(match self {
            ValueData::None => (ValueType::None, Vec::new()),
            ValueData::String(s) => (ValueType::String, encode_string(s, encoding)),
            ValueData::ExpandString(s) => (ValueType::ExpandString, encode_string(s, encoding)),
            ValueData::Binary(b) => (ValueType::Binary, b.clone()),
            ValueData::Dword(d) => (ValueType::Dword, encode_u32(*d)),
            ValueData::DwordBigEndian(d) => {
                let mut buf = vec![0u8; 4];
                BigEndian::write_u32(&mut buf, *d);
                (ValueType::DwordBigEndian, buf)
            }
            ValueData::MultiString(values) => (ValueType::MultiString, encode_multi_string(values, encoding)?),
            ValueData::Qword(q) => (ValueType::Qword, encode_u64(*q)),
            ValueData::Unknown(value_type, b) => (*value_type, b.clone()),
        })
    }

    /// Returns the type tag this data would be stored under.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::None => ValueType::None,
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Dword(_) => ValueType::Dword,
            ValueData::DwordBigEndian(_) => ValueType::DwordBigEndian,
            ValueData::MultiString(_) => ValueType::MultiString,
            ValueData::Qword(_) => ValueType::Qword,
            ValueData::Unknown(value_type, _) => *value_type,
        }
    }
}

fn size_error(value_type: ValueType, expected: usize, actual: usize) -> RegistryError {
    RegistryError::cant_read(
        &value_type.name(),
        format!("expected {} bytes, found {}", expected, actual),
    )
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::None => write!(f, "(none)"),
            ValueData::String(s) | ValueData::ExpandString(s) => write!(f, "{}", s),
            ValueData::Binary(b) | ValueData::Unknown(_, b) => write!(f, "{}", hex::encode(b)),
            ValueData::Dword(d) | ValueData::DwordBigEndian(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => write!(f, "{}", strings.join(", ")),
        }
    }
}
