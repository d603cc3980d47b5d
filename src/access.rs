//! Access masks and registry view qualifiers.
//!
//! An [`Access`] mask combines rights (query, set, enumerate, create) with at
//! most one of the two WOW64 view bits. The view bits select which of the
//! parallel redirected namespaces a key is opened in; they are extracted as a
//! [`View`] and must stay consistent down a chain of handles.

use crate::error::{RegistryError, Result};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Access rights requested when opening or creating a key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Access(pub u32);

impl Access {
    /// Query values.
    pub const QUERY_VALUE: Access = Access(0x0001);

    /// Create, overwrite or delete values.
    pub const SET_VALUE: Access = Access(0x0002);

    /// Create subkeys.
    pub const CREATE_SUB_KEY: Access = Access(0x0004);

    /// Enumerate subkeys.
    pub const ENUMERATE_SUB_KEYS: Access = Access(0x0008);

    /// Request change notifications.
    pub const NOTIFY: Access = Access(0x0010);

    /// Create symbolic links.
    pub const CREATE_LINK: Access = Access(0x0020);

    /// Use the 64-bit view.
    pub const WOW64_64KEY: Access = Access(0x0100);

    /// Use the 32-bit view.
    pub const WOW64_32KEY: Access = Access(0x0200);

    /// Delete the key.
    pub const DELETE: Access = Access(0x0001_0000);

    /// Read the security descriptor.
    pub const READ_CONTROL: Access = Access(0x0002_0000);

    /// Standard read rights.
    pub const READ: Access = Access(0x0002_0019);

    /// Standard write rights.
    pub const WRITE: Access = Access(0x0002_0006);

    /// Every right.
    pub const ALL_ACCESS: Access = Access(0x000F_003F);

    /// Mask of the two view bits.
    pub const VIEW_MASK: Access = Access(Self::WOW64_32KEY.0 | Self::WOW64_64KEY.0);

    /// Creates an access mask from its native value.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the native value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub fn contains(&self, other: Access) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if any bit of `other` is set.
    pub fn intersects(&self, other: Access) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns true if the mask asks for any right that modifies the store.
    pub fn wants_write(&self) -> bool {
        self.intersects(Access(Self::SET_VALUE.0 | Self::CREATE_SUB_KEY.0 | Self::CREATE_LINK.0))
    }

    /// Returns the mask with the view bits cleared.
    pub fn rights(&self) -> Access {
        Access(self.0 & !Self::VIEW_MASK.0)
    }

    /// Extracts the view qualifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when both view bits are set.
    pub fn view(&self) -> Result<View> {
        match (self.contains(Self::WOW64_32KEY), self.contains(Self::WOW64_64KEY)) {
            (false, false) => Ok(View::Default),
            (true, false) => Ok(View::Wow64_32),
            (false, true) => Ok(View::Wow64_64),
            (true, true) => Err(RegistryError::invalid_argument(
                "WOW64_32KEY and WOW64_64KEY are mutually exclusive",
            )),
        }
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Access) {
        self.0 |= rhs.0;
    }
}

impl BitOr<View> for Access {
    type Output = Access;

    fn bitor(self, rhs: View) -> Access {
        self | rhs.access()
    }
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Access({:#x})", self.0)
    }
}

/// Which redirected namespace a handle was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum View {
    /// No explicit view; the process-native namespace.
    #[default]
    Default,
    /// The 32-bit view (`WOW64_32KEY`).
    Wow64_32,
    /// The 64-bit view (`WOW64_64KEY`).
    Wow64_64,
}

impl View {
    /// Returns the access bits that select this view.
    pub fn access(&self) -> Access {
        match self {
            View::Default => Access(0),
            View::Wow64_32 => Access::WOW64_32KEY,
            View::Wow64_64 => Access::WOW64_64KEY,
        }
    }
}
