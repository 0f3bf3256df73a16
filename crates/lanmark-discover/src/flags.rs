//! DNS-SD flag and interface index values.

use std::fmt;
use std::ops::BitOr;

/// Bit set passed to and returned from the native facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ServiceFlags(u32);

impl ServiceFlags {
    pub const NONE: Self = Self(0);
    /// More notifications are queued behind this one.
    pub const MORE_COMING: Self = Self(0x1);
    pub const ADD: Self = Self(0x2);
    pub const DEFAULT: Self = Self(0x4);
    /// Fail with a name conflict instead of picking a new instance name.
    pub const NO_AUTO_RENAME: Self = Self(0x8);
    pub const SHARED: Self = Self(0x10);
    pub const UNIQUE: Self = Self(0x20);
    pub const LONG_LIVED_QUERY: Self = Self(0x100);
    pub const ALLOW_REMOTE_QUERY: Self = Self(0x200);
    pub const FORCE_MULTICAST: Self = Self(0x400);
    pub const NON_BROWSABLE: Self = Self(0x2000);
    pub const INCLUDE_P2P: Self = Self(0x20000);
    pub const WAKE_ON_RESOLVE: Self = Self(0x40000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ServiceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ServiceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Network interface selector.
///
/// Ordinary interfaces are identified by their OS index. The top three values
/// of the range are reserved selectors with signed spellings -1, -2 and -3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterfaceIndex(u32);

impl InterfaceIndex {
    /// Every interface.
    pub const ANY: Self = Self(0);
    /// Only this machine.
    pub const LOCAL_ONLY: Self = Self(u32::MAX);
    pub const UNICAST: Self = Self(u32::MAX - 1);
    pub const P2P: Self = Self(u32::MAX - 2);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Interpret a signed caller-supplied index.
    ///
    /// Returns `None` for values outside `-3..=u32::MAX`.
    pub fn from_signed(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Self::LOCAL_ONLY),
            -2 => Some(Self::UNICAST),
            -3 => Some(Self::P2P),
            v => u32::try_from(v).ok().map(Self),
        }
    }
}

impl fmt::Display for InterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ANY => write!(f, "any"),
            Self::LOCAL_ONLY => write!(f, "local-only"),
            Self::UNICAST => write!(f, "unicast"),
            Self::P2P => write!(f, "p2p"),
            Self(index) => write!(f, "{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_contains_and_or() {
        let flags = ServiceFlags::MORE_COMING | ServiceFlags::ADD;
        assert!(flags.contains(ServiceFlags::MORE_COMING));
        assert!(flags.contains(ServiceFlags::ADD));
        assert!(!flags.contains(ServiceFlags::SHARED));
        assert_eq!(flags.bits(), 0x3);
        assert!(ServiceFlags::NONE.is_empty());
    }

    #[test]
    fn test_interface_index_signed_spellings() {
        assert_eq!(InterfaceIndex::from_signed(0), Some(InterfaceIndex::ANY));
        assert_eq!(
            InterfaceIndex::from_signed(-1),
            Some(InterfaceIndex::LOCAL_ONLY)
        );
        assert_eq!(InterfaceIndex::from_signed(-2), Some(InterfaceIndex::UNICAST));
        assert_eq!(InterfaceIndex::from_signed(-3), Some(InterfaceIndex::P2P));
        assert_eq!(
            InterfaceIndex::from_signed(7),
            Some(InterfaceIndex::new(7))
        );
        assert_eq!(InterfaceIndex::from_signed(-4), None);
        assert_eq!(InterfaceIndex::from_signed(i64::from(u32::MAX) + 1), None);
    }

    #[test]
    fn test_interface_index_display() {
        assert_eq!(InterfaceIndex::ANY.to_string(), "any");
        assert_eq!(InterfaceIndex::LOCAL_ONLY.to_string(), "local-only");
        assert_eq!(InterfaceIndex::new(3).to_string(), "3");
    }
}
