use core::fmt;
use core::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(try_from = "u32", into = "u32")
        )]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create an id from a 0-based index by storing index+1.
            ///
            /// Panics for `u32::MAX`. Counters and decoded documents go
            /// through [`Self::try_from_index`] instead.
            pub fn from_index(index: u32) -> Self {
                Self::try_from_index(index).expect("id index below u32::MAX")
            }

            /// Checked variant of [`Self::from_index`], used on untrusted input.
            pub fn try_from_index(index: u32) -> Option<Self> {
                index.checked_add(1).and_then(NonZeroU32::new).map(Self)
            }

            /// Recover the 0-based index.
            pub fn index(self) -> u32 {
                self.0.get() - 1
            }

            /// The id that follows this one, if the id space has room.
            pub fn next(self) -> Option<Self> {
                // index() is at most u32::MAX - 1.
                Self::try_from_index(self.index() + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }

        impl TryFrom<u32> for $name {
            type Error = IdOverflow;

            fn try_from(index: u32) -> Result<Self, Self::Error> {
                Self::try_from_index(index).ok_or(IdOverflow(index))
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.index()
            }
        }
    };
}

define_id!(
    /// Identifier of a network element (subbasin, reach, node, diversion).
    ///
    /// - `u32` keeps memory small
    /// - `NonZero` enables `Option<ElementId>` to be pointer-optimized
    ElementId
);

define_id!(
    /// Identifier of a connection between two elements.
    ConnectionId
);

/// An id index that cannot be represented (only `u32::MAX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdOverflow(pub u32);

impl fmt::Display for IdOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id index {} is out of range", self.0)
    }
}

impl std::error::Error for IdOverflow {}
