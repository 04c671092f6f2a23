//! Wire type tags
//!
//! Every value exchanged with the component model carries one of these
//! tags. The set mirrors the foreign type system: fixed-width integers,
//! floating point, strings, date/currency, two object-reference flavors,
//! arrays, the empty/error/null sentinels, and a handful of structural
//! tags the bridge never converts.

/// Type tag of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Nothing at all (uninitialized slot).
    Empty,
    /// The SQL-style null sentinel.
    Null,
    /// An error/status code.
    Error,
    /// Foreign boolean.
    Bool,
    /// Signed 8-bit integer.
    I1,
    /// Signed 16-bit integer.
    I2,
    /// Signed 32-bit integer.
    I4,
    /// Signed 64-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U1,
    /// 32-bit floating point.
    R4,
    /// 64-bit floating point.
    R8,
    /// Fixed-point currency (scaled by 10^4).
    Currency,
    /// Date as fractional days.
    Date,
    /// String.
    Str,
    /// Dynamic-dispatchable object reference.
    Dispatch,
    /// Plain (non-dispatchable) object reference.
    Unknown,
    /// Pass-through: "whatever fits", no conversion target.
    Variant,
    /// N-dimensional array.
    Array,
    /// Binary blob (not convertible).
    Blob,
    /// Storage object (not convertible).
    Storage,
    /// Raw pointer (not convertible).
    Ptr,
    /// Raw C array (not convertible).
    CArray,
    /// Opaque user-defined type the introspection could not resolve.
    UserDefined,
}

impl Tag {
    /// Wire name of the tag, used in conversion-failure messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Tag::Empty => "EMPTY",
            Tag::Null => "NULL",
            Tag::Error => "ERROR",
            Tag::Bool => "BOOL",
            Tag::I1 => "I1",
            Tag::I2 => "I2",
            Tag::I4 => "I4",
            Tag::I8 => "I8",
            Tag::U1 => "UI1",
            Tag::R4 => "R4",
            Tag::R8 => "R8",
            Tag::Currency => "CY",
            Tag::Date => "DATE",
            Tag::Str => "BSTR",
            Tag::Dispatch => "DISPATCH",
            Tag::Unknown => "UNKNOWN",
            Tag::Variant => "VARIANT",
            Tag::Array => "ARRAY",
            Tag::Blob => "BLOB",
            Tag::Storage => "STORAGE",
            Tag::Ptr => "PTR",
            Tag::CArray => "CARRAY",
            Tag::UserDefined => "USERDEFINED",
        }
    }

    /// True for the integer tags of any width.
    pub const fn is_integer(&self) -> bool {
        matches!(self, Tag::I1 | Tag::I2 | Tag::I4 | Tag::I8 | Tag::U1)
    }

    /// True for the floating-point tags.
    pub const fn is_float(&self) -> bool {
        matches!(self, Tag::R4 | Tag::R8)
    }

    /// True for the two object-reference flavors.
    pub const fn is_object(&self) -> bool {
        matches!(self, Tag::Dispatch | Tag::Unknown)
    }

    /// True for tags the codec has no conversion for.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Tag::Blob | Tag::Storage | Tag::Ptr | Tag::CArray | Tag::UserDefined
        )
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
