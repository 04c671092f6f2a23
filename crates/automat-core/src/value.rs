//! Tagged wire values and by-reference framing
//!
//! [`WireValue`] is the discriminated union exchanged with the component
//! model. By-reference framing is an explicit sum type: a [`WireSlot`] is
//! either a direct value or exactly one owned indirection cell. Double
//! indirection is unrepresentable, so the encode/collapse pair are total
//! functions and the defensive "extra dereference hop" some callers need
//! against hostile peers is unnecessary by construction.

use crate::array::ForeignArray;
use crate::foreign::{ForeignRef, UnknownRef};
use crate::tag::Tag;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of live indirection cells, for leak checks in tests.
static LIVE_CELLS: AtomicUsize = AtomicUsize::new(0);

/// A tagged value as exchanged with the component model.
///
/// Object references are retained by the value (`Arc` clone) and released
/// when it is dropped.
#[derive(Clone, Default)]
pub enum WireValue {
    /// Nothing at all.
    #[default]
    Empty,
    /// The null sentinel.
    Null,
    /// An error/status code.
    Error(u32),
    /// Foreign boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    I1(i8),
    /// Signed 16-bit integer.
    I2(i16),
    /// Signed 32-bit integer.
    I4(i32),
    /// Signed 64-bit integer.
    I8(i64),
    /// Unsigned 8-bit integer.
    U1(u8),
    /// 32-bit float.
    R4(f32),
    /// 64-bit float.
    R8(f64),
    /// Fixed-point currency, scaled by 10^4.
    Currency(i64),
    /// Date as fractional days.
    Date(f64),
    /// String.
    Str(String),
    /// Dynamic-dispatchable object reference (may be nil).
    Dispatch(Option<ForeignRef>),
    /// Plain object reference (may be nil).
    Unknown(Option<UnknownRef>),
    /// N-dimensional array.
    Array(ForeignArray),
    /// A structural payload the bridge never converts; only the tag is kept.
    Opaque(Tag),
}

impl WireValue {
    /// The type tag of this value.
    pub fn tag(&self) -> Tag {
        match self {
            WireValue::Empty => Tag::Empty,
            WireValue::Null => Tag::Null,
            WireValue::Error(_) => Tag::Error,
            WireValue::Bool(_) => Tag::Bool,
            WireValue::I1(_) => Tag::I1,
            WireValue::I2(_) => Tag::I2,
            WireValue::I4(_) => Tag::I4,
            WireValue::I8(_) => Tag::I8,
            WireValue::U1(_) => Tag::U1,
            WireValue::R4(_) => Tag::R4,
            WireValue::R8(_) => Tag::R8,
            WireValue::Currency(_) => Tag::Currency,
            WireValue::Date(_) => Tag::Date,
            WireValue::Str(_) => Tag::Str,
            WireValue::Dispatch(_) => Tag::Dispatch,
            WireValue::Unknown(_) => Tag::Unknown,
            WireValue::Array(_) => Tag::Array,
            WireValue::Opaque(tag) => *tag,
        }
    }

    /// True if this is the `Empty` sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, WireValue::Empty)
    }
}

impl PartialEq for WireValue {
    fn eq(&self, other: &Self) -> bool {
        use WireValue::*;
        match (self, other) {
            (Empty, Empty) | (Null, Null) => true,
            (Error(a), Error(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (I1(a), I1(b)) => a == b,
            (I2(a), I2(b)) => a == b,
            (I4(a), I4(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (U1(a), U1(b)) => a == b,
            (R4(a), R4(b)) => a == b,
            (R8(a), R8(b)) => a == b,
            (Currency(a), Currency(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Dispatch(a), Dispatch(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
            (Unknown(a), Unknown(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
            (Array(a), Array(b)) => a == b,
            (Opaque(a), Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for WireValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireValue::Empty => write!(f, "EMPTY"),
            WireValue::Null => write!(f, "NULL"),
            WireValue::Error(c) => write!(f, "ERROR({c:#x})"),
            WireValue::Bool(b) => write!(f, "BOOL({b})"),
            WireValue::I1(v) => write!(f, "I1({v})"),
            WireValue::I2(v) => write!(f, "I2({v})"),
            WireValue::I4(v) => write!(f, "I4({v})"),
            WireValue::I8(v) => write!(f, "I8({v})"),
            WireValue::U1(v) => write!(f, "UI1({v})"),
            WireValue::R4(v) => write!(f, "R4({v})"),
            WireValue::R8(v) => write!(f, "R8({v})"),
            WireValue::Currency(v) => write!(f, "CY({v})"),
            WireValue::Date(v) => write!(f, "DATE({v})"),
            WireValue::Str(s) => write!(f, "BSTR({s:?})"),
            WireValue::Dispatch(Some(r)) => write!(f, "DISPATCH({:p})", Arc::as_ptr(r)),
            WireValue::Dispatch(None) => write!(f, "DISPATCH(nil)"),
            WireValue::Unknown(Some(r)) => write!(f, "UNKNOWN({:p})", Arc::as_ptr(r)),
            WireValue::Unknown(None) => write!(f, "UNKNOWN(nil)"),
            WireValue::Array(a) => write!(f, "ARRAY({:?})", a.bounds()),
            WireValue::Opaque(tag) => write!(f, "OPAQUE({tag})"),
        }
    }
}

/// The single indirection cell of a by-reference value.
///
/// Cells are counted globally so tests can verify that every
/// `by_ref`/`collapse` pair is symmetric and leaks nothing.
#[derive(Debug, PartialEq)]
pub struct ByRefCell {
    value: WireValue,
}

impl ByRefCell {
    fn new(value: WireValue) -> Self {
        LIVE_CELLS.fetch_add(1, Ordering::Relaxed);
        ByRefCell { value }
    }

    /// The value behind the reference.
    pub fn value(&self) -> &WireValue {
        &self.value
    }

    /// Mutable access to the value behind the reference.
    pub fn value_mut(&mut self) -> &mut WireValue {
        &mut self.value
    }

    /// Number of indirection cells currently alive in the process.
    pub fn live() -> usize {
        LIVE_CELLS.load(Ordering::Relaxed)
    }
}

impl Drop for ByRefCell {
    fn drop(&mut self) {
        LIVE_CELLS.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Clone for ByRefCell {
    fn clone(&self) -> Self {
        ByRefCell::new(self.value.clone())
    }
}

/// One argument slot of a foreign call: a value passed directly, or
/// through exactly one indirection cell ("by reference").
#[derive(Debug, Clone, PartialEq)]
pub enum WireSlot {
    /// The value itself.
    Direct(WireValue),
    /// The value behind one owned indirection cell.
    ByRef(Box<ByRefCell>),
}

impl WireSlot {
    /// Frame a value by reference, allocating its indirection cell.
    pub fn by_ref(value: WireValue) -> Self {
        WireSlot::ByRef(Box::new(ByRefCell::new(value)))
    }

    /// Collapse the framing, freeing the indirection cell if there was
    /// one, and return the value.
    pub fn collapse(self) -> WireValue {
        match self {
            WireSlot::Direct(v) => v,
            WireSlot::ByRef(mut cell) => std::mem::take(cell.value_mut()),
        }
    }

    /// True if the by-reference flag is set.
    pub fn is_by_ref(&self) -> bool {
        matches!(self, WireSlot::ByRef(_))
    }

    /// The value, seen through the framing.
    pub fn value(&self) -> &WireValue {
        match self {
            WireSlot::Direct(v) => v,
            WireSlot::ByRef(cell) => cell.value(),
        }
    }

    /// Mutable access to the value, seen through the framing.
    pub fn value_mut(&mut self) -> &mut WireValue {
        match self {
            WireSlot::Direct(v) => v,
            WireSlot::ByRef(cell) => cell.value_mut(),
        }
    }
}

impl From<WireValue> for WireSlot {
    fn from(value: WireValue) -> Self {
        WireSlot::Direct(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that assert on the process-wide cell counter must not
    // interleave with each other.
    static COUNTER_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_tags() {
        assert_eq!(WireValue::Empty.tag(), Tag::Empty);
        assert_eq!(WireValue::I4(7).tag(), Tag::I4);
        assert_eq!(WireValue::Str("x".into()).tag(), Tag::Str);
        assert_eq!(WireValue::Opaque(Tag::Blob).tag(), Tag::Blob);
    }

    #[test]
    fn test_by_ref_symmetry() {
        let samples = vec![
            WireValue::Empty,
            WireValue::Null,
            WireValue::Bool(true),
            WireValue::I2(-1),
            WireValue::I4(i32::MAX),
            WireValue::I8(i64::MIN),
            WireValue::U1(255),
            WireValue::R8(0.5),
            WireValue::Currency(10_000),
            WireValue::Str(String::new()),
            WireValue::Str("hello".into()),
        ];
        let _guard = COUNTER_LOCK.lock().unwrap();
        let before = ByRefCell::live();
        for v in samples {
            let framed = WireSlot::by_ref(v.clone());
            assert!(framed.is_by_ref());
            assert_eq!(framed.value(), &v);
            let back = framed.collapse();
            assert_eq!(back, v);
        }
        assert_eq!(ByRefCell::live(), before);
    }

    #[test]
    fn test_collapse_direct_is_identity() {
        let slot = WireSlot::Direct(WireValue::I4(3));
        assert!(!slot.is_by_ref());
        assert_eq!(slot.collapse(), WireValue::I4(3));
    }

    #[test]
    fn test_cell_counter_tracks_clones() {
        let _guard = COUNTER_LOCK.lock().unwrap();
        let before = ByRefCell::live();
        let a = WireSlot::by_ref(WireValue::I4(1));
        let b = a.clone();
        assert_eq!(ByRefCell::live(), before + 2);
        drop(a);
        drop(b);
        assert_eq!(ByRefCell::live(), before);
    }

    #[test]
    fn test_value_mut_through_framing() {
        let mut slot = WireSlot::by_ref(WireValue::I4(1));
        *slot.value_mut() = WireValue::Str("updated".into());
        assert_eq!(slot.collapse(), WireValue::Str("updated".into()));
    }
}
