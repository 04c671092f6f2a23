//! Foreign dynamic-dispatch seam
//!
//! The component model is consumed through two traits:
//! [`ForeignDispatch`] for objects that answer name→ID lookup and
//! dynamically-dispatched invocation, and [`ForeignUnknown`] for plain
//! references that may or may not offer a dispatchable view. Reference
//! counting is expressed through `Arc`: cloning a reference retains it,
//! dropping releases it.

use crate::error::ForeignFailure;
use crate::value::{WireSlot, WireValue};
use std::sync::Arc;

/// The fixed named-argument slot that carries the new value of a
/// property-put invocation.
pub const PROPERTY_VALUE_SLOT: i32 = -3;

/// Identity of a foreign interface, as negotiated by `query_interface`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// An interface identity from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        InterfaceId(id.into())
    }

    /// The base identity-query interface.
    pub fn unknown() -> Self {
        InterfaceId::new("00000000-0000-0000-C000-000000000046")
    }

    /// The base dynamic-dispatch interface.
    pub fn dispatch() -> Self {
        InterfaceId::new("00020400-0000-0000-C000-000000000046")
    }

    /// The string form of the identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invocation-kind flags of one foreign call.
///
/// Several kinds can be accepted at once; resolution fallbacks widen the
/// set rather than re-enumerating single kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFlags(u8);

impl KindFlags {
    /// Ordinary method call.
    pub const METHOD: KindFlags = KindFlags(0b0001);
    /// Property read.
    pub const GET: KindFlags = KindFlags(0b0010);
    /// Property write.
    pub const PUT: KindFlags = KindFlags(0b0100);
    /// Property write by reference.
    pub const PUT_REF: KindFlags = KindFlags(0b1000);

    /// True if every flag in `other` is set here.
    pub const fn contains(&self, other: KindFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if either property-write flag is set.
    pub const fn is_put(&self) -> bool {
        self.0 & (Self::PUT.0 | Self::PUT_REF.0) != 0
    }
}

impl std::ops::BitOr for KindFlags {
    type Output = KindFlags;

    fn bitor(self, rhs: KindFlags) -> KindFlags {
        KindFlags(self.0 | rhs.0)
    }
}

/// One dynamically-dispatched call, fully marshalled.
///
/// Arguments are in reverse (rightmost-first) order, per the wire
/// convention. `named` binds named-argument slots to positions in
/// `args`; property-put uses [`PROPERTY_VALUE_SLOT`].
pub struct InvokeRequest<'a> {
    /// Member ID to invoke.
    pub member: i32,
    /// Accepted invocation kinds.
    pub kind: KindFlags,
    /// Argument slots, rightmost first. Out-parameters are framed by
    /// reference and updated in place by the callee.
    pub args: &'a mut [WireSlot],
    /// Named-argument bindings: (slot ID, index into `args`).
    pub named: &'a [(i32, usize)],
    /// Whether the caller wants a result value back.
    pub want_result: bool,
}

/// A foreign object reachable through the dynamic-dispatch convention.
pub trait ForeignDispatch: Send + Sync {
    /// Baseline name→ID lookup against the live object.
    fn member_id(&self, name: &str) -> Result<i32, ForeignFailure>;

    /// Fast name→ID lookup through the dynamic-extension interface, if
    /// the object offers one.
    fn member_id_ex(&self, name: &str) -> Option<i32> {
        let _ = name;
        None
    }

    /// Invoke a member. A `None` result means the call succeeded without
    /// producing a value (or none was requested).
    fn invoke(&self, request: InvokeRequest<'_>) -> Result<Option<WireValue>, ForeignFailure>;
}

/// Shared handle to a dispatchable foreign object.
pub type ForeignRef = Arc<dyn ForeignDispatch>;

/// A plain foreign reference that is not itself dispatchable.
pub trait ForeignUnknown: Send + Sync {
    /// Try to obtain a dynamic-dispatchable view of this reference.
    fn query_dispatch(&self) -> Option<ForeignRef>;
}

/// Shared handle to a plain foreign reference.
pub type UnknownRef = Arc<dyn ForeignUnknown>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_flags() {
        let k = KindFlags::METHOD | KindFlags::GET;
        assert!(k.contains(KindFlags::METHOD));
        assert!(k.contains(KindFlags::GET));
        assert!(!k.contains(KindFlags::PUT));
        assert!(!k.is_put());
        assert!(KindFlags::PUT_REF.is_put());
        assert!((KindFlags::PUT | KindFlags::METHOD).is_put());
    }

    #[test]
    fn test_interface_ids_distinct() {
        assert_ne!(InterfaceId::unknown(), InterfaceId::dispatch());
        assert_eq!(InterfaceId::new("abc"), InterfaceId::new("abc"));
        assert_eq!(InterfaceId::new("abc").as_str(), "abc");
    }
}
