//! Host-side dynamic value model
//!
//! The host runtime is string-centric: numbers travel as strings, and
//! truth is carried by two singletons. The bridge consumes the runtime
//! through this narrow surface: the [`HostValue`] union, the
//! [`HostReceiver`] message-send seam for live host objects, and the
//! [`HostContext`] thread-attachment seam.

use crate::foreign::ForeignRef;
use crate::tag::Tag;
use std::sync::Arc;
use thiserror::Error;

/// A failure reported by the host runtime while delivering a message.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HostSendError(pub String);

/// A live host object the bridge can send messages to.
pub trait HostReceiver: Send + Sync {
    /// True if the object exposes a method of this name.
    fn responds_to(&self, name: &str) -> bool;

    /// Send a message and return its result.
    fn send(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HostSendError>;

    /// Push an updated value into the object in place. Returns false if
    /// the object does not support in-place update.
    fn update(&self, value: &HostValue) -> bool {
        let _ = value;
        false
    }

    /// The object's string form, used by generic stringification.
    fn string_value(&self) -> String {
        "an Object".to_string()
    }
}

/// Shared handle to a live host object.
pub type HostObjectRef = Arc<dyn HostReceiver>;

/// A host value carrying an explicit conversion target.
///
/// This is the override hook consumed by the encoder: the wrapper's tag
/// supersedes whatever target the signature declared, the `out` flag
/// reclassifies the argument as an out-parameter, and `keep_ownership`
/// tells the caller that the produced wire value must not be disposed of
/// on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedWrapper {
    /// The wrapped value.
    pub value: HostValue,
    /// Explicit target tag, if any.
    pub target: Option<Tag>,
    /// Treat the argument as an out-parameter.
    pub out: bool,
    /// Ownership of the encoded value stays with the wrapper.
    pub keep_ownership: bool,
}

impl TypedWrapper {
    /// Wrap a value with an explicit target tag.
    pub fn new(value: HostValue, target: Tag) -> Self {
        TypedWrapper {
            value,
            target: Some(target),
            out: false,
            keep_ownership: false,
        }
    }

    /// Mark the wrapped argument as an out-parameter.
    pub fn as_out(mut self) -> Self {
        self.out = true;
        self
    }
}

/// A host dynamic object, as seen by the bridge.
#[derive(Clone, Default)]
pub enum HostValue {
    /// The nil singleton.
    #[default]
    Nil,
    /// One of the two boolean singletons.
    Bool(bool),
    /// A string (the host's universal scalar).
    Str(String),
    /// A host array.
    Array(HostArray),
    /// A proxy wrapping a foreign dispatchable object.
    Proxy(ForeignRef),
    /// A typed value wrapper (encoder override hook).
    Wrapped(Box<TypedWrapper>),
    /// A live host object that accepts message sends.
    Object(HostObjectRef),
}

impl HostValue {
    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        HostValue::Str(s.into())
    }

    /// True if this is the nil singleton.
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// The boolean singleton this value is, if it is one.
    ///
    /// Deliberately strict: numeric `"0"`/`"1"` are not booleans here.
    pub fn truth(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Host-native whole-number coercion.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Str(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Host-native floating-point coercion.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Generic stringification, the entry to the string conversion path.
    pub fn stringify(&self) -> String {
        match self {
            HostValue::Nil => String::new(),
            HostValue::Bool(true) => "1".to_string(),
            HostValue::Bool(false) => "0".to_string(),
            HostValue::Str(s) => s.clone(),
            HostValue::Array(_) => "an Array".to_string(),
            HostValue::Proxy(_) => "an Automation object".to_string(),
            HostValue::Wrapped(w) => w.value.stringify(),
            HostValue::Object(o) => o.string_value(),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Proxy(a), Proxy(b)) => Arc::ptr_eq(a, b),
            (Wrapped(a), Wrapped(b)) => a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostValue::Nil => write!(f, "nil"),
            HostValue::Bool(b) => write!(f, "bool({b})"),
            HostValue::Str(s) => write!(f, "str({s:?})"),
            HostValue::Array(a) => write!(f, "array({:?})", a.extents()),
            HostValue::Proxy(p) => write!(f, "proxy({:p})", Arc::as_ptr(p)),
            HostValue::Wrapped(w) => f.debug_tuple("wrapped").field(w).finish(),
            HostValue::Object(o) => write!(f, "object({:p})", Arc::as_ptr(o)),
        }
    }
}

/// A host array: N-dimensional, 1-based indexing, canonical element
/// order with the last dimension varying fastest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostArray {
    extents: Vec<u32>,
    elements: Vec<HostValue>,
}

impl HostArray {
    /// Allocate an array of the given shape, filled with nil.
    pub fn new(extents: Vec<u32>) -> Self {
        let total = if extents.is_empty() {
            0
        } else {
            extents.iter().map(|e| *e as usize).product()
        };
        HostArray {
            extents,
            elements: vec![HostValue::Nil; total],
        }
    }

    /// A one-dimensional array from its elements.
    pub fn from_vec(elements: Vec<HostValue>) -> Self {
        HostArray {
            extents: vec![elements.len() as u32],
            elements,
        }
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Per-dimension extents.
    pub fn extents(&self) -> &[u32] {
        &self.extents
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// True for a one-dimensional array.
    pub fn is_vector(&self) -> bool {
        self.extents.len() == 1
    }

    /// Elements in canonical order.
    pub fn elements(&self) -> &[HostValue] {
        &self.elements
    }

    /// Element at a 1-based index vector.
    pub fn get(&self, indices: &[u32]) -> Option<&HostValue> {
        let at = self.linear_index(indices)?;
        self.elements.get(at)
    }

    /// Store an element at a 1-based index vector. Returns false if the
    /// index vector is out of shape.
    pub fn put(&mut self, indices: &[u32], value: HostValue) -> bool {
        match self.linear_index(indices) {
            Some(at) => {
                self.elements[at] = value;
                true
            }
            None => false,
        }
    }

    fn linear_index(&self, indices: &[u32]) -> Option<usize> {
        if indices.len() != self.extents.len() || self.extents.is_empty() {
            return None;
        }
        let mut at: usize = 0;
        for (index, extent) in indices.iter().zip(&self.extents) {
            if *index < 1 || *index > *extent {
                return None;
            }
            at = at * *extent as usize + (*index - 1) as usize;
        }
        Some(at)
    }
}

/// Scoped attachment of the calling thread to the host execution
/// context. Detaches when dropped, on every exit path.
pub struct AttachGuard {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl AttachGuard {
    /// A guard that runs `detach` when dropped.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        AttachGuard {
            detach: Some(Box::new(detach)),
        }
    }

    /// A guard with nothing to detach.
    pub fn noop() -> Self {
        AttachGuard { detach: None }
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for AttachGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachGuard")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// The host execution context the bridge attaches foreign threads to.
pub trait HostContext: Send + Sync {
    /// Attach the calling thread for the duration of one call.
    /// `None` means the attach failed and the call must abort.
    fn attach_current_thread(&self) -> Option<AttachGuard>;
}
