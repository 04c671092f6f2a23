//! Automat core value model
//!
//! This crate defines the data that crosses the Automation boundary:
//! - Wire type tags and tagged values ([`Tag`], [`WireValue`])
//! - By-reference framing for out-parameters ([`WireSlot`], [`ByRefCell`])
//! - The N-dimensional foreign array container ([`ForeignArray`])
//! - The foreign dynamic-dispatch seam ([`ForeignDispatch`], [`ForeignUnknown`])
//! - The host-side dynamic value model ([`HostValue`], [`HostReceiver`])
//! - The bridge error taxonomy ([`BridgeError`], [`ForeignFailure`])
//!
//! The bridge logic itself (descriptor cache, introspection, codec,
//! dispatcher, event sink) lives in `automat-bridge`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod array;
pub mod error;
pub mod foreign;
pub mod host;
pub mod tag;
pub mod value;

pub use array::{Bound, ForeignArray, IndexWalker};
pub use error::{BridgeError, BridgeResult, ForeignFailure};
pub use foreign::{
    ForeignDispatch, ForeignRef, ForeignUnknown, InterfaceId, InvokeRequest, KindFlags,
    UnknownRef, PROPERTY_VALUE_SLOT,
};
pub use host::{
    AttachGuard, HostArray, HostContext, HostObjectRef, HostReceiver, HostSendError, HostValue,
    TypedWrapper,
};
pub use tag::Tag;
pub use value::{ByRefCell, WireSlot, WireValue};
