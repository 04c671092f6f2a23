//! Automat dispatch bridge
//!
//! The runtime layer that lets a dynamically-typed host language call
//! into an Automation-style component model: invoke methods, get and set
//! properties, read constants, and receive asynchronous callbacks.
//!
//! Data flow: [`typelib`] introspection populates the [`cache`]; the
//! [`dispatch`] dispatcher consults the cache through [`resolve`], then
//! crosses the boundary in both directions through [`codec`] and
//! [`array_codec`]; the [`sink`] event sink independently uses the codec
//! to turn inbound callbacks into host message sends.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod array_codec;
pub mod cache;
pub mod codec;
pub mod descriptor;
pub mod dispatch;
pub mod resolve;
pub mod sink;
pub mod typelib;

pub use cache::{DescriptorCache, DescriptorId};
pub use descriptor::{
    ClassDescriptor, ConstantDescriptor, InvokeKind, MemberDescriptor, ParamFlags,
};
pub use dispatch::{CallOutcome, Dispatcher};
pub use resolve::Resolution;
pub use sink::{EventSink, SinkMethod};
pub use typelib::{
    FunctionDescription, ParamDescription, ParamType, TypeAttributes, TypeDescription, TypeKind,
    TypeLibrary, VariableDescription,
};
