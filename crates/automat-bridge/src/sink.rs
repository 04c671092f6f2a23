//! Event sink
//!
//! A callback-receivable object implementing the foreign
//! dynamic-dispatch convention. A foreign event source invokes the sink
//! on its own thread; the sink looks up the callback descriptor,
//! decodes the arguments and forwards the call as an ordinary message
//! send to the host object. The sink's lifetime is shared between the
//! registration table and the foreign connection, so it hands itself
//! out as an `Arc`.

use crate::codec;
use crate::descriptor::ParamFlags;
use automat_core::error::ForeignFailure;
use automat_core::foreign::{ForeignDispatch, InterfaceId, InvokeRequest};
use automat_core::host::{AttachGuard, HostContext, HostObjectRef, HostValue};
use automat_core::tag::Tag;
use automat_core::value::{WireSlot, WireValue};
use std::sync::Arc;

/// Exception code used when a host-side delivery failure is surfaced
/// back to the foreign caller.
const DELIVERY_FAILED: u32 = 0x8002_0009;

/// Signature of one callback member the sink can receive.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkMethod {
    /// Callback name, matched case-insensitively.
    pub name: String,
    /// Numeric member ID the event source invokes.
    pub member: i32,
    /// Declared parameter type tags, in source order.
    pub param_tags: Vec<Tag>,
    /// Declared parameter direction flags, in source order.
    pub param_flags: Vec<ParamFlags>,
    /// Documentation string from the event interface, if any.
    pub doc: Option<String>,
}

impl SinkMethod {
    /// Number of parameters the callback declares.
    pub fn arity(&self) -> usize {
        self.param_flags.len()
    }

    fn out_positions(&self) -> Vec<usize> {
        self.param_flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_out_param())
            .map(|(position, _)| position)
            .collect()
    }
}

/// A sink registered with a foreign event source.
///
/// Forwards each inbound callback to `receiver` using the upper-cased
/// member name. A callback whose ID, arity or receiver method does not
/// line up is answered with member-not-found and no host message is
/// sent — the sink never invents a call.
pub struct EventSink {
    interface: InterfaceId,
    methods: Vec<SinkMethod>,
    receiver: HostObjectRef,
    context: Option<Arc<dyn HostContext>>,
}

impl EventSink {
    /// A sink for one event interface, forwarding to `receiver`.
    pub fn new(interface: InterfaceId, methods: Vec<SinkMethod>, receiver: HostObjectRef) -> Self {
        EventSink {
            interface,
            methods,
            receiver,
            context: None,
        }
    }

    /// A sink that attaches the calling thread to `context` around each
    /// delivery.
    pub fn with_context(
        interface: InterfaceId,
        methods: Vec<SinkMethod>,
        receiver: HostObjectRef,
        context: Arc<dyn HostContext>,
    ) -> Self {
        EventSink {
            interface,
            methods,
            receiver,
            context: Some(context),
        }
    }

    /// Identity negotiation: the base identity-query interface, the base
    /// dispatch interface, and exactly the registered event interface.
    pub fn supports_interface(&self, id: &InterfaceId) -> bool {
        *id == InterfaceId::unknown() || *id == InterfaceId::dispatch() || *id == self.interface
    }

    /// The registered event interface.
    pub fn interface(&self) -> &InterfaceId {
        &self.interface
    }

    /// The callback signatures this sink receives, for event-listing
    /// introspection.
    pub fn methods(&self) -> &[SinkMethod] {
        &self.methods
    }

    fn find_method(&self, member: i32) -> Option<&SinkMethod> {
        self.methods.iter().find(|m| m.member == member)
    }

    /// Write a result value back through an out-parameter slot,
    /// re-encoded against the slot's current tag.
    fn store_out(
        args: &mut [WireSlot],
        slot_index: usize,
        value: &HostValue,
    ) -> Result<(), ForeignFailure> {
        let target = args[slot_index].value().tag();
        let encoded = codec::encode(value, Some(target), slot_index + 1)
            .map_err(|_| ForeignFailure::TypeMismatch {
                argument: slot_index,
            })?;
        *args[slot_index].value_mut() = encoded.value;
        Ok(())
    }
}

impl ForeignDispatch for EventSink {
    fn member_id(&self, name: &str) -> Result<i32, ForeignFailure> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| m.member)
            .ok_or(ForeignFailure::MemberNotFound)
    }

    fn invoke(&self, request: InvokeRequest<'_>) -> Result<Option<WireValue>, ForeignFailure> {
        let _attach = match &self.context {
            Some(context) => context
                .attach_current_thread()
                .ok_or(ForeignFailure::MemberNotFound)?,
            None => AttachGuard::noop(),
        };

        let method = match self.find_method(request.member) {
            Some(method) => method.clone(),
            None => return Err(ForeignFailure::MemberNotFound),
        };

        // Arity and receiver checks come before any decoding; a miss is
        // answered without sending anything to the host object.
        let argc = request.args.len();
        let message = method.name.to_ascii_uppercase();
        if argc != method.arity() || !self.receiver.responds_to(&message) {
            return Err(ForeignFailure::MemberNotFound);
        }

        // Wire order is rightmost-first; decode into source order,
        // reporting the wire index of a failing argument.
        let mut host_args = vec![HostValue::Nil; argc];
        for (slot_index, slot) in request.args.iter().enumerate() {
            let decoded = codec::decode(slot.value())
                .map_err(|_| ForeignFailure::TypeMismatch {
                    argument: slot_index,
                })?;
            host_args[argc - 1 - slot_index] = decoded;
        }

        let result = self
            .receiver
            .send(&message, &host_args)
            .map_err(|error| ForeignFailure::Exception {
                source: method.name.clone(),
                description: error.0.clone(),
                code: DELIVERY_FAILED,
            })?;

        // Distribute a non-nil result into the declared out-parameters:
        // one out-parameter takes it directly; several only from a
        // one-dimensional host array, positionally in declared order.
        let outs = method.out_positions();
        if !result.is_nil() && !outs.is_empty() {
            if outs.len() == 1 {
                let slot_index = argc - 1 - outs[0];
                Self::store_out(&mut *request.args, slot_index, &result)?;
            } else if let HostValue::Array(values) = &result {
                if values.is_vector() {
                    for (position, element) in outs.iter().zip(values.elements()) {
                        let slot_index = argc - 1 - *position;
                        Self::store_out(&mut *request.args, slot_index, element)?;
                    }
                }
            }
        }

        if request.want_result && !result.is_nil() {
            let encoded = codec::encode(&result, None, 1)
                .map_err(|_| ForeignFailure::BadVarType)?;
            return Ok(Some(encoded.value));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_negotiation() {
        struct Silent;
        impl automat_core::host::HostReceiver for Silent {
            fn responds_to(&self, _name: &str) -> bool {
                false
            }
            fn send(
                &self,
                _name: &str,
                _args: &[HostValue],
            ) -> Result<HostValue, automat_core::host::HostSendError> {
                Ok(HostValue::Nil)
            }
        }
        let sink = EventSink::new(
            InterfaceId::new("{EVT-1}"),
            Vec::new(),
            Arc::new(Silent),
        );
        assert!(sink.supports_interface(&InterfaceId::unknown()));
        assert!(sink.supports_interface(&InterfaceId::dispatch()));
        assert!(sink.supports_interface(&InterfaceId::new("{EVT-1}")));
        assert!(!sink.supports_interface(&InterfaceId::new("{EVT-2}")));
    }

    #[test]
    fn test_member_id_scans_by_name() {
        struct Silent;
        impl automat_core::host::HostReceiver for Silent {
            fn responds_to(&self, _name: &str) -> bool {
                false
            }
            fn send(
                &self,
                _name: &str,
                _args: &[HostValue],
            ) -> Result<HostValue, automat_core::host::HostSendError> {
                Ok(HostValue::Nil)
            }
        }
        let sink = EventSink::new(
            InterfaceId::new("{EVT}"),
            vec![SinkMethod {
                name: "OnChange".to_string(),
                member: 17,
                param_tags: vec![],
                param_flags: vec![],
                doc: None,
            }],
            Arc::new(Silent),
        );
        assert_eq!(sink.member_id("onchange"), Ok(17));
        assert_eq!(sink.member_id("OnClose"), Err(ForeignFailure::MemberNotFound));
    }
}
