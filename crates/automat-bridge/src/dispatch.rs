//! Dynamic invocation dispatcher
//!
//! Orchestrates a single dynamic call: resolves the member, marshals
//! in-arguments (framing declared out-parameters by reference), invokes
//! with the member-not-found retry ladder, demarshals the result and
//! out-parameters, and translates foreign failure codes into the host
//! error taxonomy. State is strictly per call; the only shared state is
//! the descriptor cache the dispatcher borrows.

use crate::cache::{DescriptorCache, DescriptorId};
use crate::codec;
use crate::descriptor::MemberDescriptor;
use crate::resolve::{resolve_live, resolve_member, Resolution};
use automat_core::error::{BridgeError, BridgeResult, ForeignFailure};
use automat_core::foreign::{ForeignRef, InvokeRequest, KindFlags, PROPERTY_VALUE_SLOT};
use automat_core::host::{AttachGuard, HostContext, HostValue};
use automat_core::value::{WireSlot, WireValue};

/// The foreign convention name for indexed access, tried when the host
/// convention names miss.
const INDEXED_ACCESS_NAME: &str = "Item";

/// The two host-convention aliases for indexed access.
fn is_indexed_access_alias(name: &str) -> bool {
    name == "[]" || name.eq_ignore_ascii_case("at")
}

/// Result of one dispatched call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallOutcome {
    /// The decoded return value; nil for a call that produced none.
    pub result: HostValue,
    /// Decoded out-parameter values, in source argument order.
    pub out_values: Vec<HostValue>,
}

struct ResolvedMember {
    member: i32,
    /// Index into the class's member list; `None` marks an unreliable
    /// (weak or live-lookup) resolution.
    index: Option<usize>,
    /// Invocation kinds the live call will accept.
    kinds: KindFlags,
}

/// The per-call invocation engine.
pub struct Dispatcher<'a> {
    cache: &'a DescriptorCache,
    context: Option<&'a dyn HostContext>,
}

impl<'a> Dispatcher<'a> {
    /// A dispatcher over the given cache, with no host context to
    /// attach to.
    pub fn new(cache: &'a DescriptorCache) -> Self {
        Dispatcher {
            cache,
            context: None,
        }
    }

    /// A dispatcher that attaches the calling thread to `context` for
    /// the duration of each call.
    pub fn with_context(cache: &'a DescriptorCache, context: &'a dyn HostContext) -> Self {
        Dispatcher {
            cache,
            context: Some(context),
        }
    }

    /// Invoke `name` on a foreign object.
    ///
    /// A trailing assignment marker on `name` reclassifies the call as
    /// a property-put. `descriptor` is the object's cached class
    /// descriptor, if it has one; without it, resolution falls back to
    /// the live object.
    pub fn invoke(
        &self,
        target: &ForeignRef,
        descriptor: Option<DescriptorId>,
        name: &str,
        args: &[HostValue],
    ) -> BridgeResult<CallOutcome> {
        let _attach = match self.context {
            Some(context) => context
                .attach_current_thread()
                .ok_or(BridgeError::Foreign(ForeignFailure::MemberNotFound))?,
            None => AttachGuard::noop(),
        };

        let (bare, put) = match name.strip_suffix('=') {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        let argc = args.len();

        let resolved = self
            .resolve_target(descriptor, target, bare, put, argc)
            .or_else(|| {
                if is_indexed_access_alias(bare) {
                    self.resolve_target(descriptor, target, INDEXED_ACCESS_NAME, put, argc)
                } else {
                    None
                }
            })
            .ok_or_else(|| BridgeError::UnknownMember {
                name: name.to_string(),
            })?;

        let member_desc: Option<MemberDescriptor> = match (descriptor, resolved.index) {
            (Some(id), Some(index)) => {
                Some(self.cache.with(id, |d| d.members()[index].clone()))
            }
            _ => None,
        };

        // Marshal right-to-left into a frame sized 2x the argument
        // count. The upper half holds pristine copies of the
        // out-classified slots; the copies keep the original foreign
        // references alive until cleanup even if the callee overwrites
        // a slot.
        let mut frame: Vec<WireSlot> = Vec::with_capacity(argc * 2);
        let mut shadow: Vec<WireSlot> = Vec::with_capacity(argc);
        let mut out_frames: Vec<usize> = Vec::new();
        for (slot_index, position) in (0..argc).rev().enumerate() {
            let arg = &args[position];
            let declared = member_desc.as_ref().and_then(|m| m.param_tag(position));
            let explicit_out = matches!(arg, HostValue::Wrapped(w) if w.out);
            let declared_out = member_desc
                .as_ref()
                .map(|m| m.param_flag(position).is_out_param())
                .unwrap_or(false);
            let out = explicit_out || declared_out;

            let encoded = codec::encode(arg, declared, position + 1)?;
            if out {
                shadow.push(WireSlot::Direct(encoded.value.clone()));
                frame.push(WireSlot::by_ref(encoded.value));
                out_frames.push(slot_index);
            } else {
                shadow.push(WireSlot::Direct(WireValue::Empty));
                frame.push(WireSlot::Direct(encoded.value));
            }
        }
        frame.append(&mut shadow);

        // A property-put passes its new value through the fixed
        // property-value named slot; rightmost-first order puts it at
        // slot 0.
        let named: Vec<(i32, usize)> = if resolved.kinds.is_put() {
            vec![(PROPERTY_VALUE_SLOT, 0)]
        } else {
            Vec::new()
        };

        let (live, _pristine) = frame.split_at_mut(argc);
        let mut outcome = target.invoke(InvokeRequest {
            member: resolved.member,
            kind: resolved.kinds,
            args: &mut *live,
            named: &named,
            want_result: true,
        });

        // Member-not-found ladder: retry as property-get with the same
        // arguments, then once more with no result slot. All attempts
        // share the argument array.
        if matches!(outcome, Err(ForeignFailure::MemberNotFound))
            && !resolved.kinds.contains(KindFlags::GET)
            && !resolved.kinds.is_put()
        {
            outcome = target.invoke(InvokeRequest {
                member: resolved.member,
                kind: resolved.kinds | KindFlags::GET,
                args: &mut *live,
                named: &named,
                want_result: true,
            });
        }
        if matches!(outcome, Err(ForeignFailure::MemberNotFound)) {
            outcome = target.invoke(InvokeRequest {
                member: resolved.member,
                kind: resolved.kinds,
                args: &mut *live,
                named: &named,
                want_result: false,
            });
        }

        match outcome {
            Ok(result) => {
                let out_values = Self::drain_outs(live, &out_frames, argc, args, true)?;
                let result = match result {
                    Some(value) => codec::decode(&value)?,
                    None => HostValue::Nil,
                };
                Ok(CallOutcome { result, out_values })
            }
            Err(failure) => {
                // Cleanup runs before the error is raised.
                let _ = Self::drain_outs(live, &out_frames, argc, args, false);
                Err(Self::translate(failure, name, argc))
            }
        }
    }

    /// Resolve a member against the cache, then the live object.
    fn resolve_target(
        &self,
        descriptor: Option<DescriptorId>,
        target: &ForeignRef,
        name: &str,
        put: bool,
        argc: usize,
    ) -> Option<ResolvedMember> {
        let wanted = if put {
            KindFlags::PUT | KindFlags::PUT_REF
        } else if argc == 0 {
            KindFlags::METHOD | KindFlags::GET
        } else {
            KindFlags::METHOD
        };
        // A weak or live resolution cannot pin the kind down, so the
        // live call accepts any accessibility kind of its class.
        let widened = if put {
            KindFlags::PUT | KindFlags::PUT_REF
        } else {
            KindFlags::METHOD | KindFlags::GET
        };

        if let Some(id) = descriptor {
            let first = self
                .cache
                .with(id, |d| resolve_member(d, name, wanted, Some(argc)));
            match first {
                Resolution::Exact { member, index } => {
                    let kinds = self.cache.with(id, |d| d.members()[index].kind.flags());
                    return Some(ResolvedMember {
                        member,
                        index: Some(index),
                        kinds,
                    });
                }
                Resolution::Weak { member } => {
                    // Widen the arity filter before settling for the
                    // weak ID.
                    let wide = self.cache.with(id, |d| resolve_member(d, name, wanted, None));
                    if let Resolution::Exact { member, index } = wide {
                        let kinds = self.cache.with(id, |d| d.members()[index].kind.flags());
                        return Some(ResolvedMember {
                            member,
                            index: Some(index),
                            kinds,
                        });
                    }
                    return Some(ResolvedMember {
                        member,
                        index: None,
                        kinds: widened,
                    });
                }
                Resolution::Unresolved => {}
            }
        }

        resolve_live(target.as_ref(), name)
            .ok()
            .map(|member| ResolvedMember {
                member,
                index: None,
                kinds: widened,
            })
    }

    /// Collapse every out-parameter's by-reference framing, decoding
    /// the updated values back to host objects when `decode` is set and
    /// pushing them into arguments that support in-place update.
    ///
    /// Collapsing always runs to completion so no indirection cell
    /// survives the call, even when a decode fails mid-way.
    fn drain_outs(
        live: &mut [WireSlot],
        out_frames: &[usize],
        argc: usize,
        args: &[HostValue],
        decode: bool,
    ) -> BridgeResult<Vec<HostValue>> {
        let mut out_values = Vec::new();
        let mut first_error: Option<BridgeError> = None;
        // Frame order is rightmost-first; walk it backwards so the
        // collected values come out in source order.
        for &slot_index in out_frames.iter().rev() {
            let value = std::mem::replace(&mut live[slot_index], WireSlot::Direct(WireValue::Empty))
                .collapse();
            if !decode || first_error.is_some() {
                continue;
            }
            match codec::decode(&value) {
                Ok(decoded) => {
                    let position = argc - 1 - slot_index;
                    match &args[position] {
                        HostValue::Object(receiver) => {
                            receiver.update(&decoded);
                        }
                        HostValue::Wrapped(wrapper) => {
                            if let HostValue::Object(receiver) = &wrapper.value {
                                receiver.update(&decoded);
                            }
                        }
                        _ => {}
                    }
                    out_values.push(decoded);
                }
                Err(error) => first_error = Some(error),
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(out_values),
        }
    }

    /// Map a foreign failure to the host taxonomy. The type-mismatch
    /// index comes back in wire (rightmost-first, 0-based) terms and is
    /// translated to the 1-based source position.
    fn translate(failure: ForeignFailure, name: &str, argc: usize) -> BridgeError {
        match failure {
            ForeignFailure::MemberNotFound => BridgeError::UnknownMember {
                name: name.to_string(),
            },
            ForeignFailure::TypeMismatch { argument } if argument < argc => {
                BridgeError::Foreign(ForeignFailure::TypeMismatch {
                    argument: argc - argument,
                })
            }
            other => BridgeError::Foreign(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_access_aliases() {
        assert!(is_indexed_access_alias("[]"));
        assert!(is_indexed_access_alias("at"));
        assert!(is_indexed_access_alias("AT"));
        assert!(!is_indexed_access_alias("Item"));
        assert!(!is_indexed_access_alias("atlas"));
    }

    #[test]
    fn test_type_mismatch_index_translation() {
        // Three arguments, wire index 0 is the rightmost: source
        // position 3.
        let e = Dispatcher::translate(ForeignFailure::TypeMismatch { argument: 0 }, "M", 3);
        assert!(matches!(
            e,
            BridgeError::Foreign(ForeignFailure::TypeMismatch { argument: 3 })
        ));
        let e = Dispatcher::translate(ForeignFailure::TypeMismatch { argument: 2 }, "M", 3);
        assert!(matches!(
            e,
            BridgeError::Foreign(ForeignFailure::TypeMismatch { argument: 1 })
        ));
        // An index the frame cannot contain passes through untouched.
        let e = Dispatcher::translate(ForeignFailure::TypeMismatch { argument: 7 }, "M", 3);
        assert!(matches!(
            e,
            BridgeError::Foreign(ForeignFailure::TypeMismatch { argument: 7 })
        ));
    }

    #[test]
    fn test_member_not_found_becomes_unknown_member() {
        let e = Dispatcher::translate(ForeignFailure::MemberNotFound, "Frob", 0);
        assert!(matches!(e, BridgeError::UnknownMember { name } if name == "Frob"));
    }
}
