//! Method and constant resolution
//!
//! A pure linear scan over a class's member list. First match wins;
//! there is no best-fit scoring beyond declaration order — this is
//! observed behavior of the component model the bridge preserves for
//! compatibility. A same-name, same-kind candidate whose arity filter
//! failed is reported as a weak match: the caller gets an ID it must
//! treat as unreliable and retry with widened acceptance.

use crate::descriptor::ClassDescriptor;
use automat_core::error::ForeignFailure;
use automat_core::foreign::{ForeignDispatch, KindFlags};

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A member matched name, kind class and arity.
    Exact {
        /// The member's numeric ID.
        member: i32,
        /// Index of the matched descriptor in the class's member list.
        index: usize,
    },
    /// A member matched name and kind class but not arity; the ID is
    /// unreliable and the live call must widen its acceptance.
    Weak {
        /// The first same-name, same-kind candidate's ID.
        member: i32,
    },
    /// Nothing matched.
    Unresolved,
}

impl Resolution {
    /// True unless nothing matched.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

/// Scan the member list for `name` with a matching invocation-kind
/// class. `argc` of `None` widens the arity filter to accept any
/// member of the right name and kind.
///
/// `kinds` uses the wire flags: property-put and put-by-reference are
/// one kind class, distinct from get and method.
pub fn resolve_member(
    descriptor: &ClassDescriptor,
    name: &str,
    kinds: KindFlags,
    argc: Option<usize>,
) -> Resolution {
    let mut weak: Option<i32> = None;
    for (index, member) in descriptor.members().iter().enumerate() {
        if !member.matches_name(name) {
            continue;
        }
        let member_kinds = member.kind.flags();
        let kind_matches = if member.kind.is_put() {
            kinds.is_put()
        } else {
            kinds.contains(member_kinds)
        };
        if !kind_matches {
            continue;
        }
        match argc {
            Some(argc) if member.max_args() < argc => {
                if weak.is_none() {
                    weak = Some(member.member);
                }
            }
            _ => {
                return Resolution::Exact {
                    member: member.member,
                    index,
                }
            }
        }
    }
    match weak {
        Some(member) => Resolution::Weak { member },
        None => Resolution::Unresolved,
    }
}

/// Ask the live foreign object for a member ID by name: the fast
/// dynamic-extension path first, then the baseline name→ID lookup.
/// This path never yields a descriptor, only an ID.
pub fn resolve_live(target: &dyn ForeignDispatch, name: &str) -> Result<i32, ForeignFailure> {
    if let Some(member) = target.member_id_ex(name) {
        return Ok(member);
    }
    target.member_id(name)
}
