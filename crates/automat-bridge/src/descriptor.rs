//! Cached descriptors for foreign classes
//!
//! A [`ClassDescriptor`] holds everything the bridge has learned about
//! one foreign class: its callable members, the constant set of its
//! type library, and its identity keys. Members are append-only;
//! duplicate insertions (same ID, kind, signature and name) are detected
//! and discarded.

use automat_core::foreign::KindFlags;
use automat_core::tag::Tag;
use automat_core::value::WireValue;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Invocation kind of one member, as declared by its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    /// Ordinary method.
    Method,
    /// Property read.
    PropertyGet,
    /// Property write.
    PropertyPut,
    /// Property write by reference.
    PropertyPutRef,
}

impl InvokeKind {
    /// The wire flags for invoking a member of this kind.
    pub fn flags(&self) -> KindFlags {
        match self {
            InvokeKind::Method => KindFlags::METHOD,
            InvokeKind::PropertyGet => KindFlags::GET,
            InvokeKind::PropertyPut => KindFlags::PUT,
            InvokeKind::PropertyPutRef => KindFlags::PUT_REF,
        }
    }

    /// True for the two property-write kinds, which form one kind class
    /// for resolution purposes.
    pub fn is_put(&self) -> bool {
        matches!(self, InvokeKind::PropertyPut | InvokeKind::PropertyPutRef)
    }
}

/// Direction and presence flags of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamFlags(u8);

impl ParamFlags {
    /// Value flows into the call.
    pub const IN: ParamFlags = ParamFlags(0b0000_0001);
    /// Value is written back by the call.
    pub const OUT: ParamFlags = ParamFlags(0b0000_0010);
    /// Parameter may be omitted.
    pub const OPTIONAL: ParamFlags = ParamFlags(0b0000_0100);
    /// Parameter has a declared default.
    pub const HAS_DEFAULT: ParamFlags = ParamFlags(0b0000_1000);
    /// Parameter is the return-value slot.
    pub const RETVAL: ParamFlags = ParamFlags(0b0001_0000);

    /// True if every flag in `other` is set here.
    pub const fn contains(&self, other: ParamFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True for a parameter the dispatcher must treat as an
    /// out-parameter: flagged out, and not the return-value slot.
    pub const fn is_out_param(&self) -> bool {
        self.contains(Self::OUT) && !self.contains(Self::RETVAL)
    }
}

impl std::ops::BitOr for ParamFlags {
    type Output = ParamFlags;

    fn bitor(self, rhs: ParamFlags) -> ParamFlags {
        ParamFlags(self.0 | rhs.0)
    }
}

/// Cached signature of one callable member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    /// Member name; matched case-insensitively.
    pub name: String,
    /// Numeric member ID.
    pub member: i32,
    /// Declared invocation kind.
    pub kind: InvokeKind,
    /// Declared return type tag.
    pub return_tag: Tag,
    /// Number of required parameters.
    pub required: u16,
    /// Number of optional parameters.
    pub optional: u16,
    /// Per-parameter type tags.
    pub param_tags: Vec<Tag>,
    /// Per-parameter direction flags.
    pub param_flags: Vec<ParamFlags>,
}

impl MemberDescriptor {
    /// Greatest argument count this member accepts.
    pub fn max_args(&self) -> usize {
        self.required as usize + self.optional as usize
    }

    /// Case-insensitive name match.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Declared tag of the parameter at `position`, if any.
    pub fn param_tag(&self, position: usize) -> Option<Tag> {
        self.param_tags.get(position).copied()
    }

    /// Declared flags of the parameter at `position`.
    pub fn param_flag(&self, position: usize) -> ParamFlags {
        self.param_flags.get(position).copied().unwrap_or_default()
    }
}

/// A named constant drawn from a type library.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDescriptor {
    /// Constant name; matched case-insensitively.
    pub name: String,
    /// Numeric member ID within its enumeration or module.
    pub member: i32,
    /// The materialized value.
    pub value: WireValue,
}

/// The constant set of one type library, shared across every class
/// drawn from that library.
pub type ConstantSet = Arc<Vec<ConstantDescriptor>>;

static EMPTY_CONSTANTS: Lazy<ConstantSet> = Lazy::new(|| Arc::new(Vec::new()));

/// An empty constant set (the initial state of every descriptor).
pub fn empty_constants() -> ConstantSet {
    EMPTY_CONSTANTS.clone()
}

/// Cached metadata for one foreign class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Class identity key (the class key string), if known.
    pub class_key: Option<String>,
    /// Human-readable program identifier, if known.
    pub prog_id: Option<String>,
    /// Identity of the type description this descriptor was built from.
    pub type_identity: Option<String>,
    /// Identity of the containing type library, once introspected.
    pub library_identity: Option<String>,
    members: Vec<MemberDescriptor>,
    constants: ConstantSet,
    refs: u32,
}

impl ClassDescriptor {
    /// A fresh descriptor with the given identity keys.
    pub fn new(class_key: Option<String>, type_identity: Option<String>) -> Self {
        ClassDescriptor {
            class_key,
            prog_id: None,
            type_identity,
            library_identity: None,
            members: Vec::new(),
            constants: empty_constants(),
            refs: 0,
        }
    }

    /// The member list, in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// The shared constant set.
    pub fn constants(&self) -> &ConstantSet {
        &self.constants
    }

    /// Replace the constant set with a library's shared set.
    pub fn set_constants(&mut self, constants: ConstantSet) {
        self.constants = constants;
    }

    /// Append a member unless an identical one is already present.
    /// Returns false for a discarded duplicate.
    pub fn append_member(&mut self, member: MemberDescriptor) -> bool {
        let duplicate = self.members.iter().any(|m| {
            m.member == member.member
                && m.kind == member.kind
                && m.param_tags == member.param_tags
                && m.required == member.required
                && m.optional == member.optional
                && m.matches_name(&member.name)
        });
        if duplicate {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Linear scan for a constant by name. A miss is an ordinary
    /// outcome, not an error.
    pub fn find_constant(&self, name: &str) -> Option<&ConstantDescriptor> {
        self.constants
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Current instance reference count.
    pub fn refs(&self) -> u32 {
        self.refs
    }

    pub(crate) fn retain(&mut self) {
        self.refs += 1;
    }

    pub(crate) fn release(&mut self) -> u32 {
        self.refs = self.refs.saturating_sub(1);
        self.refs
    }
}
