//! Type-library introspection
//!
//! Walks a class's type description and its containing library to
//! populate the descriptor cache with callable-member signatures and
//! named constants. A member whose description cannot be read is
//! skipped; the populate pass itself never fails.

use crate::cache::{DescriptorCache, DescriptorId};
use crate::descriptor::{ConstantDescriptor, InvokeKind, MemberDescriptor, ParamFlags};
use automat_core::tag::Tag;
use automat_core::value::WireValue;
use std::sync::Arc;

/// Kind of one type description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Named integer constants.
    Enum,
    /// Plain (vtable) interface.
    Interface,
    /// Dynamic-dispatchable interface.
    Dispatch,
    /// Alias for another type.
    Alias,
    /// Module of constants and static members.
    Module,
    /// Component class.
    Coclass,
    /// Structure.
    Record,
    /// Union.
    Union,
}

/// Attributes of one type description.
#[derive(Debug, Clone)]
pub struct TypeAttributes {
    /// Identity string of this description.
    pub identity: String,
    /// What kind of type this describes.
    pub kind: TypeKind,
    /// Number of function descriptions.
    pub functions: usize,
    /// Number of variable descriptions.
    pub variables: usize,
}

/// A declared parameter or return type: either a known wire tag or an
/// opaque reference into the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Resolved wire tag.
    Known(Tag),
    /// Opaque user-defined type, to be resolved through the library.
    UserDefined(u32),
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParamDescription {
    /// Declared type.
    pub ty: ParamType,
    /// Direction and presence flags.
    pub flags: ParamFlags,
}

/// One callable member as the library describes it.
#[derive(Debug, Clone)]
pub struct FunctionDescription {
    /// Member name.
    pub name: String,
    /// Numeric member ID.
    pub member: i32,
    /// Invocation kind.
    pub kind: InvokeKind,
    /// Declared return type.
    pub ret: ParamType,
    /// Number of required parameters.
    pub required: u16,
    /// Number of optional parameters.
    pub optional: u16,
    /// Declared parameters.
    pub params: Vec<ParamDescription>,
}

/// One variable description: a named constant with its materialized
/// value.
#[derive(Debug, Clone)]
pub struct VariableDescription {
    /// Constant name.
    pub name: String,
    /// Numeric member ID.
    pub member: i32,
    /// Materialized value.
    pub value: WireValue,
}

/// One type description within a library.
pub trait TypeDescription: Send + Sync {
    /// The description's attributes.
    fn attributes(&self) -> TypeAttributes;

    /// Function description at `index`, if readable.
    fn function(&self, index: usize) -> Option<FunctionDescription>;

    /// Variable description at `index`, if readable.
    fn variable(&self, index: usize) -> Option<VariableDescription>;

    /// Follow an opaque type reference to its underlying description.
    fn resolve_ref(&self, href: u32) -> Option<Arc<dyn TypeDescription>>;

    /// For an alias, the type it stands for.
    fn aliased(&self) -> Option<ParamType> {
        None
    }

    /// The library containing this description.
    fn containing_library(&self) -> Option<Arc<dyn TypeLibrary>>;
}

/// An auxiliary type library.
pub trait TypeLibrary: Send + Sync {
    /// Identity string of the library.
    fn identity(&self) -> String;

    /// Number of type descriptions in the library.
    fn len(&self) -> usize;

    /// True if the library holds no descriptions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type description at `index`, if readable.
    fn type_description(&self, index: usize) -> Option<Arc<dyn TypeDescription>>;

    /// The library's primary description, covering inherited and
    /// default members of its classes.
    fn primary(&self) -> Option<Arc<dyn TypeDescription>>;
}

// Alias chains observed in the wild are shallow; the cap only guards
// against cyclic libraries.
const MAX_ALIAS_DEPTH: usize = 32;

/// Resolve a declared type to a wire tag, following opaque references
/// by kind. Unresolvable kinds keep the opaque tag.
pub fn resolve_param_type(desc: &dyn TypeDescription, ty: ParamType) -> Tag {
    resolve_depth(desc, ty, 0)
}

fn resolve_depth(desc: &dyn TypeDescription, ty: ParamType, depth: usize) -> Tag {
    if depth >= MAX_ALIAS_DEPTH {
        return Tag::UserDefined;
    }
    let href = match ty {
        ParamType::Known(tag) => return tag,
        ParamType::UserDefined(href) => href,
    };
    let Some(target) = desc.resolve_ref(href) else {
        return Tag::UserDefined;
    };
    match target.attributes().kind {
        TypeKind::Enum => Tag::I4,
        TypeKind::Interface => Tag::Unknown,
        TypeKind::Dispatch => Tag::Dispatch,
        TypeKind::Alias => match target.aliased() {
            Some(inner) => resolve_depth(target.as_ref(), inner, depth + 1),
            None => Tag::UserDefined,
        },
        _ => Tag::UserDefined,
    }
}

/// Populate a cached descriptor from a type description.
///
/// Walks the class's own function descriptions, then the containing
/// library's primary description, appending each member through the
/// cache's duplicate check. Constants are populated once per library
/// identity and attached to the descriptor by reference. Never fails;
/// unreadable members are skipped.
pub fn populate(desc: &Arc<dyn TypeDescription>, cache: &DescriptorCache, id: DescriptorId) {
    append_functions(desc.as_ref(), cache, id);

    let library = desc.containing_library();
    if let Some(library) = &library {
        if let Some(primary) = library.primary() {
            append_functions(primary.as_ref(), cache, id);
        }

        let identity = library.identity();
        let constants =
            cache.library_constants(&identity, || Arc::new(collect_constants(library.as_ref())));
        cache.with_mut(id, |d| {
            d.library_identity = Some(identity);
            d.set_constants(constants);
        });
    }
}

fn append_functions(desc: &dyn TypeDescription, cache: &DescriptorCache, id: DescriptorId) {
    let attributes = desc.attributes();
    for index in 0..attributes.functions {
        let Some(function) = desc.function(index) else {
            continue;
        };
        let member = MemberDescriptor {
            name: function.name,
            member: function.member,
            kind: function.kind,
            return_tag: resolve_param_type(desc, function.ret),
            required: function.required,
            optional: function.optional,
            param_tags: function
                .params
                .iter()
                .map(|p| resolve_param_type(desc, p.ty))
                .collect(),
            param_flags: function.params.iter().map(|p| p.flags).collect(),
        };
        cache.append_member(id, member);
    }
}

/// Scan a library for enumerations and modules and collect their
/// constants.
fn collect_constants(library: &dyn TypeLibrary) -> Vec<ConstantDescriptor> {
    let mut constants = Vec::new();
    for index in 0..library.len() {
        let Some(desc) = library.type_description(index) else {
            continue;
        };
        let attributes = desc.attributes();
        if !matches!(attributes.kind, TypeKind::Enum | TypeKind::Module) {
            continue;
        }
        for at in 0..attributes.variables {
            let Some(variable) = desc.variable(at) else {
                continue;
            };
            constants.push(ConstantDescriptor {
                name: variable.name,
                member: variable.member,
                value: variable.value,
            });
        }
    }
    constants
}
