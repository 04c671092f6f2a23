//! Process-wide descriptor cache
//!
//! A mutex-synchronized slot arena of [`ClassDescriptor`]s with
//! lookup-or-insert semantics. Slot indices are stable for the life of
//! the cache: freed slots are recycled, never returned, so a
//! [`DescriptorId`] handed out once stays valid until its descriptor is
//! released. The constant-library table lives beside the arena and is
//! populated once per library identity, shared by `Arc` across classes.

use crate::descriptor::{ClassDescriptor, ConstantSet, MemberDescriptor};
use automat_core::error::{BridgeError, BridgeResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Initial slot capacity; the arena doubles on exhaustion.
const INITIAL_SLOTS: usize = 10;

/// Stable handle to one cached class descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(usize);

#[derive(Default)]
struct SlotTable {
    slots: Vec<Option<ClassDescriptor>>,
    free: Vec<usize>,
    by_class_key: FxHashMap<String, usize>,
    by_type_identity: FxHashMap<String, usize>,
}

impl SlotTable {
    fn slot(&self, id: DescriptorId) -> &ClassDescriptor {
        self.slots[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("descriptor slot {} is not live", id.0))
    }

    fn slot_mut(&mut self, id: DescriptorId) -> &mut ClassDescriptor {
        self.slots[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("descriptor slot {} is not live", id.0))
    }
}

/// The descriptor cache: lookup-or-insert by class key or type identity.
pub struct DescriptorCache {
    table: Mutex<SlotTable>,
    libraries: DashMap<String, ConstantSet>,
}

impl DescriptorCache {
    /// An empty cache with the initial slot capacity.
    pub fn new() -> Self {
        let mut table = SlotTable::default();
        table.slots.reserve(INITIAL_SLOTS);
        DescriptorCache {
            table: Mutex::new(table),
            libraries: DashMap::new(),
        }
    }

    /// Look up a descriptor by class key, then by type identity; insert
    /// a fresh one on miss. At least one key must be supplied.
    ///
    /// The lookup itself does not touch the reference count; callers
    /// pair [`retain`](Self::retain)/[`release`](Self::release) around
    /// the lifetime of each bridged object. The only failure mode is
    /// resource exhaustion.
    pub fn find_or_create(
        &self,
        class_key: Option<&str>,
        type_identity: Option<&str>,
    ) -> BridgeResult<DescriptorId> {
        assert!(
            class_key.is_some() || type_identity.is_some(),
            "find_or_create needs at least one identity key"
        );
        let mut table = self.table.lock();

        if let Some(key) = class_key {
            if let Some(&at) = table.by_class_key.get(key) {
                return Ok(DescriptorId(at));
            }
        }
        if let Some(identity) = type_identity {
            if let Some(&at) = table.by_type_identity.get(identity) {
                return Ok(DescriptorId(at));
            }
        }

        let descriptor = ClassDescriptor::new(
            class_key.map(str::to_string),
            type_identity.map(str::to_string),
        );
        let at = match table.free.pop() {
            Some(at) => {
                table.slots[at] = Some(descriptor);
                at
            }
            None => {
                if table.slots.len() == table.slots.capacity() {
                    let grow = table.slots.capacity().max(INITIAL_SLOTS);
                    table
                        .slots
                        .try_reserve(grow)
                        .map_err(|_| BridgeError::Exhausted("descriptor slot table".to_string()))?;
                }
                table.slots.push(Some(descriptor));
                table.slots.len() - 1
            }
        };
        if let Some(key) = class_key {
            table.by_class_key.insert(key.to_string(), at);
        }
        if let Some(identity) = type_identity {
            table.by_type_identity.insert(identity.to_string(), at);
        }
        Ok(DescriptorId(at))
    }

    /// Increment the instance count of a descriptor.
    pub fn retain(&self, id: DescriptorId) {
        self.table.lock().slot_mut(id).retain();
    }

    /// Decrement the instance count; at zero the descriptor's owned data
    /// is cleared and its slot becomes eligible for reuse.
    pub fn release(&self, id: DescriptorId) {
        let mut table = self.table.lock();
        if table.slot_mut(id).release() > 0 {
            return;
        }
        let descriptor = table.slots[id.0].take();
        if let Some(descriptor) = descriptor {
            if let Some(key) = &descriptor.class_key {
                table.by_class_key.remove(key);
            }
            if let Some(identity) = &descriptor.type_identity {
                table.by_type_identity.remove(identity);
            }
        }
        table.free.push(id.0);
    }

    /// Read a descriptor under the lock.
    ///
    /// Panics if the slot was released; holding a [`DescriptorId`] past
    /// its matching `release` is a programming error.
    pub fn with<R>(&self, id: DescriptorId, f: impl FnOnce(&ClassDescriptor) -> R) -> R {
        f(self.table.lock().slot(id))
    }

    /// Mutate a descriptor under the lock.
    pub fn with_mut<R>(&self, id: DescriptorId, f: impl FnOnce(&mut ClassDescriptor) -> R) -> R {
        f(self.table.lock().slot_mut(id))
    }

    /// Append a member through the duplicate check. Returns false for a
    /// discarded duplicate.
    pub fn append_member(&self, id: DescriptorId, member: MemberDescriptor) -> bool {
        self.with_mut(id, |d| d.append_member(member))
    }

    /// The constant set of a library, building it on first encounter.
    /// Subsequent callers share the same set by reference.
    pub fn library_constants(
        &self,
        library_identity: &str,
        build: impl FnOnce() -> ConstantSet,
    ) -> ConstantSet {
        self.libraries
            .entry(library_identity.to_string())
            .or_insert_with(build)
            .clone()
    }

    /// The constant set of a library, if already populated.
    pub fn library_constants_cached(&self, library_identity: &str) -> Option<ConstantSet> {
        self.libraries.get(library_identity).map(|c| c.clone())
    }

    /// Number of live descriptors.
    pub fn live(&self) -> usize {
        let table = self.table.lock();
        table.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}
