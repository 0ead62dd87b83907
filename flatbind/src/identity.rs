//! Identity service — stable per-run integers for symbol names.

use std::collections::HashMap;

use crate::model::EntityId;

/// A model object that can receive an identity.
///
/// Scopes are keyed by their owning entity; enum constants by their
/// enumeration plus ordinal, since neither is an entity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identified {
    Entity(EntityId),
    Scope(EntityId),
    EnumConstant(EntityId, u32),
}

/// Memoized object-to-integer assignment.
///
/// For any number of calls with the same key, [`IdentityMap::id`] returns
/// the same integer; distinct keys get distinct integers, assigned in
/// first-seen order starting from 1. There is no removal. The integers are
/// only meaningful within one generator run — every derived symbol name in
/// a single run agrees, and that is all the emission passes need.
#[derive(Debug, Default)]
pub struct IdentityMap {
    assigned: HashMap<Identified, u32>,
    next: u32,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, key: Identified) -> u32 {
        if let Some(got) = self.assigned.get(&key) {
            return *got;
        }
        self.next += 1;
        self.assigned.insert(key, self.next);
        self.next
    }
}
