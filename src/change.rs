//! Change notifications delivered to observers of a field module.
use crate::field::FieldId;
use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

/// Set of changes that happened to a single field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ChangeFlags(u8);

impl ChangeFlags {
    pub const NONE: ChangeFlags = ChangeFlags(0);
    pub const ADDED: ChangeFlags = ChangeFlags(1);
    pub const REMOVED: ChangeFlags = ChangeFlags(1 << 1);
    /// Name or other identifying attribute changed.
    pub const IDENTIFIER: ChangeFlags = ChangeFlags(1 << 2);
    /// Operator or sources were replaced.
    pub const DEFINITION: ChangeFlags = ChangeFlags(1 << 3);
    /// Stored parameters changed, e.g. node values or constant values.
    pub const VALUES: ChangeFlags = ChangeFlags(1 << 4);
    /// A field that this field depends on changed.
    pub const DEPENDENCY: ChangeFlags = ChangeFlags(1 << 5);

    pub fn contains(&self, other: ChangeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: ChangeFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether the change can affect the values computed by the field or its dependents.
    pub fn affects_values(&self) -> bool {
        self.intersects(ChangeFlags::DEFINITION | ChangeFlags::VALUES | ChangeFlags::DEPENDENCY)
    }
}

impl BitOr for ChangeFlags {
    type Output = ChangeFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ChangeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The changes accumulated between the outermost
/// [`begin_change`](crate::module::FieldModule::begin_change) and
/// [`end_change`](crate::module::FieldModule::end_change).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    changes: BTreeMap<FieldId, ChangeFlags>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The changes of the field, empty if it did not change.
    pub fn flags(&self, field: FieldId) -> ChangeFlags {
        self.changes.get(&field).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, ChangeFlags)> + '_ {
        self.changes.iter().map(|(&id, &flags)| (id, flags))
    }

    pub(crate) fn record(&mut self, field: FieldId, flags: ChangeFlags) {
        *self.changes.entry(field).or_default() |= flags;
    }

    pub(crate) fn take(&mut self) -> ChangeBatch {
        std::mem::take(self)
    }
}
