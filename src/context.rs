//! The evaluation cursor and the value caches created against it.
use crate::cache::ValueCache;
use crate::field::FieldId;
use crate::location::{DomainLocation, ElementId, Location, NodeId};
use log::debug;
use rustc_hash::FxHashMap;

/// The current location at which fields of one module are evaluated, together with the
/// cached values of every field evaluated there.
///
/// Every change of location increments the generation of the context, which invalidates all
/// caches at once. Caches are only recomputed when they are next requested.
#[derive(Debug)]
pub struct EvaluationContext {
    pub(crate) module_id: u64,
    location: Location,
    generation: u64,
    derivatives_requested: bool,
    /// Revision of the module definitions that the caches were computed against.
    pub(crate) seen_revision: u64,
    pub(crate) caches: FxHashMap<FieldId, ValueCache>,
}

impl EvaluationContext {
    pub(crate) fn new(module_id: u64, revision: u64) -> Self {
        Self {
            module_id,
            location: Location::default(),
            generation: 0,
            derivatives_requested: false,
            seen_revision: revision,
            caches: FxHashMap::default(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn derivatives_requested(&self) -> bool {
        self.derivatives_requested
    }

    /// Number of derivative directions computed per component: the number of reference
    /// coordinates if derivatives are requested at an element location, zero otherwise.
    pub fn number_of_xi(&self) -> usize {
        match (&self.location.domain, self.derivatives_requested) {
            (DomainLocation::Element { xi, .. }, true) => xi.len(),
            _ => 0,
        }
    }

    /// The cache of a field, if it has been evaluated in this context. It may be stale.
    pub(crate) fn cache(&self, field: FieldId) -> Option<&ValueCache> {
        self.caches.get(&field)
    }

    pub fn set_location(&mut self, location: Location) {
        if self.location != location {
            self.location = location;
            self.invalidate();
        }
    }

    pub fn set_element_location(&mut self, element: ElementId, xi: &[f64]) {
        let time = self.location.time;
        self.set_location(Location::element(element, xi, time));
    }

    pub fn set_node(&mut self, node: NodeId) {
        let time = self.location.time;
        self.set_location(Location::node(node, time));
    }

    pub fn set_time(&mut self, time: f64) {
        if self.location.time != time {
            self.location.time = time;
            self.invalidate();
        }
    }

    /// Resets the domain location, keeping the time.
    pub fn clear_location(&mut self) {
        if self.location.domain != DomainLocation::Unset {
            self.location.domain = DomainLocation::Unset;
            self.invalidate();
        }
    }

    pub fn set_derivatives_requested(&mut self, requested: bool) {
        if self.derivatives_requested != requested {
            self.derivatives_requested = requested;
            self.invalidate();
        }
    }

    /// Invalidates every cache by advancing the generation.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Catches up with definition changes in the module: advances the generation once if
    /// anything changed, and drops the caches of destroyed fields.
    pub(crate) fn synchronize<F>(&mut self, revision: u64, is_live: F)
    where
        F: Fn(FieldId) -> bool,
    {
        if self.seen_revision != revision {
            debug!(
                "Module revision {} -> {}, invalidating generation {}",
                self.seen_revision, revision, self.generation
            );
            self.seen_revision = revision;
            self.caches.retain(|&id, _| is_live(id));
            self.invalidate();
        }
    }
}
