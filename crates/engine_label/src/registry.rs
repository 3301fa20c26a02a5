//! The label registry.
//!
//! Two indexes are kept in lockstep: labels per entity and entities per label.
//! Every mutation updates both before returning, and buckets are dropped as
//! soon as they empty out, so queries never see a stale entry.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use engine_component::Entity;
use tracing::{debug, trace};

/// Shared, single-threaded handle to a [`LabelRegistry`].
pub type SharedLabels = Rc<RefCell<LabelRegistry>>;

/// Bidirectional `entity ↔ set<label>` index.
///
/// All operations are total: querying an unknown entity or label yields an
/// empty result rather than an error.
#[derive(Debug, Default)]
pub struct LabelRegistry {
    /// Labels carried by each entity.
    by_entity: HashMap<Entity, BTreeSet<String>>,
    /// Bearers of each label, ordered so iteration is consistent.
    by_label: HashMap<String, BTreeSet<Entity>>,
}

impl LabelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a new registry in a [`SharedLabels`] handle.
    #[must_use]
    pub fn shared() -> SharedLabels {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Attach `label` to `entity`. No-op if it is already attached.
    pub fn add_label(&mut self, entity: Entity, label: &str) {
        if !entity.is_valid() {
            return;
        }
        let inserted = self
            .by_entity
            .entry(entity)
            .or_default()
            .insert(label.to_owned());
        if inserted {
            self.by_label
                .entry(label.to_owned())
                .or_default()
                .insert(entity);
            trace!(entity = %entity, label, "label added");
        }
    }

    /// Detach `label` from `entity`. No-op if it is not attached.
    pub fn remove_label(&mut self, entity: Entity, label: &str) {
        let Some(labels) = self.by_entity.get_mut(&entity) else {
            return;
        };
        if !labels.remove(label) {
            return;
        }
        if labels.is_empty() {
            self.by_entity.remove(&entity);
        }
        self.detach_from_bucket(entity, label);
        trace!(entity = %entity, label, "label removed");
    }

    /// Purge every label of `entity`. Safe to call for unlabeled entities.
    pub fn remove_entity(&mut self, entity: Entity) {
        let Some(labels) = self.by_entity.remove(&entity) else {
            return;
        };
        for label in &labels {
            self.detach_from_bucket(entity, label);
        }
        debug!(entity = %entity, count = labels.len(), "entity purged from label registry");
    }

    fn detach_from_bucket(&mut self, entity: Entity, label: &str) {
        if let Some(bucket) = self.by_label.get_mut(label) {
            bucket.remove(&entity);
            if bucket.is_empty() {
                self.by_label.remove(label);
            }
        }
    }

    /// Returns `true` if `entity` carries `label`.
    #[must_use]
    pub fn has_label(&self, entity: Entity, label: &str) -> bool {
        self.by_entity
            .get(&entity)
            .is_some_and(|labels| labels.contains(label))
    }

    /// Returns `true` if `entity` carries at least one of `labels`.
    ///
    /// An empty list places no restriction and always matches.
    #[must_use]
    pub fn has_any_label<S: AsRef<str>>(&self, entity: Entity, labels: &[S]) -> bool {
        if labels.is_empty() {
            return true;
        }
        self.by_entity
            .get(&entity)
            .is_some_and(|own| labels.iter().any(|l| own.contains(l.as_ref())))
    }

    /// Iterate the labels of `entity` in lexical order.
    pub fn labels_of(&self, entity: Entity) -> impl Iterator<Item = &str> + '_ {
        self.by_entity
            .get(&entity)
            .into_iter()
            .flat_map(|labels| labels.iter().map(String::as_str))
    }

    /// Returns one bearer of `label` other than `requester`.
    ///
    /// When several entities qualify, which one is returned is unspecified.
    /// Callers must not rely on a particular choice.
    #[must_use]
    pub fn find_first(&self, requester: Entity, label: &str) -> Option<Entity> {
        let bucket = self.by_label.get(label)?;
        let mut candidates = bucket.iter().copied().filter(|&e| e != requester);
        let found = candidates.next()?;
        if candidates.next().is_some() {
            debug!(
                requester = %requester,
                label,
                "multiple entities carry label, returning an arbitrary one"
            );
        }
        Some(found)
    }

    /// All current bearers of `label`.
    #[must_use]
    pub fn find_all(&self, label: &str) -> BTreeSet<Entity> {
        self.by_label.get(label).cloned().unwrap_or_default()
    }

    /// Union of the bearers of every label in `labels`.
    #[must_use]
    pub fn find_all_any<S: AsRef<str>>(&self, labels: &[S]) -> BTreeSet<Entity> {
        labels
            .iter()
            .filter_map(|l| self.by_label.get(l.as_ref()))
            .flatten()
            .copied()
            .collect()
    }

    /// Iterate labels that currently have at least one bearer.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_label.keys().map(String::as_str)
    }

    /// Returns the number of labels with at least one bearer.
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.by_label.len()
    }

    /// Returns the number of entities carrying at least one label.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    pub(crate) fn bearers(&self, label: &str) -> impl Iterator<Item = Entity> + '_ {
        self.by_label.get(label).into_iter().flatten().copied()
    }
}
