//! Local list reconciliation after a successful mutation.
//!
//! These functions are pure: the view-model calls them with the server's
//! answer so the displayed list reflects a create/update/delete immediately,
//! without a full refetch. A later refetch replaces everything they produce.
use crate::api::Stats;
use crate::model::{Entity, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Remove,
}

/// Outcome of a successful mutation as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<E> {
    Created(E),
    Updated(E),
    Removed(EntityId),
}

impl<E: Entity> Mutation<E> {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Created(_) => MutationKind::Create,
            Mutation::Updated(_) => MutationKind::Update,
            Mutation::Removed(_) => MutationKind::Remove,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Mutation::Created(e) | Mutation::Updated(e) => e.id(),
            Mutation::Removed(id) => id,
        }
    }
}

/// Apply `mutation` to `items`, returning the new list.
///
/// * created rows go to the tail, matching the server's default order; if
///   the id is already listed the row is replaced instead of duplicated
/// * updated rows are replaced in place, order untouched
/// * removed rows are dropped
pub fn reconcile<E: Entity>(items: &[E], mutation: &Mutation<E>) -> Vec<E> {
    match mutation {
        Mutation::Created(created) => {
            let mut out = items.to_vec();
            match out.iter().position(|e| e.id() == created.id()) {
                Some(idx) => out[idx] = created.clone(),
                None => out.push(created.clone()),
            }
            out
        }
        Mutation::Updated(updated) => items
            .iter()
            .map(|e| {
                if e.id() == updated.id() {
                    updated.clone()
                } else {
                    e.clone()
                }
            })
            .collect(),
        Mutation::Removed(id) => items.iter().filter(|e| e.id() != id).cloned().collect(),
    }
}

/// Append the next page for infinite scroll. Rows that shifted onto the next
/// page since the last fetch are refreshed in place rather than repeated.
pub fn append_page<E: Entity>(items: &mut Vec<E>, page: Vec<E>) {
    for row in page {
        match items.iter().position(|e| e.id() == row.id()) {
            Some(idx) => items[idx] = row,
            None => items.push(row),
        }
    }
}

/// Aggregate counters shown next to a list ("Total: N", "Active: M").
///
/// Locally adjusted counters are an approximation: they follow this client's
/// notion of "active" and may drift from the backend until the next
/// `/stats` fetch, which always wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
}

impl Counters {
    pub fn from_stats(stats: &Stats) -> Self {
        let active = stats.active.unwrap_or(0);
        let total = stats
            .total
            .unwrap_or(active + stats.inactive.unwrap_or(0));
        let inactive = stats
            .inactive
            .unwrap_or_else(|| total.saturating_sub(active));
        Self {
            total,
            active,
            inactive,
        }
    }

    /// Adjust for `mutation`. `previous` is the row as it was listed before
    /// the mutation, when known.
    pub fn apply<E: Entity>(&mut self, mutation: &Mutation<E>, previous: Option<&E>) {
        match (mutation, previous) {
            // An id that is already listed replaces its row, so it counts as an update.
            (Mutation::Created(changed), Some(prev)) | (Mutation::Updated(changed), Some(prev)) => {
                if prev.is_active() != changed.is_active() {
                    self.sub(prev.is_active());
                    self.add(changed.is_active());
                }
            }
            (Mutation::Created(created), None) => {
                self.total += 1;
                self.add(created.is_active());
            }
            (Mutation::Updated(_), None) => {}
            (Mutation::Removed(_), prev) => {
                self.total = self.total.saturating_sub(1);
                self.sub(prev.and_then(|p| p.is_active()));
            }
        }
    }

    fn add(&mut self, active: Option<bool>) {
        match active {
            Some(true) => self.active += 1,
            Some(false) => self.inactive += 1,
            None => {}
        }
    }

    fn sub(&mut self, active: Option<bool>) {
        match active {
            Some(true) => self.active = self.active.saturating_sub(1),
            Some(false) => self.inactive = self.inactive.saturating_sub(1),
            None => {}
        }
    }
}
