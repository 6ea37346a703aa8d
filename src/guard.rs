//! Lifecycle scopes.
//!
//! Everything registered on a [`Stage`](crate::stage::Stage) while a scope is
//! open is recorded against the innermost open scope. Disposing a scope tears
//! down its children first, then its own triggers, timelines and scene.

use crate::stage::Stage;
use crate::timeline::TimelineId;
use crate::trigger::TriggerHandle;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScopeRecord {
    pub label: String,
    pub triggers: Vec<TriggerHandle>,
    /// Creation order.
    pub timelines: Vec<TimelineId>,
    pub children: Vec<ScopeId>,
    pub owns_scene: bool,
}

#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: BTreeMap<ScopeId, ScopeRecord>,
    open: Vec<ScopeId>,
    next: u64,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, label: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.next);
        self.next += 1;
        if let Some(parent) = self.current().and_then(|parent| self.scopes.get_mut(&parent)) {
            parent.children.push(id);
        }
        self.scopes.insert(id, ScopeRecord { label: label.into(), ..ScopeRecord::default() });
        self.open.push(id);
        id
    }

    /// Closes `id` and anything opened inside it that is still open.
    pub fn close(&mut self, id: ScopeId) {
        if let Some(position) = self.open.iter().rposition(|open| *open == id) {
            self.open.truncate(position);
        }
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.open.last().copied()
    }

    pub fn is_live(&self, id: ScopeId) -> bool {
        self.scopes.contains_key(&id)
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.scopes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn current_record(&mut self) -> Option<&mut ScopeRecord> {
        let id = self.current()?;
        self.scopes.get_mut(&id)
    }

    pub fn record_trigger(&mut self, handle: TriggerHandle) -> Option<ScopeId> {
        let id = self.current()?;
        self.current_record()?.triggers.push(handle);
        Some(id)
    }

    pub fn record_timeline(&mut self, timeline: TimelineId) -> Option<ScopeId> {
        let id = self.current()?;
        self.current_record()?.timelines.push(timeline);
        Some(id)
    }

    pub fn record_scene(&mut self) -> Option<ScopeId> {
        let id = self.current()?;
        self.current_record()?.owns_scene = true;
        Some(id)
    }

    pub fn adopt_timeline(&mut self, scope: ScopeId, timeline: TimelineId) {
        if let Some(record) = self.scopes.get_mut(&scope) {
            record.timelines.push(timeline);
        }
    }

    pub fn owner_of_trigger(&self, handle: TriggerHandle) -> Option<ScopeId> {
        self.scopes.iter().find(|(_, record)| record.triggers.contains(&handle)).map(|(id, _)| *id)
    }

    pub fn forget_trigger(&mut self, handle: TriggerHandle) {
        for record in self.scopes.values_mut() {
            record.triggers.retain(|owned| *owned != handle);
        }
    }

    pub fn forget_timeline(&mut self, timeline: TimelineId) {
        for record in self.scopes.values_mut() {
            record.timelines.retain(|owned| *owned != timeline);
        }
    }

    /// Clears scene ownership everywhere (the scene was replaced or unmounted
    /// by hand).
    pub fn forget_scene(&mut self) {
        for record in self.scopes.values_mut() {
            record.owns_scene = false;
        }
    }

    /// Removes a scope for teardown. Returns `None` once it is gone, which is
    /// what makes disposal idempotent.
    pub fn take(&mut self, id: ScopeId) -> Option<ScopeRecord> {
        let record = self.scopes.remove(&id)?;
        self.close(id);
        for parent in self.scopes.values_mut() {
            parent.children.retain(|child| *child != id);
        }
        Some(record)
    }
}

/// Handle returned by [`Stage::scope`]. Disposing is safe any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Disposer {
    scope: ScopeId,
}

impl Disposer {
    pub(crate) fn new(scope: ScopeId) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Returns false when the scope was already disposed.
    pub fn dispose(&self, stage: &mut Stage) -> bool {
        stage.dispose(self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeStore, Rect};
    use crate::timeline::{Choreographer, PlayOptions};
    use crate::trigger::{ScrollState, TriggerCallbacks, TriggerRegistry, TriggerSpec};

    fn handle() -> TriggerHandle {
        let mut nodes = NodeStore::new();
        let node = nodes.spawn("n");
        nodes.set_layout(node, Rect::new(0.0, 10.0));
        TriggerRegistry::new()
            .register(&nodes, ScrollState::default(), TriggerSpec::new("n", node), TriggerCallbacks::new())
            .unwrap()
            .handle
    }

    #[test]
    fn records_go_to_the_innermost_open_scope() {
        let mut table = ScopeTable::new();
        assert!(table.record_trigger(handle()).is_none());
        let outer = table.open("page");
        let inner = table.open("card");
        let trigger = handle();
        assert_eq!(table.record_trigger(trigger), Some(inner));
        table.close(inner);
        assert!(table.record_scene().is_some());
        assert_eq!(table.get(outer).unwrap().children, vec![inner]);
        assert!(table.get(outer).unwrap().owns_scene);
        assert_eq!(table.owner_of_trigger(trigger), Some(inner));
    }

    #[test]
    fn take_is_one_shot() {
        let mut table = ScopeTable::new();
        let scope = table.open("hero");
        let mut choreo = Choreographer::new();
        let mut nodes = NodeStore::new();
        let timeline = choreo.build_play(&[], &PlayOptions::default(), &mut nodes);
        table.record_timeline(timeline);
        let record = table.take(scope).unwrap();
        assert_eq!(record.timelines, vec![timeline]);
        assert!(table.take(scope).is_none());
        assert!(table.current().is_none());
    }

    #[test]
    fn closing_an_outer_scope_closes_inner_ones() {
        let mut table = ScopeTable::new();
        let outer = table.open("outer");
        table.open("inner");
        table.close(outer);
        assert!(table.current().is_none());
    }
}
