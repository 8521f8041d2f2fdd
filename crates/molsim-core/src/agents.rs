//! Per-particle side tables keyed by global index.

use crate::container::{BoxEvent, BoxListener, BoxView, ListenerError, ParticleStore};
use crate::particle::Atom;
use crate::reservoir::IndexReservoir;
use thiserror::Error;
use tracing::debug;

/// Flat array of optional values indexed by global index.
///
/// Indices beyond the current allocation read as absent; writes grow the
/// array following the configured [`IndexReservoir`].
#[derive(Debug, Clone)]
pub struct AgentTable<T> {
    slots: Vec<Option<T>>,
    reservoir: IndexReservoir,
    live: usize,
    resizes: usize,
}

impl<T> Default for AgentTable<T> {
    fn default() -> Self {
        Self::new(IndexReservoir::default())
    }
}

impl<T> AgentTable<T> {
    /// Create an empty table; nothing is allocated until the first write.
    #[must_use]
    pub const fn new(reservoir: IndexReservoir) -> Self {
        Self {
            slots: Vec::new(),
            reservoir,
            live: 0,
            resizes: 0,
        }
    }

    /// Create a table pre-sized for an index space topping out at `max_index`.
    #[must_use]
    pub fn with_max_index(reservoir: IndexReservoir, max_index: Option<usize>) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(reservoir.target_len(max_index), || None);
        Self {
            slots,
            reservoir,
            live: 0,
            resizes: 0,
        }
    }

    /// Number of allocated slots, occupied or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// How many times the backing array has been resized.
    #[must_use]
    pub const fn resizes(&self) -> usize {
        self.resizes
    }

    #[must_use]
    pub const fn reservoir(&self) -> IndexReservoir {
        self.reservoir
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Store `value` at `index`, returning whatever occupied the slot before.
    pub fn set(&mut self, index: usize, value: T) -> Option<T> {
        self.ensure_index(index);
        let previous = self.slots[index].replace(value);
        if previous.is_none() {
            self.live += 1;
        }
        previous
    }

    /// Clear the slot at `index`, returning its value.
    pub fn take(&mut self, index: usize) -> Option<T> {
        let taken = self.slots.get_mut(index)?.take();
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Grow the array so that `index` is addressable.
    pub fn ensure_index(&mut self, index: usize) {
        if index < self.slots.len() {
            return;
        }
        let len = self.reservoir.grown_len(index);
        debug!(from = self.slots.len(), to = len, "growing agent table");
        self.slots.resize_with(len, || None);
        self.resizes += 1;
    }

    /// Move the value at `from` into `to`, clearing `from`.
    ///
    /// Returns the value previously stored at `to`, which the caller owns.
    pub fn move_slot(&mut self, from: usize, to: usize) -> Option<T> {
        if from == to {
            return None;
        }
        let moved = self.take(from);
        match moved {
            Some(value) => self.set(to, value),
            None => self.take(to),
        }
    }

    /// Reallocate for an index space topping out at `max_index` when the
    /// reservoir policy asks for it. Returns values dropped off the tail.
    pub fn resize_for(&mut self, max_index: Option<usize>) -> Vec<(usize, T)> {
        if !self.reservoir.needs_resize(self.slots.len(), max_index) {
            return Vec::new();
        }
        let len = self.reservoir.target_len(max_index);
        debug!(from = self.slots.len(), to = len, "resizing agent table");
        let mut dropped = Vec::new();
        if len < self.slots.len() {
            for (index, slot) in self.slots.iter_mut().enumerate().skip(len) {
                if let Some(value) = slot.take() {
                    dropped.push((index, value));
                }
            }
            self.live -= dropped.len();
            self.slots.truncate(len);
            self.slots.shrink_to_fit();
        } else {
            self.slots.resize_with(len, || None);
        }
        self.resizes += 1;
        dropped
    }

    /// Lazily visit occupied slots in index order.
    #[must_use]
    pub fn iter(&self) -> Agents<'_, T> {
        Agents {
            slots: &self.slots,
            cursor: 0,
        }
    }

    /// Empty the table, handing back every stored value, and release the array.
    pub fn drain(&mut self) -> Vec<(usize, T)> {
        let drained: Vec<(usize, T)> = std::mem::take(&mut self.slots)
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|value| (index, value)))
            .collect();
        self.live = 0;
        drained
    }
}

/// Restartable cursor over the occupied slots of an [`AgentTable`].
#[derive(Debug, Clone)]
pub struct Agents<'a, T> {
    slots: &'a [Option<T>],
    cursor: usize,
}

impl<T> Agents<'_, T> {
    /// Rewind to the first slot.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl<'a, T> Iterator for Agents<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.slots.len() {
            let index = self.cursor;
            self.cursor += 1;
            if let Some(value) = &self.slots[index] {
                return Some((index, value));
            }
        }
        None
    }
}

/// Client factory for agents.
pub trait AgentSource<A> {
    /// Build the agent for a newly tracked atom.
    fn make_agent(&mut self, atom: &Atom) -> A;

    /// Dispose of the agent of an atom leaving the box.
    fn release_agent(&mut self, _agent: A, _atom: &Atom) {}

    /// Dispose of an agent whose atom is no longer in the store, for example
    /// when a manager is detached from a box it stopped listening to.
    fn discard_agent(&mut self, _agent: A, _index: usize) {}
}

/// Errors raised by [`AgentManager`] lifecycle calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent manager is already attached")]
    AlreadyAttached,
}

fn release<A, S: AgentSource<A>>(source: &mut S, agent: A, atoms: &ParticleStore, index: usize) {
    match atoms.get(index) {
        Some(atom) => source.release_agent(agent, atom),
        None => source.discard_agent(agent, index),
    }
}

/// Keeps one agent per atom of a box, following its lifecycle events.
///
/// Register the manager as a box listener after calling [`attach`]
/// so that additions, removals and renumbering are mirrored.
///
/// [`attach`]: AgentManager::attach
#[derive(Debug)]
pub struct AgentManager<A, S> {
    source: S,
    table: AgentTable<A>,
    attached: bool,
}

impl<A, S: AgentSource<A>> AgentManager<A, S> {
    #[must_use]
    pub const fn new(source: S, reservoir: IndexReservoir) -> Self {
        Self {
            source,
            table: AgentTable::new(reservoir),
            attached: false,
        }
    }

    /// Create one agent for every atom currently in the box.
    pub fn attach(&mut self, view: &BoxView<'_>) -> Result<(), AgentError> {
        if self.attached {
            return Err(AgentError::AlreadyAttached);
        }
        let reservoir = self.table.reservoir();
        self.table = AgentTable::with_max_index(reservoir, view.atoms.max_index());
        for particle in view.particles() {
            particle.for_each_leaf(|index| self.add_leaf(view.atoms, index));
        }
        self.attached = true;
        debug!(agents = self.table.len(), "agent manager attached");
        Ok(())
    }

    /// Release every agent and drop the table. Safe to call when detached.
    pub fn detach(&mut self, atoms: &ParticleStore) {
        for (index, agent) in self.table.drain() {
            release(&mut self.source, agent, atoms, index);
        }
        self.attached = false;
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.attached
    }

    /// Agent of the atom at global `index`, if one exists.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&A> {
        self.table.get(index)
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut A> {
        self.table.get_mut(index)
    }

    #[must_use]
    pub fn agent_of(&self, atom: &Atom) -> Option<&A> {
        self.table.get(atom.index())
    }

    /// Overwrite the agent at `index` without releasing the previous one.
    pub fn set(&mut self, index: usize, agent: A) -> Option<A> {
        self.table.set(index, agent)
    }

    #[must_use]
    pub fn iter(&self) -> Agents<'_, A> {
        self.table.iter()
    }

    #[must_use]
    pub const fn table(&self) -> &AgentTable<A> {
        &self.table
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn add_leaf(&mut self, atoms: &ParticleStore, index: usize) {
        let Some(atom) = atoms.get(index) else {
            return;
        };
        let agent = self.source.make_agent(atom);
        if let Some(stale) = self.table.set(index, agent) {
            self.source.release_agent(stale, atom);
        }
    }

    fn remove_leaf(&mut self, atoms: &ParticleStore, index: usize) {
        if let Some(agent) = self.table.take(index) {
            release(&mut self.source, agent, atoms, index);
        }
    }
}

impl<A, S: AgentSource<A>> BoxListener for AgentManager<A, S> {
    fn on_event(&mut self, event: &BoxEvent, view: &BoxView<'_>) -> Result<(), ListenerError> {
        if !self.attached {
            return Ok(());
        }
        match event {
            BoxEvent::ParticleAdded(particle) => {
                particle.for_each_leaf(|index| self.add_leaf(view.atoms, index));
            }
            BoxEvent::ParticleRemoved(particle) => {
                particle.for_each_leaf(|index| self.remove_leaf(view.atoms, index));
            }
            BoxEvent::IndexChanged { index, old_index } => {
                if let Some(displaced) = self.table.move_slot(*old_index, *index) {
                    self.source.discard_agent(displaced, *index);
                }
            }
            BoxEvent::IndexSpaceChanged { max_index } => {
                let dropped = self.table.resize_for(*max_index);
                debug_assert!(dropped.is_empty(), "index space shrank below live agents");
            }
            BoxEvent::ParticleMoved { .. }
            | BoxEvent::ParentChanged { .. }
            | BoxEvent::BoundaryInflated { .. }
            | BoxEvent::BoundaryDeformed { .. } => {}
        }
        Ok(())
    }
}
