//! Particle container with global index allocation and listener fan-out.

use crate::geometry::{Boundary, DIM, GeometryError, PeriodicBox, Vector, add, scale_components};
use crate::particle::{Atom, AtomSpec, GroupId, MoleculeId, ParticleRef, ParticleSpec};
use crate::reservoir::IndexReservoir;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Lifecycle notifications delivered to every [`BoxListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoxEvent {
    /// Particle has been stored; its atoms are visible in the view.
    ParticleAdded(ParticleRef),
    /// Particle is about to leave; its atoms are still visible in the view.
    ParticleRemoved(ParticleRef),
    ParticleMoved { index: usize, old_position: Vector },
    ParentChanged { index: usize, old_group: GroupId },
    /// The atom formerly at `old_index` now lives at `index`.
    IndexChanged { index: usize, old_index: usize },
    /// Highest global index in use moved outside the advertised index space.
    IndexSpaceChanged { max_index: Option<usize> },
    /// Every edge and position was scaled by the same factor.
    BoundaryInflated { scale: f64 },
    /// Edges and positions were scaled by per-axis factors.
    BoundaryDeformed { scales: Vector },
}

/// Error type listeners report back to the box.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of box lifecycle events, invoked synchronously in registration order.
pub trait BoxListener {
    fn on_event(&mut self, event: &BoxEvent, view: &BoxView<'_>) -> Result<(), ListenerError>;

    /// Veto a rescaling of the box to `dimensions` before anything is changed.
    fn check_resize(
        &self,
        _dimensions: &Vector,
        _periodic: &[bool; DIM],
    ) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Shared handle under which listeners are registered.
pub type SharedListener = Rc<RefCell<dyn BoxListener>>;

/// Registration handle returned by [`SimBox::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Errors that can occur while mutating a box.
#[derive(Debug, Error)]
pub enum BoxError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("no live atom at global index {0}")]
    UnknownAtom(usize),
    #[error("unknown molecule {0:?}")]
    UnknownMolecule(MoleculeId),
    #[error("atom {0} belongs to a molecule; remove the molecule instead")]
    AtomInMolecule(usize),
    #[error("molecule must contain at least one atom")]
    EmptyMolecule,
    #[error("listener {0:?} is already borrowed")]
    ListenerBusy(ListenerId),
    #[error("listener {id:?} failed")]
    Listener {
        id: ListenerId,
        #[source]
        source: ListenerError,
    },
}

/// Static configuration for a [`SimBox`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxConfig {
    /// Edge lengths of the rectangular volume.
    pub dimensions: Vector,
    /// Which axes wrap around.
    pub periodic: [bool; DIM],
    /// Slack applied to the advertised index space.
    pub index_reservoir: IndexReservoir,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            dimensions: [10.0; DIM],
            periodic: [true; DIM],
            index_reservoir: IndexReservoir::default(),
        }
    }
}

impl BoxConfig {
    pub fn validate(&self) -> Result<(), BoxError> {
        if self
            .dimensions
            .iter()
            .any(|length| !(length.is_finite() && *length > 0.0))
        {
            return Err(BoxError::InvalidConfig(
                "box dimensions must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Atom storage addressed by global index.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    slots: Vec<Option<Atom>>,
    live: usize,
}

impl ParticleStore {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.slots.get(index)?.as_ref()
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Number of live atoms.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Highest global index that has ever been handed out and not compacted away.
    #[must_use]
    pub fn max_index(&self) -> Option<usize> {
        self.slots.len().checked_sub(1)
    }

    /// Live atoms in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.slots.iter().flatten()
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.slots.get_mut(index)?.as_mut()
    }

    fn insert(&mut self, atom: Atom) {
        let index = atom.index;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        debug_assert!(self.slots[index].is_none(), "global index {index} reused while live");
        self.slots[index] = Some(atom);
        self.live += 1;
    }

    fn remove(&mut self, index: usize) -> Option<Atom> {
        let atom = self.slots.get_mut(index)?.take()?;
        self.live -= 1;
        Some(atom)
    }

    fn truncate(&mut self, len: usize) {
        debug_assert!(self.slots.iter().skip(len).all(Option::is_none));
        self.slots.truncate(len);
    }
}

/// Read-only snapshot handed to listeners.
#[derive(Clone, Copy)]
pub struct BoxView<'a> {
    pub boundary: &'a dyn Boundary,
    pub atoms: &'a ParticleStore,
    pub molecules: &'a SlotMap<MoleculeId, ParticleRef>,
}

impl fmt::Debug for BoxView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxView")
            .field("boundary", &self.boundary)
            .field("atoms", &self.atoms.len())
            .field("molecules", &self.molecules.len())
            .finish()
    }
}

impl BoxView<'_> {
    /// Top-level particles: free atoms as leaves, molecules as groups.
    pub fn particles(&self) -> impl Iterator<Item = ParticleRef> + '_ {
        self.atoms
            .iter()
            .filter(|atom| atom.molecule.is_none())
            .map(|atom| ParticleRef::Leaf(atom.index))
            .chain(self.molecules.values().cloned())
    }
}

/// A simulation volume and the particles inside it.
pub struct SimBox {
    boundary: Box<dyn Boundary>,
    atoms: ParticleStore,
    molecules: SlotMap<MoleculeId, ParticleRef>,
    free_indices: Vec<usize>,
    reservoir: IndexReservoir,
    index_capacity: usize,
    listeners: Vec<(ListenerId, SharedListener)>,
    next_listener: u64,
}

impl fmt::Debug for SimBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimBox")
            .field("boundary", &self.boundary)
            .field("atoms", &self.atoms.len())
            .field("molecules", &self.molecules.len())
            .field("index_capacity", &self.index_capacity)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SimBox {
    /// Build an empty box from `config`.
    pub fn new(config: &BoxConfig) -> Result<Self, BoxError> {
        config.validate()?;
        let boundary = PeriodicBox::with_periodicity(config.dimensions, config.periodic)?;
        Ok(Self::with_boundary(Box::new(boundary), config.index_reservoir))
    }

    /// Build an empty box around an arbitrary boundary.
    #[must_use]
    pub fn with_boundary(boundary: Box<dyn Boundary>, reservoir: IndexReservoir) -> Self {
        Self {
            boundary,
            atoms: ParticleStore::default(),
            molecules: SlotMap::with_key(),
            free_indices: Vec::new(),
            reservoir,
            index_capacity: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    #[must_use]
    pub fn boundary(&self) -> &dyn Boundary {
        self.boundary.as_ref()
    }

    #[must_use]
    pub const fn atoms(&self) -> &ParticleStore {
        &self.atoms
    }

    #[must_use]
    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    #[must_use]
    pub fn molecule(&self, id: MoleculeId) -> Option<&ParticleRef> {
        self.molecules.get(id)
    }

    /// Number of slots advertised to index-keyed tables.
    #[must_use]
    pub const fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    #[must_use]
    pub fn view(&self) -> BoxView<'_> {
        BoxView {
            boundary: self.boundary.as_ref(),
            atoms: &self.atoms,
            molecules: &self.molecules,
        }
    }

    /// Register a listener; it is notified after every previously registered one.
    pub fn add_listener(&mut self, listener: SharedListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<SharedListener> {
        let position = self.listeners.iter().position(|(key, _)| *key == id)?;
        Some(self.listeners.remove(position).1)
    }

    /// Insert a free atom and return its global index.
    pub fn add_atom(&mut self, spec: AtomSpec) -> Result<usize, BoxError> {
        let index = self.store_atom(spec, None)?;
        self.notify(&BoxEvent::ParticleAdded(ParticleRef::Leaf(index)))?;
        Ok(index)
    }

    /// Insert a composite particle; every leaf becomes an atom of the new molecule.
    pub fn add_molecule(&mut self, spec: &ParticleSpec) -> Result<MoleculeId, BoxError> {
        if spec.leaf_count() == 0 {
            return Err(BoxError::EmptyMolecule);
        }
        let id = self.molecules.insert(ParticleRef::Group(Vec::new()));
        let tree = self.store_tree(spec, id)?;
        self.molecules[id] = tree.clone();
        self.notify(&BoxEvent::ParticleAdded(tree))?;
        Ok(id)
    }

    /// Remove a free atom.
    pub fn remove_atom(&mut self, index: usize) -> Result<Atom, BoxError> {
        let atom = self.atoms.get(index).ok_or(BoxError::UnknownAtom(index))?;
        if atom.molecule.is_some() {
            return Err(BoxError::AtomInMolecule(index));
        }
        self.notify(&BoxEvent::ParticleRemoved(ParticleRef::Leaf(index)))?;
        let atom = self.release_index(index)?;
        Ok(atom)
    }

    /// Remove a molecule and all of its atoms.
    pub fn remove_molecule(&mut self, id: MoleculeId) -> Result<Vec<Atom>, BoxError> {
        let tree = self
            .molecules
            .get(id)
            .cloned()
            .ok_or(BoxError::UnknownMolecule(id))?;
        self.notify(&BoxEvent::ParticleRemoved(tree.clone()))?;
        self.molecules.remove(id);
        let mut removed = Vec::with_capacity(tree.leaf_count());
        for index in tree.leaves() {
            removed.push(self.release_index(index)?);
        }
        Ok(removed)
    }

    /// Place the atom at `position`, folded back into the box.
    pub fn move_atom(&mut self, index: usize, mut position: Vector) -> Result<(), BoxError> {
        self.boundary.wrap(&mut position);
        let atom = self.atoms.get_mut(index).ok_or(BoxError::UnknownAtom(index))?;
        let old_position = std::mem::replace(&mut atom.position, position);
        self.notify(&BoxEvent::ParticleMoved {
            index,
            old_position,
        })
    }

    /// Displace the atom by `delta`.
    pub fn translate_atom(&mut self, index: usize, delta: &Vector) -> Result<(), BoxError> {
        let position = self
            .atoms
            .get(index)
            .ok_or(BoxError::UnknownAtom(index))?
            .position;
        self.move_atom(index, add(&position, delta))
    }

    /// Move the atom into another sequence group.
    pub fn set_group(&mut self, index: usize, group: GroupId) -> Result<(), BoxError> {
        let atom = self.atoms.get_mut(index).ok_or(BoxError::UnknownAtom(index))?;
        if atom.group == group {
            return Ok(());
        }
        let old_group = std::mem::replace(&mut atom.group, group);
        self.notify(&BoxEvent::ParentChanged { index, old_group })
    }

    /// Renumber live atoms so that indices are dense again.
    ///
    /// The highest live atom is moved into the lowest hole until no hole
    /// remains below the live count; each move is announced before the next.
    pub fn compact(&mut self) -> Result<usize, BoxError> {
        let live = self.atoms.len();
        let mut holes: Vec<usize> = self
            .free_indices
            .iter()
            .copied()
            .filter(|&index| index < live)
            .collect();
        holes.sort_unstable();
        let mut moved = 0;
        let mut source = self.atoms.slots.len();
        for hole in holes {
            source = (live..source)
                .rev()
                .find(|&index| self.atoms.contains(index))
                .ok_or(BoxError::InvalidConfig("index bookkeeping out of sync"))?;
            let Some(mut atom) = self.atoms.remove(source) else {
                continue;
            };
            atom.index = hole;
            if let Some(molecule) = atom.molecule {
                if let Some(tree) = self.molecules.get_mut(molecule) {
                    tree.renumber(source, hole);
                }
            }
            self.atoms.insert(atom);
            moved += 1;
            trace!(from = source, to = hole, "compacted atom index");
            self.notify(&BoxEvent::IndexChanged {
                index: hole,
                old_index: source,
            })?;
        }
        self.free_indices.clear();
        self.atoms.truncate(live);
        debug!(moved, live, "compacted global indices");
        let max_index = live.checked_sub(1);
        if self.reservoir.needs_resize(self.index_capacity, max_index) {
            self.index_capacity = self.reservoir.target_len(max_index);
        }
        self.notify(&BoxEvent::IndexSpaceChanged { max_index })?;
        Ok(moved)
    }

    /// Scale the box and every position uniformly.
    ///
    /// Listeners may refuse the new dimensions, in which case the box is left untouched.
    pub fn inflate(&mut self, scale: f64) -> Result<(), BoxError> {
        self.check_resize(&[scale; DIM])?;
        self.boundary.inflate(scale)?;
        for atom in self.atoms.slots.iter_mut().flatten() {
            for x in &mut atom.position {
                *x *= scale;
            }
            // Rounding may land a scaled position on the open upper face.
            self.boundary.wrap(&mut atom.position);
        }
        self.notify(&BoxEvent::BoundaryInflated { scale })
    }

    /// Scale the box and every position per axis.
    ///
    /// Equal factors are delivered to listeners as an inflation.
    pub fn deform(&mut self, scales: Vector) -> Result<(), BoxError> {
        if scales.iter().all(|&s| s == scales[0]) {
            return self.inflate(scales[0]);
        }
        self.check_resize(&scales)?;
        self.boundary.deform(&scales)?;
        for atom in self.atoms.slots.iter_mut().flatten() {
            for (x, s) in atom.position.iter_mut().zip(scales) {
                *x *= s;
            }
            self.boundary.wrap(&mut atom.position);
        }
        self.notify(&BoxEvent::BoundaryDeformed { scales })
    }

    fn allocate_index(&mut self) -> Result<usize, BoxError> {
        let index = self
            .free_indices
            .pop()
            .unwrap_or(self.atoms.slots.len());
        if index >= self.index_capacity {
            self.index_capacity = self.reservoir.grown_len(index);
            self.notify(&BoxEvent::IndexSpaceChanged {
                max_index: Some(index),
            })?;
        }
        trace!(index, "allocated global index");
        Ok(index)
    }

    fn store_atom(
        &mut self,
        spec: AtomSpec,
        molecule: Option<MoleculeId>,
    ) -> Result<usize, BoxError> {
        let index = self.allocate_index()?;
        let mut position = spec.position;
        self.boundary.wrap(&mut position);
        self.atoms.insert(Atom {
            index,
            position,
            group: spec.group,
            molecule,
        });
        Ok(index)
    }

    fn store_tree(&mut self, spec: &ParticleSpec, id: MoleculeId) -> Result<ParticleRef, BoxError> {
        match spec {
            ParticleSpec::Leaf(atom) => Ok(ParticleRef::Leaf(self.store_atom(*atom, Some(id))?)),
            ParticleSpec::Group(children) => children
                .iter()
                .map(|child| self.store_tree(child, id))
                .collect::<Result<Vec<_>, _>>()
                .map(ParticleRef::Group),
        }
    }

    fn release_index(&mut self, index: usize) -> Result<Atom, BoxError> {
        let atom = self.atoms.remove(index).ok_or(BoxError::UnknownAtom(index))?;
        self.free_indices.push(index);
        Ok(atom)
    }

    fn check_resize(&self, scales: &Vector) -> Result<(), BoxError> {
        for (axis, &value) in scales.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(GeometryError::InvalidScale { axis, value }.into());
            }
        }
        let dimensions = scale_components(&self.boundary.dimensions(), scales);
        let periodic = self.boundary.periodicity();
        for (id, listener) in &self.listeners {
            let listener = listener
                .try_borrow()
                .map_err(|_| BoxError::ListenerBusy(*id))?;
            listener
                .check_resize(&dimensions, &periodic)
                .map_err(|source| BoxError::Listener { id: *id, source })?;
        }
        Ok(())
    }

    fn notify(&self, event: &BoxEvent) -> Result<(), BoxError> {
        let view = self.view();
        for (id, listener) in &self.listeners {
            let mut listener = listener
                .try_borrow_mut()
                .map_err(|_| BoxError::ListenerBusy(*id))?;
            listener
                .on_event(event, &view)
                .map_err(|source| BoxError::Listener { id: *id, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<BoxEvent>,
    }

    impl BoxListener for Recorder {
        fn on_event(&mut self, event: &BoxEvent, _view: &BoxView<'_>) -> Result<(), ListenerError> {
            self.events.push(event.clone());
            Ok(())
        }
    }

    fn atom_at(x: f64) -> AtomSpec {
        AtomSpec::new([x, 0.0, 0.0], GroupId(0))
    }

    fn small_box() -> SimBox {
        let config = BoxConfig {
            index_reservoir: IndexReservoir::new(4, 4),
            ..BoxConfig::default()
        };
        SimBox::new(&config).expect("box")
    }

    #[test]
    fn freed_index_is_reused_first() {
        let mut sim = small_box();
        let indices: Vec<usize> = (0..10)
            .map(|i| sim.add_atom(atom_at(i as f64 * 0.5)).expect("add"))
            .collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());

        sim.remove_atom(5).expect("remove");
        assert!(sim.atom(5).is_none());
        assert_eq!(sim.add_atom(atom_at(1.0)).expect("add"), 5);
        assert_eq!(sim.add_atom(atom_at(1.0)).expect("add"), 10);
    }

    #[test]
    fn positions_are_wrapped_on_insert_and_move() {
        let mut sim = small_box();
        let index = sim.add_atom(atom_at(6.0)).expect("add");
        assert_eq!(sim.atom(index).expect("atom").position(), &[-4.0, 0.0, 0.0]);
        sim.translate_atom(index, &[-1.5, 0.0, 0.0]).expect("move");
        assert_eq!(sim.atom(index).expect("atom").position(), &[4.5, 0.0, 0.0]);
    }

    #[test]
    fn listeners_see_events_in_order() {
        let mut sim = small_box();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        sim.add_listener(recorder.clone());

        let index = sim.add_atom(atom_at(0.0)).expect("add");
        sim.move_atom(index, [1.0, 0.0, 0.0]).expect("move");
        sim.set_group(index, GroupId(3)).expect("group");
        sim.remove_atom(index).expect("remove");

        let events = &recorder.borrow().events;
        assert_eq!(
            events.as_slice(),
            &[
                BoxEvent::IndexSpaceChanged { max_index: Some(0) },
                BoxEvent::ParticleAdded(ParticleRef::Leaf(0)),
                BoxEvent::ParticleMoved {
                    index: 0,
                    old_position: [0.0; 3]
                },
                BoxEvent::ParentChanged {
                    index: 0,
                    old_group: GroupId(0)
                },
                BoxEvent::ParticleRemoved(ParticleRef::Leaf(0)),
            ]
        );
    }

    #[test]
    fn molecules_are_added_and_removed_as_groups() {
        let mut sim = small_box();
        let spec = ParticleSpec::Group(vec![
            ParticleSpec::Leaf(atom_at(0.0)),
            ParticleSpec::Group(vec![
                ParticleSpec::Leaf(atom_at(0.5)),
                ParticleSpec::Leaf(atom_at(1.0)),
            ]),
        ]);
        let id = sim.add_molecule(&spec).expect("molecule");
        assert_eq!(sim.molecule(id).expect("tree").leaves(), vec![0, 1, 2]);
        assert_eq!(sim.atom(2).expect("atom").molecule(), Some(id));
        assert!(matches!(
            sim.remove_atom(1),
            Err(BoxError::AtomInMolecule(1))
        ));

        let removed = sim.remove_molecule(id).expect("remove");
        assert_eq!(removed.len(), 3);
        assert!(sim.atoms().is_empty());
        assert!(matches!(
            sim.add_molecule(&ParticleSpec::Group(Vec::new())),
            Err(BoxError::EmptyMolecule)
        ));
    }

    #[test]
    fn compact_closes_holes_and_announces_moves() {
        let mut sim = small_box();
        for i in 0..6 {
            sim.add_atom(atom_at(i as f64)).expect("add");
        }
        sim.remove_atom(1).expect("remove");
        sim.remove_atom(3).expect("remove");

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        sim.add_listener(recorder.clone());
        assert_eq!(sim.compact().expect("compact"), 2);

        {
            let events = &recorder.borrow().events;
            assert_eq!(
                events.as_slice(),
                &[
                    BoxEvent::IndexChanged {
                        index: 1,
                        old_index: 5
                    },
                    BoxEvent::IndexChanged {
                        index: 3,
                        old_index: 4
                    },
                    BoxEvent::IndexSpaceChanged { max_index: Some(3) },
                ]
            );
        }
        let xs: Vec<f64> = sim.atoms().iter().map(|atom| atom.position()[0]).collect();
        assert_eq!(xs, vec![0.0, -5.0, 2.0, 4.0]);
        assert_eq!(sim.atoms().max_index(), Some(3));
        assert_eq!(sim.add_atom(atom_at(0.0)).expect("add"), 4);
    }

    #[test]
    fn deform_with_equal_factors_is_an_inflation() {
        let mut sim = small_box();
        sim.add_atom(atom_at(1.0)).expect("add");
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        sim.add_listener(recorder.clone());

        sim.deform([2.0, 2.0, 2.0]).expect("deform");
        sim.deform([1.0, 0.5, 1.0]).expect("deform");
        assert_eq!(sim.boundary().dimensions(), [20.0, 10.0, 20.0]);
        assert_eq!(sim.atom(0).expect("atom").position(), &[2.0, 0.0, 0.0]);
        assert_eq!(
            recorder.borrow().events.as_slice(),
            &[
                BoxEvent::BoundaryInflated { scale: 2.0 },
                BoxEvent::BoundaryDeformed {
                    scales: [1.0, 0.5, 1.0]
                },
            ]
        );
    }

    #[test]
    fn failing_listener_surfaces_error() {
        struct Refuse;
        impl BoxListener for Refuse {
            fn on_event(&mut self, _: &BoxEvent, _: &BoxView<'_>) -> Result<(), ListenerError> {
                Err("refused".into())
            }
        }

        let mut sim = small_box();
        let id = sim.add_listener(Rc::new(RefCell::new(Refuse)));
        let err = sim.add_atom(atom_at(0.0)).unwrap_err();
        assert!(matches!(err, BoxError::Listener { id: failed, .. } if failed == id));
        assert!(sim.remove_listener(id).is_some());
        assert!(sim.remove_listener(id).is_none());
    }

    #[test]
    fn vetoed_resize_leaves_box_untouched() {
        struct MinimumEdge(f64);
        impl BoxListener for MinimumEdge {
            fn on_event(&mut self, _: &BoxEvent, _: &BoxView<'_>) -> Result<(), ListenerError> {
                Ok(())
            }

            fn check_resize(
                &self,
                dimensions: &Vector,
                _periodic: &[bool; DIM],
            ) -> Result<(), ListenerError> {
                if dimensions.iter().any(|&edge| edge < self.0) {
                    return Err("box too small".into());
                }
                Ok(())
            }
        }

        let mut sim = small_box();
        sim.add_atom(atom_at(4.0)).expect("add");
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        sim.add_listener(recorder.clone());
        let veto = sim.add_listener(Rc::new(RefCell::new(MinimumEdge(6.0))));

        let err = sim.inflate(0.5).unwrap_err();
        assert!(matches!(err, BoxError::Listener { id, .. } if id == veto));
        let err = sim.deform([1.0, 0.5, 1.0]).unwrap_err();
        assert!(matches!(err, BoxError::Listener { id, .. } if id == veto));
        assert_eq!(sim.boundary().dimensions(), [10.0; DIM]);
        assert_eq!(sim.atom(0).expect("atom").position(), &[4.0, 0.0, 0.0]);
        assert!(recorder.borrow().events.is_empty());

        sim.deform([1.0, 0.75, 1.0]).expect("deform");
        assert_eq!(sim.boundary().dimensions(), [10.0, 7.5, 10.0]);
        assert_eq!(recorder.borrow().events.len(), 1);
    }

    #[test]
    fn config_rejects_bad_dimensions() {
        let config = BoxConfig {
            dimensions: [1.0, -1.0, 1.0],
            ..BoxConfig::default()
        };
        assert!(matches!(
            SimBox::new(&config),
            Err(BoxError::InvalidConfig(_))
        ));
    }
}
