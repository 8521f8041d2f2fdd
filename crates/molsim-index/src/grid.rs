//! Cell-list neighbor manager driven by box lifecycle events.

use crate::cell::CellMarker;
use crate::criterion::{NeighborCriterion, separation_sq};
use crate::iter::{Direction, NeighborIter, SequentialIter};
use crate::lattice::CellLattice;
use crate::order::{CellOrder, LinkKey, LinkKind};
use crate::{IndexConfig, IndexError, NeighborhoodIndex};
use molsim_core::{
    AgentTable, Boundary, BoxEvent, BoxListener, BoxView, DIM, GroupId, ListenerError, Vector,
};
use ordered_float::OrderedFloat;
use tracing::{debug, trace, warn};

/// Cell assignment of one atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub cell: usize,
    pub group: GroupId,
    pub link: LinkKey,
}

/// Assigns every atom of a box to a lattice cell and serves neighbor queries.
///
/// Register the grid as a box listener after [`populate`]; from then on every
/// add, remove, move, renumber, reparent and boundary change is mirrored
/// without further calls.
///
/// [`populate`]: CellGrid::populate
#[derive(Debug)]
pub struct CellGrid {
    config: IndexConfig,
    lattice: CellLattice,
    order: CellOrder,
    placements: AgentTable<Placement>,
}

impl CellGrid {
    /// Build an empty lattice over `boundary`.
    pub fn new(boundary: &dyn Boundary, config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        check_range(
            config.neighbor_range,
            &boundary.dimensions(),
            &boundary.periodicity(),
        )?;
        let counts = config.cell_counts(&boundary.dimensions())?;
        let mut lattice = CellLattice::new(boundary, counts)?;
        lattice.link_neighbors(config.neighbor_range);
        Ok(Self {
            placements: AgentTable::new(config.reservoir),
            config,
            lattice,
            order: CellOrder::new(),
        })
    }

    /// Build a lattice for the view's boundary and assign all of its atoms.
    pub fn from_view(view: &BoxView<'_>, config: IndexConfig) -> Result<Self, IndexError> {
        let mut grid = Self::new(view.boundary, config)?;
        grid.populate(view);
        Ok(grid)
    }

    /// Assign every atom of the view that is not yet placed.
    pub fn populate(&mut self, view: &BoxView<'_>) {
        for atom in view.atoms.iter() {
            if self.placements.get(atom.index()).is_none() {
                self.assign_cell(atom.index(), atom.position(), atom.group());
            }
        }
        debug!(atoms = self.placements.len(), "populated cell grid");
    }

    /// Discard the lattice, derive a new one from the view's boundary and
    /// reassign every atom.
    pub fn rebuild(&mut self, view: &BoxView<'_>) -> Result<(), IndexError> {
        let boundary = view.boundary;
        check_range(
            self.config.neighbor_range,
            &boundary.dimensions(),
            &boundary.periodicity(),
        )?;
        let counts = self.config.cell_counts(&boundary.dimensions())?;
        let mut lattice = CellLattice::new(boundary, counts)?;
        lattice.link_neighbors(self.config.neighbor_range);
        self.lattice = lattice;
        self.order.clear();
        self.placements = AgentTable::with_max_index(self.config.reservoir, view.atoms.max_index());
        self.populate(view);
        debug!(dims = ?self.lattice.dims(), "rebuilt cell grid");
        Ok(())
    }

    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[must_use]
    pub const fn lattice(&self) -> &CellLattice {
        &self.lattice
    }

    pub(crate) const fn order(&self) -> &CellOrder {
        &self.order
    }

    #[must_use]
    pub const fn neighbor_range(&self) -> f64 {
        self.config.neighbor_range
    }

    /// Farthest separation at which [`neighbors`](CellGrid::neighbors) can
    /// still yield a candidate for a reference inside the box.
    ///
    /// Linked cells have a nearest-vertex gap within the neighbor range, and
    /// each end of a pair may sit anywhere in its cell, so the bound is the
    /// range plus two cell diagonals.
    #[must_use]
    pub fn candidate_reach(&self) -> f64 {
        self.config.neighbor_range + 2.0 * self.lattice.cell_diagonal()
    }

    /// Change the neighbor range and relink every cell under the current geometry.
    pub fn set_neighbor_range(&mut self, range: f64) -> Result<(), IndexError> {
        if !(range.is_finite() && range > 0.0) {
            return Err(IndexError::InvalidConfig(
                "neighbor_range must be positive and finite",
            ));
        }
        check_range(range, &self.lattice.extent(), &self.lattice.periodicity())?;
        self.config.neighbor_range = range;
        self.lattice.link_neighbors(range);
        Ok(())
    }

    /// Follow a rescaling of the boundary.
    ///
    /// Isotropic scaling stretches the lattice in place; follow it with
    /// [`refresh`](CellGrid::refresh) to re-test membership. Anisotropic
    /// scaling is refused: callers must [`rebuild`](CellGrid::rebuild) instead.
    pub fn on_boundary_inflate(&mut self, scale: f64, isotropic: bool) -> Result<(), IndexError> {
        if !isotropic {
            warn!(scale, "refusing anisotropic inflation without rebuild");
            return Err(IndexError::AnisotropicInflate { scale });
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(IndexError::InvalidConfig("scale must be positive and finite"));
        }
        let extent = self.lattice.extent().map(|length| length * scale);
        check_range(
            self.config.neighbor_range,
            &extent,
            &self.lattice.periodicity(),
        )?;
        self.lattice.scale(scale);
        self.lattice.link_neighbors(self.config.neighbor_range);
        Ok(())
    }

    /// Re-test every placed atom of the view against its cell, reassigning
    /// those that ended up outside. Returns how many moved.
    pub fn refresh(&mut self, view: &BoxView<'_>) -> usize {
        let mut moved = 0;
        for atom in view.atoms.iter() {
            let Some(&placement) = self.placements.get(atom.index()) else {
                continue;
            };
            if !self.lattice.cell(placement.cell).contains(atom.position()) {
                self.assign_cell(atom.index(), atom.position(), placement.group);
                moved += 1;
            }
        }
        if moved > 0 {
            debug!(moved, "reassigned atoms after rescaling");
        }
        moved
    }

    /// Place `index` in the cell enclosing `position`, splicing it into the
    /// group's sequence when the cell or group changed. Returns the cell.
    pub fn assign_cell(&mut self, index: usize, position: &Vector, group: GroupId) -> usize {
        let cell = self.lattice.cell_index(position);
        let previous = self.placements.get(index).copied();
        if previous.is_some_and(|p| p.cell == cell && p.group == group) {
            return cell;
        }
        let tab = self.tab(cell, group);
        let link = match previous {
            Some(old) => {
                self.adjust_occupants(old.cell, old.group, -1);
                self.order.splice_after(old.link, tab);
                old.link
            }
            None => self.order.insert_after(tab, LinkKind::Particle(index)),
        };
        self.adjust_occupants(cell, group, 1);
        self.placements.set(index, Placement { cell, group, link });
        trace!(index, cell, "assigned cell");
        cell
    }

    /// Re-test containment after a move and reassign only on exit.
    pub fn on_move(&mut self, index: usize, position: &Vector) -> Result<(), IndexError> {
        let placement = *self
            .placements
            .get(index)
            .ok_or(IndexError::Unassigned(index))?;
        if self.lattice.cell(placement.cell).contains(position) {
            return Ok(());
        }
        self.assign_cell(index, position, placement.group);
        Ok(())
    }

    /// Move `index` into the sequence of `group`.
    pub fn on_parent_changed(
        &mut self,
        index: usize,
        group: GroupId,
        position: &Vector,
    ) -> Result<(), IndexError> {
        if self.placements.get(index).is_none() {
            return Err(IndexError::Unassigned(index));
        }
        self.assign_cell(index, position, group);
        Ok(())
    }

    /// Forget `index`, releasing its link.
    pub fn remove(&mut self, index: usize) -> Option<Placement> {
        let placement = self.placements.take(index)?;
        self.adjust_occupants(placement.cell, placement.group, -1);
        self.order.unlink(placement.link);
        Some(placement)
    }

    /// Follow an atom renumbered from `old_index` to `index`.
    pub fn reindex(&mut self, index: usize, old_index: usize) {
        if let Some(stale) = self.remove(index) {
            warn!(index, ?stale, "renumbered atom overwrote a live placement");
        }
        let Some(placement) = self.placements.take(old_index) else {
            return;
        };
        self.order.set_kind(placement.link, LinkKind::Particle(index));
        self.placements.set(index, placement);
    }

    #[must_use]
    pub fn placement(&self, index: usize) -> Option<&Placement> {
        self.placements.get(index)
    }

    #[must_use]
    pub fn cell_of(&self, index: usize) -> Option<usize> {
        self.placements.get(index).map(|placement| placement.cell)
    }

    #[must_use]
    pub fn is_assigned(&self, index: usize) -> bool {
        self.placements.get(index).is_some()
    }

    /// Number of atoms currently placed.
    #[must_use]
    pub const fn assigned(&self) -> usize {
        self.placements.len()
    }

    /// Members of `group` in `cell`.
    #[must_use]
    pub fn occupants(&self, cell: usize, group: GroupId) -> usize {
        self.lattice.cell(cell).occupants(group)
    }

    /// Cells within the neighbor range of `cell`, excluding itself.
    pub fn neighbor_cells(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        self.lattice.cell(cell).neighbors()
    }

    /// Cell counts per axis.
    #[must_use]
    pub const fn dimensions(&self) -> [usize; DIM] {
        self.lattice.dims()
    }

    /// Every atom of `group`, contiguous by cell.
    #[must_use]
    pub fn sequential(&self, group: GroupId) -> SequentialIter<'_> {
        SequentialIter::new(self, group)
    }

    /// Atoms of the reference's own group in its cell and neighboring cells.
    pub fn neighbors(
        &self,
        reference: usize,
        direction: Direction,
    ) -> Result<NeighborIter<'_>, IndexError> {
        NeighborIter::seeded(self, reference, None, direction)
    }

    /// Atoms of `group` in the reference's cell and neighboring cells.
    pub fn neighbors_in(
        &self,
        reference: usize,
        group: GroupId,
        direction: Direction,
    ) -> Result<NeighborIter<'_>, IndexError> {
        NeighborIter::seeded(self, reference, Some(group), direction)
    }

    /// Neighbor candidates filtered through `criterion`.
    pub fn neighbors_matching<'a, C>(
        &'a self,
        view: BoxView<'a>,
        reference: usize,
        direction: Direction,
        criterion: &'a C,
    ) -> Result<impl Iterator<Item = usize> + 'a, IndexError>
    where
        C: NeighborCriterion + ?Sized,
    {
        if let Some(range) = criterion.range() {
            if range > self.config.neighbor_range {
                return Err(IndexError::RadiusExceedsRange {
                    radius: range,
                    range: self.config.neighbor_range,
                });
            }
        }
        let origin = *view
            .atoms
            .get(reference)
            .ok_or(IndexError::UnknownAtom(reference))?
            .position();
        let candidates = self.neighbors(reference, direction)?;
        Ok(candidates.filter(move |&other| {
            view.atoms
                .get(other)
                .is_some_and(|atom| criterion.accept(view.boundary, &origin, atom.position()))
        }))
    }

    fn tab(&mut self, cell: usize, group: GroupId) -> LinkKey {
        if let Some(marker) = self.lattice.cell(cell).marker(group) {
            return marker.tab;
        }
        self.open_lane(group);
        self.lattice.cell(cell).markers[&group].tab
    }

    /// Give `group` a head marker and one tab per cell.
    fn open_lane(&mut self, group: GroupId) {
        let mut anchor = self.order.open(group);
        for cell in self.lattice.cells_mut() {
            let tab = self
                .order
                .insert_after(anchor, LinkKind::Tab { cell: cell.index() });
            cell.markers.insert(group, CellMarker { tab, occupants: 0 });
            anchor = tab;
        }
        debug!(?group, cells = self.lattice.len(), "opened sequence group");
    }

    fn adjust_occupants(&mut self, cell: usize, group: GroupId, delta: isize) {
        if let Some(marker) = self.lattice.cells_mut()[cell].markers.get_mut(&group) {
            marker.occupants = marker.occupants.saturating_add_signed(delta);
        }
    }
}

/// Reject ranges that would reach a particle's own periodic image.
fn check_range(range: f64, extent: &Vector, periodic: &[bool; DIM]) -> Result<(), IndexError> {
    for axis in 0..DIM {
        let limit = 0.5 * extent[axis];
        if periodic[axis] && range > limit {
            return Err(IndexError::DegenerateRange { range, axis, limit });
        }
    }
    Ok(())
}

impl BoxListener for CellGrid {
    fn on_event(&mut self, event: &BoxEvent, view: &BoxView<'_>) -> Result<(), ListenerError> {
        match event {
            BoxEvent::ParticleAdded(particle) => {
                let mut missing = None;
                particle.for_each_leaf(|index| match view.atoms.get(index) {
                    Some(atom) => {
                        self.assign_cell(index, atom.position(), atom.group());
                    }
                    None => missing = Some(index),
                });
                if let Some(index) = missing {
                    return Err(IndexError::UnknownAtom(index).into());
                }
            }
            BoxEvent::ParticleRemoved(particle) => {
                particle.for_each_leaf(|index| {
                    self.remove(index);
                });
            }
            BoxEvent::ParticleMoved { index, .. } => {
                let atom = view
                    .atoms
                    .get(*index)
                    .ok_or(IndexError::UnknownAtom(*index))?;
                self.on_move(*index, atom.position())?;
            }
            BoxEvent::ParentChanged { index, .. } => {
                let atom = view
                    .atoms
                    .get(*index)
                    .ok_or(IndexError::UnknownAtom(*index))?;
                self.on_parent_changed(*index, atom.group(), atom.position())?;
            }
            BoxEvent::IndexChanged { index, old_index } => self.reindex(*index, *old_index),
            BoxEvent::IndexSpaceChanged { max_index } => {
                let dropped = self.placements.resize_for(*max_index);
                debug_assert!(dropped.is_empty(), "index space shrank below live atoms");
            }
            BoxEvent::BoundaryInflated { scale } => {
                self.on_boundary_inflate(*scale, true)?;
                self.refresh(view);
            }
            BoxEvent::BoundaryDeformed { .. } => self.rebuild(view)?,
        }
        Ok(())
    }

    fn check_resize(
        &self,
        dimensions: &Vector,
        periodic: &[bool; DIM],
    ) -> Result<(), ListenerError> {
        check_range(self.config.neighbor_range, dimensions, periodic)?;
        self.config.cell_counts(dimensions)?;
        Ok(())
    }
}

impl NeighborhoodIndex for CellGrid {
    fn rebuild(&mut self, view: &BoxView<'_>) -> Result<(), IndexError> {
        CellGrid::rebuild(self, view)
    }

    fn neighbors_within(
        &self,
        view: &BoxView<'_>,
        reference: usize,
        radius_sq: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    ) -> Result<(), IndexError> {
        let range = self.config.neighbor_range;
        if radius_sq > range * range {
            return Err(IndexError::RadiusExceedsRange {
                radius: radius_sq.sqrt(),
                range,
            });
        }
        let origin = view
            .atoms
            .get(reference)
            .ok_or(IndexError::UnknownAtom(reference))?
            .position();
        for other in self.neighbors(reference, Direction::Both)? {
            let Some(atom) = view.atoms.get(other) else {
                continue;
            };
            let dist_sq = separation_sq(view.boundary, origin, atom.position());
            if dist_sq <= radius_sq {
                visitor(other, OrderedFloat(dist_sq));
            }
        }
        Ok(())
    }
}
