//! A single lattice cell.

use crate::order::LinkKey;
use molsim_core::{DIM, GroupId, Vector};
use std::collections::HashMap;

/// Where one sequence group's members of a cell start, and how many there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMarker {
    pub tab: LinkKey,
    pub occupants: usize,
}

#[derive(Debug, Clone)]
pub struct Cell {
    index: usize,
    coordinate: [usize; DIM],
    pub(crate) lower: Vector,
    pub(crate) upper: Vector,
    pub(crate) markers: HashMap<GroupId, CellMarker>,
    pub(crate) up: Vec<usize>,
    pub(crate) down: Vec<usize>,
}

impl Cell {
    pub(crate) fn new(index: usize, coordinate: [usize; DIM], lower: Vector, upper: Vector) -> Self {
        Self {
            index,
            coordinate,
            lower,
            upper,
            markers: HashMap::new(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    pub(crate) const fn index_ref(&self) -> &usize {
        &self.index
    }

    #[must_use]
    pub const fn coordinate(&self) -> [usize; DIM] {
        self.coordinate
    }

    /// Lower corner; infinite on the outer faces of closed axes.
    #[must_use]
    pub const fn lower(&self) -> &Vector {
        &self.lower
    }

    #[must_use]
    pub const fn upper(&self) -> &Vector {
        &self.upper
    }

    /// Half-open containment test against the cell's faces.
    #[inline]
    #[must_use]
    pub fn contains(&self, position: &Vector) -> bool {
        (0..DIM).all(|axis| position[axis] >= self.lower[axis] && position[axis] < self.upper[axis])
    }

    #[must_use]
    pub fn marker(&self, group: GroupId) -> Option<&CellMarker> {
        self.markers.get(&group)
    }

    /// Members of `group` assigned to this cell.
    #[must_use]
    pub fn occupants(&self, group: GroupId) -> usize {
        self.marker(group).map_or(0, |marker| marker.occupants)
    }

    #[must_use]
    pub fn total_occupants(&self) -> usize {
        self.markers.values().map(|marker| marker.occupants).sum()
    }

    /// Neighbor cells with a higher index.
    #[must_use]
    pub fn up_neighbors(&self) -> &[usize] {
        &self.up
    }

    /// Neighbor cells with a lower index.
    #[must_use]
    pub fn down_neighbors(&self) -> &[usize] {
        &self.down
    }

    pub fn neighbors(&self) -> impl Iterator<Item = usize> + '_ {
        self.down.iter().chain(self.up.iter()).copied()
    }
}
