//! Cursors over the cell-ordered sequences of a [`CellGrid`].

use crate::IndexError;
use crate::grid::CellGrid;
use crate::order::{LinkKey, LinkKind};
use molsim_core::GroupId;
use serde::{Deserialize, Serialize};

/// Which half of the neighborhood a [`NeighborIter`] visits.
///
/// `Up` covers later atoms of the reference's own cell plus higher-indexed
/// neighbor cells; `Down` covers the rest. Seeding `Up` at every atom of a
/// group visits each neighboring pair exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    #[default]
    Both,
}

/// Every atom of one group, grouped by cell.
#[derive(Debug, Clone)]
pub struct SequentialIter<'a> {
    grid: &'a CellGrid,
    head: Option<LinkKey>,
    cursor: Option<LinkKey>,
    done: bool,
}

impl<'a> SequentialIter<'a> {
    pub(crate) fn new(grid: &'a CellGrid, group: GroupId) -> Self {
        let head = grid.order().head(group);
        Self {
            grid,
            head,
            cursor: head,
            done: false,
        }
    }

    /// Rewind to the start of the group.
    pub fn reset(&mut self) {
        self.cursor = self.head;
        self.done = false;
    }
}

impl Iterator for SequentialIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let head = self.head?;
        let order = self.grid.order();
        while !self.done {
            let key = order.next(self.cursor?);
            self.cursor = Some(key);
            if key == head {
                self.done = true;
            } else if let LinkKind::Particle(index) = order.kind(key) {
                return Some(index);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum Leg<'a> {
    /// Walk from a link until the next marker.
    Walk { from: LinkKey, forward: bool },
    /// Visit every member of each listed cell.
    Cells(&'a [usize]),
}

/// Atoms sharing or adjoining the cell of a reference atom.
#[derive(Debug, Clone)]
pub struct NeighborIter<'a> {
    grid: &'a CellGrid,
    reference: usize,
    group: GroupId,
    direction: Direction,
    legs: [Option<Leg<'a>>; 4],
    leg: usize,
    cell_pos: usize,
    cursor: Option<(LinkKey, bool)>,
}

impl<'a> NeighborIter<'a> {
    pub(crate) fn seeded(
        grid: &'a CellGrid,
        reference: usize,
        group: Option<GroupId>,
        direction: Direction,
    ) -> Result<Self, IndexError> {
        let mut iter = Self {
            grid,
            reference,
            group: GroupId::default(),
            direction,
            legs: [None; 4],
            leg: 0,
            cell_pos: 0,
            cursor: None,
        };
        iter.seat(reference, group, direction)?;
        Ok(iter)
    }

    /// Atom the iteration is centred on.
    #[must_use]
    pub const fn reference(&self) -> usize {
        self.reference
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Group whose members are being visited.
    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Restart the traversal around the same reference.
    pub fn reset(&mut self) {
        self.leg = 0;
        self.cell_pos = 0;
        self.cursor = None;
    }

    /// Re-centre on another reference atom within its own group.
    pub fn reset_to(&mut self, reference: usize, direction: Direction) -> Result<(), IndexError> {
        self.seat(reference, None, direction)
    }

    fn seat(
        &mut self,
        reference: usize,
        group: Option<GroupId>,
        direction: Direction,
    ) -> Result<(), IndexError> {
        let grid = self.grid;
        let placement = grid
            .placement(reference)
            .ok_or(IndexError::NoReference(reference))?;
        let cell = grid.lattice().cell(placement.cell);
        let target = group.unwrap_or(placement.group);
        let up = Leg::Cells(cell.up_neighbors());
        let down = Leg::Cells(cell.down_neighbors());

        self.legs = if target == placement.group {
            let after = Leg::Walk {
                from: placement.link,
                forward: true,
            };
            let before = Leg::Walk {
                from: placement.link,
                forward: false,
            };
            match direction {
                Direction::Up => [Some(after), Some(up), None, None],
                Direction::Down => [Some(before), Some(down), None, None],
                Direction::Both => [Some(after), Some(up), Some(before), Some(down)],
            }
        } else {
            let own = Leg::Cells(std::slice::from_ref(cell.index_ref()));
            match direction {
                Direction::Up => [Some(own), Some(up), None, None],
                Direction::Down => [Some(down), None, None, None],
                Direction::Both => [Some(own), Some(up), Some(down), None],
            }
        };
        self.reference = reference;
        self.group = target;
        self.direction = direction;
        self.reset();
        Ok(())
    }
}

impl Iterator for NeighborIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let order = self.grid.order();
        loop {
            if let Some((key, forward)) = self.cursor {
                let next = if forward {
                    order.next(key)
                } else {
                    order.prev(key)
                };
                if let LinkKind::Particle(index) = order.kind(next) {
                    self.cursor = Some((next, forward));
                    return Some(index);
                }
                self.cursor = None;
            }

            match self.legs.get(self.leg).copied().flatten()? {
                Leg::Walk { from, forward } => {
                    self.cursor = Some((from, forward));
                    self.leg += 1;
                }
                Leg::Cells(cells) => match cells.get(self.cell_pos) {
                    Some(&cell) => {
                        self.cell_pos += 1;
                        let marker = self.grid.lattice().cell(cell).marker(self.group);
                        if let Some(marker) = marker.filter(|marker| marker.occupants > 0) {
                            self.cursor = Some((marker.tab, true));
                        }
                    }
                    None => {
                        self.leg += 1;
                        self.cell_pos = 0;
                    }
                },
            }
        }
    }
}
