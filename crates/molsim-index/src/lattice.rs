//! Regular partition of a boundary into cells.

use crate::{IndexError, MAX_CELLS};
use crate::cell::Cell;
use crate::primitive::{Primitive, RectangularPrimitive};
use molsim_core::{Boundary, DIM, Vector};
use tracing::debug;

/// Cells laid out in row-major order over a rectangular boundary.
#[derive(Debug, Clone)]
pub struct CellLattice {
    primitive: RectangularPrimitive,
    dims: [usize; DIM],
    extent: Vector,
    periodic: [bool; DIM],
    planes: [Vec<f64>; DIM],
    cells: Vec<Cell>,
}

impl CellLattice {
    /// Tile `boundary` with `dims[d]` cells along each axis `d`.
    pub fn new(boundary: &dyn Boundary, dims: [usize; DIM]) -> Result<Self, IndexError> {
        let total = total_cells(dims)?;
        let primitive = RectangularPrimitive::for_boundary(boundary, dims)?;
        let mut lattice = Self {
            primitive,
            dims,
            extent: boundary.dimensions(),
            periodic: boundary.periodicity(),
            planes: Default::default(),
            cells: Vec::with_capacity(total),
        };
        lattice.compute_planes();
        for index in 0..total {
            let coordinate = lattice.coordinate_of(index);
            let (lower, upper) = lattice.bounds(coordinate);
            lattice.cells.push(Cell::new(index, coordinate, lower, upper));
        }
        debug!(?dims, cells = lattice.cells.len(), "built cell lattice");
        Ok(lattice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub const fn dims(&self) -> [usize; DIM] {
        self.dims
    }

    /// Edge lengths of the boundary the lattice was built for.
    #[must_use]
    pub const fn extent(&self) -> Vector {
        self.extent
    }

    #[must_use]
    pub const fn periodicity(&self) -> [bool; DIM] {
        self.periodic
    }

    #[must_use]
    pub const fn primitive(&self) -> &RectangularPrimitive {
        &self.primitive
    }

    /// Length of a cell's body diagonal.
    #[must_use]
    pub fn cell_diagonal(&self) -> f64 {
        self.primitive.size().iter().map(|edge| edge * edge).sum::<f64>().sqrt()
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    #[must_use]
    pub fn flat_index(&self, coordinate: [usize; DIM]) -> usize {
        (coordinate[0] * self.dims[1] + coordinate[1]) * self.dims[2] + coordinate[2]
    }

    #[must_use]
    pub fn coordinate_of(&self, index: usize) -> [usize; DIM] {
        let z = index % self.dims[2];
        let rest = index / self.dims[2];
        [rest / self.dims[1], rest % self.dims[1], z]
    }

    /// Index of the cell whose faces enclose `position`.
    ///
    /// Positions beyond a closed face land in the outermost cell.
    #[must_use]
    pub fn cell_index(&self, position: &Vector) -> usize {
        let coordinate = std::array::from_fn(|axis| self.axis_coordinate(position[axis], axis));
        self.flat_index(coordinate)
    }

    /// Squared nearest-vertex distance between two cells under the minimum image.
    #[must_use]
    pub fn nearest_vertex_distance_sq(&self, a: usize, b: usize) -> f64 {
        let ca = self.coordinate_of(a);
        let cb = self.coordinate_of(b);
        let size = self.primitive.size();
        (0..DIM)
            .map(|axis| {
                let n = self.dims[axis];
                let mut steps = ca[axis].abs_diff(cb[axis]);
                if self.periodic[axis] {
                    steps = steps.min(n - steps);
                }
                let gap = steps.saturating_sub(1) as f64 * size[axis];
                gap * gap
            })
            .sum()
    }

    #[must_use]
    pub fn are_neighbors(&self, a: usize, b: usize, range: f64) -> bool {
        a != b && self.nearest_vertex_distance_sq(a, b) <= range * range
    }

    /// Scale every cell about the lattice centre.
    ///
    /// Faces are multiplied rather than recomputed so that they round exactly
    /// like positions scaled by the same factor.
    pub(crate) fn scale(&mut self, factor: f64) {
        self.primitive.scale(factor);
        for length in &mut self.extent {
            *length *= factor;
        }
        for plane in self.planes.iter_mut().flatten() {
            *plane *= factor;
        }
        for index in 0..self.cells.len() {
            let (lower, upper) = self.bounds(self.cells[index].coordinate());
            let cell = &mut self.cells[index];
            cell.lower = lower;
            cell.upper = upper;
        }
    }

    /// Recompute every cell's up and down neighbor lists for `range`.
    pub(crate) fn link_neighbors(&mut self, range: f64) {
        let stencil = self.stencil(range);
        let mut scratch = Vec::with_capacity(stencil.len());
        for index in 0..self.cells.len() {
            let origin = self.cells[index].coordinate();
            scratch.clear();
            for offset in &stencil {
                if let Some(target) = self.offset_cell(origin, offset) {
                    if target != index {
                        scratch.push(target);
                    }
                }
            }
            scratch.sort_unstable();
            scratch.dedup();
            let split = scratch.partition_point(|&target| target < index);
            let cell = &mut self.cells[index];
            cell.down.clear();
            cell.down.extend_from_slice(&scratch[..split]);
            cell.up.clear();
            cell.up.extend_from_slice(&scratch[split..]);
        }
        let links: usize = self.cells.iter().map(|cell| cell.up.len()).sum();
        debug!(range, offsets = stencil.len(), links, "linked neighbor cells");
    }

    /// Lattice offsets whose nearest-vertex gap is within `range`.
    fn stencil(&self, range: f64) -> Vec<[i64; DIM]> {
        let size = self.primitive.size();
        let reach: [i64; DIM] = std::array::from_fn(|axis| {
            let needed = (range / size[axis]).ceil() as i64 + 1;
            needed.min(self.dims[axis] as i64 - 1).max(0)
        });
        let range_sq = range * range;
        let mut offsets = Vec::new();
        for dx in -reach[0]..=reach[0] {
            for dy in -reach[1]..=reach[1] {
                for dz in -reach[2]..=reach[2] {
                    let offset = [dx, dy, dz];
                    let gap_sq: f64 = (0..DIM)
                        .map(|axis| {
                            let gap = (offset[axis].unsigned_abs().saturating_sub(1)) as f64
                                * size[axis];
                            gap * gap
                        })
                        .sum();
                    if gap_sq <= range_sq && offset != [0; DIM] {
                        offsets.push(offset);
                    }
                }
            }
        }
        offsets
    }

    fn offset_cell(&self, origin: [usize; DIM], offset: &[i64; DIM]) -> Option<usize> {
        let mut coordinate = [0usize; DIM];
        for axis in 0..DIM {
            let n = self.dims[axis] as i64;
            let mut c = origin[axis] as i64 + offset[axis];
            if self.periodic[axis] {
                c = c.rem_euclid(n);
            } else if !(0..n).contains(&c) {
                return None;
            }
            coordinate[axis] = c as usize;
        }
        Some(self.flat_index(coordinate))
    }

    fn axis_coordinate(&self, x: f64, axis: usize) -> usize {
        let n = self.dims[axis];
        let planes = &self.planes[axis];
        let offset = x + 0.5 * self.extent[axis];
        let mut c = self.primitive.lattice_coordinate(offset, axis);
        if self.periodic[axis] {
            c = c.rem_euclid(n as i64);
        }
        let mut c = c.clamp(0, n as i64 - 1) as usize;
        // Settle rounding disagreements with the stored faces.
        if c > 0 && x < planes[c] {
            c -= 1;
        } else if c + 1 < n && x >= planes[c + 1] {
            c += 1;
        }
        c
    }

    fn compute_planes(&mut self) {
        let size = self.primitive.size();
        for axis in 0..DIM {
            let n = self.dims[axis];
            let half = 0.5 * self.extent[axis];
            let planes = &mut self.planes[axis];
            planes.clear();
            planes.extend((0..n).map(|k| -half + k as f64 * size[axis]));
            planes.push(half);
        }
    }

    fn bounds(&self, coordinate: [usize; DIM]) -> (Vector, Vector) {
        let mut lower = [0.0; DIM];
        let mut upper = [0.0; DIM];
        for axis in 0..DIM {
            let k = coordinate[axis];
            let n = self.dims[axis];
            let closed = !self.periodic[axis];
            lower[axis] = if closed && k == 0 {
                f64::NEG_INFINITY
            } else {
                self.planes[axis][k]
            };
            upper[axis] = if closed && k + 1 == n {
                f64::INFINITY
            } else {
                self.planes[axis][k + 1]
            };
        }
        (lower, upper)
    }
}

/// Number of cells in a lattice of `dims`, refusing sizes beyond [`MAX_CELLS`].
pub(crate) fn total_cells(dims: [usize; DIM]) -> Result<usize, IndexError> {
    dims.iter()
        .try_fold(1_usize, |total, &n| total.checked_mul(n))
        .filter(|&total| total <= MAX_CELLS)
        .ok_or(IndexError::InvalidConfig("cell lattice is too large"))
}
