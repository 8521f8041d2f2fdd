//! Spatial indexing abstractions for particle neighborhood queries.
//!
//! [`CellGrid`] partitions a box into a [`CellLattice`], keeps every atom's
//! cell assignment current as the box reports lifecycle events, and serves
//! cell-ordered sequential and neighbor traversals.

pub mod cell;
pub mod criterion;
pub mod grid;
pub mod iter;
pub mod lattice;
pub mod order;
pub mod primitive;

pub use cell::{Cell, CellMarker};
pub use criterion::{CellCriterion, CutoffCriterion, NeighborCriterion, separation_sq};
pub use grid::{CellGrid, Placement};
pub use iter::{Direction, NeighborIter, SequentialIter};
pub use lattice::CellLattice;
pub use order::{CellOrder, LinkKey, LinkKind};
pub use primitive::{Primitive, RectangularPrimitive};

use molsim_core::{BoxView, DIM, IndexReservoir, Vector};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of cells in one lattice.
pub const MAX_CELLS: usize = 1 << 24;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive range).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The neighbor range would see a particle's own periodic image.
    #[error("neighbor range {range} exceeds half the periodic length {limit} on axis {axis}")]
    DegenerateRange { range: f64, axis: usize, limit: f64 },
    #[error("atom {0} has no cell to seed neighbor iteration from")]
    NoReference(usize),
    #[error("atom {0} is not assigned to a cell")]
    Unassigned(usize),
    #[error("no live atom at global index {0}")]
    UnknownAtom(usize),
    /// Non-uniform scaling cannot be patched into an existing lattice.
    #[error("anisotropic inflation by {scale} requires a lattice rebuild")]
    AnisotropicInflate { scale: f64 },
    #[error("query radius {radius} exceeds the neighbor range {range}")]
    RadiusExceedsRange { radius: f64, range: f64 },
}

/// Static configuration for a [`CellGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Distance within which atoms count as neighbors.
    pub neighbor_range: f64,
    /// Cells spanning one neighbor range when counts are derived.
    pub cell_range: usize,
    /// Explicit cell counts per axis, overriding `cell_range`.
    pub cells_per_axis: Option<[usize; DIM]>,
    /// Slack for the per-atom placement table.
    pub reservoir: IndexReservoir,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            neighbor_range: 1.0,
            cell_range: 2,
            cells_per_axis: None,
            reservoir: IndexReservoir::default(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn with_range(neighbor_range: f64) -> Self {
        Self {
            neighbor_range,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if !(self.neighbor_range.is_finite() && self.neighbor_range > 0.0) {
            return Err(IndexError::InvalidConfig(
                "neighbor_range must be positive and finite",
            ));
        }
        if self.cell_range == 0 {
            return Err(IndexError::InvalidConfig("cell_range must be at least 1"));
        }
        if self.cells_per_axis.is_some_and(|cells| cells.contains(&0)) {
            return Err(IndexError::InvalidConfig("cells_per_axis must be non-zero"));
        }
        Ok(())
    }

    /// Cell counts for a box of edge lengths `dimensions`: explicit, or
    /// enough that `cell_range` cells span one neighbor range.
    ///
    /// Fails when the lattice would exceed [`MAX_CELLS`].
    pub fn cell_counts(&self, dimensions: &Vector) -> Result<[usize; DIM], IndexError> {
        let counts = self.cells_per_axis.unwrap_or_else(|| {
            std::array::from_fn(|axis| {
                let cells =
                    (dimensions[axis] * self.cell_range as f64 / self.neighbor_range).floor();
                // Saturating cast; oversized counts are refused below.
                (cells as usize).max(1)
            })
        });
        lattice::total_cells(counts)?;
        Ok(counts)
    }
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from the box's current geometry and atoms.
    fn rebuild(&mut self, view: &BoxView<'_>) -> Result<(), IndexError>;

    /// Visit neighbors of `reference` within the provided squared radius.
    fn neighbors_within(
        &self,
        view: &BoxView<'_>,
        reference: usize,
        radius_sq: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    ) -> Result<(), IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use molsim_core::PeriodicBox;

    #[test]
    fn derived_cell_counts_follow_cell_range() {
        let dimensions = [10.0, 3.0, 0.5];
        let config = IndexConfig::with_range(1.5);
        assert_eq!(config.cell_counts(&dimensions), Ok([13, 4, 1]));

        let explicit = IndexConfig {
            cells_per_axis: Some([2, 3, 4]),
            ..config
        };
        assert_eq!(explicit.cell_counts(&dimensions), Ok([2, 3, 4]));
    }

    #[test]
    fn huge_lattices_are_refused() {
        let config = IndexConfig::with_range(1e-6);
        assert_eq!(
            config.cell_counts(&[1e6; DIM]),
            Err(IndexError::InvalidConfig("cell lattice is too large"))
        );
        let explicit = IndexConfig {
            cells_per_axis: Some([usize::MAX, usize::MAX, 2]),
            ..IndexConfig::default()
        };
        assert!(explicit.cell_counts(&[1.0; DIM]).is_err());

        let boundary = PeriodicBox::cubic(1e6).expect("box");
        assert!(matches!(
            CellGrid::new(&boundary, config),
            Err(IndexError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        assert!(IndexConfig::with_range(0.0).validate().is_err());
        assert!(IndexConfig::with_range(f64::INFINITY).validate().is_err());
        let config = IndexConfig {
            cell_range: 0,
            ..IndexConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(IndexError::InvalidConfig("cell_range must be at least 1"))
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: IndexConfig =
            serde_json::from_str(r#"{"neighbor_range": 2.5, "cells_per_axis": [4, 4, 2]}"#)
                .expect("json");
        assert_eq!(config.neighbor_range, 2.5);
        assert_eq!(config.cell_range, 2);
        assert_eq!(config.cells_per_axis, Some([4, 4, 2]));
        assert_eq!(config.reservoir, IndexReservoir::default());
    }
}
