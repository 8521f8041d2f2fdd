//! Filters applied on top of cell-level neighbor candidates.

use crate::IndexError;
use molsim_core::{Boundary, Vector, geometry};

/// Squared minimum-image separation of `a` and `b`.
#[must_use]
pub fn separation_sq(boundary: &dyn Boundary, a: &Vector, b: &Vector) -> f64 {
    let mut dr = geometry::sub(b, a);
    boundary.nearest_image(&mut dr);
    geometry::length_squared(&dr)
}

/// Decides whether a cell-level candidate pair really interacts.
pub trait NeighborCriterion {
    /// Largest separation the criterion can accept, if bounded.
    fn range(&self) -> Option<f64>;

    fn accept(&self, boundary: &dyn Boundary, a: &Vector, b: &Vector) -> bool;
}

/// Accepts pairs closer than a fixed cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoffCriterion {
    cutoff: f64,
    cutoff_sq: f64,
}

impl CutoffCriterion {
    pub fn new(cutoff: f64) -> Result<Self, IndexError> {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(IndexError::InvalidConfig("cutoff must be positive and finite"));
        }
        Ok(Self {
            cutoff,
            cutoff_sq: cutoff * cutoff,
        })
    }

    #[must_use]
    pub const fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl NeighborCriterion for CutoffCriterion {
    fn range(&self) -> Option<f64> {
        Some(self.cutoff)
    }

    fn accept(&self, boundary: &dyn Boundary, a: &Vector, b: &Vector) -> bool {
        separation_sq(boundary, a, b) <= self.cutoff_sq
    }
}

/// Accepts every candidate the cell grid produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellCriterion;

impl NeighborCriterion for CellCriterion {
    fn range(&self) -> Option<f64> {
        None
    }

    fn accept(&self, _boundary: &dyn Boundary, _a: &Vector, _b: &Vector) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molsim_core::PeriodicBox;

    #[test]
    fn cutoff_respects_periodic_images() {
        let boundary = PeriodicBox::cubic(10.0).expect("box");
        let criterion = CutoffCriterion::new(1.5).expect("criterion");
        assert!(criterion.accept(&boundary, &[-4.8, 0.0, 0.0], &[4.6, 0.0, 0.0]));
        assert!(!criterion.accept(&boundary, &[-4.8, 0.0, 0.0], &[2.0, 0.0, 0.0]));
        assert_eq!(criterion.range(), Some(1.5));
        assert!(CutoffCriterion::new(-1.0).is_err());
    }

    #[test]
    fn cell_criterion_is_unbounded() {
        let boundary = PeriodicBox::cubic(1.0).expect("box");
        assert!(CellCriterion.accept(&boundary, &[0.0; 3], &[0.4; 3]));
        assert_eq!(CellCriterion.range(), None);
    }
}
