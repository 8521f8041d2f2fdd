//! Unit-cell geometry of a cell lattice.

use crate::IndexError;
use molsim_core::{Boundary, DIM, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of one lattice cell.
pub trait Primitive: fmt::Debug {
    /// Edge lengths of the cell.
    fn size(&self) -> Vector;

    /// Uniformly rescale the cell.
    fn scale(&mut self, factor: f64);

    /// Unwrapped lattice coordinate of an offset `x` from the lattice origin.
    fn lattice_coordinate(&self, x: f64, axis: usize) -> i64 {
        (x / self.size()[axis]).floor() as i64
    }
}

/// Orthorhombic primitive: an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectangularPrimitive {
    size: Vector,
}

impl RectangularPrimitive {
    pub fn new(size: Vector) -> Result<Self, IndexError> {
        if size.iter().any(|edge| !(edge.is_finite() && *edge > 0.0)) {
            return Err(IndexError::InvalidConfig(
                "primitive edges must be positive and finite",
            ));
        }
        Ok(Self { size })
    }

    /// Primitive that tiles `boundary` with `cells[d]` cells along axis `d`.
    pub fn for_boundary(boundary: &dyn Boundary, cells: [usize; DIM]) -> Result<Self, IndexError> {
        if cells.contains(&0) {
            return Err(IndexError::InvalidConfig("cell counts must be non-zero"));
        }
        let dims = boundary.dimensions();
        Self::new(std::array::from_fn(|axis| dims[axis] / cells[axis] as f64))
    }
}

impl Primitive for RectangularPrimitive {
    fn size(&self) -> Vector {
        self.size
    }

    fn scale(&mut self, factor: f64) {
        for edge in &mut self.size {
            *edge *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molsim_core::PeriodicBox;

    #[test]
    fn tiles_boundary() {
        let boundary = PeriodicBox::new([10.0, 6.0, 4.0]).expect("box");
        let primitive = RectangularPrimitive::for_boundary(&boundary, [5, 3, 8]).expect("primitive");
        assert_eq!(primitive.size(), [2.0, 2.0, 0.5]);
        assert_eq!(primitive.lattice_coordinate(4.1, 0), 2);
        assert_eq!(primitive.lattice_coordinate(-0.1, 2), -1);
    }

    #[test]
    fn rejects_zero_cells() {
        let boundary = PeriodicBox::cubic(1.0).expect("box");
        assert!(RectangularPrimitive::for_boundary(&boundary, [1, 0, 1]).is_err());
    }
}
