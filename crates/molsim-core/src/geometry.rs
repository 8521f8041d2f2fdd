//! Simulation volume geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Spatial dimension of every molsim volume.
pub const DIM: usize = 3;

/// Cartesian coordinate or displacement.
pub type Vector = [f64; DIM];

/// Component-wise `a - b`.
#[inline]
#[must_use]
pub fn sub(a: &Vector, b: &Vector) -> Vector {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Component-wise `a + b`.
#[inline]
#[must_use]
pub fn add(a: &Vector, b: &Vector) -> Vector {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
#[must_use]
pub fn length_squared(v: &Vector) -> f64 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

/// Component-wise product of `v` with `scales`.
#[inline]
#[must_use]
pub fn scale_components(v: &Vector, scales: &Vector) -> Vector {
    [v[0] * scales[0], v[1] * scales[1], v[2] * scales[2]]
}

/// Errors raised by boundary construction and resizing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("box length on axis {axis} must be positive and finite, got {value}")]
    InvalidDimension { axis: usize, value: f64 },
    #[error("scale factor on axis {axis} must be positive and finite, got {value}")]
    InvalidScale { axis: usize, value: f64 },
}

/// Shape of the simulated volume as seen by the indexing structures.
///
/// Implementations are centred on the origin: axis `d` spans
/// `[-L_d / 2, L_d / 2)`.
pub trait Boundary: fmt::Debug {
    /// Edge lengths of the volume.
    fn dimensions(&self) -> Vector;

    /// Which axes wrap around.
    fn periodicity(&self) -> [bool; DIM];

    /// Replace the edge lengths, leaving periodicity untouched.
    fn set_dimensions(&mut self, dimensions: Vector) -> Result<(), GeometryError>;

    fn volume(&self) -> f64 {
        self.dimensions().iter().product()
    }

    /// True when `point` lies inside the volume.
    fn contains(&self, point: &Vector) -> bool {
        let dims = self.dimensions();
        (0..DIM).all(|axis| {
            let half = 0.5 * dims[axis];
            point[axis] >= -half && point[axis] < half
        })
    }

    /// Reduce a displacement to its minimum image along periodic axes.
    fn nearest_image(&self, dr: &mut Vector) {
        let dims = self.dimensions();
        let periodic = self.periodicity();
        for axis in 0..DIM {
            if periodic[axis] {
                dr[axis] -= dims[axis] * (dr[axis] / dims[axis]).round();
            }
        }
    }

    /// Fold a position back into the primary image along periodic axes.
    fn wrap(&self, point: &mut Vector) {
        let dims = self.dimensions();
        let periodic = self.periodicity();
        for axis in 0..DIM {
            if !periodic[axis] {
                continue;
            }
            let length = dims[axis];
            let half = 0.5 * length;
            let mut x = point[axis] - length * (point[axis] / length + 0.5).floor();
            // floor() can land exactly on the open upper face after rounding.
            if x >= half {
                x -= length;
            }
            if x < -half {
                x += length;
            }
            point[axis] = x;
        }
    }

    /// Uniformly rescale every edge by `scale`.
    fn inflate(&mut self, scale: f64) -> Result<(), GeometryError> {
        self.deform(&[scale; DIM])
    }

    /// Rescale each edge by its own factor.
    fn deform(&mut self, scales: &Vector) -> Result<(), GeometryError> {
        for (axis, &value) in scales.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(GeometryError::InvalidScale { axis, value });
            }
        }
        let scaled = scale_components(&self.dimensions(), scales);
        self.set_dimensions(scaled)
    }
}

/// Rectangular box with independently periodic axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicBox {
    dimensions: Vector,
    periodic: [bool; DIM],
}

impl PeriodicBox {
    /// Box periodic along every axis.
    pub fn new(dimensions: Vector) -> Result<Self, GeometryError> {
        Self::with_periodicity(dimensions, [true; DIM])
    }

    /// Cube of edge `edge`, periodic along every axis.
    pub fn cubic(edge: f64) -> Result<Self, GeometryError> {
        Self::new([edge; DIM])
    }

    pub fn with_periodicity(
        dimensions: Vector,
        periodic: [bool; DIM],
    ) -> Result<Self, GeometryError> {
        validate_dimensions(&dimensions)?;
        Ok(Self {
            dimensions,
            periodic,
        })
    }
}

impl Boundary for PeriodicBox {
    fn dimensions(&self) -> Vector {
        self.dimensions
    }

    fn periodicity(&self) -> [bool; DIM] {
        self.periodic
    }

    fn set_dimensions(&mut self, dimensions: Vector) -> Result<(), GeometryError> {
        validate_dimensions(&dimensions)?;
        self.dimensions = dimensions;
        Ok(())
    }
}

fn validate_dimensions(dimensions: &Vector) -> Result<(), GeometryError> {
    for (axis, &value) in dimensions.iter().enumerate() {
        if !(value.is_finite() && value > 0.0) {
            return Err(GeometryError::InvalidDimension { axis, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_folds_into_primary_image() {
        let boundary = PeriodicBox::cubic(10.0).expect("box");
        let mut p = [5.0, -5.5, 17.25];
        boundary.wrap(&mut p);
        assert_eq!(p, [-5.0, 4.5, -2.75]);
        assert!(boundary.contains(&p));
    }

    #[test]
    fn wrap_skips_closed_axes() {
        let boundary =
            PeriodicBox::with_periodicity([4.0, 4.0, 4.0], [true, false, true]).expect("box");
        let mut p = [3.0, 3.0, -3.0];
        boundary.wrap(&mut p);
        assert_eq!(p, [-1.0, 3.0, 1.0]);
        assert!(!boundary.contains(&p));
    }

    #[test]
    fn nearest_image_picks_shortest_displacement() {
        let boundary = PeriodicBox::cubic(10.0).expect("box");
        let mut dr = [9.0, -6.0, 0.5];
        boundary.nearest_image(&mut dr);
        assert_eq!(dr, [-1.0, 4.0, 0.5]);
    }

    #[test]
    fn inflate_and_deform_validate_factors() {
        let mut boundary = PeriodicBox::new([2.0, 3.0, 4.0]).expect("box");
        boundary.inflate(2.0).expect("inflate");
        assert_eq!(boundary.dimensions(), [4.0, 6.0, 8.0]);
        assert!((boundary.volume() - 192.0).abs() < 1e-12);

        boundary.deform(&[1.0, 0.5, 0.25]).expect("deform");
        assert_eq!(boundary.dimensions(), [4.0, 3.0, 2.0]);

        let err = boundary.deform(&[1.0, 0.0, 1.0]).unwrap_err();
        assert_eq!(err, GeometryError::InvalidScale { axis: 1, value: 0.0 });
        assert_eq!(boundary.dimensions(), [4.0, 3.0, 2.0]);
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        let err = PeriodicBox::new([1.0, f64::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidDimension { axis: 1, .. }));
    }
}
