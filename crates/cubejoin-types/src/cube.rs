//! Axis-aligned n-dimensional boxes ("cubes").
//!
//! A [`Cube`] stores a normalized lower and upper corner, so every axis
//! satisfies `lower <= upper` regardless of the order the corners were
//! given in. Cubes of different dimensionality can be compared and merged:
//!
//! - [`Cube::overlaps`] only tests the axes both cubes have. An axis that
//!   one cube lacks does not constrain the test.
//! - [`Cube::union_all`] produces a cube with the largest dimensionality it
//!   sees. On an axis missing from any input the union is unbounded, so the
//!   union still overlaps everything each of its inputs overlaps.

use std::fmt;

use cubejoin_error::JoinError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::limits::MAX_CUBE_DIM;

type Coords = SmallVec<[f64; 4]>;

// ---------------------------------------------------------------------------
// CubeError
// ---------------------------------------------------------------------------

/// Reasons a cube cannot be built from a pair of corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeError {
    /// The corners have different numbers of coordinates.
    DimensionMismatch { lower: usize, upper: usize },
    /// More than [`MAX_CUBE_DIM`] coordinates per corner.
    TooManyDimensions { dim: usize },
    /// A coordinate is NaN.
    NotANumber { axis: usize },
}

impl fmt::Display for CubeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { lower, upper } => write!(
                f,
                "corners have different dimensionality: {lower} and {upper}"
            ),
            Self::TooManyDimensions { dim } => {
                write!(f, "cube has {dim} dimensions (max {MAX_CUBE_DIM})")
            }
            Self::NotANumber { axis } => write!(f, "coordinate on axis {axis} is NaN"),
        }
    }
}

impl std::error::Error for CubeError {}

impl From<CubeError> for JoinError {
    fn from(err: CubeError) -> Self {
        Self::InvalidCube {
            detail: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cube
// ---------------------------------------------------------------------------

/// An axis-aligned box in up to [`MAX_CUBE_DIM`] dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCube", into = "RawCube")]
pub struct Cube {
    lower: Coords,
    upper: Coords,
}

#[derive(Serialize, Deserialize)]
struct RawCube {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl TryFrom<RawCube> for Cube {
    type Error = CubeError;

    fn try_from(raw: RawCube) -> Result<Self, Self::Error> {
        Self::new(&raw.lower, &raw.upper)
    }
}

impl From<Cube> for RawCube {
    fn from(cube: Cube) -> Self {
        Self {
            lower: cube.lower.into_vec(),
            upper: cube.upper.into_vec(),
        }
    }
}

impl Cube {
    /// Build a cube from two opposite corners.
    ///
    /// Each axis is normalized so that the smaller coordinate becomes the
    /// lower bound.
    pub fn new(a: &[f64], b: &[f64]) -> Result<Self, CubeError> {
        if a.len() != b.len() {
            return Err(CubeError::DimensionMismatch {
                lower: a.len(),
                upper: b.len(),
            });
        }
        if a.len() > MAX_CUBE_DIM {
            return Err(CubeError::TooManyDimensions { dim: a.len() });
        }

        let mut lower = Coords::with_capacity(a.len());
        let mut upper = Coords::with_capacity(a.len());
        for (axis, (&x, &y)) in a.iter().zip(b).enumerate() {
            if x.is_nan() || y.is_nan() {
                return Err(CubeError::NotANumber { axis });
            }
            lower.push(x.min(y));
            upper.push(x.max(y));
        }
        Ok(Self { lower, upper })
    }

    /// Build a zero-extent cube at `coords`.
    pub fn point(coords: &[f64]) -> Result<Self, CubeError> {
        Self::new(coords, coords)
    }

    /// Number of axes.
    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower corner.
    #[inline]
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper corner.
    #[inline]
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Whether both corners coincide.
    #[must_use]
    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    /// Closed-interval overlap on every axis the two cubes share.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.lower
            .iter()
            .zip(&self.upper)
            .zip(other.lower.iter().zip(&other.upper))
            .all(|((&lo1, &hi1), (&lo2, &hi2))| lo1 <= hi2 && lo2 <= hi1)
    }

    /// Smallest cube covering `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.extend(other);
        merged
    }

    /// Smallest cube covering every cube in `cubes`, or `None` if there are
    /// none.
    pub fn union_all<'a>(cubes: impl IntoIterator<Item = &'a Cube>) -> Option<Self> {
        let mut iter = cubes.into_iter();
        let mut merged = iter.next()?.clone();
        for cube in iter {
            merged.extend(cube);
        }
        Some(merged)
    }

    /// Product of the axis extents; `0.0` for a zero-dimensional cube.
    #[must_use]
    pub fn volume(&self) -> f64 {
        if self.lower.is_empty() {
            return 0.0;
        }
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .product()
    }

    fn extend(&mut self, other: &Self) {
        let shared = self.dim().min(other.dim());
        for axis in 0..shared {
            self.lower[axis] = self.lower[axis].min(other.lower[axis]);
            self.upper[axis] = self.upper[axis].max(other.upper[axis]);
        }
        // Axes only one side has are unconstrained for the other side.
        for axis in shared..self.dim() {
            self.lower[axis] = f64::NEG_INFINITY;
            self.upper[axis] = f64::INFINITY;
        }
        for _ in shared..other.dim() {
            self.lower.push(f64::NEG_INFINITY);
            self.upper.push(f64::INFINITY);
        }
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn corner(f: &mut fmt::Formatter<'_>, coords: &[f64]) -> fmt::Result {
            f.write_str("(")?;
            for (i, c) in coords.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str(")")
        }

        corner(f, &self.lower)?;
        if !self.is_point() {
            f.write_str(",")?;
            corner(f, &self.upper)?;
        }
        Ok(())
    }
}
