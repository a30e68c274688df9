//! # Labeled Arrays
//!
//! This module provides [`LabeledArray`], an n-dimensional `f64` array whose axes
//! carry names and coordinate values, together with the reductions used to
//! collapse a variable before plotting.
//!
//! ## Reductions
//!
//! - **Mean**: arithmetic mean with equal weights along one dimension
//! - **Sum**, **Min**, **Max**, **Std**: the other aggregations accepted by
//!   [`Aggregation`]
//!
//! Missing values (NaN, including masked fill values) are handled according to
//! an explicit [`MissingPolicy`] rather than an implicit library default.
//!
//! ## Example
//!
//! ```rust
//! use nc2map::array::{Coordinate, LabeledArray, MissingPolicy};
//! use ndarray::{ArrayD, IxDyn};
//!
//! let data = ArrayD::from_elem(IxDyn(&[12, 10, 20]), 1.0);
//! let da = LabeledArray::new(
//!     "QRUNOFF",
//!     data,
//!     vec![
//!         Coordinate::index("time", 12),
//!         Coordinate::index("lat", 10),
//!         Coordinate::index("lon", 20),
//!     ],
//! )?;
//!
//! let da_mean = da.mean("time", MissingPolicy::Skip)?;
//! assert_eq!(da_mean.shape(), &[10, 20]);
//! # Ok::<(), nc2map::array::ArrayError>(())
//! ```

use chrono::NaiveDateTime;
use ndarray::{ArrayD, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::dataset::AttributeValue;

/// Errors raised by labeled-array operations
#[derive(Error, Debug, PartialEq)]
pub enum ArrayError {
    #[error("Dimension '{dimension}' not found on '{variable}' (dimensions: {available:?})")]
    DimensionNotFound {
        variable: String,
        dimension: String,
        available: Vec<String>,
    },

    #[error("Index {index} out of bounds for dimension '{dimension}' of length {len}")]
    IndexOutOfBounds {
        dimension: String,
        index: usize,
        len: usize,
    },

    #[error("Shape error: {0}")]
    Shape(String),
}

/// Result type for labeled-array operations
pub type ArrayResult<T> = Result<T, ArrayError>;

/// How NaN samples are treated while reducing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Exclude NaN samples; a lane with no valid sample reduces to NaN
    #[default]
    Skip,
    /// Any NaN in a lane makes the result NaN
    Propagate,
}

/// Aggregation applied along the reduced dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    /// Population standard deviation
    Std,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Std => "std",
        };
        f.write_str(name)
    }
}

impl Aggregation {
    /// Reduces one lane of samples.
    ///
    /// Under [`MissingPolicy::Propagate`] a NaN anywhere in the lane wins; under
    /// [`MissingPolicy::Skip`] NaNs are dropped first and an empty lane gives NaN.
    pub fn apply(&self, lane: impl Iterator<Item = f64>, policy: MissingPolicy) -> f64 {
        let mut values = Vec::new();
        for v in lane {
            if v.is_nan() {
                match policy {
                    MissingPolicy::Propagate => return f64::NAN,
                    MissingPolicy::Skip => continue,
                }
            }
            values.push(v);
        }

        if values.is_empty() {
            return f64::NAN;
        }

        let n = values.len() as f64;
        match self {
            Aggregation::Mean => values.iter().sum::<f64>() / n,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Std => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                var.sqrt()
            }
        }
    }
}

/// Values backing one named dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Calendar dates, present only when time decoding was requested
    pub dates: Option<Vec<NaiveDateTime>>,
}

impl Coordinate {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Coordinate {
            name: name.to_string(),
            values,
            attributes: BTreeMap::new(),
            dates: None,
        }
    }

    /// Positional coordinate `0..len` for dimensions without a coordinate variable
    pub fn index(name: &str, len: usize) -> Self {
        Self::new(name, (0..len).map(|i| i as f64).collect())
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `units` attribute, if it is textual
    pub fn units(&self) -> Option<&str> {
        self.attributes.get("units").and_then(|a| a.as_str())
    }
}

/// An n-dimensional array with named, coordinate-backed dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    pub name: String,
    data: ArrayD<f64>,
    coords: Vec<Coordinate>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl LabeledArray {
    /// Builds a labeled array, checking that there is one coordinate per axis
    /// and that each coordinate matches its axis length.
    pub fn new(name: &str, data: ArrayD<f64>, coords: Vec<Coordinate>) -> ArrayResult<Self> {
        if coords.len() != data.ndim() {
            return Err(ArrayError::Shape(format!(
                "'{}' has {} axes but {} coordinates",
                name,
                data.ndim(),
                coords.len()
            )));
        }
        for (axis, coord) in coords.iter().enumerate() {
            if coord.len() != data.len_of(Axis(axis)) {
                return Err(ArrayError::Shape(format!(
                    "coordinate '{}' has {} values but axis {} of '{}' has length {}",
                    coord.name,
                    coord.len(),
                    axis,
                    name,
                    data.len_of(Axis(axis))
                )));
            }
        }

        Ok(LabeledArray {
            name: name.to_string(),
            data,
            coords,
            attributes: BTreeMap::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn dims(&self) -> Vec<&str> {
        self.coords.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn values(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn into_values(self) -> ArrayD<f64> {
        self.data
    }

    /// The `units` attribute, if it is textual
    pub fn units(&self) -> Option<&str> {
        self.attributes.get("units").and_then(|a| a.as_str())
    }

    /// Coordinate of a named dimension
    pub fn coord(&self, dim: &str) -> ArrayResult<&Coordinate> {
        let axis = self.axis_of(dim)?;
        Ok(&self.coords[axis])
    }

    /// Position of a named dimension
    pub fn axis_of(&self, dim: &str) -> ArrayResult<usize> {
        self.coords
            .iter()
            .position(|c| c.name == dim)
            .ok_or_else(|| ArrayError::DimensionNotFound {
                variable: self.name.clone(),
                dimension: dim.to_string(),
                available: self.coords.iter().map(|c| c.name.clone()).collect(),
            })
    }

    /// Arithmetic mean along `dim`.
    pub fn mean(&self, dim: &str, policy: MissingPolicy) -> ArrayResult<LabeledArray> {
        self.reduce(dim, Aggregation::Mean, policy)
    }

    /// Collapses `dim` with the given aggregation.
    ///
    /// The result has the same dimensions, coordinates and attributes minus the
    /// reduced one.
    pub fn reduce(
        &self,
        dim: &str,
        aggregation: Aggregation,
        policy: MissingPolicy,
    ) -> ArrayResult<LabeledArray> {
        let axis = self.axis_of(dim)?;
        let reduced = self
            .data
            .map_axis(Axis(axis), |lane| aggregation.apply(lane.iter().cloned(), policy));

        let mut coords = self.coords.clone();
        coords.remove(axis);

        log::debug!(
            "Reduced '{}' over '{}' with {}: {:?} -> {:?}",
            self.name,
            dim,
            aggregation,
            self.shape(),
            reduced.shape()
        );

        Ok(LabeledArray {
            name: self.name.clone(),
            data: reduced,
            coords,
            attributes: self.attributes.clone(),
        })
    }

    /// Selects a single position along `dim`, dropping that dimension.
    pub fn isel(&self, dim: &str, index: usize) -> ArrayResult<LabeledArray> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(ArrayError::IndexOutOfBounds {
                dimension: dim.to_string(),
                index,
                len,
            });
        }

        let data = self.data.index_axis(Axis(axis), index).to_owned();
        let mut coords = self.coords.clone();
        coords.remove(axis);

        Ok(LabeledArray {
            name: self.name.clone(),
            data,
            coords,
            attributes: self.attributes.clone(),
        })
    }

    /// Smallest finite value, ignoring NaN
    pub fn min(&self) -> Option<f64> {
        self.data
            .iter()
            .cloned()
            .filter(|v| v.is_finite())
            .reduce(f64::min)
    }

    /// Largest finite value, ignoring NaN
    pub fn max(&self) -> Option<f64> {
        self.data
            .iter()
            .cloned()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}
