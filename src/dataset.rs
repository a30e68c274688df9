//! # Dataset Loading
//!
//! This module opens NetCDF files into a [`Dataset`]: the named variables, the
//! dimensions and their coordinate arrays, and the attached attributes (units,
//! descriptions). Variable values are read when a variable is selected with
//! [`Dataset::variable`], which returns a [`LabeledArray`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use nc2map::dataset::{Dataset, LoadOptions};
//! use nc2map::array::MissingPolicy;
//!
//! let ds = Dataset::open("control_merged.nc", &LoadOptions::default())?;
//! let da = ds.variable("QRUNOFF")?;
//! println!("units: {:?}", da.units());
//! println!("lon units: {:?}", da.coord("lon")?.units());
//!
//! let da_mean = da.mean("time", MissingPolicy::Skip)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::array::{ArrayError, Coordinate, LabeledArray};
use crate::time;

/// Errors that can occur while loading a dataset or selecting a variable
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Not a readable NetCDF file: {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("Variable '{name}' not found in dataset (available: {available:?})")]
    VariableNotFound { name: String, available: Vec<String> },

    #[error("Cannot decode times of '{coordinate}': {reason}")]
    TimeDecode { coordinate: String, reason: String },

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Options controlling how a dataset is opened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadOptions {
    /// Decode CF time coordinates into calendar dates
    pub decode_times: bool,
    /// Replace `_FillValue`/`missing_value` with NaN and apply `scale_factor`/`add_offset`
    pub mask_and_scale: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            decode_times: false,
            mask_and_scale: true,
        }
    }
}

/// A NetCDF attribute value, flattened to the shapes that matter for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Texts(Vec<String>),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// First numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Numbers(v) => v.first().copied(),
            _ => None,
        }
    }

    /// All numeric values (e.g. a list of fill values)
    pub fn as_f64_vec(&self) -> Vec<f64> {
        match self {
            AttributeValue::Number(v) => vec![*v],
            AttributeValue::Numbers(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Texts(v) => write!(f, "{}", v.join(", ")),
            AttributeValue::Number(v) => write!(f, "{}", v),
            AttributeValue::Numbers(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<netcdf::AttributeValue> for AttributeValue {
    fn from(value: netcdf::AttributeValue) -> Self {
        use netcdf::AttributeValue as Nc;
        match value {
            Nc::Uchar(v) => AttributeValue::Number(v as f64),
            Nc::Schar(v) => AttributeValue::Number(v as f64),
            Nc::Ushort(v) => AttributeValue::Number(v as f64),
            Nc::Short(v) => AttributeValue::Number(v as f64),
            Nc::Uint(v) => AttributeValue::Number(v as f64),
            Nc::Int(v) => AttributeValue::Number(v as f64),
            Nc::Ulonglong(v) => AttributeValue::Number(v as f64),
            Nc::Longlong(v) => AttributeValue::Number(v as f64),
            Nc::Float(v) => AttributeValue::Number(v as f64),
            Nc::Double(v) => AttributeValue::Number(v),
            Nc::Uchars(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Schars(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Ushorts(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Shorts(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Uints(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Ints(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Ulonglongs(v) => AttributeValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
            Nc::Longlongs(v) => AttributeValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
            Nc::Floats(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
            Nc::Doubles(v) => AttributeValue::Numbers(v),
            Nc::Str(s) => AttributeValue::Text(s),
            Nc::Strs(v) => AttributeValue::Texts(v),
            #[allow(unreachable_patterns)]
            other => AttributeValue::Text(format!("{:?}", other)),
        }
    }
}

/// Metadata of one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionInfo {
    pub name: String,
    pub len: usize,
    pub is_unlimited: bool,
}

/// Metadata of one variable, available without reading its values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl VariableInfo {
    pub fn units(&self) -> Option<&str> {
        self.attributes.get("units").and_then(|a| a.as_str())
    }
}

/// An opened NetCDF dataset.
///
/// Metadata and coordinates are read eagerly on open; data variables are read
/// on demand. The file stays open until the dataset is dropped or closed.
pub struct Dataset {
    path: PathBuf,
    file: netcdf::File,
    options: LoadOptions,
    dimensions: Vec<DimensionInfo>,
    variables: BTreeMap<String, VariableInfo>,
    coordinates: BTreeMap<String, Coordinate>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("dimensions", &self.dimensions)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dataset {
    /// Opens a NetCDF file.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::FileNotFound`] if `path` does not exist
    /// - [`DatasetError::Format`] if the file is not a readable NetCDF file
    /// - [`DatasetError::TimeDecode`] if `decode_times` is set and a time axis
    ///   cannot be decoded
    pub fn open<P: AsRef<Path>>(path: P, options: &LoadOptions) -> DatasetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DatasetError::FileNotFound(path));
        }

        debug!("Opening NetCDF file: {}", path.display());
        let file = netcdf::open(&path).map_err(|source| DatasetError::Format {
            path: path.clone(),
            source,
        })?;

        let dimensions: Vec<DimensionInfo> = file
            .dimensions()
            .map(|dim| DimensionInfo {
                name: dim.name().to_string(),
                len: dim.len(),
                is_unlimited: dim.is_unlimited(),
            })
            .collect();

        let mut variables = BTreeMap::new();
        for var in file.variables() {
            let info = VariableInfo {
                name: var.name().to_string(),
                data_type: format!("{:?}", var.vartype()),
                dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
                shape: var.dimensions().iter().map(|d| d.len()).collect(),
                attributes: read_attributes(var.attributes()),
            };
            variables.insert(info.name.clone(), info);
        }

        let attributes = read_attributes(file.attributes());

        let mut ds = Dataset {
            path,
            file,
            options: options.clone(),
            dimensions,
            variables,
            coordinates: BTreeMap::new(),
            attributes,
        };
        ds.coordinates = ds.read_coordinates()?;

        debug!(
            "Loaded dataset with {} dimensions and {} variables",
            ds.dimensions.len(),
            ds.variables.len()
        );
        Ok(ds)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn dimensions(&self) -> &[DimensionInfo] {
        &self.dimensions
    }

    /// All variables by name, including coordinate variables
    pub fn variables(&self) -> &BTreeMap<String, VariableInfo> {
        &self.variables
    }

    /// Variables that are not coordinates of a dimension
    pub fn data_variables(&self) -> Vec<&VariableInfo> {
        self.variables
            .values()
            .filter(|v| !self.coordinates.contains_key(&v.name))
            .collect()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn variable_info(&self, name: &str) -> DatasetResult<&VariableInfo> {
        self.variables
            .get(name)
            .ok_or_else(|| self.variable_not_found(name))
    }

    /// Coordinate array for a dimension.
    ///
    /// Dimensions without a coordinate variable get a positional index.
    pub fn coordinate(&self, name: &str) -> DatasetResult<Coordinate> {
        if let Some(coord) = self.coordinates.get(name) {
            return Ok(coord.clone());
        }
        match self.dimensions.iter().find(|d| d.name == name) {
            Some(dim) => Ok(Coordinate::index(&dim.name, dim.len)),
            None => Err(self.variable_not_found(name)),
        }
    }

    /// Reads a variable into a labeled array.
    ///
    /// The result has the dimensions, shape and attributes recorded in the file;
    /// with `mask_and_scale`, fill values become NaN and packing is undone.
    pub fn variable(&self, name: &str) -> DatasetResult<LabeledArray> {
        let info = self.variable_info(name)?;
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| self.variable_not_found(name))?;

        debug!("Reading variable '{}' with shape {:?}", name, info.shape);
        let mut values: Vec<f64> = var.get_values::<f64, _>(..)?;
        if self.options.mask_and_scale {
            mask_and_scale(&mut values, &info.attributes);
        }

        let data = ArrayD::from_shape_vec(IxDyn(&info.shape), values)
            .map_err(|e| ArrayError::Shape(e.to_string()))?;

        let mut coords = Vec::with_capacity(info.dimensions.len());
        for dim in &info.dimensions {
            coords.push(self.coordinate(dim)?);
        }

        Ok(LabeledArray::new(name, data, coords)?.with_attributes(info.attributes.clone()))
    }

    /// Closes the underlying file.
    pub fn close(self) -> DatasetResult<()> {
        self.file.close()?;
        Ok(())
    }

    fn read_coordinates(&self) -> DatasetResult<BTreeMap<String, Coordinate>> {
        let mut coordinates = BTreeMap::new();
        for dim in &self.dimensions {
            let Some(info) = self.variables.get(&dim.name) else {
                continue;
            };
            if info.dimensions.len() != 1 || info.dimensions[0] != dim.name {
                continue;
            }
            let Some(var) = self.file.variable(&dim.name) else {
                continue;
            };

            let values = match var.get_values::<f64, _>(..) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Skipping non-numeric coordinate '{}': {}", dim.name, e);
                    continue;
                }
            };

            let mut coord = Coordinate::new(&dim.name, values);
            coord.attributes = info.attributes.clone();

            if self.options.decode_times
                && let Some(units) = coord.units().filter(|u| time::is_time_units(u))
            {
                let calendar = coord.attributes.get("calendar").and_then(|a| a.as_str());
                let dates = time::decode_times(&coord.values, units, calendar).map_err(|reason| {
                    DatasetError::TimeDecode {
                        coordinate: dim.name.clone(),
                        reason,
                    }
                })?;
                debug!("Decoded {} time values for '{}'", dates.len(), dim.name);
                coord.dates = Some(dates);
            }

            coordinates.insert(dim.name.clone(), coord);
        }
        Ok(coordinates)
    }

    fn variable_not_found(&self, name: &str) -> DatasetError {
        DatasetError::VariableNotFound {
            name: name.to_string(),
            available: self.variables.keys().cloned().collect(),
        }
    }
}

fn read_attributes<'a>(
    attrs: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> BTreeMap<String, AttributeValue> {
    let mut out = BTreeMap::new();
    for attr in attrs {
        match attr.value() {
            Ok(value) => {
                out.insert(attr.name().to_string(), AttributeValue::from(value));
            }
            Err(e) => warn!("Skipping unreadable attribute '{}': {}", attr.name(), e),
        }
    }
    out
}

/// Applies CF packing and fill-value conventions in place.
pub fn mask_and_scale(values: &mut [f64], attributes: &BTreeMap<String, AttributeValue>) {
    let mut fills: Vec<f64> = Vec::new();
    for key in ["_FillValue", "missing_value"] {
        if let Some(attr) = attributes.get(key) {
            fills.extend(attr.as_f64_vec());
        }
    }
    let scale = attributes.get("scale_factor").and_then(|a| a.as_f64());
    let offset = attributes.get("add_offset").and_then(|a| a.as_f64());

    for v in values.iter_mut() {
        if fills.iter().any(|f| values_match(*f, *v)) {
            *v = f64::NAN;
            continue;
        }
        if let Some(s) = scale {
            *v *= s;
        }
        if let Some(o) = offset {
            *v += o;
        }
    }
}

/// Fill values are stored in the variable's own type, so compare at `f32` precision too
fn values_match(fill: f64, v: f64) -> bool {
    fill == v || (fill as f32) == (v as f32)
}
