//! # Input Configuration Module
//!
//! This module provides configuration parsing and validation for nc2map jobs.
//! It handles JSON and YAML configuration files that specify the NetCDF input
//! file, the variable, the reduction, the plot options and the PNG output.
//!
//! ## Configuration Structure
//!
//! A configuration file specifies:
//! - **nc_key**: Path to the input NetCDF file
//! - **variable_name**: Name of the variable to plot
//! - **png_key**: Optional path of the PNG to write
//! - **load**: Dataset loading options (time decoding, fill-value masking)
//! - **reduce**: Dimension, aggregation and missing-value policy
//! - **plot**: Colormap, title, colorbar label, range, levels, projection, extent
//!
//! ## Example Usage
//!
//! ```rust
//! use nc2map::input::JobConfig;
//!
//! let json = r#"
//! {
//!   "nc_key": "control_merged.nc",
//!   "variable_name": "QRUNOFF",
//!   "png_key": "yourfigure.png",
//!   "plot": { "cmap": "GnBu", "steps": 10 }
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! assert_eq!(config.reduce.dimension, "time");
//! assert_eq!(config.plot.dpi, 300);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::array::{Aggregation, MissingPolicy};
use crate::colormap::Colormap;
use crate::dataset::LoadOptions;
use crate::projection::projection_factory;

/// Main configuration structure for nc2map jobs.
///
/// # Examples
///
/// ```rust
/// use nc2map::input::{JobConfig, PlotConfig, ReduceConfig};
/// use nc2map::dataset::LoadOptions;
///
/// let config = JobConfig {
///     nc_key: "control_merged.nc".to_string(),
///     variable_name: "QRUNOFF".to_string(),
///     png_key: Some("yourfigure.png".to_string()),
///     load: LoadOptions::default(),
///     reduce: ReduceConfig::default(),
///     plot: PlotConfig::default(),
/// };
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JobConfig {
    /// Path to the input NetCDF file
    pub nc_key: String,
    /// Name of the variable to plot
    pub variable_name: String,
    /// Path for the output PNG file; no file is written when absent
    #[serde(default)]
    pub png_key: Option<String>,
    #[serde(default)]
    pub load: LoadOptions,
    #[serde(default)]
    pub reduce: ReduceConfig,
    #[serde(default)]
    pub plot: PlotConfig,
}

/// How the variable is collapsed to two dimensions
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReduceConfig {
    /// Dimension to collapse
    pub dimension: String,
    pub aggregation: Aggregation,
    pub missing: MissingPolicy,
    /// Select this position along `dimension` instead of aggregating
    pub index: Option<usize>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        ReduceConfig {
            dimension: "time".to_string(),
            aggregation: Aggregation::Mean,
            missing: MissingPolicy::Skip,
            index: None,
        }
    }
}

/// Where the default color range is taken from when `vmin`/`vmax` are unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RangeSource {
    /// Observed range of the plotted (reduced) field
    #[default]
    Field,
    /// Observed range of the whole variable before reduction
    Variable,
}

/// Plot options.
///
/// `vmin`/`vmax` default to the observed range of the plotted field, or of
/// the unreduced variable with `range_from: variable`. `steps` produces
/// `steps` equally spaced level boundaries from `vmin`; explicit `levels`
/// take precedence over `steps`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PlotConfig {
    pub cmap: String,
    pub title: String,
    pub colorbar_label: String,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub range_from: RangeSource,
    pub steps: Option<usize>,
    pub levels: Option<Vec<f64>>,
    pub projection: String,
    /// `[lon_min, lon_max, lat_min, lat_max]` in degrees
    pub extent: Option<[f64; 4]>,
    /// GeoJSON file with coastline geometry
    pub coastlines: Option<String>,
    /// Figure size in inches (width, height)
    pub figsize: [f64; 2],
    pub dpi: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            cmap: "GnBu".to_string(),
            title: "example plot".to_string(),
            colorbar_label: "colorbar label (units)".to_string(),
            vmin: None,
            vmax: None,
            range_from: RangeSource::Field,
            steps: None,
            levels: None,
            projection: "PlateCarree".to_string(),
            extent: None,
            coastlines: None,
            figsize: [15.0, 6.0],
            dpi: 300,
        }
    }
}

impl JobConfig {
    /// Loads a job configuration from a JSON or YAML file.
    ///
    /// The format is chosen from the extension (`.yaml`/`.yml` for YAML,
    /// anything else is read as JSON).
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use nc2map::input::JobConfig;
    ///
    /// let config = JobConfig::from_file("runoff_map.yaml")?;
    /// println!("Plotting variable: {}", config.variable_name);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Loads a job configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: JobConfig = serde_json::from_str(json_str)?;
        Ok(config)
    }

    /// Loads a job configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: JobConfig = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Checks the configuration without touching the filesystem.
    ///
    /// Returns one message per problem; an empty list means the job is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.nc_key.trim().is_empty() {
            problems.push("Input NetCDF path (nc_key) is empty".to_string());
        }
        if self.variable_name.trim().is_empty() {
            problems.push("Variable name is empty".to_string());
        }
        if self.reduce.dimension.trim().is_empty() {
            problems.push("Reduction dimension is empty".to_string());
        }
        if let Some(png) = &self.png_key
            && !png.to_lowercase().ends_with(".png")
        {
            problems.push(format!("Output '{}' does not have a .png extension", png));
        }

        let plot = &self.plot;
        if Colormap::from_name(&plot.cmap).is_none() {
            problems.push(format!("Unknown colormap '{}'", plot.cmap));
        }
        if projection_factory(&plot.projection).is_none() {
            problems.push(format!("Unknown projection '{}'", plot.projection));
        }
        if let (Some(vmin), Some(vmax)) = (plot.vmin, plot.vmax)
            && vmin >= vmax
        {
            problems.push(format!("vmin ({}) must be less than vmax ({})", vmin, vmax));
        }
        if let Some(steps) = plot.steps
            && steps < 2
        {
            problems.push(format!("steps must be at least 2, got {}", steps));
        }
        if let Some(levels) = &plot.levels
            && (levels.len() < 2 || levels.windows(2).any(|w| w[0] >= w[1]))
        {
            problems.push("levels must contain at least two strictly increasing values".to_string());
        }
        if let Some([lon_min, lon_max, lat_min, lat_max]) = plot.extent
            && (lon_min >= lon_max || lat_min >= lat_max)
        {
            problems.push(format!(
                "extent must be [lon_min, lon_max, lat_min, lat_max] with min < max, got [{}, {}, {}, {}]",
                lon_min, lon_max, lat_min, lat_max
            ));
        }
        if plot.figsize[0] <= 0.0 || plot.figsize[1] <= 0.0 {
            problems.push(format!("figsize must be positive, got {:?}", plot.figsize));
        }
        if plot.dpi == 0 {
            problems.push("dpi must be positive".to_string());
        }

        problems
    }
}
