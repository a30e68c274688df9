//! # nc2map
//!
//! A Rust library for rendering netCDF climate fields as map figures.
//!
//! ## Features
//!
//! - **Labeled arrays**: Variables keep their dimension names, coordinates and attributes
//! - **Reductions**: Mean, sum, min, max and std along a named dimension with explicit missing-value handling
//! - **Map figures**: PlateCarree or Mercator rasters, extended colorbars, categorized levels, coastlines
//! - **PNG output**: Images carry their resolution in the `pHYs` chunk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nc2map::{process_map_job, input::JobConfig};
//!
//! // Load configuration from JSON file
//! let config = JobConfig::from_file("config.json").expect("Failed to load config");
//!
//! // Reduce the variable and render it to PNG
//! process_map_job(&config).expect("Failed to render map");
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "nc_key": "control_merged.nc",
//!   "variable_name": "QRUNOFF",
//!   "png_key": "yourfigure.png",
//!   "reduce": { "dimension": "time", "aggregation": "mean", "missing": "skip" },
//!   "plot": {
//!     "cmap": "GnBu",
//!     "title": "example plot",
//!     "colorbar_label": "colorbar label (units)",
//!     "steps": 10,
//!     "extent": [-13.0, 43.0, 35.0, 70.0]
//!   }
//! }
//! ```

pub mod array;
pub mod cli;
pub mod coastline;
pub mod colormap;
pub mod dataset;
pub mod draw;
pub mod figure;
pub mod info;
pub mod input;
pub mod levels;
pub mod log;
pub mod output;
pub mod projection;
pub mod time;

#[cfg(test)]
mod cli_tests;
#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::array::LabeledArray;
use crate::dataset::Dataset;
use crate::figure::{Figure, render};
use crate::input::{JobConfig, PlotConfig, RangeSource};

/// What a job read and produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub variable: String,
    pub units: Option<String>,
    pub lon_units: Option<String>,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Lower and upper end of the colorbar
    pub color_range: (f64, f64),
    /// Path of the written PNG, if any
    pub output: Option<String>,
}

/// Pipeline stages reported to progress callbacks, in order
pub const STAGES: [&str; 5] = [
    "Opening dataset",
    "Reading variable",
    "Reducing",
    "Rendering",
    "Saving",
];

/// Renders a netCDF variable according to the provided job configuration.
///
/// This function orchestrates the entire pipeline:
/// 1. Opens the NetCDF file
/// 2. Reads the configured variable as a labeled array
/// 3. Reduces it along the configured dimension (or selects one index)
/// 4. Builds the map figure
/// 5. Writes the PNG when `png_key` is set
///
/// # Examples
///
/// ```rust,no_run
/// use nc2map::{process_map_job, input::JobConfig};
///
/// let config = JobConfig::from_file("runoff.yaml")?;
/// let summary = process_map_job(&config)?;
/// println!("Rendered {:?}", summary.output_shape);
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// This function will return an error if:
/// - The NetCDF file cannot be opened
/// - The specified variable or dimension is not found
/// - The plot options are invalid for the data
/// - The output PNG cannot be written
pub fn process_map_job(config: &JobConfig) -> Result<JobSummary> {
    process_map_job_with_progress(config, |_| {})
}

/// Same as [`process_map_job`], calling `on_stage` as each of [`STAGES`] begins.
pub fn process_map_job_with_progress<F: FnMut(&str)>(config: &JobConfig, mut on_stage: F) -> Result<JobSummary> {
    on_stage(STAGES[0]);
    let dataset = Dataset::open(&config.nc_key, &config.load)
        .with_context(|| format!("Failed to open dataset {}", config.nc_key))?;

    on_stage(STAGES[1]);
    let var = dataset
        .variable(&config.variable_name)
        .with_context(|| format!("Failed to read variable '{}'", config.variable_name))?;
    let lon_units = dataset
        .coordinate("lon")
        .ok()
        .and_then(|lon| lon.units().map(str::to_string));
    ::log::debug!(
        "Variable '{}' units: {:?}, lon units: {:?}",
        var.name,
        var.units(),
        lon_units
    );

    on_stage(STAGES[2]);
    let field = reduce_field(&var, config)?;

    on_stage(STAGES[3]);
    let plot = plot_range_from(&var, &config.plot);
    let fig = build_figure(&field, &plot)?;

    on_stage(STAGES[4]);
    if let Some(png) = &config.png_key {
        fig.save(png, config.plot.dpi)
            .with_context(|| format!("Failed to write {}", png))?;
    }
    dataset.close()?;

    Ok(JobSummary {
        variable: var.name.clone(),
        units: var.units().map(str::to_string),
        lon_units,
        input_shape: var.shape().to_vec(),
        output_shape: field.shape().to_vec(),
        min: field.min(),
        max: field.max(),
        color_range: fig.norm().range(),
        output: config.png_key.clone(),
    })
}

/// Collapses the configured dimension: selects `reduce.index` when set,
/// otherwise aggregates.
pub fn reduce_field(var: &LabeledArray, config: &JobConfig) -> Result<LabeledArray> {
    let reduce = &config.reduce;
    let field = match reduce.index {
        Some(index) => var.isel(&reduce.dimension, index),
        None => var.reduce(&reduce.dimension, reduce.aggregation, reduce.missing),
    };
    field.with_context(|| format!("Failed to reduce '{}' over '{}'", var.name, reduce.dimension))
}

/// Plot options with `vmin`/`vmax` filled from the unreduced variable when
/// `range_from` is [`RangeSource::Variable`]. Explicit values are kept.
pub fn plot_range_from(var: &LabeledArray, plot: &PlotConfig) -> PlotConfig {
    let mut plot = plot.clone();
    if plot.range_from == RangeSource::Variable {
        plot.vmin = plot.vmin.or_else(|| var.min());
        plot.vmax = plot.vmax.or_else(|| var.max());
        ::log::debug!(
            "Color range of '{}' taken from the whole variable: {:?} .. {:?}",
            var.name,
            plot.vmin,
            plot.vmax
        );
    }
    plot
}

/// Builds the map figure for a reduced field.
pub fn build_figure(field: &LabeledArray, plot: &PlotConfig) -> Result<Figure> {
    render(field, plot).with_context(|| format!("Failed to render '{}'", field.name))
}
