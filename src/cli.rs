//! # CLI Module
//!
//! This module provides the command-line interface for nc2map, including:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML)
//! - Environment variable support with the NC2MAP_ prefix
//! - Multi-source configuration merging with priority system
//! - Subcommands for rendering, inspection, validation and templates

use crate::array::{Aggregation, MissingPolicy};
use crate::input::{JobConfig, PlotConfig, RangeSource};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Render netCDF climate fields as map figures
#[derive(Parser, Debug)]
#[command(name = "nc2map")]
#[command(about = "Render a netCDF variable as a map with a colorbar")]
#[command(version)]
#[command(long_about = "
nc2map loads a netCDF climate dataset, selects one variable, aggregates it
along one dimension (by default the time-mean) and renders the resulting
latitude/longitude field as a map with a colorbar, saved as a PNG image.

FEATURES:
  • Aggregations: mean, sum, min, max and std along any named dimension
  • Categorized colorbars from a step count or explicit levels
  • PlateCarree and Mercator projections with optional regional extent
  • Coastlines from GeoJSON files
  • Configuration files: JSON and YAML format support with templates
  • Shell completions: Auto-completion for bash, zsh, fish, and PowerShell

EXAMPLES:
  # Time-mean runoff map
  nc2map render control_merged.nc yourfigure.png -n QRUNOFF

  # Categorized colorbar with 10 steps
  nc2map render control_merged.nc yourfigure.png -n QRUNOFF --steps 10

  # Europe only, with coastlines
  nc2map render control_merged.nc europe.png -n QRUNOFF \\
    --extent=-13,43,35,70 --coastlines ne_110m_coastline.geojson

  # Using config file
  nc2map render --config runoff.yaml

  # File inspection
  nc2map info control_merged.nc -n QRUNOFF --detailed
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for structured data
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "NC2MAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether progress banners go to stdout.
    ///
    /// Off in quiet mode and whenever stdout carries JSON or YAML, so the
    /// structured output stays parseable.
    pub fn shows_banners(&self) -> bool {
        !self.quiet && matches!(self.output_format, OutputFormat::Human | OutputFormat::Csv)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a variable as a map figure
    #[command(long_about = "
Render one variable of a netCDF file as a map figure.

The variable is reduced along one dimension (default: mean over 'time'),
or sliced at one index with --time-index, and the 2D result is drawn with a
colorbar extended at both ends. Options given on the command line override
environment variables, which override the configuration file.

EXAMPLES:
  # Basic render
  nc2map render control_merged.nc yourfigure.png -n QRUNOFF

  # Categorized colorbar with explicit range
  nc2map render data.nc out.png -n QRUNOFF --vmin 0 --vmax 1e-4 --steps 10

  # Levels spanning the whole variable, not just its time mean
  nc2map render data.nc out.png -n QRUNOFF --steps 10 --range-from variable

  # First time step instead of the mean
  nc2map render data.nc first.png -n QRUNOFF --time-index 0

  # Dry run for validation
  nc2map render data.nc out.png -n QRUNOFF --dry-run
")]
    Render(RenderArgs),

    /// Show information about NetCDF file
    #[command(long_about = "
Inspect NetCDF files and display structure information.

This command displays:
• File dimensions and their sizes
• Available variables and their attributes
• Variable-specific information (when specified)
• Global attributes

EXAMPLES:
  # Basic file info
  nc2map info control_merged.nc

  # Info about specific variable with statistics
  nc2map info control_merged.nc -n QRUNOFF --detailed

  # JSON output for scripting
  nc2map info data.nc --format json
")]
    Info {
        /// NetCDF file path
        file: String,

        /// Show detailed variable information
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Validate configuration file or arguments
    #[command(long_about = "
Validate a job configuration without rendering.

This command checks:
• Configuration file syntax and structure
• Colormap and projection names
• Value range, steps, levels and extent consistency
• Input file existence and variable presence (with --detailed)

EXAMPLES:
  # Validate a configuration file
  nc2map validate runoff.json

  # Validate and open the input file
  nc2map validate runoff.yaml --detailed
")]
    Validate {
        /// Configuration file to validate
        config_file: Option<PathBuf>,

        /// Also open the input file and check the variable
        #[arg(long)]
        detailed: bool,
    },

    /// Generate configuration templates
    #[command(long_about = "
Generate configuration file templates for common use cases.

Available templates:
• basic: Time-mean map with a continuous colorbar
• categorized: Time-mean map with a 10-step categorized colorbar
• regional: Europe extent with coastlines

EXAMPLES:
  # Generate basic JSON template
  nc2map template basic

  # Generate YAML template to file
  nc2map template regional --format yaml -o europe.yaml
")]
    Template {
        /// Template type to generate
        #[arg(value_enum)]
        template_type: TemplateType,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for bash, zsh, fish, and PowerShell.

EXAMPLES:
  nc2map completions bash > ~/.bash_completion.d/nc2map
  nc2map completions zsh -o _nc2map
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Arguments of the `render` subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Input NetCDF file path
    #[arg(value_name = "INPUT", env = "NC2MAP_INPUT")]
    pub input: Option<String>,

    /// Output PNG file path
    #[arg(value_name = "OUTPUT", env = "NC2MAP_OUTPUT")]
    pub output: Option<String>,

    /// NetCDF variable name to plot
    #[arg(short = 'n', long, env = "NC2MAP_VARIABLE")]
    pub variable: Option<String>,

    /// Dimension to aggregate over
    #[arg(long = "dim")]
    pub dimension: Option<String>,

    /// Aggregation along the dimension
    #[arg(long, value_enum)]
    pub aggregation: Option<Aggregation>,

    /// How missing values are treated during aggregation
    #[arg(long, value_enum)]
    pub missing: Option<MissingPolicy>,

    /// Select this index along the dimension instead of aggregating
    #[arg(long)]
    pub time_index: Option<usize>,

    /// Colormap name (append _r to reverse)
    #[arg(long, env = "NC2MAP_CMAP")]
    pub cmap: Option<String>,

    /// Figure title
    #[arg(long)]
    pub title: Option<String>,

    /// Colorbar label
    #[arg(long)]
    pub label: Option<String>,

    /// Lower end of the color scale
    #[arg(long, allow_negative_numbers = true)]
    pub vmin: Option<f64>,

    /// Upper end of the color scale
    #[arg(long, allow_negative_numbers = true)]
    pub vmax: Option<f64>,

    /// Take the default color range from the plotted field or the whole variable
    #[arg(long, value_enum)]
    pub range_from: Option<RangeSource>,

    /// Number of equally spaced colorbar levels
    #[arg(long, conflicts_with = "levels")]
    pub steps: Option<usize>,

    /// Explicit colorbar levels: v1,v2,v3
    // fully qualified so clap takes one comma-separated value, not many
    #[arg(long, value_parser = parse_levels, allow_hyphen_values = true)]
    pub levels: Option<::std::vec::Vec<f64>>,

    /// Map projection (PlateCarree or Mercator)
    #[arg(long)]
    pub projection: Option<String>,

    /// Map extent: lon_min,lon_max,lat_min,lat_max
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: Option<[f64; 4]>,

    /// GeoJSON file with coastlines to draw
    #[arg(long)]
    pub coastlines: Option<String>,

    /// Figure size in inches: WIDTHxHEIGHT
    #[arg(long, value_parser = parse_figsize)]
    pub figsize: Option<[f64; 2]>,

    /// Output resolution in dots per inch
    #[arg(long, env = "NC2MAP_DPI")]
    pub dpi: Option<u32>,

    /// Decode CF time coordinates into dates
    #[arg(long)]
    pub decode_times: bool,

    /// Dry run - validate configuration without rendering
    #[arg(long, env = "NC2MAP_DRY_RUN")]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output (where applicable)
    Csv,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum TemplateType {
    /// Time-mean map with a continuous colorbar
    Basic,
    /// Time-mean map with a categorized colorbar
    Categorized,
    /// Regional map with coastlines
    Regional,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

/// Parse map extent from command line argument
/// Format: lon_min,lon_max,lat_min,lat_max
pub(crate) fn parse_extent(s: &str) -> Result<[f64; 4], String> {
    let values = parse_number_list(s, "extent")?;
    let [lon_min, lon_max, lat_min, lat_max]: [f64; 4] = values
        .try_into()
        .map_err(|_| "Extent must be in format 'lon_min,lon_max,lat_min,lat_max'".to_string())?;

    if lon_min >= lon_max || lat_min >= lat_max {
        return Err("Extent minimum values must be less than maximum values".to_string());
    }

    Ok([lon_min, lon_max, lat_min, lat_max])
}

/// Parse figure size from command line argument
/// Format: WIDTHxHEIGHT (inches)
pub(crate) fn parse_figsize(s: &str) -> Result<[f64; 2], String> {
    let parts: Vec<&str> = s.split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err("Figure size must be in format 'WIDTHxHEIGHT'".to_string());
    }

    let width = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|_| "Invalid figure width")?;
    let height = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| "Invalid figure height")?;

    if width <= 0.0 || height <= 0.0 {
        return Err("Figure width and height must be positive".to_string());
    }

    Ok([width, height])
}

/// Parse explicit colorbar levels from command line argument
/// Format: v1,v2,v3 (strictly increasing)
pub(crate) fn parse_levels(s: &str) -> Result<Vec<f64>, String> {
    let values = parse_number_list(s, "levels")?;

    if values.len() < 2 {
        return Err("Levels must contain at least two values".to_string());
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err("Levels must be strictly increasing".to_string());
    }

    Ok(values)
}

fn parse_number_list(s: &str, what: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| format!("Invalid numeric value '{}' in {}", v, what))
        })
        .collect()
}

/// Loads a job configuration file with error context.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    JobConfig::from_file(path).map_err(|e| anyhow!("Failed to load configuration from {}: {}", path.display(), e))
}

/// Builds the render job from every configuration source.
///
/// Priority: CLI arguments > environment variables > configuration file >
/// defaults. Clap resolves the first two (flags with an `env` fallback), so
/// any value present in `args` replaces the one from `base`.
pub fn build_render_config(base: Option<JobConfig>, args: &RenderArgs) -> Result<JobConfig> {
    let mut config = match base {
        Some(config) => config,
        None => {
            let nc_key = args
                .input
                .clone()
                .context("Input file is required (positional INPUT, NC2MAP_INPUT or --config)")?;
            let variable_name = args
                .variable
                .clone()
                .context("Variable name is required (-n/--variable, NC2MAP_VARIABLE or --config)")?;
            JobConfig {
                nc_key,
                variable_name,
                png_key: None,
                load: Default::default(),
                reduce: Default::default(),
                plot: PlotConfig::default(),
            }
        }
    };

    if let Some(input) = &args.input {
        config.nc_key = input.clone();
    }
    if let Some(output) = &args.output {
        config.png_key = Some(output.clone());
    }
    if let Some(variable) = &args.variable {
        config.variable_name = variable.clone();
    }
    if args.decode_times {
        config.load.decode_times = true;
    }

    let reduce = &mut config.reduce;
    if let Some(dimension) = &args.dimension {
        reduce.dimension = dimension.clone();
    }
    if let Some(aggregation) = args.aggregation {
        reduce.aggregation = aggregation;
    }
    if let Some(missing) = args.missing {
        reduce.missing = missing;
    }
    if args.time_index.is_some() {
        reduce.index = args.time_index;
    }

    let plot = &mut config.plot;
    if let Some(cmap) = &args.cmap {
        plot.cmap = cmap.clone();
    }
    if let Some(title) = &args.title {
        plot.title = title.clone();
    }
    if let Some(label) = &args.label {
        plot.colorbar_label = label.clone();
    }
    if args.vmin.is_some() {
        plot.vmin = args.vmin;
    }
    if args.vmax.is_some() {
        plot.vmax = args.vmax;
    }
    // steps and levels are alternatives; the one given on the command line wins
    if args.steps.is_some() {
        plot.steps = args.steps;
        plot.levels = None;
    }
    if args.levels.is_some() {
        plot.levels = args.levels.clone();
        plot.steps = None;
    }
    if let Some(range_from) = args.range_from {
        plot.range_from = range_from;
    }
    if let Some(projection) = &args.projection {
        plot.projection = projection.clone();
    }
    if args.extent.is_some() {
        plot.extent = args.extent;
    }
    if args.coastlines.is_some() {
        plot.coastlines = args.coastlines.clone();
    }
    if let Some(figsize) = args.figsize {
        plot.figsize = figsize;
    }
    if let Some(dpi) = args.dpi {
        plot.dpi = dpi;
    }

    let problems = config.validate();
    if !problems.is_empty() {
        bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
    }

    Ok(config)
}

/// Builds a configuration template.
pub fn generate_template(template_type: &TemplateType) -> JobConfig {
    let mut config = JobConfig {
        nc_key: "control_merged.nc".to_string(),
        variable_name: "QRUNOFF".to_string(),
        png_key: Some("yourfigure.png".to_string()),
        load: Default::default(),
        reduce: Default::default(),
        plot: PlotConfig::default(),
    };

    match template_type {
        TemplateType::Basic => {}
        TemplateType::Categorized => {
            config.plot.title = "QRUNOFF time mean".to_string();
            config.plot.colorbar_label = "runoff (mm/s)".to_string();
            config.plot.steps = Some(10);
            config.plot.range_from = RangeSource::Variable;
        }
        TemplateType::Regional => {
            config.png_key = Some("europe.png".to_string());
            config.plot.title = "QRUNOFF over Europe".to_string();
            config.plot.colorbar_label = "runoff (mm/s)".to_string();
            config.plot.extent = Some([-13.0, 43.0, 35.0, 70.0]);
            config.plot.coastlines = Some("ne_110m_coastline.geojson".to_string());
        }
    }

    config
}

/// Serializes a configuration in the requested format.
pub fn serialize_config(config: &JobConfig, format: &ConfigFormat) -> Result<String> {
    let text = match format {
        ConfigFormat::Json => config.to_json().context("Failed to serialize configuration as JSON")?,
        ConfigFormat::Yaml => config.to_yaml().context("Failed to serialize configuration as YAML")?,
    };
    Ok(text)
}
