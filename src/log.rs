use std::time::Duration;

use crate::input::JobConfig;
use crate::levels::format_tick;
use crate::JobSummary;

pub fn show_greeting(source: &str) {
    println!("=== NetCDF Map Renderer ===");
    println!("Loading configuration from: {}", source);
}

pub fn config_echo(config: &JobConfig) {
    println!("\nConfiguration:");
    println!("  Input NetCDF: {}", config.nc_key);
    println!("  Variable: {}", config.variable_name);
    match config.reduce.index {
        Some(index) => println!("  Selection: {}[{}]", config.reduce.dimension, index),
        None => println!(
            "  Reduction: {} over '{}' (missing values: {:?})",
            config.reduce.aggregation, config.reduce.dimension, config.reduce.missing
        ),
    }
    println!("  Colormap: {}", config.plot.cmap);
    if config.plot.vmin.is_none() || config.plot.vmax.is_none() {
        println!("  Color range from: {:?}", config.plot.range_from);
    }
    println!("  Projection: {}", config.plot.projection);
    if let Some(steps) = config.plot.steps {
        println!("  Levels: {} steps", steps);
    }
    if let Some(levels) = &config.plot.levels {
        println!("  Levels: {:?}", levels);
    }
    if let Some(extent) = config.plot.extent {
        println!("  Extent: {:?}", extent);
    }
    match &config.png_key {
        Some(png) => println!("  Output PNG: {} ({} dpi)", png, config.plot.dpi),
        None => println!("  Output PNG: none"),
    }
}

pub fn show_job_summary(summary: &JobSummary) {
    println!("\nVariable Summary:");
    println!(
        "  {} [{}]: {:?} -> {:?}",
        summary.variable,
        summary.units.as_deref().unwrap_or("no units"),
        summary.input_shape,
        summary.output_shape
    );
    if let Some(lon_units) = &summary.lon_units {
        println!("  Longitude units: {}", lon_units);
    }
    match (summary.min, summary.max) {
        (Some(min), Some(max)) => println!("  Range: {} .. {}", format_tick(min), format_tick(max)),
        _ => println!("  Range: no finite values"),
    }
    let (low, high) = summary.color_range;
    println!("  Colorbar: {} .. {}", format_tick(low), format_tick(high));
    if let Some(path) = &summary.output {
        println!("  Written: {}", path);
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Rendering completed in {:.2?} ===", elapsed);
}
