//! # NetCDF File Information Module
//!
//! This module extracts and displays information about NetCDF files:
//! dimensions, variables, attributes and, for a selected variable, value
//! statistics and coordinate ranges.

use crate::dataset::{Dataset, LoadOptions};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Information about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfDimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Information about a NetCDF variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfVariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub shape: Vec<usize>,
    /// Value statistics, read only in detailed mode for a selected variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<VariableStatistics>,
}

/// Summary of a variable's values after fill-value masking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub missing: usize,
    pub total: usize,
    /// Range and units of each coordinate of the variable
    pub coordinates: Vec<CoordinateSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateSummary {
    pub name: String,
    pub first: Option<f64>,
    pub last: Option<f64>,
    pub units: Option<String>,
}

/// Complete information about a NetCDF file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfInfo {
    pub path: String,
    pub dimensions: Vec<NetCdfDimensionInfo>,
    pub variables: Vec<NetCdfVariableInfo>,
    pub global_attributes: BTreeMap<String, String>,
    pub file_size: Option<u64>,
    pub total_variables: usize,
    pub total_dimensions: usize,
}

/// Extract comprehensive information from a NetCDF file
pub fn get_netcdf_info(file_path: &str, variable: Option<&str>, detailed: bool) -> Result<NetCdfInfo> {
    debug!("Opening NetCDF file: {}", file_path);
    let dataset = Dataset::open(file_path, &LoadOptions::default())
        .with_context(|| format!("Failed to open NetCDF file: {}", file_path))?;

    let file_size = std::fs::metadata(file_path).ok().map(|metadata| metadata.len());

    let dimensions: Vec<NetCdfDimensionInfo> = dataset
        .dimensions()
        .iter()
        .map(|dim| NetCdfDimensionInfo {
            name: dim.name.clone(),
            length: dim.len,
            is_unlimited: dim.is_unlimited,
        })
        .collect();

    if let Some(name) = variable {
        // fail early with the list of available variables
        dataset.variable_info(name)?;
    }

    let mut variables = Vec::new();
    for info in dataset.variables().values() {
        if let Some(var_name) = variable
            && info.name != var_name
        {
            continue;
        }

        let statistics = if detailed && variable.is_some() {
            Some(variable_statistics(&dataset, &info.name)?)
        } else {
            None
        };

        variables.push(NetCdfVariableInfo {
            name: info.name.clone(),
            data_type: info.data_type.clone(),
            dimensions: info.dimensions.clone(),
            attributes: info
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            shape: info.shape.clone(),
            statistics,
        });
    }

    let global_attributes = if detailed {
        dataset
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    } else {
        BTreeMap::new()
    };

    dataset.close().context("Failed to close NetCDF file")?;

    Ok(NetCdfInfo {
        path: file_path.to_string(),
        total_dimensions: dimensions.len(),
        total_variables: variables.len(),
        dimensions,
        variables,
        global_attributes,
        file_size,
    })
}

fn variable_statistics(dataset: &Dataset, name: &str) -> Result<VariableStatistics> {
    let array = dataset
        .variable(name)
        .with_context(|| format!("Failed to read variable '{}'", name))?;

    let values = array.values();
    let total = values.len();
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

    let coordinates = array
        .coords()
        .iter()
        .map(|c| CoordinateSummary {
            name: c.name.clone(),
            first: c.values.first().copied(),
            last: c.values.last().copied(),
            units: c.units().map(str::to_string),
        })
        .collect();

    Ok(VariableStatistics {
        min: array.min(),
        max: array.max(),
        mean: (count > 0).then(|| sum / count as f64),
        missing: total - count,
        total,
        coordinates,
    })
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{}", v))
}

/// Print NetCDF info in human-readable format
pub fn print_file_info_human(info: &NetCdfInfo) {
    println!("NetCDF File Information:");
    println!("  Path: {}", info.path);
    if let Some(size) = info.file_size {
        println!("  File Size: {:.2} MB", size as f64 / 1_048_576.0);
    }
    println!("  Dimensions: {} total", info.total_dimensions);
    for dim in &info.dimensions {
        println!(
            "    {} ({}{})",
            dim.name,
            dim.length,
            if dim.is_unlimited { ", unlimited" } else { "" }
        );
    }
    println!("  Variables: {} total", info.total_variables);
    for var in &info.variables {
        println!(
            "    {} ({}) - dimensions: [{}]",
            var.name,
            var.data_type,
            var.dimensions.join(", ")
        );
        for (name, value) in &var.attributes {
            println!("      @{}: {}", name, value);
        }
        if let Some(stats) = &var.statistics {
            println!(
                "      min: {}  max: {}  mean: {}",
                format_optional(stats.min),
                format_optional(stats.max),
                format_optional(stats.mean)
            );
            println!("      missing: {} of {}", stats.missing, stats.total);
            for coord in &stats.coordinates {
                println!(
                    "      {}: {} .. {}{}",
                    coord.name,
                    format_optional(coord.first),
                    format_optional(coord.last),
                    coord.units.as_ref().map(|u| format!(" [{}]", u)).unwrap_or_default()
                );
            }
        }
    }
    if !info.global_attributes.is_empty() {
        println!("  Global Attributes:");
        for (name, value) in &info.global_attributes {
            println!("    @{}: {}", name, value);
        }
    }
}

/// Print NetCDF info in JSON format
pub fn print_file_info_json(info: &NetCdfInfo) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(info).context("Failed to serialize NetCDF info to JSON")?
    );
    Ok(())
}

/// Print NetCDF info in YAML format
pub fn print_file_info_yaml(info: &NetCdfInfo) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize NetCDF info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print NetCDF info in CSV format (variables only)
pub fn print_file_info_csv(info: &NetCdfInfo) -> Result<()> {
    println!("{}", file_info_csv(info).join("\n"));
    Ok(())
}

fn file_info_csv(info: &NetCdfInfo) -> Vec<String> {
    let mut lines = vec!["variable_name,data_type,dimensions,shape,attributes_count".to_string()];
    for var in &info.variables {
        let shape = var.shape.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(";");
        lines.push(format!(
            "{},{},\"{}\",\"{}\",{}",
            var.name,
            var.data_type,
            var.dimensions.join(";"),
            shape,
            var.attributes.len()
        ));
    }
    lines
}
