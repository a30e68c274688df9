use crate::array::*;
use crate::dataset::*;
use crate::figure::*;
use crate::input::*;
use crate::levels::*;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const NTIME: usize = 12;
const NLAT: usize = 10;
const NLON: usize = 20;
const FILL: f32 = 1.0e36;

/// Runoff value at (time, lat, lon) before masking
fn runoff_value(t: usize, i: usize, j: usize) -> f32 {
    (t as f32 + 1.0) * 1.0e-5 + (i * NLON + j) as f32 * 1.0e-7
}

/// Helper that writes a small monthly runoff file shaped like land-model output:
/// QRUNOFF(time=12, lat=10, lon=20) in mm/s with a 0..360 longitude axis and
/// one fill value at (0, 0, 0).
fn create_runoff_file(dir: &Path, calendar: &str) -> Result<PathBuf, netcdf::Error> {
    let path = dir.join("control_merged.nc");
    let mut file = netcdf::create(&path)?;

    file.add_attribute("title", "Test land model output")?;
    file.add_dimension("time", NTIME)?;
    file.add_dimension("lat", NLAT)?;
    file.add_dimension("lon", NLON)?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 2000-01-01 00:00:00")?;
        time.put_attribute("calendar", calendar)?;
        let values: Vec<f64> = (0..NTIME).map(|t| t as f64 * 30.0).collect();
        time.put_values(&values, ..)?;
    }
    {
        let mut lat = file.add_variable::<f32>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        let values: Vec<f32> = (0..NLAT).map(|i| -81.0 + 18.0 * i as f32).collect();
        lat.put_values(&values, ..)?;
    }
    {
        let mut lon = file.add_variable::<f32>("lon", &["lon"])?;
        lon.put_attribute("units", "degrees_east")?;
        let values: Vec<f32> = (0..NLON).map(|j| 9.0 + 18.0 * j as f32).collect();
        lon.put_values(&values, ..)?;
    }
    {
        let mut runoff = file.add_variable::<f32>("QRUNOFF", &["time", "lat", "lon"])?;
        runoff.put_attribute("units", "mm/s")?;
        runoff.put_attribute("long_name", "total liquid runoff")?;
        runoff.put_attribute("_FillValue", FILL)?;
        let mut values = Vec::with_capacity(NTIME * NLAT * NLON);
        for t in 0..NTIME {
            for i in 0..NLAT {
                for j in 0..NLON {
                    values.push(runoff_value(t, i, j));
                }
            }
        }
        values[0] = FILL;
        runoff.put_values(&values, ..)?;
    }

    Ok(path)
}

fn open_runoff(dir: &Path) -> Dataset {
    let path = create_runoff_file(dir, "standard").unwrap();
    Dataset::open(&path, &LoadOptions::default()).unwrap()
}

#[cfg(test)]
mod dataset_tests {
    use super::*;

    #[test]
    fn test_open_lists_variables() {
        let dir = tempdir().unwrap();
        let ds = open_runoff(dir.path());

        assert!(!ds.variables().is_empty());
        assert!(ds.variables().contains_key("QRUNOFF"));
        let data_vars: Vec<&str> = ds.data_variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(data_vars, vec!["QRUNOFF"]);
        assert_eq!(ds.attributes()["title"].as_str(), Some("Test land model output"));
        assert_eq!(ds.dimensions().len(), 3);
    }

    #[test]
    fn test_variable_matches_recorded_shape() {
        let dir = tempdir().unwrap();
        let ds = open_runoff(dir.path());
        let info = ds.variable_info("QRUNOFF").unwrap().clone();
        let da = ds.variable("QRUNOFF").unwrap();

        assert_eq!(da.ndim(), info.dimensions.len());
        assert_eq!(da.shape(), info.shape.as_slice());
        assert_eq!(da.shape(), &[NTIME, NLAT, NLON]);
        assert_eq!(da.dims(), vec!["time", "lat", "lon"]);
        assert_eq!(da.units(), Some("mm/s"));
        assert_eq!(da.coord("lon").unwrap().units(), Some("degrees_east"));
        assert_eq!(ds.coordinate("lon").unwrap().units(), Some("degrees_east"));
    }

    #[test]
    fn test_fill_values_are_masked() {
        let dir = tempdir().unwrap();
        let ds = open_runoff(dir.path());
        let da = ds.variable("QRUNOFF").unwrap();
        let values = da.values();

        assert!(values[[0, 0, 0]].is_nan());
        assert!((values[[1, 0, 0]] - runoff_value(1, 0, 0) as f64).abs() < 1e-12);

        let path = ds.path().to_path_buf();
        let raw = Dataset::open(
            &path,
            &LoadOptions {
                mask_and_scale: false,
                ..LoadOptions::default()
            },
        )
        .unwrap();
        let values = raw.variable("QRUNOFF").unwrap().into_values();
        assert_eq!(values[[0, 0, 0]] as f32, FILL);
    }

    #[test]
    fn test_variable_not_found() {
        let dir = tempdir().unwrap();
        let ds = open_runoff(dir.path());

        match ds.variable("TSA") {
            Err(DatasetError::VariableNotFound { name, available }) => {
                assert_eq!(name, "TSA");
                assert!(available.contains(&"QRUNOFF".to_string()));
            }
            other => panic!("Expected VariableNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_not_a_netcdf_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.nc");
        std::fs::write(&path, b"this is not netcdf").unwrap();

        let err = Dataset::open(&path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::Format { .. }));
    }

    #[test]
    fn test_times_are_not_decoded_by_default() {
        let dir = tempdir().unwrap();
        let ds = open_runoff(dir.path());
        let time = ds.coordinate("time").unwrap();
        assert!(time.dates.is_none());
        assert_eq!(time.values[1], 30.0);
    }

    #[test]
    fn test_decode_times() {
        let dir = tempdir().unwrap();
        let path = create_runoff_file(dir.path(), "standard").unwrap();
        let options = LoadOptions {
            decode_times: true,
            ..LoadOptions::default()
        };
        let ds = Dataset::open(&path, &options).unwrap();
        let dates = ds.coordinate("time").unwrap().dates.unwrap();

        assert_eq!(dates.len(), NTIME);
        assert_eq!(dates[0].to_string(), "2000-01-01 00:00:00");
        assert_eq!(dates[1].to_string(), "2000-01-31 00:00:00");
    }

    #[test]
    fn test_decode_times_rejects_model_calendar() {
        let dir = tempdir().unwrap();
        let path = create_runoff_file(dir.path(), "noleap").unwrap();
        let options = LoadOptions {
            decode_times: true,
            ..LoadOptions::default()
        };

        match Dataset::open(&path, &options) {
            Err(DatasetError::TimeDecode { coordinate, .. }) => assert_eq!(coordinate, "time"),
            other => panic!("Expected TimeDecode, got {:?}", other.map(|_| ())),
        }

        // without decoding the same file opens fine
        assert!(Dataset::open(&path, &LoadOptions::default()).is_ok());
    }
}

#[cfg(test)]
mod reduce_tests {
    use super::*;

    #[test]
    fn test_time_mean_drops_time() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let da_mean = da.mean("time", MissingPolicy::Skip).unwrap();

        assert_eq!(da_mean.ndim(), da.ndim() - 1);
        assert_eq!(da_mean.shape(), &[NLAT, NLON]);
        assert_eq!(da_mean.dims(), vec!["lat", "lon"]);
        assert_eq!(da_mean.units(), Some("mm/s"));

        // mean of (t + 1) over 12 months is 6.5
        let expected = 6.5e-5 + (3 * NLON + 4) as f64 * 1e-7;
        assert!((da_mean.values()[[3, 4]] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_policies() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();

        // the masked first month is skipped: mean of 2..=12 is 7
        let skipped = da.mean("time", MissingPolicy::Skip).unwrap();
        assert!((skipped.values()[[0, 0]] - 7.0e-5).abs() < 1e-9);

        let propagated = da.mean("time", MissingPolicy::Propagate).unwrap();
        assert!(propagated.values()[[0, 0]].is_nan());
        assert!(!propagated.values()[[0, 1]].is_nan());
    }

    #[test]
    fn test_reduce_missing_dimension() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();

        let err = da.mean("depth", MissingPolicy::Skip).unwrap_err();
        assert!(matches!(err, ArrayError::DimensionNotFound { ref dimension, .. } if dimension == "depth"));
    }

    #[test]
    fn test_other_aggregations() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();

        let max = da.reduce("time", Aggregation::Max, MissingPolicy::Skip).unwrap();
        assert!((max.values()[[0, 1]] - runoff_value(11, 0, 1) as f64).abs() < 1e-12);

        let min = da.reduce("time", Aggregation::Min, MissingPolicy::Skip).unwrap();
        assert!((min.values()[[0, 1]] - runoff_value(0, 0, 1) as f64).abs() < 1e-12);

        let lat_mean = da.mean("lat", MissingPolicy::Skip).unwrap();
        assert_eq!(lat_mean.dims(), vec!["time", "lon"]);
    }

    #[test]
    fn test_select_time_index() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();

        let first = da.isel("time", 5).unwrap();
        assert_eq!(first.shape(), &[NLAT, NLON]);
        assert!((first.values()[[2, 3]] - runoff_value(5, 2, 3) as f64).abs() < 1e-12);

        let err = da.isel("time", NTIME).unwrap_err();
        assert!(matches!(err, ArrayError::IndexOutOfBounds { .. }));
    }
}

#[cfg(test)]
mod levels_tests {
    use super::*;

    #[test]
    fn test_categorized_levels_from_variable_range() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let vmin = da.min().unwrap();
        let vmax = da.max().unwrap();
        let nsteps = 10;

        let levels = step_levels(vmin, vmax, nsteps);
        assert_eq!(levels.len(), nsteps);
        assert_eq!(levels[0], vmin);
        let last = vmin + (nsteps - 1) as f64 * (vmax - vmin) / nsteps as f64;
        assert!((levels[nsteps - 1] - last).abs() < 1e-18);
        assert!(levels[nsteps - 1] < vmax);
    }
}

#[cfg(test)]
mod input_tests {
    use super::*;

    #[test]
    fn test_job_config_from_json() {
        let json = r#"
        {
            "nc_key": "control_merged.nc",
            "variable_name": "QRUNOFF",
            "png_key": "yourfigure.png",
            "reduce": { "dimension": "time", "aggregation": "std", "missing": "propagate" },
            "plot": {
                "cmap": "YlGnBu",
                "steps": 10,
                "extent": [-13.0, 43.0, 35.0, 70.0]
            }
        }"#;

        let config = JobConfig::from_json(json).unwrap();
        assert_eq!(config.nc_key, "control_merged.nc");
        assert_eq!(config.png_key.as_deref(), Some("yourfigure.png"));
        assert_eq!(config.reduce.aggregation, Aggregation::Std);
        assert_eq!(config.reduce.missing, MissingPolicy::Propagate);
        assert_eq!(config.plot.steps, Some(10));
        assert_eq!(config.plot.extent, Some([-13.0, 43.0, 35.0, 70.0]));
        // defaults for everything else
        assert_eq!(config.plot.title, "example plot");
        assert_eq!(config.plot.figsize, [15.0, 6.0]);
        assert!(!config.load.decode_times);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_job_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runoff.yaml");
        std::fs::write(
            &path,
            "nc_key: control_merged.nc\nvariable_name: QRUNOFF\nplot:\n  cmap: Blues_r\n  projection: Mercator\n  dpi: 150\n",
        )
        .unwrap();

        let config = JobConfig::from_file(&path).unwrap();
        assert_eq!(config.plot.cmap, "Blues_r");
        assert_eq!(config.plot.projection, "Mercator");
        assert_eq!(config.plot.dpi, 150);
        assert_eq!(config.png_key, None);
        assert_eq!(config.reduce, ReduceConfig::default());
    }

    #[test]
    fn test_json_parsing_errors() {
        assert!(JobConfig::from_json("{ not json").is_err());
        // variable_name is required
        assert!(JobConfig::from_json(r#"{"nc_key": "a.nc"}"#).is_err());
        // unknown aggregation
        assert!(JobConfig::from_json(r#"{"nc_key": "a.nc", "variable_name": "v", "reduce": {"aggregation": "median"}}"#).is_err());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = JobConfig::from_json(r#"{"nc_key": "a.nc", "variable_name": "v", "png_key": "out.jpg"}"#).unwrap();
        config.plot.cmap = "Rainbow".to_string();
        config.plot.vmin = Some(2.0);
        config.plot.vmax = Some(1.0);
        config.plot.steps = Some(1);

        let problems = config.validate();
        assert_eq!(problems.len(), 4);
        assert!(problems.iter().any(|p| p.contains(".png")));
        assert!(problems.iter().any(|p| p.contains("Rainbow")));
    }
}

#[cfg(test)]
mod render_tests {
    use super::*;
    use crate::colormap::{Colormap, Rgba};
    use std::fs::File;

    fn small_plot() -> PlotConfig {
        PlotConfig {
            figsize: [4.0, 2.0],
            dpi: 40,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn test_render_time_mean() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let da_mean = da.mean("time", MissingPolicy::Skip).unwrap();

        let fig = render(&da_mean, &small_plot()).unwrap();
        assert_eq!(fig.extent(), [0.0, 360.0, -90.0, 90.0]);
        assert_eq!(fig.pixel_size(40), (160, 80));
        assert!(fig.boundaries().is_none());

        let img = fig.to_image(40).unwrap();
        assert_eq!(img.dimensions(), (160, 80));
        let cmap = Colormap::from_name("GnBu").unwrap();
        let colored = img
            .pixels()
            .filter(|&&p| Rgba::from(p) == cmap.sample(1.0))
            .count();
        assert!(colored > 0);
    }

    #[test]
    fn test_render_categorized_with_extent() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let da_mean = da.mean("time", MissingPolicy::Skip).unwrap();

        let plot = PlotConfig {
            vmin: da.min(),
            vmax: da.max(),
            steps: Some(10),
            extent: Some([-13.0, 43.0, 35.0, 70.0]),
            ..small_plot()
        };
        let fig = render(&da_mean, &plot).unwrap();
        assert_eq!(fig.boundaries().map(|b| b.len()), Some(10));
        assert_eq!(fig.extent(), [-13.0, 43.0, 35.0, 70.0]);

        // negative longitudes are found on the 0..360 grid
        let img = fig.to_image(40).unwrap();
        let mapped = (0..img.width())
            .filter(|&x| Rgba::from(*img.get_pixel(x, img.height() / 2)) != Rgba::WHITE)
            .count();
        assert!(mapped > 0);
    }

    #[test]
    fn test_render_rejects_three_dimensions() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        assert!(matches!(
            render(&da, &small_plot()),
            Err(RenderError::NotTwoDimensional { .. })
        ));
    }

    #[test]
    fn test_save_records_dpi_and_overwrites() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let da_mean = da.mean("time", MissingPolicy::Skip).unwrap();
        let fig = render(&da_mean, &small_plot()).unwrap();

        let png_path = dir.path().join("yourfigure.png");
        std::fs::write(&png_path, b"stale contents").unwrap();
        fig.save(&png_path, 72).unwrap();

        let decoder = png::Decoder::new(File::open(&png_path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (288, 144));
        let dims = info.pixel_dims.unwrap();
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(crate::output::ppm_to_dpi(dims.xppu), 72);
    }

    #[test]
    fn test_coastlines_from_geojson() {
        let dir = tempdir().unwrap();
        let da = open_runoff(dir.path()).variable("QRUNOFF").unwrap();
        let da_mean = da.mean("time", MissingPolicy::Skip).unwrap();

        let coast = dir.path().join("coast.geojson");
        std::fs::write(
            &coast,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[-180, 0], [-90, 0], [0, 0], [90, 0], [180, 0]]}}
            ]}"#,
        )
        .unwrap();

        let plot = PlotConfig {
            coastlines: Some(coast.to_string_lossy().to_string()),
            ..small_plot()
        };
        let img = render(&da_mean, &plot).unwrap().to_image(40).unwrap();
        let gray = img.pixels().filter(|&&p| Rgba::from(p) == Rgba::DIM_GRAY).count();
        assert!(gray > 0);

        let plot = PlotConfig {
            coastlines: Some(dir.path().join("missing.geojson").to_string_lossy().to_string()),
            ..small_plot()
        };
        assert!(matches!(render(&da_mean, &plot), Err(RenderError::Coastline(_))));
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::{process_map_job, process_map_job_with_progress, STAGES};

    fn job(dir: &Path) -> JobConfig {
        let nc = create_runoff_file(dir, "standard").unwrap();
        JobConfig {
            nc_key: nc.to_string_lossy().to_string(),
            variable_name: "QRUNOFF".to_string(),
            png_key: Some(dir.join("yourfigure.png").to_string_lossy().to_string()),
            load: LoadOptions::default(),
            reduce: ReduceConfig::default(),
            plot: PlotConfig {
                steps: Some(10),
                figsize: [3.0, 1.5],
                dpi: 50,
                ..PlotConfig::default()
            },
        }
    }

    #[test]
    fn test_full_pipeline() {
        let dir = tempdir().unwrap();
        let config = job(dir.path());

        let mut stages = Vec::new();
        let summary = process_map_job_with_progress(&config, |s| stages.push(s.to_string())).unwrap();

        assert_eq!(stages, STAGES.to_vec());
        assert_eq!(summary.input_shape, vec![NTIME, NLAT, NLON]);
        assert_eq!(summary.output_shape, vec![NLAT, NLON]);
        assert_eq!(summary.units.as_deref(), Some("mm/s"));
        assert_eq!(summary.lon_units.as_deref(), Some("degrees_east"));
        assert!(dir.path().join("yourfigure.png").exists());
    }

    #[test]
    fn test_color_range_from_whole_variable() {
        let dir = tempdir().unwrap();
        let mut config = job(dir.path());
        config.png_key = None;

        let from_field = process_map_job(&config).unwrap();
        config.plot.range_from = RangeSource::Variable;
        let from_variable = process_map_job(&config).unwrap();

        // first time step holds the smallest values, the mean does not reach them
        let expected_min = runoff_value(0, 0, 1) as f64;
        assert_eq!(from_variable.color_range.0, expected_min);
        assert_eq!(from_field.color_range.0, from_field.min.unwrap());
        assert!(from_variable.color_range.0 < from_field.color_range.0);

        // explicit bounds are kept
        config.plot.vmin = Some(0.0);
        let explicit = process_map_job(&config).unwrap();
        assert_eq!(explicit.color_range.0, 0.0);
    }

    #[test]
    fn test_pipeline_without_output() {
        let dir = tempdir().unwrap();
        let mut config = job(dir.path());
        config.png_key = None;
        config.reduce.index = Some(0);

        let summary = process_map_job(&config).unwrap();
        assert_eq!(summary.output, None);
        assert!(!dir.path().join("yourfigure.png").exists());
    }

    #[test]
    fn test_pipeline_errors() {
        let dir = tempdir().unwrap();
        let base = job(dir.path());

        let mut config = base.clone();
        config.variable_name = "TSA".to_string();
        let err = process_map_job(&config).unwrap_err();
        assert!(err.downcast_ref::<DatasetError>().is_some());

        let mut config = base.clone();
        config.reduce.dimension = "depth".to_string();
        let err = process_map_job(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::DimensionNotFound { .. })
        ));

        let mut config = base;
        config.nc_key = dir.path().join("absent.nc").to_string_lossy().to_string();
        let err = process_map_job(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::FileNotFound(_))
        ));
    }
}
