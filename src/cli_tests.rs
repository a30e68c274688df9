//! # CLI Integration Tests
//!
//! This module tests the command-line interface: argument parsing, value
//! parsers, flag conflicts and error handling scenarios.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;

    use crate::array::{Aggregation, MissingPolicy};
    use crate::cli::{Cli, Commands, ConfigFormat, OutputFormat, RenderArgs, TemplateType};
    use crate::input::RangeSource;

    fn render_args(cli: &Cli) -> &RenderArgs {
        if let Commands::Render(args) = &cli.command {
            args
        } else {
            panic!("Expected Render command");
        }
    }

    /// Test basic CLI argument parsing
    #[test]
    fn test_cli_help() {
        let result = Cli::try_parse_from(["nc2map", "--help"]);
        assert!(result.is_err()); // --help causes early exit with "error"

        let error = result.unwrap_err();
        assert!(error.to_string().contains("Render a netCDF variable as a map"));
    }

    /// Test version argument
    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["nc2map", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }

    /// Test global flags
    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "nc2map",
            "--verbose",
            "--output-format",
            "json",
            "--config",
            "/path/to/config.json",
            "template",
            "basic",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.json")));
    }

    /// Test render command argument parsing
    #[test]
    fn test_render_command_basic() {
        let cli = Cli::parse_from([
            "nc2map",
            "render",
            "control_merged.nc",
            "yourfigure.png",
            "-n",
            "QRUNOFF",
        ]);

        let args = render_args(&cli);
        assert_eq!(args.input, Some("control_merged.nc".to_string()));
        assert_eq!(args.output, Some("yourfigure.png".to_string()));
        assert_eq!(args.variable, Some("QRUNOFF".to_string()));
        assert!(!args.dry_run);
        assert!(!args.decode_times);
    }

    /// Test render command with plot options
    #[test]
    fn test_render_command_with_plot_options() {
        let cli = Cli::parse_from([
            "nc2map",
            "render",
            "control_merged.nc",
            "europe.png",
            "-n",
            "QRUNOFF",
            "--dim",
            "time",
            "--aggregation",
            "max",
            "--missing",
            "propagate",
            "--cmap",
            "YlGnBu_r",
            "--title",
            "Runoff",
            "--label",
            "mm/s",
            "--vmin",
            "-1.5",
            "--vmax",
            "2.5",
            "--steps",
            "8",
            "--projection",
            "Mercator",
            "--extent",
            "-13,43,35,70",
            "--figsize",
            "10x4",
            "--dpi",
            "150",
            "--decode-times",
            "--dry-run",
        ]);

        let args = render_args(&cli);
        assert_eq!(args.dimension, Some("time".to_string()));
        assert_eq!(args.aggregation, Some(Aggregation::Max));
        assert_eq!(args.missing, Some(MissingPolicy::Propagate));
        assert_eq!(args.cmap, Some("YlGnBu_r".to_string()));
        assert_eq!(args.title, Some("Runoff".to_string()));
        assert_eq!(args.label, Some("mm/s".to_string()));
        assert_eq!(args.vmin, Some(-1.5));
        assert_eq!(args.vmax, Some(2.5));
        assert_eq!(args.steps, Some(8));
        assert_eq!(args.projection, Some("Mercator".to_string()));
        assert_eq!(args.extent, Some([-13.0, 43.0, 35.0, 70.0]));
        assert_eq!(args.figsize, Some([10.0, 4.0]));
        assert_eq!(args.dpi, Some(150));
        assert!(args.decode_times);
        assert!(args.dry_run);
    }

    #[test]
    fn test_render_levels_and_time_index() {
        let cli = Cli::parse_from([
            "nc2map",
            "render",
            "in.nc",
            "out.png",
            "-n",
            "TSA",
            "--levels",
            "-10,0,10,20",
            "--time-index",
            "3",
        ]);

        let args = render_args(&cli);
        assert_eq!(args.levels, Some(vec![-10.0, 0.0, 10.0, 20.0]));
        assert_eq!(args.time_index, Some(3));
    }

    /// Test the color range source and the steps/levels conflict
    #[test]
    fn test_render_range_from_and_level_conflict() {
        let cli = Cli::parse_from(["nc2map", "render", "in.nc", "-n", "QRUNOFF", "--range-from", "variable"]);
        assert_eq!(render_args(&cli).range_from, Some(RangeSource::Variable));

        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--range-from", "everything"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--steps", "10", "--levels", "0,1,2"]);
        assert!(result.is_err());
    }

    /// Test info command parsing
    #[test]
    fn test_info_command() {
        let cli = Cli::parse_from([
            "nc2map",
            "info",
            "control_merged.nc",
            "--detailed",
            "-n",
            "QRUNOFF",
            "--format",
            "json",
        ]);

        if let Commands::Info {
            file,
            detailed,
            variable,
            format,
        } = &cli.command
        {
            assert_eq!(file, "control_merged.nc");
            assert!(detailed);
            assert_eq!(variable, &Some("QRUNOFF".to_string()));
            assert_eq!(format, &Some(OutputFormat::Json));
        } else {
            panic!("Expected Info command");
        }
    }

    /// Test validate command parsing
    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["nc2map", "validate", "config.json", "--detailed"]);

        if let Commands::Validate {
            config_file,
            detailed,
        } = &cli.command
        {
            assert_eq!(config_file, &Some(PathBuf::from("config.json")));
            assert!(detailed);
        } else {
            panic!("Expected Validate command");
        }
    }

    /// Test template command parsing
    #[test]
    fn test_template_command() {
        let cli = Cli::parse_from([
            "nc2map",
            "template",
            "regional",
            "--output",
            "template.yaml",
            "--format",
            "yaml",
        ]);

        if let Commands::Template {
            template_type,
            output,
            format,
        } = &cli.command
        {
            assert_eq!(template_type, &TemplateType::Regional);
            assert_eq!(output, &Some(PathBuf::from("template.yaml")));
            assert_eq!(format, &ConfigFormat::Yaml);
        } else {
            panic!("Expected Template command");
        }
    }

    /// Test invalid value formats
    #[test]
    fn test_invalid_extent() {
        // Too few values
        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--extent", "-13,43,35"]);
        assert!(result.is_err());

        // Inverted longitudes
        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--extent", "43,-13,35,70"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_figsize_and_levels() {
        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--figsize", "15by6"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--levels", "3,2,1"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["nc2map", "render", "in.nc", "--aggregation", "median"]);
        assert!(result.is_err());
    }

    /// Test output format enum
    #[test]
    fn test_output_format_values() {
        let formats = ["human", "json", "yaml", "csv"];

        for format in &formats {
            let cli = Cli::parse_from(["nc2map", "--output-format", format, "template", "basic"]);

            match *format {
                "human" => assert_eq!(cli.output_format, OutputFormat::Human),
                "json" => assert_eq!(cli.output_format, OutputFormat::Json),
                "yaml" => assert_eq!(cli.output_format, OutputFormat::Yaml),
                "csv" => assert_eq!(cli.output_format, OutputFormat::Csv),
                _ => unreachable!(),
            }
        }
    }

    /// Test template type enum
    #[test]
    fn test_template_types() {
        let templates = ["basic", "categorized", "regional"];

        for template in &templates {
            let cli = Cli::parse_from(["nc2map", "template", template]);

            if let Commands::Template { template_type, .. } = &cli.command {
                match *template {
                    "basic" => assert_eq!(template_type, &TemplateType::Basic),
                    "categorized" => assert_eq!(template_type, &TemplateType::Categorized),
                    "regional" => assert_eq!(template_type, &TemplateType::Regional),
                    _ => unreachable!(),
                }
            } else {
                panic!("Expected Template command");
            }
        }
    }

    /// Test conflicting verbose and quiet flags
    #[test]
    fn test_verbose_quiet_conflict() {
        let result = Cli::try_parse_from(["nc2map", "--verbose", "--quiet", "info", "test.nc"]);
        assert!(result.is_err());

        let cli_verbose = Cli::parse_from(["nc2map", "--verbose", "info", "test.nc"]);
        assert!(cli_verbose.verbose);
        assert!(!cli_verbose.quiet);

        let cli_quiet = Cli::parse_from(["nc2map", "--quiet", "info", "test.nc"]);
        assert!(!cli_quiet.verbose);
        assert!(cli_quiet.quiet);
    }

    #[test]
    fn test_completions_command() {
        let cli = Cli::parse_from(["nc2map", "completions", "zsh", "-o", "_nc2map"]);
        if let Commands::Completions { shell, output } = &cli.command {
            assert_eq!(*shell, clap_complete::Shell::Zsh);
            assert_eq!(output, &Some(PathBuf::from("_nc2map")));
        } else {
            panic!("Expected Completions command");
        }
    }
}
