use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use nc2map::cli::{
    Cli, Commands, ConfigFormat, OutputFormat, RenderArgs, TemplateType, build_render_config, generate_template,
    load_config, serialize_config,
};
use nc2map::dataset::Dataset;
use nc2map::info::{get_netcdf_info, print_file_info_csv, print_file_info_human, print_file_info_json, print_file_info_yaml};
use nc2map::input::JobConfig;
use nc2map::log::{config_echo, show_farewell_with_timing, show_greeting, show_job_summary};
use nc2map::{STAGES, process_map_job_with_progress};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Commands::Render(args) => run_render(&cli, args),
        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => run_info(file, *detailed, variable.as_deref(), format.as_ref().unwrap_or(&cli.output_format)),
        Commands::Validate { config_file, detailed } => run_validate(&cli, config_file.as_ref(), *detailed),
        Commands::Template {
            template_type,
            output,
            format,
        } => run_template(template_type, output.as_ref(), format),
        Commands::Completions { shell, output } => run_completions(*shell, output.as_ref()),
    }
}

/// Log level from -v/-q; RUST_LOG still takes precedence
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run_render(cli: &Cli, args: &RenderArgs) -> Result<()> {
    let start_time = Instant::now();
    let banners = cli.shows_banners();

    let base = match &cli.config {
        Some(path) => {
            if banners {
                show_greeting(&path.display().to_string());
            }
            Some(load_config(path)?)
        }
        None => {
            if banners {
                show_greeting("command line");
            }
            None
        }
    };
    let config = build_render_config(base, args)?;

    if banners {
        config_echo(&config);
    }

    if args.dry_run {
        check_input(&config)?;
        if banners {
            println!("\nDry run: configuration is valid, nothing rendered");
        }
        return Ok(());
    }

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(STAGES.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );

    let mut started = false;
    let summary = process_map_job_with_progress(&config, |stage| {
        if started {
            progress.inc(1);
        }
        started = true;
        progress.set_message(stage.to_string());
    })?;
    progress.inc(1);
    progress.finish_with_message("done");

    match cli.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&summary)?),
        OutputFormat::Human | OutputFormat::Csv => {
            if banners {
                show_job_summary(&summary);
                show_farewell_with_timing(start_time.elapsed());
            }
        }
    }
    Ok(())
}

/// Opens the input and checks the variable and dimension exist
fn check_input(config: &JobConfig) -> Result<()> {
    let dataset = Dataset::open(&config.nc_key, &config.load)
        .with_context(|| format!("Failed to open dataset {}", config.nc_key))?;
    let info = dataset.variable_info(&config.variable_name)?;
    if !info.dimensions.contains(&config.reduce.dimension) {
        bail!(
            "Variable '{}' has no dimension '{}' (dimensions: {:?})",
            config.variable_name,
            config.reduce.dimension,
            info.dimensions
        );
    }
    if info.dimensions.len() != 3 {
        bail!(
            "Variable '{}' has {} dimensions; a map needs 2 after reducing '{}'",
            config.variable_name,
            info.dimensions.len(),
            config.reduce.dimension
        );
    }
    debug!("Input check passed for '{}' in {}", config.variable_name, config.nc_key);
    dataset.close()?;
    Ok(())
}

fn run_info(file: &str, detailed: bool, variable: Option<&str>, format: &OutputFormat) -> Result<()> {
    let info = get_netcdf_info(file, variable, detailed)?;
    match format {
        OutputFormat::Human => print_file_info_human(&info),
        OutputFormat::Json => print_file_info_json(&info)?,
        OutputFormat::Yaml => print_file_info_yaml(&info)?,
        OutputFormat::Csv => print_file_info_csv(&info)?,
    }
    Ok(())
}

fn run_validate(cli: &Cli, config_file: Option<&PathBuf>, detailed: bool) -> Result<()> {
    let path = config_file
        .or(cli.config.as_ref())
        .context("No configuration file given (argument, --config or NC2MAP_CONFIG)")?;
    let config = load_config(path)?;

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  - {}", problem);
        }
        bail!("{} has {} problem(s)", path.display(), problems.len());
    }

    if detailed {
        if !Path::new(&config.nc_key).exists() {
            bail!("Input file {} does not exist", config.nc_key);
        }
        check_input(&config)?;
    }

    if !cli.quiet {
        println!("{} is valid", path.display());
    }
    info!("Validated {}", path.display());
    Ok(())
}

fn run_template(template_type: &TemplateType, output: Option<&PathBuf>, format: &ConfigFormat) -> Result<()> {
    let config = generate_template(template_type);
    let text = serialize_config(&config, format)?;
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write template to {}", path.display()))?;
            info!("Template written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_completions(shell: clap_complete::Shell, output: Option<&PathBuf>) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    match output {
        Some(path) => {
            let mut file =
                fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            clap_complete::generate(shell, &mut command, name, &mut file);
            file.flush()?;
        }
        None => clap_complete::generate(shell, &mut command, name, &mut std::io::stdout()),
    }
    Ok(())
}
