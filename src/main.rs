mod cli;

use diskforged::config::{self, persist, Config};
use diskforged::imaging::{
    ImagingEvent, ImagingOutcome, ImagingWorker, Orchestrator, PreflightReport,
};
use diskforged_tools::template::display_command;
use diskforged_tools::{compute_digests, HashAlgorithm, ResolvedTool};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "diskforged=debug,diskforged_tools=debug".to_string()
        } else {
            "diskforged=info,diskforged_tools=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check => {
            let (config, _) = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(run_preflight(&ImagingWorker::new(Orchestrator::new(
                config,
            ))))?;
            print_preflight(&report);
            if !report.ok() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Image { run, no_save } => {
            let (base, save_path) = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            let succeeded = rt.block_on(image(base, &run, &save_path, no_save))?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Plan { run } => {
            let (base, _) = config::load_config_or_default(cli.config.as_deref())?;
            plan(effective_config(&base, &run)?)
        }
        Commands::Digest {
            files,
            algorithms,
            json,
        } => digest_files(&files, &algorithms, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::SaveConfig => {
            let (config, save_path) = config::load_config_or_default(cli.config.as_deref())?;
            persist::save_config(&save_path, &config)?;
            println!("Saved config to {}", save_path.display());
            Ok(())
        }
        Commands::Version => {
            println!("diskforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Apply command-line overrides on top of the loaded config.
fn effective_config(base: &Config, run: &RunArgs) -> Result<Config> {
    let mut config = base.clone();
    let imaging = &mut config.imaging;
    if let Some(ref name) = run.base {
        imaging.base_name = Some(name.clone());
    }
    if let Some(drive) = run.drive {
        imaging.drive = drive;
    }
    if let Some(ref tracks) = run.tracks {
        imaging.tracks = tracks.clone();
    }
    if let Some(revs) = run.revs {
        imaging.revs = revs;
    }
    if let Some(ref dir) = run.output_dir {
        imaging.output_dir = Some(dir.clone());
    }
    if let Some(ref reader) = run.reader {
        config.tools.reader_path = Some(reader.clone());
    }
    if let Some(ref converter) = run.converter {
        config.tools.converter_path = Some(converter.clone());
    }

    config::validate_config(&config).context("Invalid imaging parameters")?;
    Ok(config)
}

async fn run_preflight(worker: &ImagingWorker) -> Result<PreflightReport> {
    let mut report = None;
    worker
        .spawn_preflight()?
        .follow(|event| {
            if let ImagingEvent::Preflight(r) = event {
                report = Some(r);
            }
        })
        .await?;
    report.context("Pre-flight ended without a report")
}

async fn image(base: Config, run: &RunArgs, save_path: &Path, no_save: bool) -> Result<bool> {
    let config = effective_config(&base, run)?;
    let worker = ImagingWorker::new(Orchestrator::new(config.clone()));

    let report = run_preflight(&worker).await?;
    print_preflight(&report);
    if !report.ok() {
        return Ok(false);
    }

    println!();
    let mut finished = None;
    worker
        .spawn_imaging()?
        .follow(|event| match event {
            ImagingEvent::Line(line) => println!("{}", line),
            ImagingEvent::Status(status) => println!("==> {}", status),
            ImagingEvent::Finished(result) => finished = Some(result),
            ImagingEvent::State(_) | ImagingEvent::Preflight(_) => {}
        })
        .await?;

    let outcome = match finished {
        Some(Ok(outcome)) => outcome,
        Some(Err(message)) => anyhow::bail!("Imaging aborted: {}", message),
        None => anyhow::bail!("Imaging ended without a result"),
    };
    print_outcome(&outcome);

    if outcome.succeeded() && !no_save {
        let mut to_save = base;
        persist::remember_run(&mut to_save, &config.imaging, &config.tools);
        if let Err(e) = persist::save_config(save_path, &to_save) {
            tracing::warn!("Failed to remember run parameters: {:#}", e);
        }
    }

    Ok(outcome.succeeded())
}

fn print_tool(tool: &ResolvedTool) {
    let status = if tool.is_resolved() { "✓" } else { "✗" };
    println!("{} {} - {}", status, tool.name, tool.message);
}

fn print_preflight(report: &PreflightReport) {
    println!("Checking external tools...\n");
    print_tool(&report.reader);
    print_tool(&report.converter);

    if let Some(ref probe) = report.probe {
        let status = if probe.passed { "✓" } else { "✗" };
        println!("{} {}", status, probe.message);
    }

    println!();
    match report.failure {
        None => println!("Ready to image."),
        Some(ref reason) => println!("Imaging disabled: {}", reason),
    }
}

fn print_outcome(outcome: &ImagingOutcome) {
    println!();
    println!("{}", outcome.message());

    let Some(ref session) = outcome.session else {
        return;
    };
    println!("  Log: {}", session.log_path.display());
    if let Some(code) = session.read_exit_code {
        println!("  Read exit code: {}", code);
    }
    if let Some(code) = session.convert_exit_code {
        println!("  Convert exit code: {}", code);
    }
    if !outcome.succeeded() {
        return;
    }

    println!("  Capture: {}", session.capture_path.display());
    for (alg, hex) in &session.capture_digests {
        println!("    {:<8} {}", alg.name(), hex);
    }
    if let Some(ref image) = session.image_path {
        println!("  Image: {}", image.display());
    }
    for (alg, hex) in &session.image_digests {
        println!("    {:<8} {}", alg.name(), hex);
    }
    if let Some(ref summary) = outcome.summary_path {
        println!("  Summary: {}", summary.display());
    }
}

fn plan(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    let plan = orchestrator.plan()?;

    println!("Base name: {}", plan.session.base_name);
    println!("Output directory: {}", plan.session.output_dir.display());
    println!("\nRead:\n  {}", display_command(&plan.read));
    println!("\nConvert:\n  {}", display_command(&plan.convert));
    println!("\n[DRY RUN] Nothing was executed");
    Ok(())
}

fn digest_files(files: &[PathBuf], names: &[String], json: bool) -> Result<()> {
    let algorithms = if names.is_empty() {
        HashAlgorithm::DEFAULT_SET.to_vec()
    } else {
        names
            .iter()
            .map(|n| n.parse::<HashAlgorithm>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut results = serde_json::Map::new();
    for file in files {
        let digests = compute_digests(file, &algorithms)
            .with_context(|| format!("Failed to hash {:?}", file))?;
        if json {
            results.insert(file.display().to_string(), serde_json::to_value(&digests)?);
        } else {
            println!("{}", file.display());
            for (alg, hex) in &digests {
                println!("  {:<8} {}", alg.name(), hex);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Drive: {}", config.imaging.drive);
    println!("  Tracks: {}", config.imaging.tracks);
    println!("  Revolutions: {}", config.imaging.revs);
    println!(
        "  Output directory: {}",
        config.imaging.resolved_output_dir().display()
    );
    println!("  Read template: {}", config.templates.read);
    println!("  Convert template: {}", config.templates.convert);
    let algorithms: Vec<&str> = config.digest.algorithms.iter().map(|a| a.name()).collect();
    println!("  Digests: {}", algorithms.join(", "));

    Ok(())
}
