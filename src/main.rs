use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use midt_pipeline::cli::{Cli, Commands, InitConfigArgs, RunArgs, ValidateArgs};
use midt_pipeline::config::{self, PipelineConfig};
use midt_pipeline::exclusion;
use midt_pipeline::glm::{self, default_contrasts};
use midt_pipeline::io::summary::{format_run_summary, write_run_summary_json};
use midt_pipeline::pipeline;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args)?,
        Commands::Validate(args) => handle_validate(args)?,
        Commands::InitConfig(args) => handle_init_config(args)?,
        Commands::Contrasts => print_contrasts(),
    }
    Ok(())
}

fn load_config(path: &std::path::Path, args: Option<&RunArgs>) -> Result<PipelineConfig> {
    let mut raw = config::load_raw(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))?;
    if let Some(args) = args {
        if let Some(threads) = args.threads {
            raw.threads = Some(threads);
        }
        if let Some(backend) = args.backend {
            raw.glm_backend = Some(backend.into());
        }
    }
    let config = PipelineConfig::from_raw(raw)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    Ok(config)
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.config, Some(&args))?;
    let backend = glm::build_backend(&config.backend);
    let summary = pipeline::run(&config, backend.as_ref()).context("pipeline aborted")?;

    print!("{}", format_run_summary(&summary));
    if let Some(path) = &args.json {
        write_run_summary_json(path, &summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "run summary written");
    }
    Ok(())
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    let config = load_config(&args.config, None)?;

    println!("Configuration OK: {}", args.config.display());
    println!("Base directory: {}", config.base_dir.display());
    for (label, dir) in [
        ("Behavioral", &config.behavioral_dir),
        ("fMRIPrep", &config.fmriprep_dir),
    ] {
        let state = if dir.is_dir() { "found" } else { "MISSING" };
        println!("{} directory: {} ({})", label, dir.display(), state);
    }
    println!(
        "Stages: timing={} motion={} model_fit={}",
        config.stages.timing, config.stages.motion, config.stages.model_fit
    );
    for session in &config.sessions_to_process {
        let subjects = exclusion::resolve(&config.subject_ids, &config.excluded_subjects, session);
        println!(
            "ses-{}: {} of {} subjects",
            session,
            subjects.len(),
            config.subject_ids.len()
        );
    }

    let backend = glm::build_backend(&config.backend);
    match backend.check_available() {
        Ok(()) => println!("Backend: {} (available)", backend.name()),
        Err(err) => println!("Backend: {} ({})", backend.name(), err),
    }

    let minutes = pipeline::estimate_minutes(&config);
    println!(
        "Estimated processing time: {:.1} minutes ({:.1} hours)",
        minutes,
        minutes / 60.0
    );
    Ok(())
}

fn handle_init_config(args: InitConfigArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.out.display()
        );
    }
    let yaml = config::to_yaml(&config::example_config())?;
    std::fs::write(&args.out, yaml)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("Template written to {}", args.out.display());
    println!("Edit the paths and subject list before running.");
    Ok(())
}

fn print_contrasts() {
    println!("name\tweights");
    for contrast in default_contrasts() {
        let weights = contrast
            .weights
            .iter()
            .map(|w| format!("{}", w))
            .collect::<Vec<_>>()
            .join(",");
        println!("{}\t{}", contrast.name, weights);
    }
}
