use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use glob::glob;
use ol_concourse::definition::PipelineDefinition;
use ol_concourse::fragments;
use ol_concourse::lockfile::generate_lock;
use ol_concourse::model::Pipeline;
use ol_concourse::pipeline::{FragmentRegistry, build_pipeline};
use ol_concourse::presets::generate_preset;
use ol_concourse::render::{DEFAULT_FLY_TARGET, OutputFormat, fly_command, write_pipeline};
use ol_concourse::validation::{ValidationReport, validate_definition};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Generate {
            definition,
            output,
            format,
            stdout,
            target,
        } => generate(&definition, output, format, stdout, &target),
        Commands::Validate { definition } => validate_definition_cmd(&definition),
        Commands::Lock { definition, output } => lock_definition(&definition, &output),
        Commands::ListFragments => {
            list_fragments();
            Ok(())
        }
        Commands::Definition { action } => definition_command(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ol-concourse", &mut io::stdout());
            Ok(())
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is reserved for generated documents and the fly command.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}

fn build_registry() -> FragmentRegistry {
    let mut registry = FragmentRegistry::new();
    fragments::register_defaults(&mut registry);
    registry
}

fn load_validated(path: &Path, registry: &FragmentRegistry) -> Result<PipelineDefinition> {
    let definition = PipelineDefinition::load(path)?;
    let report = validate_definition(&definition, registry);
    log_report(path, &report);
    if !report.is_ok() {
        bail!(
            "Pipeline definition validation failed with {} error(s)",
            report.errors.len()
        );
    }
    Ok(definition)
}

fn log_report(path: &Path, report: &ValidationReport) {
    for warning in &report.warnings {
        warn!(file = %path.display(), "{warning}");
    }
    for error_msg in &report.errors {
        error!(file = %path.display(), "{error_msg}");
    }
}

fn generate(
    definition_path: &Path,
    output: Option<PathBuf>,
    format: OutputFormat,
    stdout: bool,
    target: &str,
) -> Result<()> {
    let registry = build_registry();
    let definition = load_validated(definition_path, &registry)?;
    let pipeline = build_pipeline(&registry, &definition)?;

    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("definition.{}", format.extension())));
    let rendered = write_pipeline(&pipeline, format, &output)?;
    info!(
        pipeline = definition.name.as_str(),
        output = %output.display(),
        jobs = pipeline.jobs.len(),
        "Pipeline definition written"
    );

    if stdout {
        println!("{rendered}");
    }
    println!(
        "{}",
        fly_command(target, &definition.name, definition.team.as_deref(), &output)
    );
    Ok(())
}

fn validate_definition_cmd(definition_path: &Path) -> Result<()> {
    let definition = PipelineDefinition::load(definition_path)?;
    let registry = build_registry();
    let report = validate_definition(&definition, &registry);
    log_report(definition_path, &report);

    if report.is_ok() {
        info!(file = %definition_path.display(), "Pipeline definition validation passed");
        Ok(())
    } else {
        Err(anyhow!(
            "Pipeline definition validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn lock_definition(definition_path: &Path, output_path: &Path) -> Result<()> {
    let registry = build_registry();
    let definition = load_validated(definition_path, &registry)
        .context("Cannot generate lockfile")?;
    let pipeline = build_pipeline(&registry, &definition)?;

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create lockfile directory: {}", parent.display())
        })?;
    }

    generate_lock(&definition, &pipeline, output_path)?;
    info!(
        lockfile = %output_path.display(),
        "Lockfile generated successfully"
    );
    Ok(())
}

fn list_fragments() {
    let registry = build_registry();
    println!("Available fragment kinds:");
    for name in registry.known_kinds() {
        println!("- {name}");
    }
}

fn definition_command(command: DefinitionCommands) -> Result<()> {
    match command {
        DefinitionCommands::New { preset, output } => {
            let destination =
                output.unwrap_or_else(|| PathBuf::from(format!("pipelines/{preset}.yaml")));
            let generated = generate_preset(&preset, &destination)?;
            info!(
                preset = %preset,
                path = %generated.display(),
                "Preset definition generated"
            );
            Ok(())
        }
        DefinitionCommands::Lint { patterns } => lint_definitions(&patterns),
        DefinitionCommands::Diff { lhs, rhs } => diff_definitions(&lhs, &rhs),
    }
}

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    for pattern in patterns {
        let matches =
            glob(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        let mut found = false;
        for entry in matches {
            let path = entry?;
            if path.is_file() {
                resolved.push(path);
                found = true;
            }
        }
        if !found {
            bail!("No pipeline definitions matched pattern: {pattern}");
        }
    }
    Ok(resolved)
}

fn lint_definitions(patterns: &[String]) -> Result<()> {
    let paths = expand_patterns(patterns)?;
    let registry = build_registry();
    let mut failures = 0usize;

    for path in &paths {
        match PipelineDefinition::load(path) {
            Ok(definition) => {
                let report = validate_definition(&definition, &registry);
                log_report(path, &report);
                if report.is_ok() {
                    info!(file = %path.display(), "Lint passed");
                } else {
                    failures += 1;
                }
            }
            Err(err) => {
                failures += 1;
                error!(file = %path.display(), "Failed to load pipeline definition: {err:#}");
            }
        }
    }

    if failures > 0 {
        bail!("Lint failed for {failures} pipeline definition(s)");
    }

    info!(count = paths.len(), "All pipeline definition lint checks passed");
    Ok(())
}

fn diff_definitions(lhs: &Path, rhs: &Path) -> Result<()> {
    let registry = build_registry();
    let left = build_pipeline(&registry, &PipelineDefinition::load(lhs)?)
        .with_context(|| format!("Failed to build {}", lhs.display()))?;
    let right = build_pipeline(&registry, &PipelineDefinition::load(rhs)?)
        .with_context(|| format!("Failed to build {}", rhs.display()))?;

    let differences = pipeline_differences(&left, &right)?;

    if differences.is_empty() {
        info!(
            left = %lhs.display(),
            right = %rhs.display(),
            "Pipelines are equivalent"
        );
        println!("Pipelines match: {} == {}", lhs.display(), rhs.display());
        Ok(())
    } else {
        println!(
            "Pipeline differences between '{}' and '{}':",
            lhs.display(),
            rhs.display()
        );
        for diff in &differences {
            println!("- {diff}");
        }
        bail!("Pipelines differ ({} difference(s) found)", differences.len());
    }
}

fn pipeline_differences(left: &Pipeline, right: &Pipeline) -> Result<Vec<String>> {
    let mut differences = Vec::new();

    let left_types = named_values(left.resource_types.iter().map(|t| (t.name.to_string(), t)))?;
    let right_types = named_values(right.resource_types.iter().map(|t| (t.name.to_string(), t)))?;
    compare_named("Resource type", &left_types, &right_types, &mut differences);

    let left_resources = named_values(left.resources.iter().map(|r| (r.name.to_string(), r)))?;
    let right_resources = named_values(right.resources.iter().map(|r| (r.name.to_string(), r)))?;
    compare_named("Resource", &left_resources, &right_resources, &mut differences);

    let left_jobs = named_values(left.jobs.iter().map(|j| (j.name.to_string(), j)))?;
    let right_jobs = named_values(right.jobs.iter().map(|j| (j.name.to_string(), j)))?;
    compare_named("Job", &left_jobs, &right_jobs, &mut differences);

    let left_order: Vec<_> = left.jobs.iter().map(|job| job.name.as_str()).collect();
    let right_order: Vec<_> = right.jobs.iter().map(|job| job.name.as_str()).collect();
    if left_jobs.keys().eq(right_jobs.keys()) && left_order != right_order {
        differences.push(format!(
            "Job order differs: {left_order:?} vs {right_order:?}"
        ));
    }

    Ok(differences)
}

fn named_values<'a, T, I>(items: I) -> serde_json::Result<BTreeMap<String, serde_json::Value>>
where
    T: serde::Serialize + 'a,
    I: Iterator<Item = (String, &'a T)>,
{
    items
        .map(|(name, item)| serde_json::to_value(item).map(|value| (name, value)))
        .collect()
}

fn compare_named(
    label: &str,
    left: &BTreeMap<String, serde_json::Value>,
    right: &BTreeMap<String, serde_json::Value>,
    differences: &mut Vec<String>,
) {
    for (name, value) in left {
        match right.get(name) {
            None => differences.push(format!("{label} '{name}' only in left pipeline")),
            Some(other) if other != value => differences.push(format!(
                "{label} '{name}' differs: {} vs {}",
                serde_json::to_string(value).unwrap_or_else(|_| "<invalid>".into()),
                serde_json::to_string(other).unwrap_or_else(|_| "<invalid>".into())
            )),
            Some(_) => {}
        }
    }
    for name in right.keys().filter(|name| !left.contains_key(*name)) {
        differences.push(format!("{label} '{name}' only in right pipeline"));
    }
}

#[derive(Parser)]
#[command(
    name = "ol-concourse",
    version,
    about = "Compose Concourse pipeline definitions from reusable fragments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pipeline definition and write the Concourse document.
    Generate {
        definition: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Also print the generated document to stdout.
        #[arg(long)]
        stdout: bool,
        #[arg(long, default_value = DEFAULT_FLY_TARGET)]
        target: String,
    },
    Validate {
        definition: PathBuf,
    },
    Lock {
        definition: PathBuf,
        output: PathBuf,
    },
    ListFragments,
    Definition {
        #[command(subcommand)]
        action: DefinitionCommands,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DefinitionCommands {
    New {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Lint {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    Diff {
        lhs: PathBuf,
        rhs: PathBuf,
    },
}
