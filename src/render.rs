use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::model::Pipeline;

pub const DEFAULT_FLY_TARGET: &str = "pr-inf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    JsonCompact,
    Yaml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json | OutputFormat::JsonCompact => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

pub fn render_pipeline(pipeline: &Pipeline, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(pipeline)?,
        OutputFormat::JsonCompact => serde_json::to_string(pipeline)?,
        OutputFormat::Yaml => serde_yaml::to_string(pipeline)?,
    };
    Ok(rendered)
}

pub fn write_pipeline(pipeline: &Pipeline, format: OutputFormat, path: &Path) -> Result<String> {
    let rendered = render_pipeline(pipeline, format)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, &rendered)
        .with_context(|| format!("Failed to write pipeline: {}", path.display()))?;
    Ok(rendered)
}

pub fn fly_command(target: &str, pipeline_name: &str, team: Option<&str>, path: &Path) -> String {
    let mut command = format!("fly -t {target} set-pipeline");
    if let Some(team) = team {
        command.push_str(&format!(" -n {team}"));
    }
    command.push_str(&format!(" -p {pipeline_name} -c {}", path.display()));
    command
}
