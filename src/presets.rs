use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::definition::{DEFINITION_VERSION, PipelineDefinition};
use crate::fragments::{PACKER, PULUMI_CHAIN};
use crate::model::{Identifier, Resource};
use crate::pipeline::{FragmentParameters, FragmentSpec};
use crate::resources::git_repo;

pub const PRESETS: &[&str] = &["packer", "packer-pulumi", "pulumi"];

const REPOSITORY_URI: &str = "https://github.com/mitodl/ol-infrastructure";

pub fn generate_preset(name: &str, destination: &Path) -> Result<PathBuf> {
    let preset = match name {
        "pulumi" => pulumi_preset()?,
        "packer-pulumi" => packer_pulumi_preset()?,
        "packer" => packer_preset()?,
        other => anyhow::bail!(
            "Unknown preset '{other}'. Available presets: {}",
            PRESETS.join(", ")
        ),
    };

    let rendered = serde_yaml::to_string(&preset)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered).with_context(|| {
        format!("Failed to write preset definition: {}", destination.display())
    })?;

    Ok(destination.to_path_buf())
}

fn pulumi_preset() -> Result<PipelineDefinition> {
    Ok(PipelineDefinition {
        version: DEFINITION_VERSION,
        name: "ol-infrastructure-dagster".into(),
        team: Some("infrastructure".into()),
        resource_types: Vec::new(),
        resources: vec![code_resource(
            "pulumi-code",
            &["src/ol_infrastructure/applications/dagster/"],
        )?],
        fragments: vec![fragment(
            PULUMI_CHAIN,
            json!({
                "pulumi_code": "pulumi-code",
                "project_name": "ol-infrastructure-dagster",
                "project_source_path": "src/ol_infrastructure/applications/dagster",
                "stack_names": stacks("applications.dagster"),
            }),
        )],
        groups: Vec::new(),
    })
}

fn packer_pulumi_preset() -> Result<PipelineDefinition> {
    Ok(PipelineDefinition {
        version: DEFINITION_VERSION,
        name: "ol-infrastructure-vault".into(),
        team: Some("infrastructure".into()),
        resource_types: Vec::new(),
        resources: vec![
            code_resource("vault-image-code", &["src/bilder/images/vault/"])?,
            code_resource(
                "pulumi-code",
                &["src/ol_infrastructure/infrastructure/vault/"],
            )?,
        ],
        fragments: vec![
            fragment(
                PACKER,
                json!({
                    "image_code": "vault-image-code",
                    "template_path": "src/bilder/images/vault/vault.pkr.hcl",
                    "node_types": ["server"],
                    "packer_vars": {"app_name": "vault"},
                }),
            ),
            fragment(
                PULUMI_CHAIN,
                json!({
                    "pulumi_code": "pulumi-code",
                    "project_name": "ol-infrastructure-vault-server",
                    "project_source_path": "src/ol_infrastructure/infrastructure/vault",
                    "stack_names": stacks("infrastructure.vault.operations"),
                    "dependencies": [{
                        "resource": "packer-build",
                        "trigger": true,
                        "passed": ["build-packer-template"],
                    }],
                    "github_issues": {"assignees": ["platform-engineering"]},
                }),
            ),
        ],
        groups: Vec::new(),
    })
}

fn packer_preset() -> Result<PipelineDefinition> {
    Ok(PipelineDefinition {
        version: DEFINITION_VERSION,
        name: "packer-concourse".into(),
        team: None,
        resource_types: Vec::new(),
        resources: vec![code_resource(
            "concourse-image-code",
            &["src/bilder/images/concourse/"],
        )?],
        fragments: vec![fragment(
            PACKER,
            json!({
                "image_code": "concourse-image-code",
                "template_path": "src/bilder/images/concourse/concourse.pkr.hcl",
                "node_types": ["web", "worker"],
                "job_name_suffix": "concourse",
            }),
        )],
        groups: Vec::new(),
    })
}

fn code_resource(name: &str, paths: &[&str]) -> Result<Resource> {
    let paths: Vec<String> = paths.iter().map(|path| (*path).to_string()).collect();
    Ok(git_repo(Identifier::new(name)?, REPOSITORY_URI, "main", &paths)?)
}

fn stacks(prefix: &str) -> Value {
    json!(
        ["CI", "QA", "Production"]
            .iter()
            .map(|env| format!("{prefix}.{env}"))
            .collect::<Vec<_>>()
    )
}

fn fragment(kind: &str, params: Value) -> FragmentSpec {
    let params: Option<FragmentParameters> = match params {
        Value::Object(map) => Some(map),
        _ => None,
    };
    FragmentSpec {
        kind: kind.into(),
        params,
    }
}

