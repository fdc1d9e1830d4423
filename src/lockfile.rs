use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::definition::PipelineDefinition;
use crate::model::{Job, Pipeline};

#[derive(Debug, Serialize)]
pub struct PipelineLock {
    pub definition_version: u32,
    pub pipeline: String,
    pub generated_at: DateTime<Utc>,
    pub digest: String,
    pub resource_types: Vec<String>,
    pub resources: Vec<ResourceLock>,
    pub jobs: Vec<JobLock>,
}

#[derive(Debug, Serialize)]
pub struct ResourceLock {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct JobLock {
    pub name: String,
    pub plan_hash: String,
}

pub fn generate_lock(
    definition: &PipelineDefinition,
    pipeline: &Pipeline,
    path: &Path,
) -> Result<()> {
    let lock = build_lock(definition, pipeline)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;
    Ok(())
}

pub fn build_lock(definition: &PipelineDefinition, pipeline: &Pipeline) -> Result<PipelineLock> {
    let jobs = pipeline
        .jobs
        .iter()
        .map(|job| {
            Ok(JobLock {
                name: job.name.to_string(),
                plan_hash: hash_job(job)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineLock {
        definition_version: definition.version,
        pipeline: definition.name.clone(),
        generated_at: Utc::now(),
        digest: digest(pipeline)?,
        resource_types: pipeline
            .resource_types
            .iter()
            .map(|resource_type| resource_type.name.to_string())
            .collect(),
        resources: pipeline
            .resources
            .iter()
            .map(|resource| ResourceLock {
                name: resource.name.to_string(),
                kind: resource.kind.to_string(),
            })
            .collect(),
        jobs,
    })
}

pub fn digest(pipeline: &Pipeline) -> Result<String> {
    let serialized = serde_json::to_vec(pipeline).context("Failed to serialize pipeline")?;
    Ok(format!("{:x}", Sha256::digest(&serialized)))
}

fn hash_job(job: &Job) -> Result<String> {
    let serialized = serde_json::to_vec(job)
        .with_context(|| format!("Failed to serialize job '{}'", job.name))?;
    let mut hasher = Sha256::new();
    hasher.update(job.name.as_str().as_bytes());
    hasher.update(serialized);
    Ok(format!("{:x}", hasher.finalize()))
}
