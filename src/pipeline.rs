use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::definition::PipelineDefinition;
use crate::error::PipelineError;
use crate::fragment::PipelineFragment;
use crate::model::{Identifier, Pipeline, Resource};

pub type FragmentParameters = Map<String, Value>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FragmentSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<FragmentParameters>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    resources: IndexMap<Identifier, Resource>,
    jobs: Vec<Identifier>,
}

impl BuildContext {
    pub fn from_definition(definition: &PipelineDefinition) -> Self {
        let mut ctx = Self::default();
        for resource in &definition.resources {
            ctx.resources
                .entry(resource.name.clone())
                .or_insert_with(|| resource.clone());
        }
        ctx
    }

    pub fn resource(&self, name: &str) -> Result<&Resource, PipelineError> {
        self.resources
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, resource)| resource)
            .ok_or_else(|| PipelineError::UnknownResource(name.to_string()))
    }

    pub fn job(&self, name: &str) -> Result<Identifier, PipelineError> {
        self.jobs
            .iter()
            .find(|job| job.as_str() == name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownJob(name.to_string()))
    }

    pub fn absorb(&mut self, fragment: &PipelineFragment) {
        for resource in &fragment.resources {
            self.resources
                .entry(resource.name.clone())
                .or_insert_with(|| resource.clone());
        }
        self.jobs
            .extend(fragment.jobs.iter().map(|job| job.name.clone()));
    }
}

type FragmentConstructor =
    Arc<dyn Fn(FragmentParameters, &BuildContext) -> Result<PipelineFragment> + Send + Sync>;

pub struct FragmentRegistry {
    factories: HashMap<String, FragmentConstructor>,
}

impl Default for FragmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(FragmentParameters, &BuildContext) -> Result<PipelineFragment>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(constructor));
    }

    pub fn create(
        &self,
        kind: &str,
        params: FragmentParameters,
        ctx: &BuildContext,
    ) -> Result<PipelineFragment> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            anyhow!(
                "Unknown fragment kind '{}'. Available kinds: {}",
                kind,
                self.known_kinds().join(", ")
            )
        })?;
        factory(params, ctx)
    }

    pub fn known_kinds(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

pub fn build_fragments(
    registry: &FragmentRegistry,
    definition: &PipelineDefinition,
) -> Result<Vec<PipelineFragment>> {
    let mut ctx = BuildContext::from_definition(definition);
    let mut fragments = Vec::with_capacity(definition.fragments.len());
    for (idx, spec) in definition.fragments.iter().enumerate() {
        let params = spec.params.clone().unwrap_or_default();
        let fragment = registry
            .create(&spec.kind, params, &ctx)
            .with_context(|| format!("Fragment {} ('{}')", idx + 1, spec.kind))?;
        debug!(
            kind = spec.kind.as_str(),
            jobs = fragment.jobs.len(),
            resources = fragment.resources.len(),
            "Fragment built"
        );
        ctx.absorb(&fragment);
        fragments.push(fragment);
    }
    Ok(fragments)
}

// Declared resources go first so they win over fragment defaults.
#[instrument(skip_all, fields(pipeline = %definition.name))]
pub fn build_pipeline(
    registry: &FragmentRegistry,
    definition: &PipelineDefinition,
) -> Result<Pipeline> {
    let declared = PipelineFragment::new(
        definition.resource_types.clone(),
        definition.resources.clone(),
        Vec::new(),
    );
    let fragments = build_fragments(registry, definition)?;
    let combined = PipelineFragment::combine_fragments(iter::once(&declared).chain(&fragments));

    info!(
        resource_types = combined.resource_types.len(),
        resources = combined.resources.len(),
        jobs = combined.jobs.len(),
        "Pipeline assembled"
    );

    combined
        .to_pipeline_with_groups(definition.groups.clone())
        .with_context(|| format!("Pipeline '{}' is inconsistent", definition.name))
}
