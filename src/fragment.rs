use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{Group, Identifier, Job, Pipeline, Resource, ResourceType};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineFragment {
    pub resource_types: Vec<ResourceType>,
    pub resources: Vec<Resource>,
    pub jobs: Vec<Job>,
}

impl PipelineFragment {
    pub fn new(
        resource_types: Vec<ResourceType>,
        resources: Vec<Resource>,
        jobs: Vec<Job>,
    ) -> Self {
        Self {
            resource_types,
            resources,
            jobs,
        }
    }

    /// Jobs are concatenated in order. For resources and resource types the
    /// first declaration of a name wins.
    pub fn combine_fragments<'a, I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = &'a PipelineFragment>,
    {
        let mut resource_types: IndexMap<Identifier, ResourceType> = IndexMap::new();
        let mut resources: IndexMap<Identifier, Resource> = IndexMap::new();
        let mut jobs = Vec::new();
        let mut dropped = 0usize;

        for fragment in fragments {
            for resource_type in &fragment.resource_types {
                if resource_types.contains_key(&resource_type.name) {
                    dropped += 1;
                } else {
                    resource_types.insert(resource_type.name.clone(), resource_type.clone());
                }
            }
            for resource in &fragment.resources {
                if resources.contains_key(&resource.name) {
                    dropped += 1;
                } else {
                    resources.insert(resource.name.clone(), resource.clone());
                }
            }
            jobs.extend(fragment.jobs.iter().cloned());
        }

        if dropped > 0 {
            debug!(dropped, "Dropped duplicate resource declarations");
        }

        Self {
            resource_types: resource_types.into_values().collect(),
            resources: resources.into_values().collect(),
            jobs,
        }
    }

    pub fn extend(&mut self, other: PipelineFragment) {
        let combined = Self::combine_fragments([&*self, &other]);
        *self = combined;
    }

    pub fn deduplicated(self) -> Self {
        Self::combine_fragments([&self])
    }

    pub fn to_pipeline(self) -> Result<Pipeline> {
        self.to_pipeline_with_groups(Vec::new())
    }

    pub fn to_pipeline_with_groups(self, groups: Vec<Group>) -> Result<Pipeline> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(PipelineError::DuplicateJob(job.name.to_string()));
            }
        }
        for group in &groups {
            if let Some(missing) = group.jobs.iter().find(|job| !seen.contains(job.as_str())) {
                return Err(PipelineError::UnknownGroupJob {
                    group: group.name.to_string(),
                    job: missing.to_string(),
                });
            }
        }

        Ok(Pipeline {
            resource_types: self.resource_types,
            resources: self.resources,
            jobs: self.jobs,
            groups,
        })
    }

    pub fn job(&self, name: &Identifier) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.name == name)
    }

    pub fn resource(&self, name: &Identifier) -> Option<&Resource> {
        self.resources.iter().find(|resource| &resource.name == name)
    }
}
