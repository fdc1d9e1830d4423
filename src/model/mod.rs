mod identifier;
mod step;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use identifier::Identifier;
pub use step::{
    Command, GetStep, InParallelStep, Platform, PutStep, Step, StepParams, TaskArtifact,
    TaskConfig, TaskStep,
};

pub type Source = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: Identifier,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Source>,
}

impl ResourceType {
    pub fn registry_image(name: Identifier, repository: &str, tag: &str) -> Self {
        let mut source = Source::new();
        source.insert("repository".into(), Value::String(repository.into()));
        source.insert("tag".into(), Value::String(tag.into()));
        Self {
            name,
            kind: "registry-image".into(),
            source,
            check_every: None,
            defaults: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: Identifier,
    #[serde(rename = "type")]
    pub kind: Identifier,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_token: Option<String>,
}

impl Resource {
    pub fn new(name: Identifier, kind: Identifier, source: Source) -> Self {
        Self {
            name,
            kind,
            source,
            icon: None,
            check_every: None,
            webhook_token: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: Identifier,
    pub plan: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Box<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<Box<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_abort: Option<Box<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure: Option<Box<Step>>,
}

impl Job {
    pub fn new(name: Identifier, plan: Vec<Step>) -> Self {
        Self {
            name,
            plan,
            max_in_flight: None,
            serial: None,
            public: None,
            on_success: None,
            on_failure: None,
            on_error: None,
            on_abort: None,
            ensure: None,
        }
    }

    pub fn get_steps(&self) -> Vec<&GetStep> {
        self.plan.iter().flat_map(Step::get_steps).collect()
    }

    pub fn get_step_for(&self, resource: &Identifier) -> Option<&GetStep> {
        self.get_steps().into_iter().find(|step| &step.get == resource)
    }

    pub fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.plan.iter().chain(
            [
                &self.on_success,
                &self.on_failure,
                &self.on_error,
                &self.on_abort,
                &self.ensure,
            ]
            .into_iter()
            .filter_map(|hook| hook.as_deref()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: Identifier,
    #[serde(default)]
    pub jobs: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub resource_types: Vec<ResourceType>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
}

impl Pipeline {
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.name == name)
    }
}
