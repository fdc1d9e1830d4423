use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AnonymousResource, Identifier};

pub type StepParams = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Get(GetStep),
    Put(PutStep),
    Task(TaskStep),
    InParallel(InParallelStep),
}

impl Step {
    pub fn target(&self) -> Option<&Identifier> {
        match self {
            Step::Get(step) => Some(&step.get),
            Step::Put(step) => Some(&step.put),
            Step::Task(step) => Some(&step.task),
            Step::InParallel(_) => None,
        }
    }

    pub fn get_steps(&self) -> Vec<&GetStep> {
        match self {
            Step::Get(step) => vec![step],
            Step::InParallel(parallel) => parallel
                .in_parallel
                .iter()
                .flat_map(Step::get_steps)
                .collect(),
            Step::Put(_) | Step::Task(_) => Vec::new(),
        }
    }

    pub fn put_steps(&self) -> Vec<&PutStep> {
        match self {
            Step::Put(step) => vec![step],
            Step::InParallel(parallel) => parallel
                .in_parallel
                .iter()
                .flat_map(Step::put_steps)
                .collect(),
            Step::Get(_) | Step::Task(_) => Vec::new(),
        }
    }
}

impl From<GetStep> for Step {
    fn from(step: GetStep) -> Self {
        Step::Get(step)
    }
}

impl From<PutStep> for Step {
    fn from(step: PutStep) -> Self {
        Step::Put(step)
    }
}

impl From<TaskStep> for Step {
    fn from(step: TaskStep) -> Self {
        Step::Task(step)
    }
}

impl From<InParallelStep> for Step {
    fn from(step: InParallelStep) -> Self {
        Step::InParallel(step)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetStep {
    pub get: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<Vec<Identifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<StepParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl GetStep {
    pub fn new(resource: Identifier) -> Self {
        Self {
            get: resource,
            resource: None,
            trigger: None,
            passed: None,
            params: None,
            version: None,
            attempts: None,
            timeout: None,
        }
    }

    pub fn with_trigger(mut self, trigger: bool) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_passed(mut self, passed: Vec<Identifier>) -> Self {
        self.passed = Some(passed);
        self
    }

    pub fn with_params(mut self, params: StepParams) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutStep {
    pub put: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<StepParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_params: Option<StepParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl PutStep {
    pub fn new(resource: Identifier) -> Self {
        Self {
            put: resource,
            resource: None,
            inputs: None,
            params: None,
            get_params: None,
            attempts: None,
            timeout: None,
        }
    }

    pub fn with_params(mut self, params: StepParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_get_params(mut self, get_params: StepParams) -> Self {
        self.get_params = Some(get_params);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub task: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<StepParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl TaskStep {
    pub fn with_config(task: Identifier, config: TaskConfig) -> Self {
        Self {
            task,
            config: Some(config),
            file: None,
            params: None,
            attempts: None,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Linux,
    Darwin,
    Windows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_resource: Option<AnonymousResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TaskArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TaskArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<StepParams>,
    pub run: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArtifact {
    pub name: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl TaskArtifact {
    pub fn named(name: Identifier) -> Self {
        Self { name, path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InParallelStep {
    pub in_parallel: Vec<Step>,
}

impl InParallelStep {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { in_parallel: steps }
    }
}
