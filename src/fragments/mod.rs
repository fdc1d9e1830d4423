use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::fragment::PipelineFragment;
use crate::jobs::{
    GithubIssueGate, PackerJobSpec, PulumiChainSpec, PulumiJob, packer_jobs, pulumi_job,
    pulumi_jobs_chain,
};
use crate::jobs::infrastructure::{DEFAULT_ISSUE_REPOSITORY, DEFAULT_PACKER_TEMPLATE_PATH};
use crate::model::{GetStep, Identifier, Step, StepParams};
use crate::pipeline::{BuildContext, FragmentParameters, FragmentRegistry};

pub const PACKER: &str = "packer";
pub const PULUMI: &str = "pulumi";
pub const PULUMI_CHAIN: &str = "pulumi-chain";

pub fn register_defaults(registry: &mut FragmentRegistry) {
    registry.register(PACKER, |params, ctx| {
        let params: PackerParams = parse_params(PACKER, params)?;
        params.build(ctx)
    });
    registry.register(PULUMI, |params, ctx| {
        let params: PulumiParams = parse_params(PULUMI, params)?;
        params.build(ctx)
    });
    registry.register(PULUMI_CHAIN, |params, ctx| {
        let params: PulumiChainParams = parse_params(PULUMI_CHAIN, params)?;
        params.build(ctx)
    });
}

fn parse_params<T: DeserializeOwned>(kind: &str, params: FragmentParameters) -> Result<T> {
    serde_json::from_value(Value::Object(params))
        .with_context(|| format!("Invalid parameters for '{kind}' fragment"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DependencySpec {
    resource: String,
    #[serde(default)]
    trigger: Option<bool>,
    #[serde(default)]
    passed: Vec<String>,
    #[serde(default)]
    params: Option<StepParams>,
}

impl DependencySpec {
    fn resolve(&self, ctx: &BuildContext) -> Result<GetStep> {
        let resource = ctx.resource(&self.resource)?;
        let mut step = GetStep::new(resource.name.clone());
        step.trigger = self.trigger;
        if !self.passed.is_empty() {
            let passed = self
                .passed
                .iter()
                .map(|job| ctx.job(job))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Dependency on '{}'", self.resource))?;
            step = step.with_passed(passed);
        }
        if let Some(params) = &self.params {
            step = step.with_params(params.clone());
        }
        Ok(step)
    }
}

fn resolve_all(dependencies: &[DependencySpec], ctx: &BuildContext) -> Result<Vec<GetStep>> {
    dependencies.iter().map(|dep| dep.resolve(ctx)).collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackerParams {
    image_code: String,
    #[serde(default)]
    template_path: Option<String>,
    #[serde(default)]
    node_types: Vec<String>,
    #[serde(default)]
    packer_vars: StepParams,
    #[serde(default)]
    env_vars_from_files: StepParams,
    #[serde(default)]
    extra_params: StepParams,
    #[serde(default)]
    job_name_suffix: Option<String>,
    #[serde(default)]
    dependencies: Vec<DependencySpec>,
}

impl PackerParams {
    fn build(self, ctx: &BuildContext) -> Result<PipelineFragment> {
        let image_code = ctx.resource(&self.image_code)?.clone();
        // The templates live in the image code, so it is always fetched.
        let dependencies = if self.dependencies.is_empty() {
            vec![GetStep::new(image_code.name.clone()).with_trigger(true)]
        } else {
            resolve_all(&self.dependencies, ctx)?
        };

        let spec = PackerJobSpec {
            image_code,
            packer_template_path: self
                .template_path
                .unwrap_or_else(|| DEFAULT_PACKER_TEMPLATE_PATH.to_string()),
            node_types: self.node_types,
            packer_vars: self.packer_vars,
            env_vars_from_files: self.env_vars_from_files,
            extra_packer_params: self.extra_params,
            job_name_suffix: self.job_name_suffix,
        };
        Ok(packer_jobs(&dependencies, &spec)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PulumiParams {
    pulumi_code: String,
    stack_name: String,
    project_name: String,
    project_source_path: String,
    #[serde(default)]
    dependencies: Vec<DependencySpec>,
    #[serde(default)]
    additional_post_steps: Vec<Step>,
    #[serde(default)]
    previous_job: Option<String>,
    #[serde(default)]
    additional_env_vars: StepParams,
}

impl PulumiParams {
    fn build(self, ctx: &BuildContext) -> Result<PipelineFragment> {
        let pulumi_code = ctx.resource(&self.pulumi_code)?;
        let previous_job = self
            .previous_job
            .as_deref()
            .map(|name| ctx.job(name))
            .transpose()?;
        let fragment = pulumi_job(PulumiJob {
            pulumi_code,
            stack_name: &self.stack_name,
            project_name: &self.project_name,
            project_source_path: &self.project_source_path,
            dependencies: resolve_all(&self.dependencies, ctx)?,
            additional_post_steps: &self.additional_post_steps,
            previous_job: previous_job.as_ref(),
            additional_env_vars: &self.additional_env_vars,
        })?;
        Ok(fragment)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GithubIssueParams {
    #[serde(default = "enabled")]
    enabled: bool,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    assignees: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
}

impl Default for GithubIssueParams {
    fn default() -> Self {
        Self {
            enabled: true,
            repository: None,
            assignees: Vec::new(),
            labels: Vec::new(),
        }
    }
}

fn enabled() -> bool {
    true
}

impl GithubIssueParams {
    fn into_gate(self) -> Option<GithubIssueGate> {
        self.enabled.then(|| GithubIssueGate {
            repository: self
                .repository
                .unwrap_or_else(|| DEFAULT_ISSUE_REPOSITORY.to_string()),
            assignees: self.assignees,
            labels: self.labels,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PulumiChainParams {
    pulumi_code: String,
    project_name: String,
    project_source_path: String,
    stack_names: Vec<String>,
    #[serde(default)]
    dependencies: Vec<DependencySpec>,
    #[serde(default)]
    custom_dependencies: BTreeMap<usize, Vec<DependencySpec>>,
    #[serde(default)]
    previous_job: Option<String>,
    #[serde(default)]
    additional_post_steps: Vec<Step>,
    #[serde(default)]
    additional_env_vars: StepParams,
    #[serde(default)]
    github_issues: GithubIssueParams,
}

impl PulumiChainParams {
    fn build(self, ctx: &BuildContext) -> Result<PipelineFragment> {
        let pulumi_code = ctx.resource(&self.pulumi_code)?.clone();
        let previous_job: Option<Identifier> = self
            .previous_job
            .as_deref()
            .map(|name| ctx.job(name))
            .transpose()?;
        let custom_dependencies = self
            .custom_dependencies
            .iter()
            .map(|(index, deps)| resolve_all(deps, ctx).map(|steps| (*index, steps)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut spec = PulumiChainSpec::new(
            pulumi_code,
            self.project_name,
            self.project_source_path,
            self.stack_names,
        );
        spec.dependencies = resolve_all(&self.dependencies, ctx)?;
        spec.custom_dependencies = custom_dependencies;
        spec.previous_job = previous_job;
        spec.additional_post_steps = self.additional_post_steps;
        spec.additional_env_vars = self.additional_env_vars;
        spec.github_issues = self.github_issues.into_gate();
        Ok(pulumi_jobs_chain(&spec)?)
    }
}
