use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::fragment::PipelineFragment;
use crate::model::{
    AnonymousResource, Command, GetStep, Identifier, InParallelStep, Job, Platform, PutStep,
    Resource, Step, StepParams, TaskArtifact, TaskConfig, TaskStep,
};
use crate::resource_types::{
    github_issues_resource, packer_build, packer_validate, pulumi_provisioner_resource,
};
use crate::resources::{GithubIssues, IssueState, github_issues, pulumi_provisioner};

pub const DEFAULT_PACKER_TEMPLATE_PATH: &str = "src/bilder/images/.";
pub const DEFAULT_NODE_TYPE: &str = "server";
pub const PACKER_BUILD_ATTEMPTS: u32 = 3;
pub const DEFAULT_ISSUE_REPOSITORY: &str = "mitodl/concourse-workflow";
const DEFAULT_ISSUE_LABELS: [&str; 3] = ["DevOps", "pipeline-workflow", "product:infrastructure"];

const SET_AWS_CREDS_SCRIPT: &str = r#"mkdir -p aws_creds
eval "$(aws configure export-credentials --format env)"
cat > aws_creds/credentials <<EOF
[default]
aws_access_key_id=${AWS_ACCESS_KEY_ID}
aws_secret_access_key=${AWS_SECRET_ACCESS_KEY}
aws_session_token=${AWS_SESSION_TOKEN}
EOF
"#;

#[derive(Debug, Clone)]
pub struct PackerJobSpec {
    pub image_code: Resource,
    pub packer_template_path: String,
    pub node_types: Vec<String>,
    pub packer_vars: StepParams,
    pub env_vars_from_files: StepParams,
    pub extra_packer_params: StepParams,
    pub job_name_suffix: Option<String>,
}

impl PackerJobSpec {
    pub fn new(image_code: Resource) -> Self {
        Self {
            image_code,
            packer_template_path: DEFAULT_PACKER_TEMPLATE_PATH.to_string(),
            node_types: Vec::new(),
            packer_vars: StepParams::new(),
            env_vars_from_files: StepParams::new(),
            extra_packer_params: StepParams::new(),
            job_name_suffix: None,
        }
    }

    fn node_types(&self) -> Vec<&str> {
        if self.node_types.is_empty() {
            vec![DEFAULT_NODE_TYPE]
        } else {
            self.node_types.iter().map(String::as_str).collect()
        }
    }

    fn job_name(&self, base: &str) -> Result<Identifier> {
        match self.job_name_suffix.as_deref().filter(|s| !s.is_empty()) {
            Some(suffix) => Identifier::new(format!("{base}-{suffix}")),
            None => Identifier::new(base),
        }
    }

    fn put_params(&self, node_type: &str, objective: &str) -> StepParams {
        let mut vars = StepParams::new();
        vars.insert("node_type".into(), Value::String(node_type.into()));
        vars.extend(self.packer_vars.clone());

        let mut params = StepParams::new();
        params.insert(
            "template".into(),
            Value::String(format!(
                "{}/{}",
                self.image_code.name, self.packer_template_path
            )),
        );
        params.insert("objective".into(), Value::String(objective.into()));
        params.insert("vars".into(), Value::Object(vars));
        params.insert(
            "env_vars_from_files".into(),
            Value::Object(self.env_vars_from_files.clone()),
        );
        params.extend(self.extra_packer_params.clone());
        params
    }
}

pub fn packer_jobs(dependencies: &[GetStep], spec: &PackerJobSpec) -> Result<PipelineFragment> {
    let validate_type = packer_validate()?;
    let build_type = packer_build()?;
    let validate_resource = Resource::new(
        Identifier::new("packer-validate")?,
        validate_type.name.clone(),
        Default::default(),
    )
    .with_icon("checkbox-multiple-marked");
    let build_resource = Resource::new(
        Identifier::new("packer-build")?,
        build_type.name.clone(),
        Default::default(),
    )
    .with_icon("package-variant-closed");

    let node_types = spec.node_types();

    let validate_puts: Vec<Step> = node_types
        .iter()
        .map(|node_type| {
            PutStep::new(validate_resource.name.clone())
                .with_params(spec.put_params(node_type, "validate"))
                .into()
        })
        .collect();
    let mut validate_plan: Vec<Step> = dependencies.iter().cloned().map(Step::from).collect();
    validate_plan.push(InParallelStep::new(validate_puts).into());
    let validate_job = Job::new(spec.job_name("validate-packer-template")?, validate_plan);

    let build_puts: Vec<Step> = node_types
        .iter()
        .map(|node_type| {
            PutStep::new(build_resource.name.clone())
                .with_params(spec.put_params(node_type, "build"))
                .with_attempts(PACKER_BUILD_ATTEMPTS)
                .into()
        })
        .collect();
    let mut build_plan: Vec<Step> = dependencies
        .iter()
        .cloned()
        .map(|dependency| dependency.with_passed(vec![validate_job.name.clone()]).into())
        .collect();
    build_plan.push(InParallelStep::new(build_puts).into());
    let build_job = Job::new(spec.job_name("build-packer-template")?, build_plan);

    debug!(
        validate = %validate_job.name,
        build = %build_job.name,
        node_types = node_types.len(),
        "Built packer jobs"
    );

    Ok(PipelineFragment::new(
        vec![validate_type, build_type],
        vec![validate_resource, build_resource],
        vec![validate_job, build_job],
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTier {
    Ci,
    Qa,
    Production,
    Other,
}

impl StageTier {
    pub fn classify(stack_name: &str) -> Self {
        let lower = stack_name.to_lowercase();
        if lower.ends_with("production") {
            StageTier::Production
        } else if lower.ends_with("qa") {
            StageTier::Qa
        } else if lower.ends_with("ci") {
            StageTier::Ci
        } else {
            StageTier::Other
        }
    }

    pub fn is_production(self) -> bool {
        self == StageTier::Production
    }

    pub fn promotion_label(self) -> Option<&'static str> {
        match self {
            StageTier::Ci => Some("promotion-to-qa"),
            StageTier::Qa => Some("promotion-to-production"),
            StageTier::Production | StageTier::Other => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PulumiJob<'a> {
    pub pulumi_code: &'a Resource,
    pub stack_name: &'a str,
    pub project_name: &'a str,
    pub project_source_path: &'a str,
    pub dependencies: Vec<GetStep>,
    pub additional_post_steps: &'a [Step],
    pub previous_job: Option<&'a Identifier>,
    pub additional_env_vars: &'a StepParams,
}

pub fn pulumi_job(job: PulumiJob<'_>) -> Result<PipelineFragment> {
    let provisioner_type = pulumi_provisioner_resource()?;
    let provisioner = pulumi_provisioner(
        Identifier::new(format!("pulumi-{}", job.project_name))?,
        job.project_name,
        &format!("{}/{}", job.pulumi_code.name, job.project_source_path),
    )?;

    let production = StageTier::classify(job.stack_name).is_production();
    let mut get_code = GetStep::new(job.pulumi_code.name.clone())
        .with_trigger(job.previous_job.is_none() && !production);
    if let Some(previous) = job.previous_job {
        get_code = get_code.with_passed(vec![previous.clone()]);
    }

    let mut env_os = StepParams::new();
    env_os.insert("AWS_DEFAULT_REGION".into(), Value::String("us-east-1".into()));
    env_os.insert(
        "PYTHONPATH".into(),
        Value::String(format!("/usr/lib/:/tmp/build/put/{}/src/", job.pulumi_code.name)),
    );
    env_os.extend(job.additional_env_vars.clone());

    let mut put_params = StepParams::new();
    put_params.insert("stack_name".into(), Value::String(job.stack_name.into()));
    put_params.insert("env_os".into(), Value::Object(env_os));
    let mut get_params = StepParams::new();
    get_params.insert("skip_implicit_get".into(), Value::Bool(true));

    let mut plan: Vec<Step> = job.dependencies.into_iter().map(Step::from).collect();
    plan.push(get_code.into());
    plan.push(set_aws_creds_task()?.into());
    plan.push(
        PutStep::new(provisioner.name.clone())
            .with_params(put_params)
            .with_get_params(get_params)
            .into(),
    );
    plan.extend(job.additional_post_steps.iter().cloned());

    let mut deploy = Job::new(
        Identifier::new(format!(
            "deploy-{}-{}",
            job.project_name,
            job.stack_name.to_lowercase()
        ))?,
        plan,
    );
    // A stack holds an exclusive lock during `pulumi up`.
    deploy.max_in_flight = Some(1);

    Ok(PipelineFragment::new(
        vec![provisioner_type],
        vec![provisioner],
        vec![deploy],
    ))
}

fn set_aws_creds_task() -> Result<TaskStep> {
    let mut image_source = StepParams::new();
    image_source.insert("repository".into(), Value::String("amazon/aws-cli".into()));
    image_source.insert("tag".into(), Value::String("latest".into()));

    let config = TaskConfig {
        platform: Platform::Linux,
        image_resource: Some(AnonymousResource {
            kind: "registry-image".into(),
            source: image_source,
        }),
        inputs: Vec::new(),
        outputs: vec![TaskArtifact::named(Identifier::new("aws_creds")?)],
        params: None,
        run: Command {
            path: "sh".into(),
            args: vec!["-exc".into(), SET_AWS_CREDS_SCRIPT.into()],
            dir: None,
            user: None,
        },
    };
    Ok(TaskStep::with_config(Identifier::new("set-aws-creds")?, config))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubIssueGate {
    pub repository: String,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
}

impl Default for GithubIssueGate {
    fn default() -> Self {
        Self {
            repository: DEFAULT_ISSUE_REPOSITORY.to_string(),
            assignees: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl GithubIssueGate {
    fn labels_for(&self, tier: StageTier) -> Vec<String> {
        if !self.labels.is_empty() {
            return self.labels.clone();
        }
        DEFAULT_ISSUE_LABELS
            .iter()
            .copied()
            .chain(tier.promotion_label())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PulumiChainSpec {
    pub pulumi_code: Resource,
    pub stack_names: Vec<String>,
    pub project_name: String,
    pub project_source_path: String,
    pub dependencies: Vec<GetStep>,
    pub custom_dependencies: BTreeMap<usize, Vec<GetStep>>,
    pub previous_job: Option<Identifier>,
    pub additional_post_steps: Vec<Step>,
    pub additional_env_vars: StepParams,
    pub github_issues: Option<GithubIssueGate>,
}

impl PulumiChainSpec {
    pub fn new(
        pulumi_code: Resource,
        project_name: impl Into<String>,
        project_source_path: impl Into<String>,
        stack_names: Vec<String>,
    ) -> Self {
        Self {
            pulumi_code,
            stack_names,
            project_name: project_name.into(),
            project_source_path: project_source_path.into(),
            dependencies: Vec::new(),
            custom_dependencies: BTreeMap::new(),
            previous_job: None,
            additional_post_steps: Vec::new(),
            additional_env_vars: StepParams::new(),
            github_issues: None,
        }
    }

    fn issue_resource_name(&self, stack_name: &str, role: &str) -> Result<Identifier> {
        Identifier::new(format!(
            "github-issues-{}-{}-{}",
            self.project_name,
            stack_name.to_lowercase(),
            role
        ))
    }
}

/// Only the first stage triggers on its own, and never when it is a production stack.
pub fn pulumi_jobs_chain(spec: &PulumiChainSpec) -> Result<PipelineFragment> {
    if spec.stack_names.is_empty() {
        return Err(PipelineError::EmptyChain);
    }
    if let Some((&index, _)) = spec
        .custom_dependencies
        .range(spec.stack_names.len()..)
        .next()
    {
        return Err(PipelineError::CustomDependencyIndex {
            index,
            stages: spec.stack_names.len(),
        });
    }

    let mut chain = PipelineFragment::default();
    let mut previous_job = spec.previous_job.clone();
    let mut previous_trigger: Option<Identifier> = None;
    let last_index = spec.stack_names.len() - 1;

    for (index, stack_name) in spec.stack_names.iter().enumerate() {
        let tier = StageTier::classify(stack_name);
        let trigger = index == 0 && !tier.is_production();

        let mut local_dependencies: Vec<GetStep> = spec
            .dependencies
            .iter()
            .map(|dependency| {
                let step = dependency.clone().with_trigger(trigger);
                match &previous_job {
                    Some(previous) => step.with_passed(vec![previous.clone()]),
                    None => step,
                }
            })
            .collect();
        if let Some(custom) = spec.custom_dependencies.get(&index) {
            local_dependencies.extend(custom.iter().cloned());
        }
        if let Some(issue_trigger) = spec.github_issues.as_ref().and(previous_trigger.as_ref()) {
            local_dependencies.push(GetStep::new(issue_trigger.clone()).with_trigger(true));
        }

        let mut stage = pulumi_job(PulumiJob {
            pulumi_code: &spec.pulumi_code,
            stack_name,
            project_name: &spec.project_name,
            project_source_path: &spec.project_source_path,
            dependencies: local_dependencies,
            additional_post_steps: &spec.additional_post_steps,
            previous_job: previous_job.as_ref(),
            additional_env_vars: &spec.additional_env_vars,
        })?;

        previous_trigger = None;
        if let Some(gate) = spec.github_issues.as_ref().filter(|_| index < last_index) {
            let title = format!("[bot] Pulumi {} {} deployed.", spec.project_name, stack_name);
            let labels = gate.labels_for(tier);
            let trigger_resource = github_issues(
                spec.issue_resource_name(stack_name, "trigger")?,
                GithubIssues {
                    repository: &gate.repository,
                    state: IssueState::Closed,
                    title_template: title.clone(),
                    labels: &[],
                    assignees: &[],
                },
            )?;
            let post_resource = github_issues(
                spec.issue_resource_name(stack_name, "post")?,
                GithubIssues {
                    repository: &gate.repository,
                    state: IssueState::Open,
                    title_template: title,
                    labels: &labels,
                    assignees: &gate.assignees,
                },
            )?;

            for job in &mut stage.jobs {
                job.on_success = Some(Box::new(PutStep::new(post_resource.name.clone()).into()));
            }
            stage.resource_types.push(github_issues_resource()?);
            previous_trigger = Some(trigger_resource.name.clone());
            stage.resources.push(trigger_resource);
            stage.resources.push(post_resource);
        }

        debug!(
            stage = index,
            stack = %stack_name,
            tier = ?tier,
            trigger,
            previous = previous_job.as_ref().map(Identifier::as_str),
            "Chained pulumi stage"
        );

        previous_job = stage.jobs.last().map(|job| job.name.clone());
        chain.extend(stage);
    }

    Ok(chain)
}
