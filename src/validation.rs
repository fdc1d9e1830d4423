use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;

use crate::definition::{DEFINITION_VERSION, PipelineDefinition};
use crate::fragment::PipelineFragment;
use crate::fragments::PULUMI_CHAIN;
use crate::jobs::StageTier;
use crate::model::{Identifier, Pipeline, Step};
use crate::pipeline::{BuildContext, FragmentRegistry, FragmentSpec};

const CORE_RESOURCE_TYPES: &[&str] = &[
    "git",
    "registry-image",
    "docker-image",
    "time",
    "s3",
    "semver",
    "pool",
    "github-release",
    "hg",
    "mock",
    "bosh-io-release",
    "bosh-io-stemcell",
    "cf",
    "tracker",
];

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_definition(
    definition: &PipelineDefinition,
    registry: &FragmentRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if definition.version != DEFINITION_VERSION {
        report.errors.push(format!(
            "Unsupported definition version: {}",
            definition.version
        ));
    }

    if let Err(err) = Identifier::new(definition.name.as_str()) {
        report.errors.push(format!("Pipeline name is invalid: {err}"));
    }

    if definition.fragments.is_empty() {
        report
            .errors
            .push("Definition must contain at least one fragment".into());
    }

    report.merge(validate_declarations(definition));

    let mut ctx = BuildContext::from_definition(definition);
    let mut fragments = vec![PipelineFragment::new(
        definition.resource_types.clone(),
        definition.resources.clone(),
        Vec::new(),
    )];
    let mut all_built = true;
    for (idx, spec) in definition.fragments.iter().enumerate() {
        report.merge(validate_chain_order(idx, spec));
        let params = spec.params.clone().unwrap_or_default();
        match registry.create(&spec.kind, params, &ctx) {
            Ok(fragment) => {
                ctx.absorb(&fragment);
                fragments.push(fragment);
            }
            Err(err) => {
                all_built = false;
                report.errors.push(format!(
                    "Fragment {} ('{}'): {:#}",
                    idx + 1,
                    spec.kind,
                    err
                ));
            }
        }
    }

    // Reference checks on a partial pipeline would only repeat the errors above.
    if all_built {
        match PipelineFragment::combine_fragments(&fragments)
            .to_pipeline_with_groups(definition.groups.clone())
        {
            Ok(pipeline) => report.merge(validate_references(&pipeline)),
            Err(err) => report.errors.push(err.to_string()),
        }
    }

    report
}

fn validate_declarations(definition: &PipelineDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut seen = HashSet::new();
    for resource_type in &definition.resource_types {
        if !seen.insert(resource_type.name.as_str()) {
            report.warnings.push(format!(
                "Resource type '{}' is declared more than once; the first declaration wins",
                resource_type.name
            ));
        }
    }

    let mut seen = HashSet::new();
    for resource in &definition.resources {
        if !seen.insert(resource.name.as_str()) {
            report.warnings.push(format!(
                "Resource '{}' is declared more than once; the first declaration wins",
                resource.name
            ));
        }
    }

    report
}

fn validate_chain_order(idx: usize, spec: &FragmentSpec) -> ValidationReport {
    let mut report = ValidationReport::default();
    if spec.kind != PULUMI_CHAIN {
        return report;
    }
    let Some(params) = spec.params.as_ref() else {
        return report;
    };
    let stacks: Vec<&str> = params
        .get("stack_names")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for (position, stack) in stacks.iter().enumerate() {
        let tier = StageTier::classify(stack);
        if tier.is_production() && position + 1 < stacks.len() {
            report.warnings.push(format!(
                "Fragment {}: production stack '{}' is not the last stage of the chain",
                idx + 1,
                stack
            ));
        }
        if tier == StageTier::Other {
            report.warnings.push(format!(
                "Fragment {}: stack '{}' has no CI, QA or Production suffix",
                idx + 1,
                stack
            ));
        }
    }

    let gated = params
        .get("github_issues")
        .and_then(|gate| gate.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if gated && stacks.len() == 1 {
        report.warnings.push(format!(
            "Fragment {}: GitHub issue gating has no effect on a single-stage chain",
            idx + 1
        ));
    }

    report
}

fn validate_references(pipeline: &Pipeline) -> ValidationReport {
    let mut report = ValidationReport::default();

    let jobs: HashSet<&str> = pipeline.jobs.iter().map(|job| job.name.as_str()).collect();
    let resources: HashSet<&str> = pipeline
        .resources
        .iter()
        .map(|resource| resource.name.as_str())
        .collect();
    let resource_types: HashSet<&str> = pipeline
        .resource_types
        .iter()
        .map(|resource_type| resource_type.name.as_str())
        .collect();

    for resource in &pipeline.resources {
        let kind = resource.kind.as_str();
        if !resource_types.contains(kind) && !CORE_RESOURCE_TYPES.contains(&kind) {
            report.errors.push(format!(
                "Resource '{}' uses undeclared resource type '{}'",
                resource.name, kind
            ));
        }
    }

    for job in &pipeline.jobs {
        let mut steps: VecDeque<&Step> = job.all_steps().collect();
        while let Some(step) = steps.pop_front() {
            match step {
                Step::Get(get) => {
                    if !resources.contains(get.get.as_str()) {
                        report.errors.push(format!(
                            "Job '{}' gets unknown resource '{}'",
                            job.name, get.get
                        ));
                    }
                    for upstream in get.passed.iter().flatten() {
                        if !jobs.contains(upstream.as_str()) {
                            report.errors.push(format!(
                                "Job '{}' requires '{}' to pass unknown job '{}'",
                                job.name, get.get, upstream
                            ));
                        } else if upstream == &job.name {
                            report.errors.push(format!(
                                "Job '{}' lists itself in 'passed' for '{}'",
                                job.name, get.get
                            ));
                        }
                    }
                }
                Step::Put(put) => {
                    if !resources.contains(put.put.as_str()) {
                        report.errors.push(format!(
                            "Job '{}' puts to unknown resource '{}'",
                            job.name, put.put
                        ));
                    }
                }
                Step::Task(_) => {}
                Step::InParallel(parallel) => {
                    for child in parallel.in_parallel.iter().rev() {
                        steps.push_front(child);
                    }
                }
            }
        }
    }

    let used: HashSet<&str> = pipeline
        .jobs
        .iter()
        .flat_map(|job| job.all_steps())
        .flat_map(|step| {
            step.get_steps()
                .into_iter()
                .map(|get| get.get.as_str())
                .chain(step.put_steps().into_iter().map(|put| put.put.as_str()))
                .collect::<Vec<_>>()
        })
        .collect();
    for resource in &pipeline.resources {
        if !used.contains(resource.name.as_str()) {
            report.warnings.push(format!(
                "Resource '{}' is declared but no job uses it",
                resource.name
            ));
        }
    }

    report
}
