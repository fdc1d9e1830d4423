use ol_concourse::PipelineError;
use ol_concourse::jobs::{
    GithubIssueGate, PulumiChainSpec, PulumiJob, pulumi_job, pulumi_jobs_chain,
};
use ol_concourse::model::{GetStep, Identifier, Job, Resource, Step, StepParams};
use ol_concourse::resources::git_repo;
use serde_json::json;

fn id(name: &str) -> Identifier {
    Identifier::new(name).unwrap()
}

fn pulumi_code() -> Resource {
    git_repo(
        id("pulumi-code"),
        "https://github.com/mitodl/ol-infrastructure",
        "main",
        &[],
    )
    .unwrap()
}

fn stacks() -> Vec<String> {
    ["X.CI", "X.QA", "X.Production"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn chain_spec() -> PulumiChainSpec {
    let mut spec = PulumiChainSpec::new(
        pulumi_code(),
        "ol-infrastructure-x",
        "src/ol_infrastructure/applications/x",
        stacks(),
    );
    spec.dependencies = vec![GetStep::new(id("shared-artifact")).with_trigger(true)];
    spec
}

fn code_step<'a>(job: &'a Job) -> &'a GetStep {
    job.get_step_for(&id("pulumi-code")).unwrap()
}

#[test]
fn chain_wires_each_stage_to_the_previous_one() {
    let mut spec = chain_spec();
    spec.dependencies = Vec::new();
    let fragment = pulumi_jobs_chain(&spec).unwrap();

    assert_eq!(fragment.jobs.len(), 3);
    let [ci, qa, production] = [&fragment.jobs[0], &fragment.jobs[1], &fragment.jobs[2]];
    assert_eq!(ci.name, "deploy-ol-infrastructure-x-x.ci");
    assert_eq!(fragment.job(&id("deploy-ol-infrastructure-x-x.production")), Some(production));
    assert_eq!(code_step(ci).passed, None);
    assert_eq!(code_step(ci).trigger, Some(true));
    assert_eq!(code_step(qa).passed, Some(vec![ci.name.clone()]));
    assert_eq!(code_step(qa).trigger, Some(false));
    assert_eq!(code_step(production).passed, Some(vec![qa.name.clone()]));
    assert_eq!(code_step(production).trigger, Some(false));
}

#[test]
fn shared_dependencies_only_trigger_the_first_stage() {
    let fragment = pulumi_jobs_chain(&chain_spec()).unwrap();
    let shared = id("shared-artifact");

    let first = fragment.jobs[0].get_step_for(&shared).unwrap();
    assert_eq!(first.trigger, Some(true));
    assert_eq!(first.passed, None);

    for window in fragment.jobs.windows(2) {
        let step = window[1].get_step_for(&shared).unwrap();
        assert_eq!(step.trigger, Some(false));
        assert_eq!(step.passed, Some(vec![window[0].name.clone()]));
    }
}

#[test]
fn production_first_stage_never_triggers() {
    let mut spec = chain_spec();
    spec.stack_names = vec!["apps.Foo.Production".into()];
    spec.github_issues = Some(GithubIssueGate::default());
    let fragment = pulumi_jobs_chain(&spec).unwrap();

    let job = &fragment.jobs[0];
    assert_eq!(code_step(job).trigger, Some(false));
    assert_eq!(code_step(job).passed, None);
    assert_eq!(
        job.get_step_for(&id("shared-artifact")).unwrap().trigger,
        Some(false)
    );
    // Nothing follows the only stage, so there is no gate to open.
    assert!(job.on_success.is_none());
}

#[test]
fn chain_does_not_modify_its_inputs_and_is_repeatable() {
    let spec = chain_spec();
    let before = spec.dependencies.clone();

    let first = pulumi_jobs_chain(&spec).unwrap();
    let second = pulumi_jobs_chain(&spec).unwrap();

    assert_eq!(spec.dependencies, before);
    assert_eq!(first, second);
}

#[test]
fn stages_do_not_share_dependency_wiring() {
    let fragment = pulumi_jobs_chain(&chain_spec()).unwrap();
    let passed: Vec<_> = fragment
        .jobs
        .iter()
        .map(|job| job.get_step_for(&id("shared-artifact")).unwrap().passed.clone())
        .collect();
    assert_eq!(
        passed,
        vec![
            None,
            Some(vec![fragment.jobs[0].name.clone()]),
            Some(vec![fragment.jobs[1].name.clone()]),
        ]
    );
}

#[test]
fn jobs_are_limited_to_one_run_at_a_time() {
    let fragment = pulumi_jobs_chain(&chain_spec()).unwrap();
    assert!(fragment.jobs.iter().all(|job| job.max_in_flight == Some(1)));
}

#[test]
fn provisioner_resource_is_declared_once() {
    let fragment = pulumi_jobs_chain(&chain_spec()).unwrap();
    let provisioners: Vec<_> = fragment
        .resources
        .iter()
        .filter(|r| r.kind == "pulumi-provisioner")
        .collect();
    assert_eq!(provisioners.len(), 1);
    assert_eq!(provisioners[0].name, "pulumi-ol-infrastructure-x");
    assert_eq!(fragment.resource_types.len(), 1);
}

#[test]
fn github_issue_gate_links_consecutive_stages() {
    let mut spec = chain_spec();
    spec.github_issues = Some(GithubIssueGate {
        assignees: vec!["platform-engineering".into()],
        ..GithubIssueGate::default()
    });
    let fragment = pulumi_jobs_chain(&spec).unwrap();
    let [ci, qa, production] = [&fragment.jobs[0], &fragment.jobs[1], &fragment.jobs[2]];

    let ci_trigger = id("github-issues-ol-infrastructure-x-x.ci-trigger");
    let ci_post = id("github-issues-ol-infrastructure-x-x.ci-post");
    let qa_trigger = id("github-issues-ol-infrastructure-x-x.qa-trigger");

    match ci.on_success.as_deref() {
        Some(Step::Put(put)) => assert_eq!(put.put, ci_post),
        other => panic!("expected put hook, found {other:?}"),
    }
    assert!(production.on_success.is_none());

    assert!(ci.get_step_for(&ci_trigger).is_none());
    let gate = qa.get_step_for(&ci_trigger).unwrap();
    assert_eq!(gate.trigger, Some(true));
    assert_eq!(gate.passed, None);
    assert_eq!(production.get_step_for(&qa_trigger).unwrap().trigger, Some(true));

    let trigger = fragment.resource(&ci_trigger).unwrap();
    assert_eq!(trigger.source["issue_state"], json!("closed"));
    let post = fragment.resource(&ci_post).unwrap();
    assert_eq!(post.source["issue_state"], json!("open"));
    assert_eq!(post.source["assignees"], json!(["platform-engineering"]));
    assert_eq!(
        post.source["labels"],
        json!(["DevOps", "pipeline-workflow", "product:infrastructure", "promotion-to-qa"])
    );
    assert!(
        fragment
            .resources
            .iter()
            .all(|r| !r.name.as_str().contains("x.production"))
    );
    assert!(
        fragment
            .resource_types
            .iter()
            .any(|t| t.name == "github-issues")
    );
}

#[test]
fn custom_dependencies_apply_to_one_stage() {
    let mut spec = chain_spec();
    spec.custom_dependencies
        .insert(1, vec![GetStep::new(id("qa-only")).with_trigger(true)]);
    let fragment = pulumi_jobs_chain(&spec).unwrap();

    assert!(fragment.jobs[0].get_step_for(&id("qa-only")).is_none());
    let qa_only = fragment.jobs[1].get_step_for(&id("qa-only")).unwrap();
    assert_eq!(qa_only.trigger, Some(true));
    assert_eq!(qa_only.passed, None);
    assert!(fragment.jobs[2].get_step_for(&id("qa-only")).is_none());
}

#[test]
fn custom_dependencies_beyond_the_chain_are_rejected() {
    let mut spec = chain_spec();
    spec.custom_dependencies.insert(3, vec![GetStep::new(id("late"))]);
    assert_eq!(
        pulumi_jobs_chain(&spec).unwrap_err(),
        PipelineError::CustomDependencyIndex { index: 3, stages: 3 }
    );
}

#[test]
fn empty_chain_is_rejected() {
    let mut spec = chain_spec();
    spec.stack_names.clear();
    assert_eq!(pulumi_jobs_chain(&spec).unwrap_err(), PipelineError::EmptyChain);
}

#[test]
fn chain_follows_an_upstream_job() {
    let mut spec = chain_spec();
    spec.previous_job = Some(id("build-packer-template"));
    let fragment = pulumi_jobs_chain(&spec).unwrap();

    let ci = &fragment.jobs[0];
    assert_eq!(code_step(ci).trigger, Some(false));
    assert_eq!(code_step(ci).passed, Some(vec![id("build-packer-template")]));
    let shared = ci.get_step_for(&id("shared-artifact")).unwrap();
    assert_eq!(shared.trigger, Some(true));
    assert_eq!(shared.passed, Some(vec![id("build-packer-template")]));
}

#[test]
fn single_production_job_has_no_passed_constraint() {
    let code = pulumi_code();
    let env = StepParams::new();
    let fragment = pulumi_job(PulumiJob {
        pulumi_code: &code,
        stack_name: "apps.Foo.Production",
        project_name: "ol-infrastructure-foo",
        project_source_path: "src/ol_infrastructure/applications/foo",
        dependencies: Vec::new(),
        additional_post_steps: &[],
        previous_job: None,
        additional_env_vars: &env,
    })
    .unwrap();

    let job = &fragment.jobs[0];
    assert_eq!(job.name, "deploy-ol-infrastructure-foo-apps.foo.production");
    assert_eq!(code_step(job).trigger, Some(false));
    assert_eq!(code_step(job).passed, None);
}

#[test]
fn pulumi_job_plan_order() {
    let code = pulumi_code();
    let mut env = StepParams::new();
    env.insert("FASTLY_API_KEY".into(), json!("((fastly.api_key))"));
    let post = vec![Step::Get(GetStep::new(id("purge-cache")))];
    let previous = id("deploy-upstream");
    let fragment = pulumi_job(PulumiJob {
        pulumi_code: &code,
        stack_name: "apps.Foo.QA",
        project_name: "ol-infrastructure-foo",
        project_source_path: "src/ol_infrastructure/applications/foo",
        dependencies: vec![GetStep::new(id("shared-artifact"))],
        additional_post_steps: &post,
        previous_job: Some(&previous),
        additional_env_vars: &env,
    })
    .unwrap();

    let plan = &fragment.jobs[0].plan;
    let kinds: Vec<&str> = plan
        .iter()
        .map(|step| match step {
            Step::Get(_) => "get",
            Step::Put(_) => "put",
            Step::Task(_) => "task",
            Step::InParallel(_) => "in_parallel",
        })
        .collect();
    assert_eq!(kinds, vec!["get", "get", "task", "put", "get"]);
    assert_eq!(plan[2].target(), Some(&id("set-aws-creds")));

    let Step::Put(put) = &plan[3] else {
        panic!("expected provisioner put");
    };
    assert_eq!(put.put, "pulumi-ol-infrastructure-foo");
    assert_eq!(
        put.get_params.as_ref().unwrap()["skip_implicit_get"],
        json!(true)
    );
    let params = put.params.as_ref().unwrap();
    assert_eq!(params["stack_name"], json!("apps.Foo.QA"));
    assert_eq!(params["env_os"]["FASTLY_API_KEY"], json!("((fastly.api_key))"));
    assert_eq!(params["env_os"]["AWS_DEFAULT_REGION"], json!("us-east-1"));

    assert_eq!(code_step(&fragment.jobs[0]).passed, Some(vec![previous]));
    assert_eq!(code_step(&fragment.jobs[0]).trigger, Some(false));
}
