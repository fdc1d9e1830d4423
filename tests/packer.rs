use ol_concourse::jobs::{PackerJobSpec, packer_jobs};
use ol_concourse::model::{GetStep, Identifier, Job, PutStep, Step};
use ol_concourse::resources::git_repo;
use serde_json::json;

fn id(name: &str) -> Identifier {
    Identifier::new(name).unwrap()
}

fn image_code_spec() -> PackerJobSpec {
    let image_code = git_repo(
        id("image-code"),
        "https://github.com/mitodl/ol-infrastructure",
        "main",
        &["src/bilder/images/".to_string()],
    )
    .unwrap();
    PackerJobSpec::new(image_code)
}

fn parallel_puts(job: &Job) -> Vec<&PutStep> {
    match job.plan.last() {
        Some(Step::InParallel(parallel)) => parallel
            .in_parallel
            .iter()
            .map(|step| match step {
                Step::Put(put) => put,
                other => panic!("expected put step, found {other:?}"),
            })
            .collect(),
        other => panic!("expected trailing in_parallel step, found {other:?}"),
    }
}

#[test]
fn build_dependencies_must_pass_validation() {
    let deps = vec![
        GetStep::new(id("image-code")).with_trigger(true),
        GetStep::new(id("consul-release")).with_trigger(true),
    ];
    let fragment = packer_jobs(&deps, &image_code_spec()).unwrap();

    let validate = &fragment.jobs[0];
    let build = &fragment.jobs[1];
    assert_eq!(validate.name, "validate-packer-template");
    assert_eq!(build.name, "build-packer-template");

    let build_gets = build.get_steps();
    assert_eq!(build_gets.len(), 2);
    for get in build_gets {
        assert_eq!(get.passed, Some(vec![validate.name.clone()]));
        assert_eq!(get.trigger, Some(true));
    }
    for get in validate.get_steps() {
        assert_eq!(get.passed, None);
    }
}

#[test]
fn caller_dependencies_are_not_modified() {
    let deps = vec![GetStep::new(id("image-code")).with_trigger(true)];
    let before = deps.clone();
    packer_jobs(&deps, &image_code_spec()).unwrap();
    assert_eq!(deps, before);
}

#[test]
fn fans_out_one_put_per_node_type() {
    let mut spec = image_code_spec();
    spec.node_types = vec!["web".into(), "worker".into()];
    spec.packer_vars.insert("app_name".into(), json!("concourse"));

    let fragment = packer_jobs(&[], &spec).unwrap();
    let validate_puts = parallel_puts(&fragment.jobs[0]);

    assert_eq!(validate_puts.len(), 2);
    for (put, node_type) in validate_puts.iter().zip(["web", "worker"]) {
        assert_eq!(put.put, "packer-validate");
        let params = put.params.as_ref().unwrap();
        assert_eq!(
            params["vars"],
            json!({"node_type": node_type, "app_name": "concourse"})
        );
        assert_eq!(params["objective"], json!("validate"));
        assert_eq!(params["template"], json!("image-code/src/bilder/images/."));
        assert_eq!(put.attempts, None);
    }
}

#[test]
fn build_puts_retry_three_times() {
    let fragment = packer_jobs(&[], &image_code_spec()).unwrap();
    let build_puts = parallel_puts(&fragment.jobs[1]);

    assert_eq!(build_puts.len(), 1);
    assert_eq!(build_puts[0].put, "packer-build");
    assert_eq!(build_puts[0].attempts, Some(3));
    let params = build_puts[0].params.as_ref().unwrap();
    assert_eq!(params["vars"], json!({"node_type": "server"}));
    assert_eq!(params["objective"], json!("build"));
}

#[test]
fn suffix_disambiguates_job_names() {
    let mut spec = image_code_spec();
    spec.job_name_suffix = Some("consul".into());
    let fragment = packer_jobs(&[], &spec).unwrap();
    let names: Vec<_> = fragment.jobs.iter().map(|job| job.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["validate-packer-template-consul", "build-packer-template-consul"]
    );
}

#[test]
fn extra_params_override_defaults() {
    let mut spec = image_code_spec();
    spec.extra_packer_params
        .insert("only".into(), json!("amazon-ebs.third-party"));
    spec.env_vars_from_files
        .insert("CONSUL_VERSION".into(), json!("consul-release/version"));

    let fragment = packer_jobs(&[], &spec).unwrap();
    let params = parallel_puts(&fragment.jobs[1])[0].params.clone().unwrap();
    assert_eq!(params["only"], json!("amazon-ebs.third-party"));
    assert_eq!(
        params["env_vars_from_files"],
        json!({"CONSUL_VERSION": "consul-release/version"})
    );
}

#[test]
fn declares_packer_resources_and_types() {
    let fragment = packer_jobs(&[], &image_code_spec()).unwrap();
    let types: Vec<_> = fragment
        .resource_types
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(types, vec!["packer-validator", "packer-builder"]);
    let resources: Vec<_> = fragment
        .resources
        .iter()
        .map(|r| (r.name.as_str(), r.kind.as_str()))
        .collect();
    assert_eq!(
        resources,
        vec![
            ("packer-validate", "packer-validator"),
            ("packer-build", "packer-builder")
        ]
    );
}
