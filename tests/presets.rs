use std::fs;

use ol_concourse::definition::PipelineDefinition;
use ol_concourse::fragments;
use ol_concourse::pipeline::{FragmentRegistry, build_pipeline};
use ol_concourse::presets::{PRESETS, generate_preset};
use ol_concourse::validation::validate_definition;
use tempfile::tempdir;

fn registry() -> FragmentRegistry {
    let mut registry = FragmentRegistry::new();
    fragments::register_defaults(&mut registry);
    registry
}

#[test]
fn every_preset_generates_a_valid_definition() {
    let temp = tempdir().unwrap();
    let registry = registry();

    for preset in PRESETS {
        let path = temp.path().join("nested").join(format!("{preset}.yaml"));
        let generated = generate_preset(preset, &path).expect("preset generation");
        assert!(generated.exists());

        let definition = PipelineDefinition::load(&generated).expect("reload preset");
        let report = validate_definition(&definition, &registry);
        assert!(report.is_ok(), "{preset}: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "{preset}: {:?}", report.warnings);
    }
}

#[test]
fn pulumi_preset_writes_chain_fragment() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("pulumi.yaml");
    generate_preset("pulumi", &path).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("kind: pulumi-chain"));
    assert!(contents.contains("applications.dagster.Production"));
}

#[test]
fn packer_pulumi_preset_chains_after_image_build() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("vault.yaml");
    generate_preset("packer-pulumi", &path).unwrap();

    let definition = PipelineDefinition::load(&path).unwrap();
    let pipeline = build_pipeline(&registry(), &definition).unwrap();
    let names: Vec<_> = pipeline.jobs.iter().map(|job| job.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "validate-packer-template",
            "build-packer-template",
            "deploy-ol-infrastructure-vault-server-infrastructure.vault.operations.ci",
            "deploy-ol-infrastructure-vault-server-infrastructure.vault.operations.qa",
            "deploy-ol-infrastructure-vault-server-infrastructure.vault.operations.production",
        ]
    );
}

#[test]
fn unknown_preset_is_rejected() {
    let temp = tempdir().unwrap();
    let err = generate_preset("terraform", &temp.path().join("x.yaml")).unwrap_err();
    assert!(err.to_string().contains("Available presets: packer, packer-pulumi, pulumi"));
    assert!(!temp.path().join("x.yaml").exists());
}
