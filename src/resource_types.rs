use crate::error::Result;
use crate::model::{Identifier, ResourceType};

pub const PACKER_VALIDATOR: &str = "packer-validator";
pub const PACKER_BUILDER: &str = "packer-builder";
pub const PULUMI_PROVISIONER: &str = "pulumi-provisioner";
pub const GITHUB_ISSUES: &str = "github-issues";

pub fn packer_validate() -> Result<ResourceType> {
    Ok(ResourceType::registry_image(
        Identifier::new(PACKER_VALIDATOR)?,
        "mitodl/concourse-packer-resource",
        "latest",
    ))
}

pub fn packer_build() -> Result<ResourceType> {
    Ok(ResourceType::registry_image(
        Identifier::new(PACKER_BUILDER)?,
        "mitodl/concourse-packer-resource-builder",
        "latest",
    ))
}

pub fn pulumi_provisioner_resource() -> Result<ResourceType> {
    Ok(ResourceType::registry_image(
        Identifier::new(PULUMI_PROVISIONER)?,
        "mitodl/concourse-pulumi-resource-provisioner",
        "latest",
    ))
}

pub fn github_issues_resource() -> Result<ResourceType> {
    Ok(ResourceType::registry_image(
        Identifier::new(GITHUB_ISSUES)?,
        "ghcr.io/mitodl/github-issues-resource",
        "latest",
    ))
}
