use serde_json::{Value, json};

use crate::error::Result;
use crate::model::{Identifier, Resource, Source};
use crate::resource_types::{GITHUB_ISSUES, PULUMI_PROVISIONER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

pub fn git_repo(name: Identifier, uri: &str, branch: &str, paths: &[String]) -> Result<Resource> {
    let mut source = Source::new();
    source.insert("uri".into(), Value::String(uri.into()));
    source.insert("branch".into(), Value::String(branch.into()));
    if !paths.is_empty() {
        source.insert("paths".into(), json!(paths));
    }
    Ok(Resource::new(name, Identifier::new("git")?, source).with_icon("git"))
}

pub fn registry_image(name: Identifier, repository: &str, tag: &str) -> Result<Resource> {
    let mut source = Source::new();
    source.insert("repository".into(), Value::String(repository.into()));
    source.insert("tag".into(), Value::String(tag.into()));
    Ok(Resource::new(name, Identifier::new("registry-image")?, source).with_icon("docker"))
}

#[derive(Debug, Clone)]
pub struct GithubIssues<'a> {
    pub repository: &'a str,
    pub state: IssueState,
    pub title_template: String,
    pub labels: &'a [String],
    pub assignees: &'a [String],
}

pub fn github_issues(name: Identifier, issues: GithubIssues<'_>) -> Result<Resource> {
    let mut source = Source::new();
    source.insert("repository".into(), Value::String(issues.repository.into()));
    source.insert(
        "access_token".into(),
        Value::String("((github.issues_resource_access_token))".into()),
    );
    source.insert("issue_state".into(), Value::String(issues.state.as_str().into()));
    source.insert("issue_prefix".into(), Value::String(issues.title_template.clone()));
    source.insert("issue_title_template".into(), Value::String(issues.title_template));
    if !issues.labels.is_empty() {
        source.insert("labels".into(), json!(issues.labels));
    }
    if !issues.assignees.is_empty() {
        source.insert("assignees".into(), json!(issues.assignees));
    }
    Ok(Resource::new(name, Identifier::new(GITHUB_ISSUES)?, source).with_icon("github"))
}

pub fn pulumi_provisioner(
    name: Identifier,
    project_name: &str,
    project_path: &str,
) -> Result<Resource> {
    let mut source = Source::new();
    source.insert("project_name".into(), Value::String(project_name.into()));
    source.insert("source_dir".into(), Value::String(project_path.into()));
    source.insert(
        "env_pulumi".into(),
        json!({
            "AWS_SHARED_CREDENTIALS_FILE": "aws_creds/credentials",
            "AWS_PROFILE": "default",
        }),
    );
    Ok(Resource::new(name, Identifier::new(PULUMI_PROVISIONER)?, source).with_icon("cloud-braces"))
}
