use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("'{0}' is not a valid identifier (expected lowercase letters, digits, '-', '_' or '.')")]
    InvalidIdentifier(String),
    #[error("job '{0}' is declared more than once")]
    DuplicateJob(String),
    #[error("group '{group}' references unknown job '{job}'")]
    UnknownGroupJob { group: String, job: String },
    #[error("a pulumi chain needs at least one stack name")]
    EmptyChain,
    #[error("custom dependencies given for stage {index} but the chain only has {stages} stage(s)")]
    CustomDependencyIndex { index: usize, stages: usize },
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("unknown job '{0}'")]
    UnknownJob(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
