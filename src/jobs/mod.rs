pub mod infrastructure;

pub use infrastructure::{
    GithubIssueGate, PackerJobSpec, PulumiChainSpec, PulumiJob, StageTier, packer_jobs,
    pulumi_job, pulumi_jobs_chain,
};
