pub mod definition;
pub mod error;
pub mod fragment;
pub mod fragments;
pub mod jobs;
pub mod lockfile;
pub mod model;
pub mod pipeline;
pub mod presets;
pub mod render;
pub mod resource_types;
pub mod resources;
pub mod validation;

pub use definition::PipelineDefinition;
pub use error::PipelineError;
pub use fragment::PipelineFragment;
pub use model::Pipeline;
pub use pipeline::{FragmentRegistry, build_pipeline};
