//! Pipeline compiler: stage graph in, workflow document out.
//!
//! `compile` is a pure function of the pipeline description, the template
//! catalog and the hook configuration. Nothing here touches the filesystem;
//! the configuration loader resolves hooks and extra templates beforehand.

pub mod assembler;
pub mod channel;
pub mod dependency;
pub mod dot;
pub mod error;
pub mod forks;
pub mod hooks;
pub mod lint;
pub mod order;
pub mod recipe;
pub mod schema;
pub mod template;

pub use assembler::{compile, PipelineAssembler, WorkflowDocument};
pub use channel::{Channel, ChannelOrigin, ChannelRegistry, ConsumerRef};
pub use error::CompileError;
pub use forks::{ForkGroup, ForkMergeResolver, MergeGroup, Scaffold};
pub use hooks::{HookConfig, HookInjector, StageHooks};
pub use schema::{
    ChannelRef, InputBinding, InputSource, PipelineDocument, PipelineInput, ResourceLimits,
    StageSpec,
};
pub use template::{
    OptionKind, OptionSpec, RenderedStage, ResolvedChannels, RoleSpec, StageTemplate,
    TemplateCatalog, TemplateRenderer,
};
