/// Fatal compile-time defects in a pipeline graph.
///
/// Every variant names the offending stage id(s) and, where one exists, the
/// channel or role involved. None of them are transient: the input graph has
/// to be fixed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("pipeline contains a dependency cycle through stages [{}]", stages.join(", "))]
    CyclicPipeline { stages: Vec<String> },

    #[error("stage id '{stage}' is declared more than once")]
    DuplicateStageId { stage: String },

    #[error("stage '{stage}': {reason}")]
    InvalidStage { stage: String, reason: String },

    #[error("output '{role}' of stage '{stage}' is declared more than once")]
    DuplicateOutput { stage: String, role: String },

    #[error("input '{role}' of stage '{stage}' references '{reference}', which no upstream stage or pipeline input provides")]
    UnresolvedInput {
        stage: String,
        role: String,
        reference: String,
    },

    #[error("channel '{channel}' was wired to input '{role}' of stage '{stage}' but never resolved")]
    DanglingChannel {
        channel: String,
        stage: String,
        role: String,
    },

    #[error("channel name '{channel}' is derived by both {first} and {second}")]
    ChannelNameCollision {
        channel: String,
        first: String,
        second: String,
    },

    #[error("stage '{stage}' requests unknown stage kind '{kind}'")]
    UnknownStageKind { stage: String, kind: String },

    #[error("stage '{stage}' ({kind}): cannot bind '{placeholder}': {reason}")]
    TemplateBinding {
        stage: String,
        kind: String,
        placeholder: String,
        reason: String,
    },
}

impl CompileError {
    /// Stable diagnostic code, shared with lint output.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::CyclicPipeline { .. } => "PW-GRAPH-001",
            CompileError::DuplicateStageId { .. } => "PW-GRAPH-002",
            CompileError::InvalidStage { .. } => "PW-GRAPH-003",
            CompileError::DuplicateOutput { .. } => "PW-CHAN-001",
            CompileError::UnresolvedInput { .. } => "PW-CHAN-002",
            CompileError::DanglingChannel { .. } => "PW-CHAN-003",
            CompileError::ChannelNameCollision { .. } => "PW-CHAN-004",
            CompileError::UnknownStageKind { .. } => "PW-TPL-001",
            CompileError::TemplateBinding { .. } => "PW-TPL-002",
        }
    }

    /// Stage ids implicated by the error.
    pub fn stage_ids(&self) -> Vec<String> {
        match self {
            CompileError::CyclicPipeline { stages } => stages.clone(),
            CompileError::DuplicateStageId { stage }
            | CompileError::InvalidStage { stage, .. }
            | CompileError::DuplicateOutput { stage, .. }
            | CompileError::UnresolvedInput { stage, .. }
            | CompileError::DanglingChannel { stage, .. }
            | CompileError::UnknownStageKind { stage, .. }
            | CompileError::TemplateBinding { stage, .. } => vec![stage.clone()],
            CompileError::ChannelNameCollision { first, second, .. } => {
                vec![first.clone(), second.clone()]
            }
        }
    }

    /// Channel, role or placeholder the error is about, when there is one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            CompileError::DuplicateOutput { role, .. } => Some(role),
            CompileError::UnresolvedInput { reference, .. } => Some(reference),
            CompileError::DanglingChannel { channel, .. }
            | CompileError::ChannelNameCollision { channel, .. } => Some(channel),
            CompileError::TemplateBinding { placeholder, .. } => Some(placeholder),
            _ => None,
        }
    }
}
