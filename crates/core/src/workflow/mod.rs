pub mod engine;
pub mod states;

pub use engine::{WorkflowEngine, WorkflowError};
pub use states::{
    ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
    TransitionOutcome, WorkflowAction,
};
