pub mod audit;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod policy;
pub mod views;
pub mod workflow;

pub use domain::authorization::{
    ActorRole, AuthorizationId, AuthorizationRecord, AuthorizationState, AuthorizationStatus,
};
pub use domain::product::ProductId;
pub use domain::seller::{SellerId, SellerLimit};
pub use domain::supplier::SupplierId;
pub use eligibility::{
    cooldown_days_remaining, evaluate_approval, evaluate_request, ActiveAuthorization,
    EligibilityDenial, PairSnapshot, TerminalOutcome,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use policy::AuthorizationPolicy;
pub use views::{supplier_inbox, InboxEntry, SellerPortfolio};
pub use workflow::{
    ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
    TransitionOutcome, WorkflowAction, WorkflowEngine, WorkflowError,
};
