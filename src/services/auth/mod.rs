pub mod credential;
pub mod decision;
pub mod identity;

pub use credential::{SigningKey, TokenService};
pub use decision::{AuthDecision, DenyReason, RequiredAttributes, decide};
pub use identity::{Identity, resolve};
