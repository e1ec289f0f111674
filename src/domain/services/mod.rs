pub mod assignment_policy;
pub mod authorization;
pub mod state_machine;

pub use authorization::{authorize, Action};
pub use state_machine::{validate_transition, Transition, TransitionError};
