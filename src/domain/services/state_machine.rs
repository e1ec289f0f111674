use crate::domain::entities::TicketStatus;
use crate::domain::errors::DomainError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },
    #[error("Ticket is closed; new traffic opens a new ticket")]
    TicketClosed,
}

impl From<TransitionError> for DomainError {
    fn from(err: TransitionError) -> Self {
        DomainError::Conflict(err.to_string())
    }
}

/// What applying a requested status means for the stored ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one.
    Unchanged,
    Move { from: TicketStatus, to: TicketStatus },
}

/// Validates a status change requested by an agent.
///
/// Closed tickets are terminal: every transition out of `Closed`, including to itself, is
/// rejected.
pub fn validate_transition(
    from: TicketStatus,
    to: TicketStatus,
) -> Result<Transition, TransitionError> {
    use TicketStatus::*;

    match (from, to) {
        (Closed, _) => Err(TransitionError::TicketClosed),
        (a, b) if a == b => Ok(Transition::Unchanged),
        (Open, Pending) | (Pending, Open) | (Open, Closed) | (Pending, Closed) => {
            Ok(Transition::Move { from, to })
        }
        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}

/// Status a ticket takes when a new inbound message lands on it.
pub fn on_inbound(current: TicketStatus) -> Result<Transition, TransitionError> {
    match current {
        TicketStatus::Pending => Ok(Transition::Move {
            from: TicketStatus::Pending,
            to: TicketStatus::Open,
        }),
        TicketStatus::Open => Ok(Transition::Unchanged),
        TicketStatus::Closed => Err(TransitionError::TicketClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn test_same_state_is_noop() {
        assert_eq!(validate_transition(Open, Open), Ok(Transition::Unchanged));
        assert_eq!(validate_transition(Pending, Pending), Ok(Transition::Unchanged));
    }

    #[test]
    fn test_agent_transitions_allowed() {
        for (from, to) in [(Open, Pending), (Pending, Open), (Open, Closed), (Pending, Closed)] {
            assert_eq!(
                validate_transition(from, to),
                Ok(Transition::Move { from, to }),
                "{} -> {} should be allowed",
                from,
                to
            );
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        for to in [Open, Pending, Closed] {
            assert_eq!(validate_transition(Closed, to), Err(TransitionError::TicketClosed));
        }
    }

    #[test]
    fn test_inbound_reopens_pending() {
        assert_eq!(
            on_inbound(Pending),
            Ok(Transition::Move {
                from: Pending,
                to: Open
            })
        );
        assert_eq!(on_inbound(Open), Ok(Transition::Unchanged));
        assert!(on_inbound(Closed).is_err());
    }

    #[test]
    fn test_transition_error_maps_to_conflict() {
        let err: DomainError = TransitionError::TicketClosed.into();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
