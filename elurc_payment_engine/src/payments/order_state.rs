use thiserror::Error;

use crate::db_types::OrderStatusType::{self, *};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderStatusTransitionError {
    #[error("Order status cannot change from {from} to {to}")]
    Forbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Order is already {0}")]
    NoOp(OrderStatusType),
}

/// The statuses an order in `from` may move to.
pub fn legal_transitions(from: OrderStatusType) -> &'static [OrderStatusType] {
    match from {
        Pending => &[Paid, Overpaid, Underpaid, Timeout, Cancelled],
        Paid | Overpaid | Underpaid => &[Processing, Cancelled],
        Processing => &[Fulfilled, Cancelled],
        Fulfilled | Cancelled | Timeout => &[],
    }
}

pub fn check_transition(from: OrderStatusType, to: OrderStatusType) -> Result<(), OrderStatusTransitionError> {
    if from == to {
        return Err(OrderStatusTransitionError::NoOp(from));
    }
    if legal_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(OrderStatusTransitionError::Forbidden { from, to })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: [OrderStatusType; 8] = [Pending, Paid, Overpaid, Underpaid, Processing, Fulfilled, Cancelled, Timeout];

    #[test]
    fn happy_path() {
        assert!(check_transition(Pending, Paid).is_ok());
        assert!(check_transition(Paid, Processing).is_ok());
        assert!(check_transition(Processing, Fulfilled).is_ok());
        assert!(check_transition(Underpaid, Cancelled).is_ok());
        assert!(check_transition(Pending, Timeout).is_ok());
    }

    #[test]
    fn terminal_states_go_nowhere() {
        for from in [Fulfilled, Cancelled, Timeout] {
            for to in ALL {
                assert!(check_transition(from, to).is_err(), "{from} -> {to} should be rejected");
            }
        }
        assert_eq!(
            check_transition(Fulfilled, Cancelled),
            Err(OrderStatusTransitionError::Forbidden { from: Fulfilled, to: Cancelled })
        );
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(check_transition(Pending, Processing).is_err());
        assert!(check_transition(Pending, Fulfilled).is_err());
        assert!(check_transition(Paid, Fulfilled).is_err());
        assert!(check_transition(Processing, Paid).is_err());
        assert!(check_transition(Paid, Pending).is_err());
        assert_eq!(check_transition(Paid, Paid), Err(OrderStatusTransitionError::NoOp(Paid)));
    }
}
