use chrono::Utc;
use thiserror::Error;

use crate::models::order::{Order, OrderStatus};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("order cannot move from {} to {}", .from.as_str(), .to.as_str())]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        Pending => &[AcceptedByMerchant, Rejected, Canceled],
        AcceptedByMerchant => &[ReadyToDeliver, Canceled],
        ReadyToDeliver => &[AcceptedByDriver, Canceled],
        AcceptedByDriver => &[OnTheWay, Canceled],
        OnTheWay => &[Completed, Canceled],
        Completed | Canceled | Rejected => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Moves `order` to `to` if the current status allows it, stamping timestamps.
/// Returns the previous status.
pub fn advance(order: &mut Order, to: OrderStatus) -> Result<OrderStatus, TransitionError> {
    let from = order.status;
    if !can_transition(from, to) {
        return Err(TransitionError { from, to });
    }

    let now = Utc::now();
    order.status = to;
    order.updated_at = now;
    if to == OrderStatus::Completed {
        order.completed_at = Some(now);
    }

    Ok(from)
}

#[cfg(test)]
mod tests {
    use super::{TransitionError, can_transition};
    use crate::models::order::OrderStatus::{self, *};

    #[test]
    fn happy_path_is_linear() {
        let path = [
            Pending,
            AcceptedByMerchant,
            ReadyToDeliver,
            AcceptedByDriver,
            OnTheWay,
            Completed,
        ];

        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn steps_cannot_be_skipped() {
        assert!(!can_transition(Pending, ReadyToDeliver));
        assert!(!can_transition(ReadyToDeliver, OnTheWay));
        assert!(!can_transition(AcceptedByDriver, Completed));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Canceled, Rejected] {
            for target in OrderStatus::ALL {
                assert!(!can_transition(terminal, target));
            }
        }
    }

    #[test]
    fn every_active_state_can_be_canceled() {
        for status in OrderStatus::ALL.into_iter().filter(|s| s.is_active()) {
            assert!(can_transition(status, Canceled));
        }
    }

    #[test]
    fn only_pending_orders_can_be_rejected() {
        for status in OrderStatus::ALL {
            assert_eq!(can_transition(status, Rejected), status == Pending);
        }
    }

    #[test]
    fn repeated_transition_is_refused() {
        assert!(!can_transition(OnTheWay, OnTheWay));
        assert_eq!(
            TransitionError {
                from: OnTheWay,
                to: OnTheWay
            }
            .to_string(),
            "order cannot move from ON_THE_WAY to ON_THE_WAY"
        );
    }
}
