//! The order lifecycle rules.
//!
//! The happy path is strictly linear:
//!
//! `pending → paid → confirmed → preparing → shipped → delivered → completed`
//!
//! with two side exits:
//! * `cancelled`: reachable from every state before `delivered`, and from `disputed` when an
//!   admin resolves the dispute in the buyer's favour. Terminal.
//! * `disputed`: reachable from any non-terminal state. Resolved by moving to `cancelled`
//!   (refund the buyer) or `completed` (release to the farmer).
//!
//! `completed` and `cancelled` are terminal. Every edge not listed here is invalid and must be
//! rejected with an explicit error naming the edge; the database layer enforces this with
//! conditional updates so that two racing writers cannot both take the same edge.

use crate::db_types::OrderStatus;

impl OrderStatus {
    /// The next state on the happy path, if there is one.
    pub fn next_in_happy_path(self) -> Option<OrderStatus> {
        use OrderStatus::*;
        match self {
            Pending => Some(Paid),
            Paid => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(Shipped),
            Shipped => Some(Delivered),
            Delivered => Some(Completed),
            Completed | Cancelled | Disputed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether `self → next` is a legal edge in the lifecycle graph.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return false;
        }
        match next {
            Cancelled => matches!(self, Pending | Paid | Confirmed | Preparing | Shipped | Disputed),
            Disputed => !self.is_terminal(),
            Completed => matches!(self, Delivered | Disputed),
            _ => self.next_in_happy_path() == Some(next),
        }
    }
}
