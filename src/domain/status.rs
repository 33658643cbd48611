use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::OrderError;

/// Lifecycle status of an order. The set is closed on purpose: every status
/// an order can ever hold appears here, and every legal move between them is
/// listed in [`OrderStatus::transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Statuses reachable from `self` in a single update.
    pub fn transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Returned],
            OrderStatus::Delivered => &[OrderStatus::Completed],
            OrderStatus::Returned => &[OrderStatus::Refunded],
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded => &[],
        }
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        self.transitions().contains(&to)
    }

    /// Rejects any move not in the transition table. A no-op "transition" to
    /// the current status is rejected too: a status update must represent
    /// forward progress.
    pub fn validate_transition(&self, to: OrderStatus) -> Result<(), OrderError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(OrderError::InvalidStatusTransition { from: *self, to })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.transitions().is_empty()
    }

    /// Whether any field of an order in this status may still be changed.
    /// `refunded` is terminal for transitions but its orders are not locked
    /// against e.g. client-name corrections; only completed and cancelled
    /// orders are frozen.
    pub fn is_modifiable(&self) -> bool {
        !matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}
