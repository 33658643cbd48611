use thiserror::Error;
use uuid::Uuid;

use super::status::OrderStatus;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order must contain 1 to 50 products with quantities between 1 and 1000")]
    InvalidOrderProducts,

    #[error("products not found: {}", format_ids(.0))]
    ProductsNotFound(Vec<Uuid>),

    #[error("order not found")]
    OrderNotFound,

    #[error("completed or cancelled orders cannot be modified")]
    OrderNotModifiable,

    #[error("cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("could not allocate a unique order identifier")]
    CreateConflict,

    #[error("start date must be before or equal to end date")]
    InvalidDateRange,

    #[error("failed to generate report: {0}")]
    ReportFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("store error during {op}: {message}")]
    Store { op: &'static str, message: String },
}

impl OrderError {
    pub fn store(op: &'static str, message: impl ToString) -> Self {
        OrderError::Store {
            op,
            message: message.to_string(),
        }
    }
}

fn format_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
