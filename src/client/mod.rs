//! The orders backend as seen from the driver side.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::order::{OrderId, OrderRecord, OrderStatus};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

/// Mutations the driver can issue against a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Accept,
    Reject,
    MarkPickedUp,
    MarkArrived,
    MarkDelivered,
}

impl OrderAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            OrderAction::Accept => "accept",
            OrderAction::Reject => "reject",
            OrderAction::MarkPickedUp => "picked-up",
            OrderAction::MarkArrived => "arrived",
            OrderAction::MarkDelivered => "delivered",
        }
    }
}

/// OR-expression over named statuses, e.g. `status:PREPARING OR status:PICKED_UP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter {
    statuses: Vec<OrderStatus>,
}

impl StatusFilter {
    pub fn any_of(statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        let mut collected: Vec<OrderStatus> = Vec::new();
        for status in statuses {
            if !collected.contains(&status) {
                collected.push(status);
            }
        }
        Self {
            statuses: collected,
        }
    }

    /// The set the tracker polls for.
    pub fn tracked() -> Self {
        Self::any_of(OrderStatus::POLLED)
    }

    pub fn statuses(&self) -> &[OrderStatus] {
        &self.statuses
    }

    pub fn expression(&self) -> String {
        self.statuses
            .iter()
            .map(|status| format!("status:{}", status.as_str()))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderPage {
    pub data: Vec<OrderRecord>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[async_trait]
pub trait OrderApi: Send + Sync + 'static {
    /// Lists the current driver's orders matching `filter`.
    async fn list_orders(&self, filter: &StatusFilter, size: u32) -> Result<OrderPage, ClientError>;

    async fn perform(&self, id: OrderId, action: OrderAction) -> Result<(), ClientError>;
}
