use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Lifecycle status as reported by the orders backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    AssignedToDriver,
    ReadyForPickup,
    PickedUp,
    ArrivedAtDropoff,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Statuses requested from the listing endpoint. Broader than
    /// [`OrderStatus::ACTIVE`]: `Preparing` orders are offer candidates.
    pub const POLLED: [OrderStatus; 5] = [
        OrderStatus::Preparing,
        OrderStatus::AssignedToDriver,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickedUp,
        OrderStatus::ArrivedAtDropoff,
    ];

    /// Statuses shown in the active-order panel.
    pub const ACTIVE: [OrderStatus; 4] = [
        OrderStatus::AssignedToDriver,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickedUp,
        OrderStatus::ArrivedAtDropoff,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Wire name used in the status filter expression.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::AssignedToDriver => "ASSIGNED_TO_DRIVER",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::ArrivedAtDropoff => "ARRIVED_AT_DROPOFF",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRef {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl RestaurantRef {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverRef {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One order as returned by the listing endpoint. Read-only on this side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: OrderStatus,
    pub restaurant: RestaurantRef,
    #[serde(default)]
    pub delivery_address: String,
    pub delivery_latitude: f64,
    pub delivery_longitude: f64,
    #[serde(default)]
    pub driver: Option<DriverRef>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub driver_net_earning: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn dropoff_point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.delivery_latitude,
            lng: self.delivery_longitude,
        }
    }

    pub fn driver_point(&self) -> Option<GeoPoint> {
        self.driver.as_ref().map(|driver| GeoPoint {
            lat: driver.latitude,
            lng: driver.longitude,
        })
    }
}
