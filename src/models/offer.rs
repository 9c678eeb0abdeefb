use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::trip_distance_km;
use crate::models::order::{
    CustomerRef, GeoPoint, OrderId, OrderRecord, OrderStatus, PaymentMethod,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub name: Option<String>,
    pub address: String,
    pub point: GeoPoint,
}

impl Place {
    fn pickup(record: &OrderRecord) -> Self {
        Self {
            name: Some(record.restaurant.name.clone()),
            address: record.restaurant.address.clone(),
            point: record.restaurant.point(),
        }
    }

    fn dropoff(record: &OrderRecord) -> Self {
        Self {
            name: None,
            address: record.delivery_address.clone(),
            point: record.dropoff_point(),
        }
    }
}

/// A pending order awaiting the driver's decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderOffer {
    pub id: OrderId,
    pub net_earning: f64,
    pub order_value: f64,
    pub payment_method: PaymentMethod,
    pub distance_km: f64,
    pub pickup: Place,
    pub dropoff: Place,
    pub expires_in_secs: u64,
    pub received_at: DateTime<Utc>,
}

impl OrderOffer {
    pub fn from_record(record: &OrderRecord, window_secs: u64, received_at: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            net_earning: record.driver_net_earning.unwrap_or_default(),
            order_value: record.total_amount,
            payment_method: record.payment_method,
            distance_km: trip_distance_km(record),
            pickup: Place::pickup(record),
            dropoff: Place::dropoff(record),
            expires_in_secs: window_secs,
            received_at,
        }
    }

    /// Refreshes payload fields from a newer record with the same id,
    /// keeping the original receipt time and window.
    pub fn refreshed(&self, record: &OrderRecord) -> Self {
        Self::from_record(record, self.expires_in_secs, self.received_at)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pickup,
    Delivery,
}

/// Driver actions available from the active-order panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStep {
    PickUp,
    Arrive,
    Deliver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Earnings {
    pub subtotal: f64,
    pub total: f64,
    pub net_earning: f64,
    pub distance_km: f64,
}

/// An accepted order the driver is currently fulfilling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveOrder {
    pub id: OrderId,
    pub status: OrderStatus,
    pub phase: Phase,
    pub pickup: Place,
    pub dropoff: Place,
    pub driver_location: Option<GeoPoint>,
    pub customer: Option<CustomerRef>,
    pub payment_method: PaymentMethod,
    pub earnings: Earnings,
    pub next_step: Option<ActiveStep>,
}

impl ActiveOrder {
    /// Returns `None` when the record is not in an active-panel status.
    pub fn from_record(record: &OrderRecord) -> Option<Self> {
        let phase = phase_for(record.status)?;

        Some(Self {
            id: record.id,
            status: record.status,
            phase,
            pickup: Place::pickup(record),
            dropoff: Place::dropoff(record),
            driver_location: record.driver_point(),
            customer: record.customer.clone(),
            payment_method: record.payment_method,
            earnings: Earnings {
                subtotal: record.subtotal,
                total: record.total_amount,
                net_earning: record.driver_net_earning.unwrap_or_default(),
                distance_km: trip_distance_km(record),
            },
            next_step: next_step_for(record.status),
        })
    }
}

pub fn phase_for(status: OrderStatus) -> Option<Phase> {
    match status {
        OrderStatus::AssignedToDriver | OrderStatus::ReadyForPickup => Some(Phase::Pickup),
        OrderStatus::PickedUp | OrderStatus::ArrivedAtDropoff => Some(Phase::Delivery),
        _ => None,
    }
}

/// `AssignedToDriver` has no step: the restaurant still has to mark it ready.
pub fn next_step_for(status: OrderStatus) -> Option<ActiveStep> {
    match status {
        OrderStatus::ReadyForPickup => Some(ActiveStep::PickUp),
        OrderStatus::PickedUp => Some(ActiveStep::Arrive),
        OrderStatus::ArrivedAtDropoff => Some(ActiveStep::Deliver),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ActiveOrder, ActiveStep, OrderOffer, Phase};
    use crate::models::order::{OrderRecord, OrderStatus, PaymentMethod, RestaurantRef};

    fn record(id: u64, status: OrderStatus) -> OrderRecord {
        OrderRecord {
            id,
            status,
            restaurant: RestaurantRef {
                name: "Bun Cha".to_string(),
                address: "12 Hang Manh".to_string(),
                latitude: 10.77,
                longitude: 106.70,
            },
            delivery_address: "3 Ly Thai To".to_string(),
            delivery_latitude: 10.78,
            delivery_longitude: 106.71,
            driver: None,
            customer: None,
            payment_method: PaymentMethod::Card,
            subtotal: 80.0,
            total_amount: 95.0,
            distance: None,
            driver_net_earning: Some(12.0),
            created_at: None,
        }
    }

    #[test]
    fn offer_falls_back_to_great_circle_distance() {
        let offer = OrderOffer::from_record(&record(1, OrderStatus::Preparing), 30, Utc::now());

        assert_eq!(offer.id, 1);
        assert_eq!(offer.order_value, 95.0);
        assert_eq!(offer.expires_in_secs, 30);
        assert!((offer.distance_km - 1.56).abs() < 0.05);
        assert_eq!(offer.pickup.name.as_deref(), Some("Bun Cha"));
    }

    #[test]
    fn refreshed_offer_keeps_receipt_time() {
        let received_at = Utc::now() - chrono::Duration::seconds(10);
        let offer = OrderOffer::from_record(&record(1, OrderStatus::Preparing), 30, received_at);

        let mut newer = record(1, OrderStatus::Preparing);
        newer.driver_net_earning = Some(14.0);
        let refreshed = offer.refreshed(&newer);

        assert_eq!(refreshed.received_at, received_at);
        assert_eq!(refreshed.net_earning, 14.0);
    }

    #[test]
    fn phase_follows_status() {
        let pickup = ActiveOrder::from_record(&record(2, OrderStatus::AssignedToDriver)).unwrap();
        assert_eq!(pickup.phase, Phase::Pickup);
        assert_eq!(pickup.next_step, None);

        let ready = ActiveOrder::from_record(&record(2, OrderStatus::ReadyForPickup)).unwrap();
        assert_eq!(ready.next_step, Some(ActiveStep::PickUp));

        let delivering = ActiveOrder::from_record(&record(2, OrderStatus::ArrivedAtDropoff)).unwrap();
        assert_eq!(delivering.phase, Phase::Delivery);
        assert_eq!(delivering.next_step, Some(ActiveStep::Deliver));
    }

    #[test]
    fn non_active_status_has_no_active_projection() {
        assert!(ActiveOrder::from_record(&record(3, OrderStatus::Preparing)).is_none());
        assert!(ActiveOrder::from_record(&record(3, OrderStatus::Delivered)).is_none());
    }
}
