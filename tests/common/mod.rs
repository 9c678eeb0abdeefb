#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offer_tracker::client::{ClientError, OrderAction, OrderApi, OrderPage, PageMeta, StatusFilter};
use offer_tracker::config::TrackerConfig;
use offer_tracker::engine::tracker::{TrackerHandle, TrackerSnapshot};
use offer_tracker::models::order::{
    CustomerRef, OrderId, OrderRecord, OrderStatus, PaymentMethod, RestaurantRef,
};
use offer_tracker::observability::metrics::Metrics;
use tokio::time::{sleep, timeout, Duration};

/// In-memory stand-in for the orders backend. Actions mutate the stored
/// orders the way the real backend would.
#[derive(Default)]
pub struct ScriptedApi {
    orders: Mutex<Vec<OrderRecord>>,
    scripted_lists: Mutex<VecDeque<(Duration, Vec<OrderRecord>)>>,
    fail_lists: AtomicBool,
    fail_actions: AtomicBool,
    list_calls: AtomicUsize,
    actions: Mutex<Vec<(OrderId, OrderAction)>>,
}

impl ScriptedApi {
    pub fn with_orders(orders: Vec<OrderRecord>) -> Arc<Self> {
        let api = Self::default();
        *api.orders.lock().unwrap() = orders;
        Arc::new(api)
    }

    pub fn set_orders(&self, orders: Vec<OrderRecord>) {
        *self.orders.lock().unwrap() = orders;
    }

    /// The next list call sleeps for `delay` and returns `orders` instead of
    /// the stored set.
    pub fn script_list(&self, delay: Duration, orders: Vec<OrderRecord>) {
        self.scripted_lists.lock().unwrap().push_back((delay, orders));
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<(OrderId, OrderAction)> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderApi for ScriptedApi {
    async fn list_orders(&self, filter: &StatusFilter, _size: u32) -> Result<OrderPage, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.scripted_lists.lock().unwrap().pop_front();
        if let Some((delay, orders)) = scripted {
            sleep(delay).await;
            return Ok(page(orders));
        }

        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ClientError::Server {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let orders: Vec<OrderRecord> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|order| filter.statuses().contains(&order.status))
            .cloned()
            .collect();
        Ok(page(orders))
    }

    async fn perform(&self, id: OrderId, action: OrderAction) -> Result<(), ClientError> {
        self.actions.lock().unwrap().push((id, action));

        if self.fail_actions.load(Ordering::SeqCst) {
            return Err(ClientError::Server {
                status: 409,
                body: "order already taken".to_string(),
            });
        }

        let mut orders = self.orders.lock().unwrap();
        let next_status = match action {
            OrderAction::Accept => Some(OrderStatus::AssignedToDriver),
            OrderAction::MarkPickedUp => Some(OrderStatus::PickedUp),
            OrderAction::MarkArrived => Some(OrderStatus::ArrivedAtDropoff),
            OrderAction::MarkDelivered => Some(OrderStatus::Delivered),
            OrderAction::Reject => None,
        };
        match next_status {
            Some(status) => {
                if let Some(order) = orders.iter_mut().find(|order| order.id == id) {
                    order.status = status;
                }
            }
            None => orders.retain(|order| order.id != id),
        }
        Ok(())
    }
}

fn page(orders: Vec<OrderRecord>) -> OrderPage {
    let total = orders.len() as u64;
    OrderPage {
        data: orders,
        meta: PageMeta {
            page: 0,
            size: 20,
            total,
        },
    }
}

pub fn order(id: OrderId, status: OrderStatus) -> OrderRecord {
    OrderRecord {
        id,
        status,
        restaurant: RestaurantRef {
            name: format!("Restaurant {id}"),
            address: "45 Nguyen Hue".to_string(),
            latitude: 10.7740,
            longitude: 106.7030,
        },
        delivery_address: "88 Le Loi".to_string(),
        delivery_latitude: 10.7800,
        delivery_longitude: 106.6950,
        driver: None,
        customer: Some(CustomerRef {
            name: "Minh".to_string(),
            phone: None,
        }),
        payment_method: PaymentMethod::Cash,
        subtotal: 120.0,
        total_amount: 135.0,
        distance: Some(1.8),
        driver_net_earning: Some(22.5),
        created_at: None,
    }
}

pub fn spawn_tracker(api: Arc<ScriptedApi>) -> TrackerHandle {
    TrackerHandle::spawn(api, TrackerConfig::default(), Metrics::new())
}

pub async fn wait_until(
    tracker: &TrackerHandle,
    mut condition: impl FnMut(&TrackerSnapshot) -> bool,
) -> TrackerSnapshot {
    let mut rx = tracker.subscribe();
    let snapshot = timeout(Duration::from_secs(120), rx.wait_for(|s| condition(s)))
        .await
        .expect("condition not reached in time")
        .expect("tracker stopped")
        .clone();
    snapshot
}

pub fn offer_id(snapshot: &TrackerSnapshot) -> Option<u64> {
    snapshot.current_offer.as_ref().map(|offer| offer.id)
}
