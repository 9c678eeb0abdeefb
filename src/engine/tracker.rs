//! The offer tracker: a single task that polls the driver's orders, derives
//! the current offer or active order, and runs the offer countdown.
//!
//! All state lives inside the task. The outside world talks to it through a
//! [`TrackerHandle`]: commands go in over an mpsc channel, snapshots come out
//! over a watch channel and events over a broadcast channel.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::{ClientError, OrderAction, OrderApi, OrderPage, StatusFilter};
use crate::config::TrackerConfig;
use crate::engine::classify::{classify, Classification};
use crate::engine::countdown::{Countdown, CountdownEvent};
use crate::engine::poll::PollSequence;
use crate::error::AppError;
use crate::models::offer::{ActiveOrder, ActiveStep, OrderOffer};
use crate::models::order::{OrderId, OrderRecord};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Accepted,
    Rejected,
    AutoAccepted,
}

impl Resolution {
    pub fn action(self) -> OrderAction {
        match self {
            Resolution::Accepted | Resolution::AutoAccepted => OrderAction::Accept,
            Resolution::Rejected => OrderAction::Reject,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resolution::Accepted => "accepted",
            Resolution::Rejected => "rejected",
            Resolution::AutoAccepted => "auto_accepted",
        }
    }
}

fn step_action(step: ActiveStep) -> OrderAction {
    match step {
        ActiveStep::PickUp => OrderAction::MarkPickedUp,
        ActiveStep::Arrive => OrderAction::MarkArrived,
        ActiveStep::Deliver => OrderAction::MarkDelivered,
    }
}

/// What the presentation layer renders. `current_offer` and `active_order`
/// are never both set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub online: bool,
    pub current_offer: Option<OrderOffer>,
    pub active_order: Option<ActiveOrder>,
    pub countdown: Option<u64>,
    pub is_loading: bool,
    /// Offer whose accept or reject is in flight or awaiting poll
    /// confirmation. Also cleared when that mutation fails; a still-listed
    /// offer then has no countdown and waits for a manual accept or reject,
    /// with the failure kept in `last_error`.
    pub resolving: Option<OrderId>,
    /// Latest poll failure, else the latest failed mutation while its order
    /// is still on screen.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    WentOnline,
    WentOffline,
    OfferReceived {
        offer: OrderOffer,
    },
    OfferWithdrawn {
        offer_id: OrderId,
    },
    OfferResolved {
        offer_id: OrderId,
        resolution: Resolution,
    },
    ActiveOrderChanged {
        order: Option<ActiveOrder>,
    },
    StepCompleted {
        order_id: OrderId,
        step: ActiveStep,
    },
    MutationFailed {
        order_id: OrderId,
        action: OrderAction,
        message: String,
    },
}

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

enum Command {
    SetOnline { online: bool, reply: Reply<()> },
    Resolve { resolution: Resolution, reply: Reply<OrderId> },
    Advance { step: ActiveStep, reply: Reply<OrderId> },
    Refresh { reply: Reply<()> },
    Shutdown,
}

enum TaskResult {
    Poll {
        seq: u64,
        started: Instant,
        result: Result<OrderPage, ClientError>,
    },
    Resolution {
        offer_id: OrderId,
        resolution: Resolution,
        reply: Option<Reply<OrderId>>,
        result: Result<(), ClientError>,
    },
    Step {
        order_id: OrderId,
        step: ActiveStep,
        reply: Reply<OrderId>,
        result: Result<(), ClientError>,
    },
}

/// Cloneable handle to a running tracker. When every handle is dropped the
/// tracker stops and its timers go with it.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<TrackerSnapshot>,
    events: broadcast::Sender<TrackerEvent>,
}

impl TrackerHandle {
    /// Starts the tracker task. It begins offline.
    pub fn spawn(api: Arc<dyn OrderApi>, config: TrackerConfig, metrics: Metrics) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue_size);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(TrackerSnapshot::default());
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let tracker = Tracker {
            api,
            filter: StatusFilter::tracked(),
            countdown: Countdown::new(config.offer_window_secs),
            config,
            metrics,
            online: false,
            polls: PollSequence::new(),
            poll_timer: None,
            poll_tasks: JoinSet::new(),
            current_offer: None,
            active_order: None,
            resolving: None,
            advancing: None,
            poll_error: None,
            mutation_error: None,
            results_tx,
            snapshot_tx,
            events_tx: events_tx.clone(),
        };

        tokio::spawn(tracker.run(commands_rx, results_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            events: events_tx,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| AppError::Internal("offer tracker is not running".to_string()))?;

        reply_rx
            .await
            .map_err(|_| AppError::Internal("offer tracker dropped the request".to_string()))?
    }

    pub async fn set_online(&self, online: bool) -> Result<(), AppError> {
        self.request(|reply| Command::SetOnline { online, reply })
            .await
    }

    /// Accepts the current offer; resolves once the backend has answered.
    pub async fn accept_offer(&self) -> Result<OrderId, AppError> {
        self.request(|reply| Command::Resolve {
            resolution: Resolution::Accepted,
            reply,
        })
        .await
    }

    pub async fn reject_offer(&self) -> Result<OrderId, AppError> {
        self.request(|reply| Command::Resolve {
            resolution: Resolution::Rejected,
            reply,
        })
        .await
    }

    pub async fn advance(&self, step: ActiveStep) -> Result<OrderId, AppError> {
        self.request(|reply| Command::Advance { step, reply }).await
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        self.request(|reply| Command::Refresh { reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }
}

struct Tracker {
    api: Arc<dyn OrderApi>,
    config: TrackerConfig,
    filter: StatusFilter,
    metrics: Metrics,
    online: bool,
    polls: PollSequence,
    poll_timer: Option<Interval>,
    poll_tasks: JoinSet<()>,
    countdown: Countdown,
    current_offer: Option<OrderOffer>,
    active_order: Option<ActiveOrder>,
    /// Single-writer guard shared by manual accept, manual reject and
    /// auto-accept. Held until a poll shows the offer gone, or the
    /// mutation fails.
    resolving: Option<OrderId>,
    advancing: Option<OrderId>,
    poll_error: Option<String>,
    mutation_error: Option<(OrderId, String)>,
    results_tx: mpsc::UnboundedSender<TaskResult>,
    snapshot_tx: watch::Sender<TrackerSnapshot>,
    events_tx: broadcast::Sender<TrackerEvent>,
}

async fn next_poll(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Tracker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut results: mpsc::UnboundedReceiver<TaskResult>,
    ) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            offer_window_secs = self.config.offer_window_secs,
            tie_break = %self.config.tie_break,
            "offer tracker started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(result) = results.recv() => self.handle_result(result),
                _ = next_poll(&mut self.poll_timer) => self.scheduled_poll(),
                event = self.countdown.next() => self.handle_countdown(event),
            }
            self.publish();
        }

        self.poll_timer = None;
        self.poll_tasks.abort_all();
        self.countdown.clear();
        info!("offer tracker stopped");
    }

    fn emit(&self, event: TrackerEvent) {
        let _ = self.events_tx.send(event);
    }

    fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            online: self.online,
            current_offer: self.current_offer.clone(),
            active_order: self.active_order.clone(),
            countdown: self.countdown.remaining(),
            is_loading: self.polls.in_flight(),
            resolving: self.resolving,
            last_error: self
                .poll_error
                .clone()
                .or_else(|| self.mutation_error.as_ref().map(|(_, message)| message.clone())),
        }
    }

    /// Replies go out only after the state they describe is visible.
    fn reply<T>(&self, reply: Option<Reply<T>>, value: Result<T, AppError>) {
        self.publish();
        if let Some(reply) = reply {
            let _ = reply.send(value);
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.metrics
            .countdown_remaining_seconds
            .set(next.countdown.unwrap_or(0) as i64);

        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetOnline { online, reply } => {
                if online {
                    self.go_online();
                } else {
                    self.go_offline();
                }
                self.reply(Some(reply), Ok(()));
            }
            Command::Resolve { resolution, reply } => self.begin_resolution(resolution, Some(reply)),
            Command::Advance { step, reply } => self.begin_step(step, reply),
            Command::Refresh { reply } => {
                if !self.online {
                    self.reply(Some(reply), Err(AppError::Conflict("driver is offline".to_string())));
                    return;
                }
                self.issue_poll();
                self.reply(Some(reply), Ok(()));
            }
            Command::Shutdown => {}
        }
    }

    fn go_online(&mut self) {
        if self.online {
            return;
        }

        let mut timer = interval(self.config.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.poll_timer = Some(timer);
        self.online = true;
        self.metrics.driver_online.set(1);

        info!("driver online; polling started");
        self.emit(TrackerEvent::WentOnline);
    }

    fn go_offline(&mut self) {
        if !self.online {
            return;
        }

        self.online = false;
        self.poll_timer = None;
        self.poll_tasks.abort_all();
        self.polls.invalidate();
        self.countdown.clear();
        self.current_offer = None;
        self.active_order = None;
        self.resolving = None;
        self.advancing = None;
        self.poll_error = None;
        self.mutation_error = None;
        self.metrics.driver_online.set(0);

        info!("driver offline; polling and countdown stopped");
        self.emit(TrackerEvent::WentOffline);
    }

    /// Timer-driven polls never supersede one still in flight, so a backend
    /// slower than the poll interval still gets its responses applied.
    fn scheduled_poll(&mut self) {
        while self.poll_tasks.try_join_next().is_some() {}

        if self.polls.in_flight() && !self.poll_tasks.is_empty() {
            debug!("previous poll still in flight; skipping tick");
            return;
        }
        self.issue_poll();
    }

    /// Starts a poll, superseding any in flight.
    fn issue_poll(&mut self) {
        if !self.online {
            return;
        }

        while self.poll_tasks.try_join_next().is_some() {}

        let seq = self.polls.issue();
        let api = self.api.clone();
        let filter = self.filter.clone();
        let size = self.config.page_size;
        let results_tx = self.results_tx.clone();

        debug!(seq, "polling driver orders");
        self.poll_tasks.spawn(async move {
            let started = Instant::now();
            let result = api.list_orders(&filter, size).await;
            let _ = results_tx.send(TaskResult::Poll {
                seq,
                started,
                result,
            });
        });
    }

    fn handle_countdown(&mut self, event: CountdownEvent) {
        match event {
            CountdownEvent::Tick { offer_id, remaining } => {
                debug!(offer_id, remaining, "offer countdown tick");
            }
            CountdownEvent::Expired { offer_id } => {
                let still_current = self.current_offer.as_ref().map(|offer| offer.id) == Some(offer_id);
                if !still_current || self.resolving.is_some() {
                    debug!(offer_id, "offer window elapsed with nothing to do");
                    return;
                }

                info!(offer_id, "offer window elapsed; auto-accepting");
                self.begin_resolution(Resolution::AutoAccepted, None);
            }
        }
    }

    fn begin_resolution(&mut self, resolution: Resolution, reply: Option<Reply<OrderId>>) {
        let Some(offer_id) = self.current_offer.as_ref().map(|offer| offer.id) else {
            self.reply(reply, Err(AppError::NotFound("no pending offer".to_string())));
            return;
        };

        if let Some(resolving_id) = self.resolving {
            warn!(
                offer_id,
                resolution = resolution.label(),
                "offer is already being resolved"
            );
            self.reply(
                reply,
                Err(AppError::Conflict(format!(
                    "offer {resolving_id} is already being resolved"
                ))),
            );
            return;
        }

        self.resolving = Some(offer_id);
        self.countdown.resolve(offer_id);
        info!(offer_id, resolution = resolution.label(), "resolving offer");

        let api = self.api.clone();
        let results_tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = api.perform(offer_id, resolution.action()).await;
            let _ = results_tx.send(TaskResult::Resolution {
                offer_id,
                resolution,
                reply,
                result,
            });
        });
    }

    fn begin_step(&mut self, step: ActiveStep, reply: Reply<OrderId>) {
        let Some(order) = self.active_order.as_ref() else {
            self.reply(Some(reply), Err(AppError::NotFound("no active order".to_string())));
            return;
        };

        if order.next_step != Some(step) {
            self.reply(
                Some(reply),
                Err(AppError::Conflict(format!(
                    "cannot {step:?} order {} in status {}",
                    order.id,
                    order.status.as_str()
                ))),
            );
            return;
        }

        if self.advancing.is_some() {
            self.reply(
                Some(reply),
                Err(AppError::Conflict(format!(
                    "order {} already has a step in progress",
                    order.id
                ))),
            );
            return;
        }

        let order_id = order.id;
        self.advancing = Some(order_id);
        info!(order_id, ?step, "advancing active order");

        let api = self.api.clone();
        let results_tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = api.perform(order_id, step_action(step)).await;
            let _ = results_tx.send(TaskResult::Step {
                order_id,
                step,
                reply,
                result,
            });
        });
    }

    fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Poll {
                seq,
                started,
                result,
            } => self.handle_poll(seq, started, result),
            TaskResult::Resolution {
                offer_id,
                resolution,
                reply,
                result,
            } => match result {
                Ok(()) => {
                    self.metrics
                        .offer_resolutions_total
                        .with_label_values(&[resolution.label()])
                        .inc();
                    info!(offer_id, resolution = resolution.label(), "offer resolved");
                    self.mutation_error = None;
                    self.emit(TrackerEvent::OfferResolved {
                        offer_id,
                        resolution,
                    });
                    self.reply(reply, Ok(offer_id));
                    self.issue_poll();
                }
                Err(err) => {
                    self.metrics
                        .offer_resolutions_total
                        .with_label_values(&["failed"])
                        .inc();
                    warn!(offer_id, resolution = resolution.label(), error = %err, "offer resolution failed");

                    let message = err.to_string();
                    if self.resolving == Some(offer_id) {
                        self.resolving = None;
                    }
                    self.mutation_error = Some((offer_id, message.clone()));
                    self.emit(TrackerEvent::MutationFailed {
                        order_id: offer_id,
                        action: resolution.action(),
                        message: message.clone(),
                    });
                    self.reply(reply, Err(AppError::Upstream(message)));
                }
            },
            TaskResult::Step {
                order_id,
                step,
                reply,
                result,
            } => match result {
                Ok(()) => {
                    info!(order_id, ?step, "active order step completed");
                    self.mutation_error = None;
                    self.emit(TrackerEvent::StepCompleted { order_id, step });
                    self.reply(Some(reply), Ok(order_id));
                    self.issue_poll();
                }
                Err(err) => {
                    warn!(order_id, ?step, error = %err, "active order step failed");

                    let message = err.to_string();
                    if self.advancing == Some(order_id) {
                        self.advancing = None;
                    }
                    self.mutation_error = Some((order_id, message.clone()));
                    self.emit(TrackerEvent::MutationFailed {
                        order_id,
                        action: step_action(step),
                        message: message.clone(),
                    });
                    self.reply(Some(reply), Err(AppError::Upstream(message)));
                }
            },
        }
    }

    fn handle_poll(&mut self, seq: u64, started: Instant, result: Result<OrderPage, ClientError>) {
        if !self.online || !self.polls.complete(seq) {
            self.metrics.polls_total.with_label_values(&["stale"]).inc();
            debug!(seq, "discarding stale poll response");
            return;
        }

        self.metrics
            .poll_latency_seconds
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(page) => {
                self.metrics.polls_total.with_label_values(&["success"]).inc();
                debug!(seq, count = page.data.len(), "poll applied");
                self.poll_error = None;
                self.apply(&page.data);
            }
            Err(err) => {
                self.metrics.polls_total.with_label_values(&["error"]).inc();
                warn!(seq, error = %err, "poll failed; keeping last known orders");
                self.poll_error = Some(err.to_string());
            }
        }
    }

    fn apply(&mut self, orders: &[OrderRecord]) {
        let (offer, active) = match classify(orders, self.config.tie_break) {
            Classification::Empty => (None, None),
            Classification::Offer(record) => (Some(record), None),
            Classification::Active(record) => (None, Some(record)),
        };

        self.apply_offer(offer);
        self.apply_active(active);

        let shown = [
            self.current_offer.as_ref().map(|offer| offer.id),
            self.active_order.as_ref().map(|order| order.id),
        ];
        let failed_order_gone = self
            .mutation_error
            .as_ref()
            .is_some_and(|(order_id, _)| !shown.contains(&Some(*order_id)));
        if failed_order_gone {
            self.mutation_error = None;
        }
    }

    fn apply_offer(&mut self, record: Option<&OrderRecord>) {
        let previous_id = self.current_offer.as_ref().map(|offer| offer.id);
        let next_id = record.map(|record| record.id);

        if self.resolving.is_some() && self.resolving != next_id {
            debug!(offer_id = ?self.resolving, "resolved offer left the order list");
            self.resolving = None;
        }

        match record {
            Some(record) if previous_id == Some(record.id) => {
                self.current_offer = self
                    .current_offer
                    .as_ref()
                    .map(|offer| offer.refreshed(record));
            }
            Some(record) => {
                if let Some(offer_id) = previous_id {
                    info!(offer_id, "offer withdrawn");
                    self.emit(TrackerEvent::OfferWithdrawn { offer_id });
                }

                let offer = OrderOffer::from_record(record, self.config.offer_window_secs, Utc::now());
                self.countdown.start(offer.id);
                self.metrics.offers_received_total.inc();
                info!(
                    offer_id = offer.id,
                    net_earning = offer.net_earning,
                    distance_km = offer.distance_km,
                    "new offer"
                );
                self.emit(TrackerEvent::OfferReceived {
                    offer: offer.clone(),
                });
                self.current_offer = Some(offer);
            }
            None => {
                if let Some(offer_id) = previous_id {
                    self.countdown.clear();
                    self.current_offer = None;
                    info!(offer_id, "offer withdrawn");
                    self.emit(TrackerEvent::OfferWithdrawn { offer_id });
                }
            }
        }
    }

    fn apply_active(&mut self, record: Option<&OrderRecord>) {
        let next = record.and_then(ActiveOrder::from_record);

        let changed = match (&self.active_order, &next) {
            (Some(current), Some(next)) => current.id != next.id || current.status != next.status,
            (None, None) => false,
            _ => true,
        };

        if changed {
            if self.advancing.is_some() {
                self.advancing = None;
            }
            match &next {
                Some(order) => info!(
                    order_id = order.id,
                    status = order.status.as_str(),
                    "active order updated"
                ),
                None => info!("no active order"),
            }
            self.emit(TrackerEvent::ActiveOrderChanged {
                order: next.clone(),
            });
        }

        self.active_order = next;
    }
}
