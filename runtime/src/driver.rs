//! # FlowDriver: Async Host Loop
//!
//! Runs one [`FlowController`] on a tokio task. The host talks to it through
//! a cloneable [`FlowHandle`]; surface changes are published on a `watch`
//! channel for the rendering layer.
//!
//! The driver performs the effects that need async work itself:
//!
//! * `RequestEligibility` spawns the eligibility lookup
//! * `OpenChallenge` runs the challenge service, when one is configured
//!
//! Each spawned request holds a child [`CancellationToken`] and is tagged with
//! the activation that asked for it. A reset cancels the request; a result
//! that arrives for an activation that is no longer open is dropped.
//! Every other effect is forwarded to the host sink unchanged.

use crate::collaborator::{ChallengeService, EligibilityService, LookupError};
use crate::config::DriverConfig;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use turnstile_core::activation::ActivationId;
use turnstile_core::bus::Bus;
use turnstile_core::chain::GateChain;
use turnstile_core::condition::Condition;
use turnstile_core::controller::FlowController;
use turnstile_core::effect::{CompletionSink, Effect, EffectQueue, EffectSink};
use turnstile_core::gate::GateId;
use turnstile_core::host::{ChallengeOutcome, ChallengeState, EligibilityState, Lookup};
use turnstile_core::surface::Surface;
use turnstile_core::terminal::CompletionToken;
use turnstile_core::timeline::Timeline;
use turnstile_core::verdict::Explanation;
use turnstile_core::ActivationState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("flow driver `{0}` has stopped")]
    Stopped(String),
}

type BusUpdate = Box<dyn FnOnce(&mut Bus) + Send>;

/// Inbound events from the host.
pub enum HostEvent {
    /// The user pressed the trigger control.
    Activate,
    /// A watched condition changed.
    Notify(Condition),
    /// Retry the gate that failed transiently.
    Retry,
    /// Abandon the open activation.
    Reset,
    /// Mutate host state, then notify `condition` (or refresh when `None`).
    Apply {
        update: BusUpdate,
        condition: Option<Condition>,
    },
    Shutdown,
}

impl std::fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostEvent::Activate => f.write_str("Activate"),
            HostEvent::Notify(condition) => f.debug_tuple("Notify").field(condition).finish(),
            HostEvent::Retry => f.write_str("Retry"),
            HostEvent::Reset => f.write_str("Reset"),
            HostEvent::Apply { condition, .. } => f
                .debug_struct("Apply")
                .field("condition", condition)
                .finish_non_exhaustive(),
            HostEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

enum Resolution {
    Eligibility(Result<bool, LookupError>),
    Challenge(ChallengeOutcome),
}

struct Resolved {
    activation: ActivationId,
    resolution: Resolution,
}

/// What the driver left behind when it stopped.
#[derive(Debug)]
pub struct DriverReport {
    pub bus: Bus,
    pub timeline: Timeline,
    pub state: ActivationState,
    pub last_completion: Option<CompletionToken>,
}

/// Owns a flow controller and the host state it reads.
pub struct FlowDriver {
    controller: FlowController,
    bus: Bus,
    queue: Arc<EffectQueue>,
    host: Arc<dyn EffectSink>,
    eligibility: Arc<dyn EligibilityService>,
    challenge: Option<Arc<dyn ChallengeService>>,
    config: DriverConfig,
    events: mpsc::Receiver<HostEvent>,
    resolved_tx: mpsc::Sender<Resolved>,
    resolved_rx: mpsc::Receiver<Resolved>,
    surface: watch::Sender<Surface>,
    completed: watch::Sender<Option<CompletionToken>>,
    shutdown: CancellationToken,
    pending: Option<CancellationToken>,
}

impl FlowDriver {
    pub fn new(
        chain: GateChain,
        config: DriverConfig,
        host: Arc<dyn EffectSink>,
        eligibility: Arc<dyn EligibilityService>,
    ) -> (Self, FlowHandle) {
        let queue = Arc::new(EffectQueue::new());
        let controller = FlowController::new(chain, queue.clone());
        let capacity = config.channel_capacity.max(1);
        let (events_tx, events) = mpsc::channel(capacity);
        let (resolved_tx, resolved_rx) = mpsc::channel(capacity);
        let (surface, surface_rx) = watch::channel(Surface::default());
        let (completed, completed_rx) = watch::channel(None);
        let shutdown = CancellationToken::new();

        let handle = FlowHandle {
            flow: controller.name().to_string(),
            events: events_tx,
            surface: surface_rx,
            completed: completed_rx,
            shutdown: shutdown.clone(),
        };
        let driver = Self {
            controller,
            bus: Bus::new(),
            queue,
            host,
            eligibility,
            challenge: None,
            config,
            events,
            resolved_tx,
            resolved_rx,
            surface,
            completed,
            shutdown,
            pending: None,
        };
        (driver, handle)
    }

    /// Seed the host state.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    /// Run challenges through `service` instead of forwarding `OpenChallenge`.
    pub fn with_challenge(mut self, service: Arc<dyn ChallengeService>) -> Self {
        self.challenge = Some(service);
        self
    }

    pub fn with_completion(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.controller = self.controller.with_completion(sink);
        self
    }

    pub fn with_terminal<F>(mut self, terminal: F) -> Self
    where
        F: Fn(ActivationId) -> Option<Effect> + Send + Sync + 'static,
    {
        self.controller = self.controller.with_terminal(terminal);
        self
    }

    /// Process host events until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> DriverReport {
        let span = tracing::info_span!("FlowDriver", turnstile.flow = %self.controller.name());
        async move {
            tracing::info!("Flow driver started");
            self.publish();

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    event = self.events.recv() => {
                        let Some(event) = event else { break };
                        if !self.handle(event) {
                            break;
                        }
                    }
                    Some(resolved) = self.resolved_rx.recv() => self.resolve(resolved),
                }
            }

            self.cancel_pending();
            tracing::info!("Flow driver stopped");
            DriverReport {
                state: self.controller.state(),
                timeline: self.controller.timeline().clone(),
                last_completion: self.controller.last_completion().cloned(),
                bus: self.bus,
            }
        }
        .instrument(span)
        .await
    }

    fn handle(&mut self, event: HostEvent) -> bool {
        tracing::debug!(?event, "Host event");
        let progress = match event {
            HostEvent::Activate => self.controller.trigger(&self.bus),
            HostEvent::Notify(condition) => {
                self.controller.observe_external_change(&condition, &self.bus)
            }
            HostEvent::Retry => self.controller.retry(&self.bus),
            HostEvent::Reset => {
                self.controller.reset();
                self.controller.progress()
            }
            HostEvent::Apply { update, condition } => {
                update(&mut self.bus);
                match condition {
                    Some(condition) => {
                        self.controller.observe_external_change(&condition, &self.bus)
                    }
                    None => self.controller.refresh(&self.bus),
                }
            }
            HostEvent::Shutdown => return false,
        };
        tracing::debug!(?progress, "Host event handled");
        self.pump();
        true
    }

    fn resolve(&mut self, resolved: Resolved) {
        if self.controller.activation_id() != Some(resolved.activation) {
            tracing::debug!(activation = %resolved.activation, "Stale resolution dropped");
            return;
        }
        self.pending = None;

        let condition = match resolved.resolution {
            Resolution::Eligibility(Ok(available)) => {
                tracing::info!(available, "Eligibility resolved");
                self.bus.insert(EligibilityState::resolved(available));
                Condition::EligibilityResolved
            }
            Resolution::Eligibility(Err(error)) => {
                tracing::warn!(%error, "Eligibility lookup failed");
                self.bus.insert(EligibilityState {
                    available: Lookup::Failed(error.to_string()),
                });
                Condition::EligibilityResolved
            }
            Resolution::Challenge(outcome) => {
                tracing::info!(?outcome, "Challenge resolved");
                self.bus.insert(ChallengeState {
                    outcome: Some(outcome),
                });
                Condition::ChallengeResolved
            }
        };
        self.controller
            .observe_external_change(&condition, &self.bus);
        self.pump();
    }

    /// Perform queued effects until the controller stops producing them,
    /// then publish the surface.
    fn pump(&mut self) {
        loop {
            let effects = self.queue.drain();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                self.perform(effect);
            }
        }

        if self.controller.state().is_inactive() {
            self.cancel_pending();
            // A challenge answer belongs to the activation that asked for it.
            self.bus.insert(ChallengeState::default());
        }
        self.publish();
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::RequestEligibility { activation } => self.request_eligibility(activation),
            Effect::OpenChallenge { activation, gate } if self.challenge.is_some() => {
                self.open_challenge(activation, gate)
            }
            Effect::CancelPending { .. } => {
                self.cancel_pending();
                self.host.dispatch(effect);
            }
            effect => self.host.dispatch(effect),
        }
    }

    fn request_eligibility(&mut self, activation: ActivationId) {
        let token = self.arm();
        self.bus.insert(EligibilityState {
            available: Lookup::InFlight,
        });

        let service = self.eligibility.clone();
        let timeout = self.config.lookup_timeout();
        let timeout_ms = self.config.lookup_timeout_ms;
        let tx = self.resolved_tx.clone();
        tracing::debug!(%activation, "Eligibility lookup started");

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = tokio::time::timeout(timeout, service.check_availability()) => {
                    result.unwrap_or(Err(LookupError::Timeout(timeout_ms)))
                }
            };
            let resolved = Resolved {
                activation,
                resolution: Resolution::Eligibility(result),
            };
            if tx.send(resolved).await.is_err() {
                tracing::debug!("Driver stopped; eligibility result dropped");
            }
        });

        self.controller.refresh(&self.bus);
    }

    fn open_challenge(&mut self, activation: ActivationId, gate: GateId) {
        let Some(service) = self.challenge.clone() else {
            return;
        };
        let token = self.arm();
        let timeout = self.config.challenge_timeout();
        let tx = self.resolved_tx.clone();
        tracing::debug!(%activation, %gate, "Challenge opened");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => return,
                outcome = tokio::time::timeout(timeout, service.challenge()) => {
                    outcome.unwrap_or(ChallengeOutcome::Dismissed)
                }
            };
            let resolved = Resolved {
                activation,
                resolution: Resolution::Challenge(outcome),
            };
            if tx.send(resolved).await.is_err() {
                tracing::debug!("Driver stopped; challenge outcome dropped");
            }
        });
    }

    /// Cancel whatever is outstanding and hand out a token for a new request.
    fn arm(&mut self) -> CancellationToken {
        self.cancel_pending();
        let token = self.shutdown.child_token();
        self.pending = Some(token.clone());
        token
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
            tracing::debug!("Outstanding request cancelled");
        }
        if let Some(state) = self.bus.get_mut::<EligibilityState>()
            && state.available.is_in_flight()
        {
            state.available = Lookup::Idle;
        }
    }

    fn publish(&self) {
        self.surface.send_replace(self.controller.surface());
        let latest = self.controller.last_completion();
        self.completed.send_if_modified(|current| {
            if current.as_ref() == latest {
                return false;
            }
            *current = latest.cloned();
            true
        });
    }
}

/// Host-side handle to a running [`FlowDriver`].
#[derive(Clone)]
pub struct FlowHandle {
    flow: String,
    events: mpsc::Sender<HostEvent>,
    surface: watch::Receiver<Surface>,
    completed: watch::Receiver<Option<CompletionToken>>,
    shutdown: CancellationToken,
}

impl FlowHandle {
    pub async fn send(&self, event: HostEvent) -> Result<(), DriverError> {
        self.events
            .send(event)
            .await
            .map_err(|_| DriverError::Stopped(self.flow.clone()))
    }

    pub async fn activate(&self) -> Result<(), DriverError> {
        self.send(HostEvent::Activate).await
    }

    pub async fn notify(&self, condition: Condition) -> Result<(), DriverError> {
        self.send(HostEvent::Notify(condition)).await
    }

    pub async fn retry(&self) -> Result<(), DriverError> {
        self.send(HostEvent::Retry).await
    }

    pub async fn reset(&self) -> Result<(), DriverError> {
        self.send(HostEvent::Reset).await
    }

    /// Change host state on the driver task, then report `condition`.
    pub async fn apply<F>(&self, update: F, condition: Option<Condition>) -> Result<(), DriverError>
    where
        F: FnOnce(&mut Bus) + Send + 'static,
    {
        self.send(HostEvent::Apply {
            update: Box::new(update),
            condition,
        })
        .await
    }

    /// Stop after the events already queued.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.send(HostEvent::Shutdown).await
    }

    /// Stop immediately, cancelling outstanding requests.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn surface(&self) -> Surface {
        self.surface.borrow().clone()
    }

    pub fn is_disabled(&self) -> bool {
        self.surface.borrow().disabled
    }

    pub fn explanation(&self) -> Option<Explanation> {
        self.surface.borrow().explanation.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Surface> {
        self.surface.clone()
    }

    /// Receipt for the flow's most recent completion, for the stage that
    /// runs after the terminal action.
    pub fn last_completion(&self) -> Option<CompletionToken> {
        self.completed.borrow().clone()
    }

    pub fn subscribe_completions(&self) -> watch::Receiver<Option<CompletionToken>> {
        self.completed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{StaticChallenge, StaticEligibility};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use turnstile_core::host::WalletState;
    use turnstile_std::flows::{buy_fiat_flow, send_flow_with_challenge};

    struct Forward(mpsc::UnboundedSender<Effect>);

    impl EffectSink for Forward {
        fn dispatch(&self, effect: Effect) {
            let _ = self.0.send(effect);
        }
    }

    fn host() -> (Arc<Forward>, mpsc::UnboundedReceiver<Effect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Forward(tx)), rx)
    }

    struct Scripted(Mutex<VecDeque<Result<bool, LookupError>>>);

    #[async_trait]
    impl EligibilityService for Scripted {
        async fn check_availability(&self) -> Result<bool, LookupError> {
            self.0
                .lock()
                .pop_front()
                .unwrap_or(Err(LookupError::Unavailable("script exhausted".into())))
        }
    }

    /// Answers the first lookup with `false` after a short delay; later
    /// lookups never answer.
    #[derive(Default)]
    struct FirstAnswersLate(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl EligibilityService for FirstAnswersLate {
        async fn check_availability(&self) -> Result<bool, LookupError> {
            if self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(false)
            } else {
                std::future::pending().await
            }
        }
    }

    struct Never;

    #[async_trait]
    impl EligibilityService for Never {
        async fn check_availability(&self) -> Result<bool, LookupError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn buy_flow_runs_to_terminal_modal_once() {
        let (sink, mut effects) = host();
        let (driver, handle) = FlowDriver::new(
            buy_fiat_flow(),
            DriverConfig::default(),
            sink,
            Arc::new(StaticEligibility(Ok(true))),
        );
        let task = tokio::spawn(driver.run());

        handle.activate().await.unwrap();
        assert!(matches!(
            effects.recv().await,
            Some(Effect::OpenConnectionPanel {
                promote_onramp: true,
                ..
            })
        ));

        handle
            .apply(
                |bus| bus.insert(WalletState::connected("0xabc")),
                Some(Condition::AccountConnected),
            )
            .await
            .unwrap();
        assert!(matches!(
            effects.recv().await,
            Some(Effect::OpenTerminalModal { .. })
        ));

        handle.notify(Condition::AccountConnected).await.unwrap();
        handle.notify(Condition::AccountConnected).await.unwrap();
        handle.shutdown().await.unwrap();
        let report = task.await.unwrap();

        assert_eq!(report.state, ActivationState::Inactive);
        assert!(effects.try_recv().is_err());
        assert_eq!(
            report.timeline.kinds().iter().filter(|k| **k == "completed").count(),
            1
        );
        assert_eq!(report.last_completion.map(|t| t.flow().to_string()), Some("buy_fiat".into()));
    }

    #[tokio::test]
    async fn ineligible_region_publishes_explanation() {
        let (sink, _effects) = host();
        let (driver, handle) = FlowDriver::new(
            buy_fiat_flow(),
            DriverConfig::default(),
            sink,
            Arc::new(StaticEligibility(Ok(false))),
        );
        let task = tokio::spawn(driver.run());
        let mut surface = handle.subscribe();

        handle.activate().await.unwrap();
        let blocked = surface
            .wait_for(|s| s.explanation.is_some())
            .await
            .unwrap()
            .clone();
        assert!(blocked.disabled);
        assert!(blocked.explanation.and_then(|e| e.learn_more_url).is_some());

        handle.shutdown().await.unwrap();
        assert_eq!(task.await.unwrap().state, ActivationState::Blocked(0));
    }

    #[tokio::test]
    async fn transient_failure_can_be_retried() {
        let (sink, mut effects) = host();
        let script = Scripted(Mutex::new(VecDeque::from([
            Err(LookupError::Unavailable("offline".into())),
            Ok(true),
        ])));
        let (driver, handle) =
            FlowDriver::new(buy_fiat_flow(), DriverConfig::default(), sink, Arc::new(script));
        let task = tokio::spawn(driver.run());
        let mut surface = handle.subscribe();

        handle.activate().await.unwrap();
        let held = surface.wait_for(|s| s.retry_available).await.unwrap().clone();
        assert!(held.disabled);
        assert!(held.explanation.is_none());

        handle.retry().await.unwrap();
        assert!(matches!(
            effects.recv().await,
            Some(Effect::OpenConnectionPanel { .. })
        ));

        handle.shutdown().await.unwrap();
        assert_eq!(task.await.unwrap().state, ActivationState::PendingAtGate(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out_as_transient() {
        let (sink, _effects) = host();
        let config = DriverConfig {
            lookup_timeout_ms: 50,
            ..Default::default()
        };
        let (driver, handle) = FlowDriver::new(buy_fiat_flow(), config, sink, Arc::new(Never));
        let task = tokio::spawn(driver.run());
        let mut surface = handle.subscribe();

        handle.activate().await.unwrap();
        surface.wait_for(|s| s.retry_available).await.unwrap();

        handle.shutdown().await.unwrap();
        let report = task.await.unwrap();
        assert_eq!(
            report.bus.get::<EligibilityState>().map(|s| s.available.clone()),
            Some(Lookup::Failed("lookup timed out after 50ms".into()))
        );
    }

    #[tokio::test]
    async fn reset_cancels_in_flight_lookup() {
        let (sink, _effects) = host();
        let (driver, handle) =
            FlowDriver::new(buy_fiat_flow(), DriverConfig::default(), sink, Arc::new(Never));
        let task = tokio::spawn(driver.run());

        handle.activate().await.unwrap();
        handle.reset().await.unwrap();
        handle.shutdown().await.unwrap();
        let report = task.await.unwrap();

        assert_eq!(report.state, ActivationState::Inactive);
        assert_eq!(
            report.bus.get::<EligibilityState>().map(|s| s.available.clone()),
            Some(Lookup::Idle)
        );
        assert_eq!(report.timeline.kinds().last(), Some(&"reset"));
    }

    #[tokio::test]
    async fn rejected_challenge_returns_to_edit() {
        let (sink, mut effects) = host();
        let bus = Bus::new().with(WalletState::connected("0xabc"));
        let (driver, handle) = FlowDriver::new(
            send_flow_with_challenge(),
            DriverConfig::default(),
            sink,
            Arc::new(StaticEligibility(Ok(true))),
        );
        let driver = driver
            .with_bus(bus)
            .with_challenge(Arc::new(StaticChallenge(ChallengeOutcome::Rejected)));
        let task = tokio::spawn(driver.run());

        handle.activate().await.unwrap();
        assert!(matches!(
            effects.recv().await,
            Some(Effect::ReturnToEdit { .. })
        ));

        handle.shutdown().await.unwrap();
        let report = task.await.unwrap();
        assert_eq!(report.state, ActivationState::Inactive);
        assert_eq!(report.bus.get::<ChallengeState>(), Some(&ChallengeState::default()));
    }

    #[tokio::test]
    async fn dropped_handles_stop_the_driver() {
        let (sink, _effects) = host();
        let (driver, handle) = FlowDriver::new(
            buy_fiat_flow(),
            DriverConfig::default(),
            sink,
            Arc::new(StaticEligibility(Ok(true))),
        );
        let task = tokio::spawn(driver.run());
        drop(handle);
        assert_eq!(task.await.unwrap().state, ActivationState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_result_for_a_reset_activation_is_dropped() {
        let (sink, _effects) = host();
        let (mut driver, _handle) = FlowDriver::new(
            buy_fiat_flow(),
            DriverConfig::default(),
            sink,
            Arc::new(FirstAnswersLate::default()),
        );

        driver.handle(HostEvent::Activate);
        let stale = driver.controller.activation_id();
        // The first lookup answers before the driver sees the reset.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        driver.handle(HostEvent::Reset);
        driver.handle(HostEvent::Activate);
        let current = driver.controller.activation_id();
        assert_ne!(current, stale);

        let late = tokio::time::timeout(std::time::Duration::from_secs(1), driver.resolved_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Some(late.activation), stale);
        driver.resolve(late);

        assert_eq!(driver.controller.state(), ActivationState::PendingAtGate(0));
        assert_eq!(driver.controller.activation_id(), current);
        assert_eq!(
            driver.bus.get::<EligibilityState>().map(|s| s.available.clone()),
            Some(Lookup::InFlight)
        );
        let surface = driver.surface.borrow().clone();
        assert!(surface.disabled);
        assert!(surface.explanation.is_none());
        assert!(driver.pending.is_some());
    }

    #[tokio::test]
    async fn handle_exposes_the_latest_completion() {
        let (sink, _effects) = host();
        let bus = Bus::new().with(WalletState::connected("0xabc"));
        let (driver, handle) = FlowDriver::new(
            buy_fiat_flow(),
            DriverConfig::default(),
            sink,
            Arc::new(StaticEligibility(Ok(true))),
        );
        let task = tokio::spawn(driver.with_bus(bus).run());
        let mut completions = handle.subscribe_completions();
        assert!(handle.last_completion().is_none());

        handle.activate().await.unwrap();
        let token = completions
            .wait_for(Option::is_some)
            .await
            .unwrap()
            .clone()
            .unwrap();
        assert_eq!(token.flow(), "buy_fiat");
        assert_eq!(handle.last_completion(), Some(token));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
