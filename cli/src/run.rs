//! Scenario replay
//!
//! Drives a [`FlowController`] synchronously and plays the host's part:
//! effects the controller dispatches are applied back to the bus the way a
//! wallet would, then logged through [`LogSink`].

use crate::scenario::{ExpectedState, Expectation, ScenarioConfig, ScenarioStep};
use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use turnstile::core::host::{ChallengeState, EligibilityState, Lookup, WalletState, WarningSet};
use turnstile::core::{
    ActivationState, Bus, CompletionEvent, CompletionSink, Condition, Effect, EffectSink,
    FlowController, Timeline,
};
use turnstile::observe::{LogSink, init_json_tracing, init_stdout_tracing};

/// Host reactions can trigger refreshes that dispatch again; a chain this
/// long means a gate keeps re-entering.
const MAX_SETTLE_ROUNDS: usize = 8;

pub fn run_scenario_command(path: &str, json: bool, log: Option<&str>) -> Result<()> {
    let config = ScenarioConfig::from_path(path)?;

    let filter = log.or(config.log.filter.as_deref());
    if config.log.json {
        init_json_tracing(filter)?;
    } else {
        init_stdout_tracing(filter)?;
    }

    let report = Scenario::new(&config).run(&config.steps)?;

    if json {
        let output = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{output}");
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

/// Captures what the controller sends outward and forwards it to the log.
#[derive(Default)]
struct HostSink {
    pending: Mutex<Vec<Effect>>,
    completions: Mutex<Vec<CompletionEvent>>,
}

impl HostSink {
    fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.pending.lock())
    }
}

impl EffectSink for HostSink {
    fn dispatch(&self, effect: Effect) {
        LogSink.dispatch(effect.clone());
        self.pending.lock().push(effect);
    }
}

impl CompletionSink for HostSink {
    fn completed(&self, event: CompletionEvent) {
        LogSink.completed(event.clone());
        self.completions.lock().push(event);
    }
}

/// The surface after one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: &'static str,
    pub state: String,
    pub disabled: bool,
    pub retry_available: bool,
    pub explanation: Option<String>,
    pub effects: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub flow: String,
    pub steps: Vec<StepRecord>,
    pub completions: Vec<CompletionEvent>,
    pub timeline: Timeline,
}

impl ScenarioReport {
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.flow);
        for step in &self.steps {
            out.push_str(&format!(
                "{:>3} {:<20} {:<20} {}",
                step.index,
                step.action,
                step.state,
                if step.disabled { "disabled" } else { "enabled" }
            ));
            if step.retry_available {
                out.push_str(" retry");
            }
            if let Some(title) = &step.explanation {
                out.push_str(&format!(" \"{title}\""));
            }
            if !step.effects.is_empty() {
                out.push_str(&format!(" -> {}", step.effects.join(", ")));
            }
            out.push('\n');
        }
        out.push_str(&format!("completions: {}\n", self.completions.len()));
        out
    }
}

pub struct Scenario {
    controller: FlowController,
    bus: Bus,
    sink: Arc<HostSink>,
}

impl Scenario {
    pub fn new(config: &ScenarioConfig) -> Self {
        let sink = Arc::new(HostSink::default());
        let controller =
            FlowController::new(config.preset.chain(), sink.clone()).with_completion(sink.clone());
        Self {
            controller,
            bus: config.host.to_bus(),
            sink,
        }
    }

    /// Play every step; the first failed expectation stops the run.
    pub fn run(mut self, steps: &[ScenarioStep]) -> Result<ScenarioReport> {
        let mut records = Vec::with_capacity(steps.len());
        let mut last_effects: Vec<&'static str> = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            if let ScenarioStep::Expect(expectation) = step {
                self.check(expectation, &last_effects)
                    .with_context(|| format!("Expectation failed at step {index}"))?;
                continue;
            }

            let span = tracing::info_span!("Step", index, action = step.name());
            let _enter = span.enter();

            self.apply(step);
            last_effects = self.settle()?;
            records.push(self.record(index, step.name(), last_effects.clone()));
        }

        Ok(ScenarioReport {
            flow: self.controller.name().to_string(),
            steps: records,
            completions: self.sink.completions.lock().clone(),
            timeline: self.controller.timeline().clone(),
        })
    }

    fn apply(&mut self, step: &ScenarioStep) {
        match step {
            ScenarioStep::Trigger => {
                self.controller.trigger(&self.bus);
            }
            ScenarioStep::Notify { condition } => self.notify(condition.clone()),
            ScenarioStep::Refresh => {
                self.controller.refresh(&self.bus);
            }
            ScenarioStep::Retry => {
                self.controller.retry(&self.bus);
            }
            ScenarioStep::Reset => self.controller.reset(),
            ScenarioStep::ResolveEligibility { eligible } => {
                self.bus.insert(EligibilityState::resolved(*eligible));
                self.notify(Condition::EligibilityResolved);
            }
            ScenarioStep::FailEligibility { reason } => {
                self.bus.insert(EligibilityState {
                    available: Lookup::Failed(reason.clone()),
                });
                self.notify(Condition::EligibilityResolved);
            }
            ScenarioStep::Connect { account } => {
                let wallet = self.bus.entry::<WalletState>();
                wallet.account = Some(account.clone());
                wallet.panel_open = false;
                self.notify(Condition::AccountConnected);
            }
            ScenarioStep::ClosePanel => {
                self.bus.entry::<WalletState>().panel_open = false;
                self.notify(Condition::PanelClosed);
            }
            ScenarioStep::Acknowledge => {
                self.bus.entry::<WarningSet>().acknowledged = true;
                self.notify(Condition::WarningAcknowledged);
            }
            ScenarioStep::DismissWarning => self.notify(Condition::WarningDismissed),
            ScenarioStep::AnswerChallenge { outcome } => {
                self.bus.insert(ChallengeState {
                    outcome: Some(*outcome),
                });
                self.notify(Condition::ChallengeResolved);
            }
            ScenarioStep::Expect(_) => {}
        }
    }

    fn notify(&mut self, condition: Condition) {
        self.controller.observe_external_change(&condition, &self.bus);
    }

    /// Apply host reactions until the controller stops dispatching.
    fn settle(&mut self) -> Result<Vec<&'static str>> {
        let mut kinds = Vec::new();
        for _ in 0..MAX_SETTLE_ROUNDS {
            let effects = self.sink.take();
            if effects.is_empty() {
                return Ok(kinds);
            }
            let mut refresh = false;
            for effect in effects {
                kinds.push(effect.kind());
                refresh |= self.react(&effect);
            }
            if refresh {
                self.controller.refresh(&self.bus);
            }
        }
        bail!("host reactions did not settle after {MAX_SETTLE_ROUNDS} rounds")
    }

    /// Mirror what a wallet does on `effect`. Returns whether the
    /// controller should look at the bus again.
    fn react(&mut self, effect: &Effect) -> bool {
        match effect {
            Effect::RequestEligibility { .. } => {
                self.bus.entry::<EligibilityState>().available = Lookup::InFlight;
                true
            }
            Effect::OpenConnectionPanel { .. } => {
                self.bus.entry::<WalletState>().panel_open = true;
                false
            }
            Effect::CancelPending { .. } => {
                self.bus.entry::<WalletState>().panel_open = false;
                let eligibility = self.bus.entry::<EligibilityState>();
                if eligibility.available.is_in_flight() {
                    eligibility.available = Lookup::Idle;
                }
                false
            }
            Effect::ReturnToEdit { .. } => {
                self.bus.insert(ChallengeState::default());
                false
            }
            _ => false,
        }
    }

    fn record(&self, index: usize, action: &'static str, effects: Vec<&'static str>) -> StepRecord {
        let surface = self.controller.surface();
        StepRecord {
            index,
            action,
            state: self.controller.state().to_string(),
            disabled: surface.disabled,
            retry_available: surface.retry_available,
            explanation: surface.explanation.map(|e| e.title),
            effects,
        }
    }

    fn check(&self, expect: &Expectation, last_effects: &[&'static str]) -> Result<()> {
        let state = self.controller.state();
        if let Some(expected) = expect.state {
            let actual = match state {
                ActivationState::Inactive => ExpectedState::Inactive,
                ActivationState::PendingAtGate(_) => ExpectedState::Pending,
                ActivationState::Blocked(_) => ExpectedState::Blocked,
                ActivationState::Completed => ExpectedState::Completed,
            };
            if actual != expected {
                bail!("expected state {expected:?}, got {state}");
            }
        }
        if let Some(gate) = expect.gate {
            if state.gate_index() != Some(gate) {
                bail!("expected gate {gate}, got {state}");
            }
        }

        let surface = self.controller.surface();
        if let Some(disabled) = expect.disabled {
            if surface.disabled != disabled {
                bail!("expected disabled = {disabled}, got {}", surface.disabled);
            }
        }
        if let Some(retry) = expect.retry_available {
            if surface.retry_available != retry {
                bail!(
                    "expected retry_available = {retry}, got {}",
                    surface.retry_available
                );
            }
        }
        if let Some(title) = &expect.explanation {
            let actual = surface.explanation.as_ref().map(|e| e.title.as_str());
            let matches = match actual {
                Some(actual) => actual == title,
                None => title.is_empty(),
            };
            if !matches {
                bail!("expected explanation {title:?}, got {actual:?}");
            }
        }
        if let Some(effects) = &expect.effects {
            if effects.iter().map(String::as_str).ne(last_effects.iter().copied()) {
                bail!("expected effects {effects:?}, got {last_effects:?}");
            }
        }
        if let Some(count) = expect.completions {
            let actual = self.sink.completions.lock().len();
            if actual != count {
                bail!("expected {count} completions, got {actual}");
            }
        }
        Ok(())
    }
}
