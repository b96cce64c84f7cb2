use turnstile_core::bus::Bus;
use turnstile_core::host::{
    ChallengeOutcome, ChallengeState, EligibilityState, Lookup, WalletState, Warning, WarningSet,
};

/// Fluent builder for the host state gates read.
///
/// ```rust,ignore
/// let bus = TestBus::new().eligible(true).connected("0xabc").build();
/// ```
#[derive(Debug, Default)]
pub struct TestBus {
    bus: Bus,
}

impl TestBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eligible(mut self, available: bool) -> Self {
        self.bus.insert(EligibilityState::resolved(available));
        self
    }

    pub fn eligibility_failed(mut self, reason: &str) -> Self {
        self.bus.insert(EligibilityState {
            available: Lookup::Failed(reason.to_string()),
        });
        self
    }

    pub fn connected(mut self, account: &str) -> Self {
        self.bus.entry::<WalletState>().account = Some(account.to_string());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.bus.entry::<WalletState>().read_only = true;
        self
    }

    pub fn panel_open(mut self) -> Self {
        self.bus.entry::<WalletState>().panel_open = true;
        self
    }

    pub fn warning(mut self, warning: Warning) -> Self {
        self.bus.entry::<WarningSet>().warnings.push(warning);
        self
    }

    pub fn challenge(mut self, outcome: ChallengeOutcome) -> Self {
        self.bus.insert(ChallengeState {
            outcome: Some(outcome),
        });
        self
    }

    pub fn build(self) -> Bus {
        self.bus
    }
}
