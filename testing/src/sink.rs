use parking_lot::Mutex;
use turnstile_core::effect::{CompletionEvent, CompletionSink, Effect, EffectSink};

/// Captures everything a controller or driver sends outward.
#[derive(Debug, Default)]
pub struct RecordingSink {
    effects: Mutex<Vec<Effect>>,
    completions: Mutex<Vec<CompletionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().clone()
    }

    /// Effect kinds in dispatch order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.effects.lock().iter().map(Effect::kind).collect()
    }

    /// How many captured effects have the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.effects.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn completions(&self) -> Vec<CompletionEvent> {
        self.completions.lock().clone()
    }

    pub fn clear(&self) {
        self.effects.lock().clear();
        self.completions.lock().clear();
    }
}

impl EffectSink for RecordingSink {
    fn dispatch(&self, effect: Effect) {
        self.effects.lock().push(effect);
    }
}

impl CompletionSink for RecordingSink {
    fn completed(&self, event: CompletionEvent) {
        self.completions.lock().push(event);
    }
}
