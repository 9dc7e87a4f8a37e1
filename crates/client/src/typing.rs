use std::time::Duration;

use pairchat_shared::constants::TYPING_TIMEOUT_MS;
use pairchat_shared::events::ClientEvent;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

impl TypingSignal {
    pub fn into_event(self, display_name: &str) -> ClientEvent {
        ClientEvent::Typing {
            display_name: display_name.to_string(),
            is_typing: self == TypingSignal::Start,
        }
    }
}

/// Local side of the typing indicator. The relay never times anyone out,
/// so the typist announces the stop itself.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TYPING_TIMEOUT_MS))
    }
}

impl TypingTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Re-arms the timer. Only the first keystroke of a burst is announced.
    pub fn keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        let first = self.deadline.is_none();
        self.deadline = Some(now + self.timeout);
        first.then_some(TypingSignal::Start)
    }

    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// Called on send or when the input is cleared.
    pub fn stop(&mut self) -> Option<TypingSignal> {
        self.deadline.take().map(|_| TypingSignal::Stop)
    }
}
