//! Stream Capture State Machine
//!
//! Tracks a bounded capture from start to termination. The machine is
//! clock-agnostic: callers pass `Instant`s in, so the deadline arithmetic
//! can be tested without sleeping.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Stand-in deadline distance for durations that overflow `Instant`
const UNBOUNDED_CAPTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Lifecycle states of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Nothing spawned yet
    Idle,
    /// Source process running, reads in progress
    Capturing,
    /// Wall-clock deadline reached
    Expired,
    /// Caller requested cancellation
    Cancelled,
    /// Source closed its output (or the read failed)
    SourceClosed,
    /// Source process terminated and reaped
    Terminated,
}

/// Events that drive the capture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Source process spawned
    Started,
    /// A chunk was read and buffered
    ChunkRead,
    /// A bounded read elapsed without data
    ReadTimedOut,
    /// No time left
    DeadlineReached,
    /// External cancellation
    CancelRequested,
    /// Source reached end of stream
    EndOfStream,
    /// Reading from the source failed
    ReadFailed,
    /// Termination path completed
    ProcessTerminated,
}

/// Why the capture stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEnd {
    Expired,
    Cancelled,
    SourceClosed,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed (or stayed, for reads)
    Success(CaptureState),
    /// Transition was invalid from current state
    Invalid { from: CaptureState, event: CaptureEvent },
}

/// State machine for a single bounded capture
#[derive(Debug)]
pub struct CaptureStateMachine {
    current_state: CaptureState,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    end: Option<CaptureEnd>,
    chunks: usize,
}

impl Default for CaptureStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: CaptureState::Idle,
            started_at: None,
            deadline: None,
            end: None,
            chunks: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> CaptureState {
        self.current_state
    }

    /// Why reading stopped, once it has
    pub fn end(&self) -> Option<CaptureEnd> {
        self.end
    }

    /// Number of chunks read so far
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Whether the read loop should keep going
    pub fn is_capturing(&self) -> bool {
        self.current_state == CaptureState::Capturing
    }

    /// Record the start and arm the deadline
    pub fn start(&mut self, now: Instant, duration: Duration) -> TransitionResult {
        let result = self.process_event(CaptureEvent::Started);
        if matches!(result, TransitionResult::Success(_)) {
            self.started_at = Some(now);
            // Durations past the clock's range never expire
            self.deadline = now
                .checked_add(duration)
                .or_else(|| now.checked_add(UNBOUNDED_CAPTURE));
        }
        result
    }

    /// Time left before the deadline; zero once passed or before start
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// Bound for the next read: `min(remaining, poll_interval)`
    pub fn read_bound(&self, now: Instant, poll_interval: Duration) -> Duration {
        self.remaining(now).min(poll_interval)
    }

    /// Time since start
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Fire `DeadlineReached` if no time is left. Returns true if it fired.
    pub fn check_deadline(&mut self, now: Instant) -> bool {
        if self.is_capturing() && self.remaining(now).is_zero() {
            self.process_event(CaptureEvent::DeadlineReached);
            return true;
        }
        false
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: CaptureEvent) -> TransitionResult {
        match self.get_next_state(&event) {
            Some(state) => {
                if event == CaptureEvent::ChunkRead {
                    self.chunks += 1;
                }
                self.end = self.end.or(match state {
                    CaptureState::Expired => Some(CaptureEnd::Expired),
                    CaptureState::Cancelled => Some(CaptureEnd::Cancelled),
                    CaptureState::SourceClosed => Some(CaptureEnd::SourceClosed),
                    _ => None,
                });
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &CaptureEvent) -> Option<CaptureState> {
        use CaptureEvent::*;
        use CaptureState::*;

        match (self.current_state, event) {
            (Idle, Started) => Some(Capturing),

            // Reads keep the loop going
            (Capturing, ChunkRead | ReadTimedOut) => Some(Capturing),

            // Ways out of the read loop
            (Capturing, DeadlineReached) => Some(Expired),
            (Capturing, CancelRequested) => Some(Cancelled),
            (Capturing, EndOfStream | ReadFailed) => Some(SourceClosed),

            // Every exit funnels into the same termination path
            (Expired | Cancelled | SourceClosed, ProcessTerminated) => Some(Terminated),

            _ => None,
        }
    }
}
