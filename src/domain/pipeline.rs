use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Pipeline lifecycle state machine.
///
/// State transitions:
/// - Idle -> Running (start)
/// - Running -> Stopped (stop)
///
/// Stopped is terminal for a run: the workers, cancel token and channels
/// belong to the run that created them, so restarting requires a fresh
/// controller. start() is guarded by a compare-exchange on this state, so a
/// second start() while Running fails instead of spawning a duplicate worker
/// pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PipelineState {
    /// Ready to start, no workers running.
    Idle = 0,
    /// Capture and display workers are live.
    Running = 1,
    /// Workers joined and the transcript persisted. Terminal.
    Stopped = 2,
}

impl PipelineState {
    /// Check if the pipeline can be started from this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }

    /// Check if the pipeline can be stopped from this state.
    #[must_use]
    pub fn can_stop(&self) -> bool {
        matches!(self, PipelineState::Running)
    }
}

impl From<u8> for PipelineState {
    fn from(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }
}

impl From<PipelineState> for u8 {
    fn from(state: PipelineState) -> Self {
        state as u8
    }
}

/// Atomic wrapper for PipelineState for lock-free reads.
#[derive(Debug)]
pub struct AtomicPipelineState(AtomicU8);

impl AtomicPipelineState {
    pub fn new(state: PipelineState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> PipelineState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: PipelineState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Compare and swap, returns true if successful.
    pub fn compare_exchange(&self, current: PipelineState, new: PipelineState) -> bool {
        self.0
            .compare_exchange(
                current.into(),
                new.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for AtomicPipelineState {
    fn default() -> Self {
        Self::new(PipelineState::Idle)
    }
}
