//! Mock GPIO pin for sensor tests.
//!
//! A [`MockPin`] reports a steady level set through its [`MockPinHandle`].
//! Tests can also script the exact sequence of samples the next level reads
//! return, which is how mains-induced spikes are simulated: the handle emits an
//! edge while the scripted samples disagree with the edge direction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{HardwareError, Result, traits::GpioPin, types::EdgeKind};

#[derive(Debug, Default)]
struct PinState {
    level: bool,
    script: VecDeque<Option<bool>>,
    reads: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<PinState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated GPIO input pin.
///
/// # Examples
///
/// ```
/// use warden_hardware::mock::MockPin;
/// use warden_hardware::traits::GpioPin;
/// use warden_hardware::types::EdgeKind;
///
/// #[tokio::main]
/// async fn main() -> warden_hardware::Result<()> {
///     let (mut pin, handle) = MockPin::new(5, false);
///
///     handle.set_level(true);
///     pin.wait_for_edge(EdgeKind::Rising).await?;
///     assert!(pin.level()?);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockPin {
    number: u8,
    edges: mpsc::UnboundedReceiver<(bool, bool)>,
    shared: Arc<Shared>,
}

impl MockPin {
    /// Create a pin with the given number and initial level.
    pub fn new(number: u8, level: bool) -> (Self, MockPinHandle) {
        let (edge_tx, edges) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        shared.lock().level = level;

        let pin = Self {
            number,
            edges,
            shared: Arc::clone(&shared),
        };
        let handle = MockPinHandle { edge_tx, shared };

        (pin, handle)
    }
}

impl GpioPin for MockPin {
    fn number(&self) -> u8 {
        self.number
    }

    fn level(&self) -> Result<bool> {
        let mut state = self.shared.lock();
        state.reads += 1;

        match state.script.pop_front() {
            Some(Some(sample)) => Ok(sample),
            Some(None) => Err(HardwareError::invalid_data(format!(
                "GPIO{} read failed",
                self.number
            ))),
            None => Ok(state.level),
        }
    }

    async fn wait_for_edge(&mut self, kind: EdgeKind) -> Result<()> {
        loop {
            let (previous, current) = self
                .edges
                .recv()
                .await
                .ok_or_else(|| HardwareError::disconnected(format!("GPIO{}", self.number)))?;

            if kind.matches(previous, current) {
                return Ok(());
            }
        }
    }

    fn clear_edges(&mut self) -> Result<()> {
        while self.edges.try_recv().is_ok() {}
        Ok(())
    }
}

/// Controller for a [`MockPin`].
#[derive(Debug, Clone)]
pub struct MockPinHandle {
    edge_tx: mpsc::UnboundedSender<(bool, bool)>,
    shared: Arc<Shared>,
}

impl MockPinHandle {
    /// Change the steady level, emitting an edge if it differs from the
    /// current one.
    pub fn set_level(&self, level: bool) {
        let previous = {
            let mut state = self.shared.lock();
            std::mem::replace(&mut state.level, level)
        };

        if previous != level {
            let _ = self.edge_tx.send((previous, level));
        }
    }

    /// Queue samples returned by the next level reads, before the steady
    /// level applies again.
    pub fn script_samples(&self, samples: impl IntoIterator<Item = bool>) {
        self.shared
            .lock()
            .script
            .extend(samples.into_iter().map(Some));
    }

    /// Make the next `count` level reads fail.
    pub fn fail_reads(&self, count: usize) {
        let mut state = self.shared.lock();
        state.script.extend(std::iter::repeat_n(None, count));
    }

    /// Emit an edge without changing the steady level, as a spike would.
    pub fn spike(&self, previous: bool, current: bool, samples: impl IntoIterator<Item = bool>) {
        self.script_samples(samples);
        let _ = self.edge_tx.send((previous, current));
    }

    /// Number of level reads performed so far.
    pub fn reads(&self) -> u64 {
        self.shared.lock().reads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_level() {
        let (pin, _handle) = MockPin::new(22, true);
        assert_eq!(pin.number(), 22);
        assert!(pin.level().unwrap());
    }

    #[test]
    fn test_scripted_samples_then_steady_level() {
        let (pin, handle) = MockPin::new(5, false);
        handle.script_samples([true, false]);

        assert!(pin.level().unwrap());
        assert!(!pin.level().unwrap());
        assert!(!pin.level().unwrap());
        assert_eq!(handle.reads(), 3);
    }

    #[test]
    fn test_failed_reads() {
        let (pin, handle) = MockPin::new(5, true);
        handle.fail_reads(1);

        assert!(matches!(pin.level(), Err(HardwareError::InvalidData { .. })));
        assert!(pin.level().unwrap());
    }

    #[tokio::test]
    async fn test_wait_skips_non_matching_edges() {
        let (mut pin, handle) = MockPin::new(5, true);

        handle.set_level(false);
        handle.set_level(true);

        pin.wait_for_edge(EdgeKind::Rising).await.unwrap();
        assert!(pin.level().unwrap());
    }

    #[tokio::test]
    async fn test_unchanged_level_emits_no_edge() {
        let (mut pin, handle) = MockPin::new(5, false);

        handle.set_level(false);
        drop(handle);

        let result = pin.wait_for_edge(EdgeKind::Both).await;
        assert!(matches!(result, Err(HardwareError::Disconnected { .. })));
    }

    #[tokio::test]
    async fn test_cleared_edges_are_not_delivered() {
        let (mut pin, handle) = MockPin::new(5, false);

        handle.set_level(true);
        pin.clear_edges().unwrap();
        handle.set_level(false);

        pin.wait_for_edge(EdgeKind::Both).await.unwrap();
        assert!(!pin.level().unwrap());

        drop(handle);
        assert!(pin.wait_for_edge(EdgeKind::Rising).await.is_err());
    }

    #[tokio::test]
    async fn test_spike_keeps_steady_level() {
        let (mut pin, handle) = MockPin::new(5, false);

        handle.spike(false, true, [true, false, true]);
        pin.wait_for_edge(EdgeKind::Rising).await.unwrap();

        let samples: Vec<bool> = (0..4).map(|_| pin.level().unwrap()).collect();
        assert_eq!(samples, vec![true, false, true, false]);
    }
}
