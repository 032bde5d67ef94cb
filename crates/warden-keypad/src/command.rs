//! Messages into the keypad processor task.

use tokio::sync::mpsc;
use tracing::debug;

/// A request for the processor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadCommand {
    /// Clear the typed buffer and cancel the inactivity countdown.
    ResetBuffer,

    /// The inactivity countdown with this generation ran out.
    InactivityElapsed(u64),
}

/// Cloneable handle other contexts use to reach the processor.
///
/// State entry actions run synchronously inside a dispatch, so the handle
/// never blocks: requests go over an unbounded channel and are applied by the
/// processor task in order with key presses.
#[derive(Debug, Clone)]
pub struct KeypadHandle {
    tx: mpsc::UnboundedSender<KeypadCommand>,
}

impl KeypadHandle {
    /// Ask the processor to clear its buffer.
    ///
    /// Returns `false` if the processor is gone.
    pub fn reset_buffer(&self) -> bool {
        let sent = self.tx.send(KeypadCommand::ResetBuffer).is_ok();
        if !sent {
            debug!("Keypad processor is not running, reset dropped");
        }
        sent
    }
}

/// Receiving side of [`keypad_channel`], consumed by the processor.
#[derive(Debug)]
pub struct KeypadInbox {
    pub(crate) tx: mpsc::UnboundedSender<KeypadCommand>,
    pub(crate) rx: mpsc::UnboundedReceiver<KeypadCommand>,
}

impl KeypadInbox {
    /// Take the next queued command without waiting.
    pub fn try_recv(&mut self) -> Option<KeypadCommand> {
        self.rx.try_recv().ok()
    }
}

/// Create the handle before the processor exists.
///
/// The alarm topology needs the handle while building state actions, long
/// before the keypad device is available.
pub fn keypad_channel() -> (KeypadHandle, KeypadInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (KeypadHandle { tx: tx.clone() }, KeypadInbox { tx, rx })
}
