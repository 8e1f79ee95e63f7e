use tokio::sync::watch;

use crate::keypad::LoopState;

// The loop thread is plain OS threads and crossbeam; this is the
// async window onto it. Nothing here blocks.

#[derive(Debug, Clone)]
/// Async (Tokio) view of a `LoopPlayer`'s state. To obtain one of
/// these call `LoopPlayer::watch()`. Any number can exist, each sees
/// every change.
pub struct LoopWatch {
    receiver: watch::Receiver<LoopState>,
}

impl LoopWatch {
    pub(crate) fn new(receiver: watch::Receiver<LoopState>) -> LoopWatch {
        LoopWatch { receiver }
    }

    /// State as last published by the loop thread.
    pub fn state(&self) -> LoopState {
        *self.receiver.borrow()
    }

    /// Await until the loop reaches `wanted`. Returns at once if it is
    /// already there. `None` if the `LoopPlayer` went away first.
    pub async fn wait_for_state(&mut self, wanted: LoopState) -> Option<LoopState> {
        // A possible race: we look, it isn't `wanted`, then it changes
        // before we start waiting and we miss it. `borrow_and_update()`
        // marks what we looked at as seen, so any later change wakes
        // `changed()`.
        loop {
            if *self.receiver.borrow_and_update() == wanted {
                return Some(wanted);
            }

            if self.receiver.changed().await.is_err() {
                // Sender gone, but the last value might still be it.
                return (*self.receiver.borrow() == wanted).then_some(wanted);
            }
        }
    }
}
