//! Worker loop shared by every search thread.
//!
//! Workers never talk to one another; coordination happens entirely
//! through the shared tree's atomics, the transposition table, and the
//! driver's `running` flag.

use crate::evaluation::Evaluator;
use crate::search::UctSearch;

impl<E: Evaluator> UctSearch<E> {
    /// Simulate against the shared root until the driver stops the
    /// search or a playout/visit limit is hit.
    pub(crate) fn worker_loop(&self) {
        loop {
            let mut state = self.root_state.clone();
            match self.play_simulation(&mut state, &self.root) {
                Ok(result) if result.is_valid() => self.increment_playouts(),
                Ok(_) => {}
                Err(err) => {
                    self.record_failure(err);
                    break;
                }
            }
            if !self.is_running() || self.limit_reached() {
                break;
            }
        }
    }
}
