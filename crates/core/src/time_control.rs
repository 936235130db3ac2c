use std::time::Instant;

use crate::moves::Color;

/// Default main time per player: one hour, in centiseconds.
const DEFAULT_MAIN_TIME: i32 = 60 * 60 * 100;

/// Per-player game clock yielding a per-move budget in centiseconds.
///
/// The budget heuristic divides the remaining main time by the number of
/// moves a game of the configured board size is still expected to last.
#[derive(Debug, Clone)]
pub struct TimeControl {
    boardsize: usize,
    remaining: [i32; 2],
    started: [Option<Instant>; 2],
}

impl TimeControl {
    /// Create a clock with `main_time` centiseconds for each player.
    pub fn new(main_time: i32) -> Self {
        Self {
            boardsize: 19,
            remaining: [main_time; 2],
            started: [None; 2],
        }
    }

    pub fn set_boardsize(&mut self, size: usize) {
        self.boardsize = size;
    }

    /// Maximum time to spend on the next move, in centiseconds.
    pub fn max_time_for_move(&self, color: Color) -> i32 {
        // Expect the game to last about half the board in further moves,
        // never fewer than 10.
        let moves_expected = ((self.boardsize * self.boardsize) / 2).max(10) as i32;
        (self.remaining[color.index()] / moves_expected).max(1)
    }

    pub fn start_clock(&mut self, color: Color) {
        self.started[color.index()] = Some(Instant::now());
    }

    /// Stop the clock and deduct the elapsed time from the main time.
    pub fn stop_clock(&mut self, color: Color) {
        if let Some(start) = self.started[color.index()].take() {
            let centis = (start.elapsed().as_millis() / 10) as i32;
            let remaining = &mut self.remaining[color.index()];
            *remaining = (*remaining - centis).max(0);
        }
    }

    /// Remaining main time in centiseconds.
    pub fn remaining(&self, color: Color) -> i32 {
        self.remaining[color.index()]
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(DEFAULT_MAIN_TIME)
    }
}
