//! Post-search move choice: best child, pass sanity, resignation.

use bitflags::bitflags;
use goban_core::{Color, Move};
use tracing::{debug, info};

use crate::evaluation::Evaluator;
use crate::search::UctSearch;

bitflags! {
    /// Adjustments to the move choice requested by the caller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PassFlags: u32 {
        /// Never answer with a pass if any alternative exists.
        const NOPASS = 1 << 0;
        /// Never answer with a resignation.
        const NORESIGN = 1 << 1;
    }
}

impl<E: Evaluator> UctSearch<E> {
    /// Pick the move to play from the finished search tree.
    pub fn get_best_move(&mut self, flags: PassFlags) -> Move {
        let color = self.root_state.to_move();
        self.root.sort_children(color);

        // Early game: sample the move proportionally to visit counts.
        if self.root_state.get_movenum() < self.config.random_cnt {
            self.root.randomize_first_proportionally();
        }

        let Some(first) = self.root.get_first_child() else {
            return Move::PASS;
        };
        let mut best_move = first.get_move();

        // No statistics at all: fall back on the best prior.
        if first.first_visit() {
            return best_move;
        }
        let mut best_score = first.get_eval(color);

        if flags.contains(PassFlags::NOPASS) {
            if best_move.is_pass() {
                if let Some(nopass) = self.root.get_nopass_child(&self.root_state) {
                    debug!("preferring not to pass");
                    best_move = nopass.get_move();
                    best_score = if nopass.first_visit() {
                        1.0
                    } else {
                        nopass.get_eval(color)
                    };
                } else {
                    debug!("pass is the only acceptable move");
                }
            }
        } else if !self.config.dumb_pass {
            if best_move.is_pass() {
                // Passing ends the game on the spot when the opponent
                // passed last, so count the board before agreeing to it.
                let score = self.root_state.final_score();
                if passing_loses(score, color) {
                    if let Some(nopass) = self.root.get_nopass_child(&self.root_state) {
                        debug!("avoiding pass because it loses");
                        best_move = nopass.get_move();
                        best_score = if nopass.first_visit() {
                            1.0
                        } else {
                            nopass.get_eval(color)
                        };
                    } else {
                        debug!("no alternative to passing");
                    }
                } else {
                    debug!("passing wins");
                }
            } else if self.root_state.get_last_move() == Some(Move::PASS) {
                // The opponent just passed. If answering with a pass
                // already wins the count, claim the win immediately.
                let score = self.root_state.final_score();
                if passing_loses(score, color) {
                    debug!("passing loses, playing on");
                } else {
                    debug!("passing wins, passing out");
                    best_move = Move::PASS;
                }
            }
        }

        if !best_move.is_pass() && self.should_resign(flags, best_score) {
            info!(eval_pct = 100.0 * best_score, "position looks lost, resigning");
            best_move = Move::RESIGN;
        }

        best_move
    }

    /// Whether the side to move should resign instead of playing on.
    pub fn should_resign(&self, flags: PassFlags, best_score: f32) -> bool {
        if flags.contains(PassFlags::NORESIGN) {
            return false;
        }
        if self.config.resign_pct == 0 {
            return false;
        }

        let visits = self.root.get_visits();
        if visits < 500.min(self.max_playouts) {
            // Not enough evidence yet.
            return false;
        }

        let board_squares = self.root_state.boardsize() * self.root_state.boardsize();
        let move_threshold = board_squares / 4;
        let movenum = self.root_state.get_movenum();
        if movenum as usize <= move_threshold {
            // Too early in the game.
            return false;
        }

        let color = self.root_state.to_move();
        let is_default_resign = self.config.resign_pct < 0;
        let resign_pct = if is_default_resign { 10 } else { self.config.resign_pct };
        let resign_threshold = 0.01 * resign_pct as f32;
        if best_score > resign_threshold {
            return false;
        }

        if self.root_state.get_handicap() > 0 && color == Color::White && is_default_resign {
            // White gives handicap stones: hold out longer early on, the
            // opponent may still fumble the lead.
            let handicap_threshold =
                resign_threshold / (1 + self.root_state.get_handicap()) as f32;
            let blend_ratio = 1.0f32.min(movenum as f32 / (0.6 * board_squares as f32));
            let blended_threshold =
                blend_ratio * resign_threshold + (1.0 - blend_ratio) * handicap_threshold;
            if best_score > blended_threshold {
                return false;
            }
        }

        true
    }
}

fn passing_loses(score: f32, color: Color) -> bool {
    (score > 0.0 && color == Color::White) || (score < 0.0 && color == Color::Black)
}
