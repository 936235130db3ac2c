//! One search simulation: a single descend-expand-backup pass.
//!
//! The recursion's return path is the back-propagation path; every node
//! traversed receives exactly one virtual-loss / update / undo triple.

use std::sync::atomic::Ordering;

use goban_core::{GameState, Move};

use crate::error::Result;
use crate::evaluation::Evaluator;
use crate::node::UctNode;
use crate::search::UctSearch;

/// Outcome of a single simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimResult {
    /// The simulation aborted: lost an expansion race, ran into superko,
    /// or found no valid child. Not counted as a playout.
    Invalid,
    /// Completed with an evaluation in [0, 1], Black's perspective.
    Valid(f32),
}

impl SimResult {
    pub fn from_eval(eval: f32) -> Self {
        SimResult::Valid(eval)
    }

    /// Convert a signed final score (positive = Black wins) into a value.
    pub fn from_score(score: f32) -> Self {
        if score > 0.0 {
            SimResult::Valid(1.0)
        } else if score < 0.0 {
            SimResult::Valid(0.0)
        } else {
            SimResult::Valid(0.5)
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, SimResult::Valid(_))
    }

    pub fn eval(self) -> Option<f32> {
        match self {
            SimResult::Valid(eval) => Some(eval),
            SimResult::Invalid => None,
        }
    }
}

impl<E: Evaluator> UctSearch<E> {
    /// Run one simulation from `node`, mutating `state` along the descent.
    ///
    /// The caller owns `state` (a clone of the root state); the recursion
    /// plays moves onto it as it walks down. A `Valid` result has already
    /// been folded into every node on the path when this returns.
    pub fn play_simulation(&self, state: &mut GameState, node: &UctNode) -> Result<SimResult> {
        let color = state.to_move();
        let hash = state.hash();
        let komi = state.komi();

        let mut result = SimResult::Invalid;

        self.ttable.sync(hash, komi, node);
        node.apply_virtual_loss();

        if !node.has_children() {
            if state.get_passes() >= 2 {
                result = SimResult::from_score(state.final_score());
            } else if self.nodes.load(Ordering::Relaxed) < self.max_tree_size {
                if let Some(eval) = node.create_children(
                    &self.nodes,
                    self.max_tree_size,
                    state,
                    &self.evaluator,
                )? {
                    result = SimResult::from_eval(eval);
                }
            } else {
                let eval = node.eval_state(state, &self.evaluator)?;
                result = SimResult::from_eval(eval);
            }
        }

        if node.has_children() && !result.is_valid() {
            if let Some(next) = node.uct_select_child(color, self.config.c_puct) {
                let mv = next.get_move();
                if mv == Move::PASS {
                    state.play_pass();
                    result = self.play_simulation(state, next)?;
                } else {
                    match state.play_move(mv) {
                        Ok(()) if !state.superko() => {
                            result = self.play_simulation(state, next)?;
                        }
                        _ => next.invalidate(),
                    }
                }
            }
        }

        if let SimResult::Valid(eval) = result {
            node.update(eval);
        }
        node.undo_virtual_loss();
        self.ttable.update(hash, komi, node);

        Ok(result)
    }
}
