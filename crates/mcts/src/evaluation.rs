use goban_core::{GameState, Move};

use crate::error::Result;

/// Network output for one position.
///
/// `value` is the win probability in [0, 1] from Black's perspective.
/// `priors` maps every legal move (pass included) to its probability;
/// priors sum to at most 1.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub value: f32,
    pub priors: Vec<(Move, f32)>,
}

/// Minimal interface required from the policy-value network.
///
/// Implementations may be slow (GPU inference) and must be callable from
/// several search threads at once.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, state: &GameState) -> Result<Evaluation>;
}

/// Uniform priors and an even value, for tests and benchmarks.
#[derive(Debug, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, state: &GameState) -> Result<Evaluation> {
        let moves = state.legal_moves();
        let prior = 1.0 / moves.len() as f32;
        Ok(Evaluation {
            value: 0.5,
            priors: moves.into_iter().map(|mv| (mv, prior)).collect(),
        })
    }
}
