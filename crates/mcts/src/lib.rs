//! Parallel Monte Carlo Tree Search core for the goban-zero engine.
//!
//! The search grows a rooted tree from the current position, evaluating
//! leaves through an external policy/value [`Evaluator`] and picking a
//! move under a wall-clock or simulation budget. Worker threads descend
//! the shared tree concurrently; a virtual-loss bias on in-flight paths
//! keeps them spread out, and a bounded transposition table shares
//! statistics between equivalent positions.
//!
//! A simulation is one descend-expand-backup pass:
//!
//! 1. **Descend** by PUCT over the node's children, skipping children
//!    whose moves were found to violate superko
//! 2. **Expand** the leaf (or score it directly after two passes, or
//!    evaluate it without children once the tree is full)
//! 3. **Back up** the evaluation along the recursion's return path
//!
//! [`UctSearch::think`] drives a full move decision: subtree reuse,
//! worker spawn, periodic analysis output, and the pass/resign logic of
//! [`UctSearch::get_best_move`].

mod config;
mod error;
mod evaluation;
mod move_select;
mod node;
mod search;
mod simulation;
mod ttable;
mod worker;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use evaluation::{Evaluation, Evaluator, UniformEvaluator};
pub use move_select::PassFlags;
pub use node::{UctNode, MAX_TREE_SIZE};
pub use search::UctSearch;
pub use simulation::SimResult;
pub use ttable::TranspositionTable;
