//! Shared search-tree node.
//!
//! Several threads descend the tree at once, so every statistic is an
//! atomic and children are created exactly once behind a compare-and-swap
//! on the expansion state. A thread that loses the expansion race backs
//! out instead of waiting.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::OnceLock;

use goban_core::{Color, GameState, Move};
use rand::distributions::{Distribution, WeightedIndex};
use rand::thread_rng;
use rand_distr::Dirichlet;

use crate::error::Result;
use crate::evaluation::Evaluator;

/// Hard bound on the node count across the whole tree. Once the counter
/// passes it, leaves are evaluated without creating children.
pub const MAX_TREE_SIZE: usize = 2_000_000;

const UNEXPANDED: u8 = 0;
const EXPANDING: u8 = 1;
const EXPANDED: u8 = 2;

pub struct UctNode {
    mv: Move,
    prior: f32,
    /// Completed back-propagations through this node.
    visits: AtomicU32,
    /// Sum of evaluations in Black's perspective, as f64 bits.
    value_sum: AtomicU64,
    /// In-flight simulations currently descending through this node.
    virtual_loss: AtomicU32,
    expansion: AtomicU8,
    /// Cleared when the move leading here turns out to violate superko.
    valid: AtomicBool,
    children: OnceLock<Vec<UctNode>>,
}

impl UctNode {
    pub fn new(mv: Move, prior: f32) -> Self {
        Self {
            mv,
            prior,
            visits: AtomicU32::new(0),
            value_sum: AtomicU64::new(0.0f64.to_bits()),
            virtual_loss: AtomicU32::new(0),
            expansion: AtomicU8::new(UNEXPANDED),
            valid: AtomicBool::new(true),
            children: OnceLock::new(),
        }
    }

    #[inline]
    pub fn get_move(&self) -> Move {
        self.mv
    }

    #[inline]
    pub fn prior(&self) -> f32 {
        self.prior
    }

    #[inline]
    pub fn get_visits(&self) -> u32 {
        self.visits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn virtual_losses(&self) -> u32 {
        self.virtual_loss.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn first_visit(&self) -> bool {
        self.get_visits() == 0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.expansion.load(Ordering::Acquire) == EXPANDED
    }

    /// Children slice; empty until expansion has completed.
    pub fn children(&self) -> &[UctNode] {
        self.children.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_first_child(&self) -> Option<&UctNode> {
        self.children().first()
    }

    pub fn apply_virtual_loss(&self) {
        self.virtual_loss.fetch_add(1, Ordering::Relaxed);
    }

    pub fn undo_virtual_loss(&self) {
        self.virtual_loss.fetch_sub(1, Ordering::Relaxed);
    }

    /// Accumulate one evaluation (Black's perspective) and count the visit.
    pub fn update(&self, eval: f32) {
        let mut current = self.value_sum.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + eval as f64).to_bits();
            match self.value_sum.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.visits.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean value in `color`'s perspective.
    pub fn get_eval(&self, color: Color) -> f32 {
        let visits = self.get_visits().max(1);
        let mean = (f64::from_bits(self.value_sum.load(Ordering::Relaxed)) / visits as f64) as f32;
        match color {
            Color::Black => mean,
            Color::White => 1.0 - mean,
        }
    }

    /// Raw statistics snapshot for the transposition table.
    pub(crate) fn stats(&self) -> (u32, f64) {
        (
            self.get_visits(),
            f64::from_bits(self.value_sum.load(Ordering::Relaxed)),
        )
    }

    /// Adopt statistics from a transposition-table entry.
    pub(crate) fn set_stats(&self, visits: u32, value_sum: f64) {
        self.visits.store(visits, Ordering::Relaxed);
        self.value_sum.store(value_sum.to_bits(), Ordering::Relaxed);
    }

    /// Expand this leaf: query the evaluator and publish one child per
    /// legal move. Returns the leaf evaluation on success, `None` when
    /// another thread holds the expansion or the tree is full.
    pub fn create_children<E: Evaluator>(
        &self,
        node_count: &AtomicUsize,
        max_tree_size: usize,
        state: &GameState,
        evaluator: &E,
    ) -> Result<Option<f32>> {
        if node_count.load(Ordering::Relaxed) > max_tree_size {
            return Ok(None);
        }
        if self
            .expansion
            .compare_exchange(UNEXPANDED, EXPANDING, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return Ok(None);
        }

        let eval = evaluator.evaluate(state)?;

        let mut children: Vec<UctNode> = eval
            .priors
            .iter()
            .map(|&(mv, prior)| UctNode::new(mv, prior))
            .collect();
        if !children.iter().any(|c| c.mv.is_pass()) {
            children.push(UctNode::new(Move::PASS, 0.0));
        }

        node_count.fetch_add(children.len(), Ordering::Relaxed);
        let _ = self.children.set(children);
        self.expansion.store(EXPANDED, Ordering::Release);

        Ok(Some(eval.value))
    }

    /// Leaf evaluation without expansion, for when the tree is full.
    pub fn eval_state<E: Evaluator>(&self, state: &GameState, evaluator: &E) -> Result<f32> {
        Ok(evaluator.evaluate(state)?.value)
    }

    /// Best child by PUCT in `color`'s perspective. In-flight simulations
    /// count as losing visits so concurrent descents spread out. Children
    /// marked invalid are skipped; returns `None` if none remain.
    pub fn uct_select_child(&self, color: Color, c_puct: f32) -> Option<&UctNode> {
        let children = self.children.get()?;
        let sqrt_parent = (self.get_visits() as f32).sqrt();

        let mut best: Option<&UctNode> = None;
        let mut best_score = f32::NEG_INFINITY;
        for child in children {
            if !child.is_valid() {
                continue;
            }
            let visits = child.get_visits();
            let vloss = child.virtual_losses();
            let denom = visits + vloss;
            let q = if denom == 0 {
                0.0
            } else {
                let sum = f64::from_bits(child.value_sum.load(Ordering::Relaxed));
                let wins = match color {
                    Color::Black => sum,
                    Color::White => visits as f64 - sum,
                };
                (wins / denom as f64) as f32
            };
            let u = c_puct * child.prior * sqrt_parent / (1.0 + denom as f32);
            let score = q + u;
            if score > best_score {
                best_score = score;
                best = Some(child);
            }
        }
        best
    }

    /// Stable-sort children best-first: visits, then mean value in
    /// `color`'s perspective, then prior.
    pub fn sort_children(&mut self, color: Color) {
        if let Some(children) = self.children.get_mut() {
            children.sort_by(|a, b| {
                let (va, vb) = (a.get_visits(), b.get_visits());
                vb.cmp(&va)
                    .then_with(|| b.sort_eval(color).total_cmp(&a.sort_eval(color)))
                    .then_with(|| b.prior.total_cmp(&a.prior))
            });
        }
    }

    fn sort_eval(&self, color: Color) -> f32 {
        if self.first_visit() {
            -1.0
        } else {
            self.get_eval(color)
        }
    }

    /// Swap a child sampled from the visit-count distribution into the
    /// first slot, for opening diversity.
    pub fn randomize_first_proportionally(&mut self) {
        let Some(children) = self.children.get_mut() else {
            return;
        };
        let visits: Vec<u32> = children.iter().map(|c| c.get_visits()).collect();
        let Ok(dist) = WeightedIndex::new(&visits) else {
            return;
        };
        let pick = dist.sample(&mut thread_rng());
        children.swap(0, pick);
    }

    /// Invalidate every child whose move would repeat an earlier position.
    pub fn kill_superkos(&self, state: &GameState) {
        for child in self.children() {
            if child.mv.is_pass() {
                continue;
            }
            let mut probe = state.clone();
            match probe.play_move(child.mv) {
                Ok(()) if !probe.superko() => {}
                _ => child.invalidate(),
            }
        }
    }

    /// Blend the child priors with a symmetric Dirichlet(alpha) sample.
    pub fn dirichlet_noise(&mut self, epsilon: f32, alpha: f32) {
        let Some(children) = self.children.get_mut() else {
            return;
        };
        if children.len() < 2 {
            return;
        }
        let alphas = vec![alpha as f64; children.len()];
        let Ok(dirichlet) = Dirichlet::new(&alphas) else {
            return;
        };
        let noise = dirichlet.sample(&mut thread_rng());
        for (child, sample) in children.iter_mut().zip(noise) {
            child.prior = (1.0 - epsilon) * child.prior + epsilon * sample as f32;
        }
    }

    /// Detach and return the subtree behind `mv`; all siblings and their
    /// descendants are dropped.
    pub fn find_child(self: Box<Self>, mv: Move) -> Option<Box<UctNode>> {
        let UctNode { children, .. } = *self;
        let mut children = children.into_inner()?;
        let index = children.iter().position(|c| c.mv == mv)?;
        Some(Box::new(children.swap_remove(index)))
    }

    /// Best non-pass child that is valid and still legal in `state`.
    /// Assumes children are already sorted best-first.
    pub fn get_nopass_child(&self, state: &GameState) -> Option<&UctNode> {
        self.children()
            .iter()
            .find(|c| !c.mv.is_pass() && c.is_valid() && state.is_legal(c.mv))
    }

    /// Size of the subtree rooted here, this node included.
    pub fn count_nodes(&self) -> usize {
        1 + self.children().iter().map(UctNode::count_nodes).sum::<usize>()
    }
}
