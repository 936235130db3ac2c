//! Search driver.
//!
//! Owns the tree and the root position, spawns the worker threads, polls
//! the clock, and turns the finished tree into a move.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use goban_core::{Color, GameState, Move};
use tracing::info;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::evaluation::Evaluator;
use crate::move_select::PassFlags;
use crate::node::{UctNode, MAX_TREE_SIZE};
use crate::ttable::TranspositionTable;

/// Interval between analysis dumps while thinking, in centiseconds.
const ANALYSIS_INTERVAL: i64 = 250;

/// Root-noise mixing weight and Dirichlet concentration.
const NOISE_EPSILON: f32 = 0.25;
const NOISE_ALPHA: f32 = 0.03;

pub struct UctSearch<E: Evaluator> {
    pub(crate) config: SearchConfig,
    pub(crate) root: Box<UctNode>,
    pub(crate) root_state: GameState,
    pub(crate) evaluator: E,
    pub(crate) ttable: TranspositionTable,
    /// Live node count across the whole tree.
    pub(crate) nodes: AtomicUsize,
    /// Valid simulations completed since the last `set_gamestate`.
    pub(crate) playouts: AtomicU32,
    pub(crate) running: AtomicBool,
    pub(crate) max_playouts: u32,
    pub(crate) max_visits: u32,
    pub(crate) max_tree_size: usize,
    failure: Mutex<Option<SearchError>>,
}

impl<E: Evaluator> UctSearch<E> {
    pub fn new(root_state: GameState, evaluator: E, config: SearchConfig) -> Self {
        let ttable = TranspositionTable::new(config.tt_size);
        let max_playouts = saturate(config.max_playouts);
        let max_visits = saturate(config.max_visits);
        Self {
            config,
            root: fresh_root(),
            root_state,
            evaluator,
            ttable,
            nodes: AtomicUsize::new(1),
            playouts: AtomicU32::new(0),
            running: AtomicBool::new(false),
            max_playouts,
            max_visits,
            max_tree_size: MAX_TREE_SIZE,
            failure: Mutex::new(None),
        }
    }

    /// Limit the number of playouts per search; 0 means unlimited.
    pub fn set_playout_limit(&mut self, playouts: u32) {
        self.max_playouts = saturate(playouts);
    }

    /// Limit the number of root visits per search; 0 means unlimited.
    pub fn set_visit_limit(&mut self, visits: u32) {
        self.max_visits = saturate(visits);
    }

    /// Override the tree-size bound (exposed for small-tree testing).
    pub fn set_max_tree_size(&mut self, nodes: usize) {
        self.max_tree_size = nodes;
    }

    pub fn root(&self) -> &UctNode {
        &self.root
    }

    pub fn root_state(&self) -> &GameState {
        &self.root_state
    }

    pub fn node_count(&self) -> usize {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn playouts(&self) -> u32 {
        self.playouts.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn increment_playouts(&self) {
        self.playouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn limit_reached(&self) -> bool {
        self.playouts.load(Ordering::Relaxed) >= self.max_playouts
            || self.root.get_visits() >= self.max_visits
    }

    /// Point the search at `g`, keeping the tree when the position is
    /// unchanged and walking the retained subtree forward when `g` is a
    /// continuation of the current root position.
    pub fn set_gamestate(&mut self, g: &GameState) {
        // Playouts count from the position being searched.
        self.playouts.store(0, Ordering::Relaxed);
        if self.root_state.komi() != g.komi() || self.root_state.hash() != g.hash() {
            self.root = self.find_new_root(g);
            self.root_state = g.clone();
        }
        self.nodes.store(self.root.count_nodes(), Ordering::Relaxed);
    }

    fn find_new_root(&mut self, g: &GameState) -> Box<UctNode> {
        if self.root_state.komi() != g.komi() {
            return fresh_root();
        }
        let played = self.root_state.history().len();
        let target = g.history();
        if target.len() <= played || target[..played] != *self.root_state.history() {
            return fresh_root();
        }
        let mut root = std::mem::replace(&mut self.root, fresh_root());
        for &mv in &target[played..] {
            match root.find_child(mv) {
                Some(child) => root = child,
                None => return fresh_root(),
            }
        }
        root
    }

    /// Search the position and return the move to play. The root state
    /// advances by the chosen move and its subtree is retained.
    pub fn think(&mut self, color: Color, g: &GameState, flags: PassFlags) -> Result<Move> {
        self.set_gamestate(g);
        self.root_state.set_to_move(color);
        self.root_state.start_clock(color);
        let boardsize = self.root_state.boardsize();
        self.root_state.get_timecontrol_mut().set_boardsize(boardsize);
        let time_for_move =
            self.root_state.get_timecontrol().max_time_for_move(color) as i64;
        if !self.config.quiet {
            info!(budget_secs = time_for_move as f32 / 100.0, "thinking");
        }

        let start = Instant::now();

        let root_eval = if self.root.has_children() {
            self.root.get_eval(Color::Black)
        } else {
            self.root
                .create_children(
                    &self.nodes,
                    self.max_tree_size,
                    &self.root_state,
                    &self.evaluator,
                )?
                .unwrap_or(0.5)
        };
        self.root.kill_superkos(&self.root_state);
        if self.config.noise {
            self.root.dirichlet_noise(NOISE_EPSILON, NOISE_ALPHA);
        }
        if !self.config.quiet {
            let eval = match color {
                Color::Black => root_eval,
                Color::White => 1.0 - root_eval,
            };
            info!(eval, "network eval");
        }

        self.clear_failure();
        self.running.store(true, Ordering::Release);
        let threads = self.config.num_threads.max(1);
        {
            let this = &*self;
            thread::scope(|scope| {
                for _ in 1..threads {
                    scope.spawn(|| this.worker_loop());
                }
                this.think_loop(start, time_for_move);
            });
        }
        self.root_state.stop_clock(color);

        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if !self.root.has_children() {
            // The budget ran out before the root could even expand.
            return Ok(Move::PASS);
        }

        self.dump_stats();
        let elapsed_centis = centis_since(start);
        if !self.config.quiet {
            let playouts = self.playouts();
            info!(
                visits = self.root.get_visits(),
                nodes = self.node_count(),
                playouts,
                playouts_per_sec = (playouts as i64 * 100) / (elapsed_centis + 1),
                "search finished"
            );
        }

        let best = self.get_best_move(flags);
        if !best.is_resign() {
            if best.is_pass() {
                self.root_state.play_pass();
            } else {
                self.root_state.play_move(best)?;
            }
            let root = std::mem::replace(&mut self.root, fresh_root());
            self.root = root.find_child(best).unwrap_or_else(fresh_root);
        }
        Ok(best)
    }

    /// Keep searching the position until `input_pending` reports that the
    /// caller wants the thread back.
    pub fn ponder<F>(&mut self, g: &GameState, input_pending: F) -> Result<()>
    where
        F: Fn() -> bool + Sync,
    {
        self.set_gamestate(g);
        self.clear_failure();
        self.running.store(true, Ordering::Release);
        let threads = self.config.num_threads.max(1);
        {
            let this = &*self;
            thread::scope(|scope| {
                for _ in 1..threads {
                    scope.spawn(|| this.worker_loop());
                }
                this.ponder_loop(&input_pending);
            });
        }
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.dump_stats();
        if !self.config.quiet {
            info!(
                visits = self.root.get_visits(),
                nodes = self.node_count(),
                "ponder finished"
            );
        }
        Ok(())
    }

    fn think_loop(&self, start: Instant, time_for_move: i64) {
        let mut last_update = 0;
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
            let elapsed_centis = centis_since(start);
            if elapsed_centis - last_update > ANALYSIS_INTERVAL {
                last_update = elapsed_centis;
                self.dump_analysis();
            }
            if !self.is_running() || elapsed_centis >= time_for_move || self.limit_reached() {
                break;
            }
        }
        self.running.store(false, Ordering::Release);
    }

    fn ponder_loop(&self, input_pending: &(impl Fn() -> bool + Sync)) {
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
            if input_pending() || !self.is_running() {
                break;
            }
        }
        self.running.store(false, Ordering::Release);
    }

    /// Log the current principal variation and win rate.
    fn dump_analysis(&self) {
        if self.config.quiet {
            return;
        }
        let mut state = self.root_state.clone();
        let color = state.to_move();
        let pv = self.get_pv(&mut state, &self.root);
        info!(
            playouts = self.playouts(),
            winrate = 100.0 * self.root.get_eval(color),
            pv = %pv,
            "analysis"
        );
    }

    /// Log per-move statistics for the searched root children.
    fn dump_stats(&mut self) {
        if self.config.quiet || !self.root.has_children() {
            return;
        }
        let color = self.root_state.to_move();
        self.root.sort_children(color);

        let Some(first) = self.root.get_first_child() else {
            return;
        };
        if first.first_visit() {
            return;
        }

        for (count, child) in self.root.children().iter().enumerate() {
            // Always show at least two moves so a forced choice still
            // gets some context.
            if count >= 2 && child.first_visit() {
                break;
            }
            let mut state = self.root_state.clone();
            let text = state.move_to_text(child.get_move());
            let mut pv = text.clone();
            let descended = if child.get_move().is_pass() {
                state.play_pass();
                true
            } else {
                state.play_move(child.get_move()).is_ok()
            };
            if descended {
                let rest = self.get_pv(&mut state, child);
                if !rest.is_empty() {
                    pv.push(' ');
                    pv.push_str(&rest);
                }
            }
            info!(
                mv = %text,
                visits = child.get_visits(),
                winrate = 100.0 * child.get_eval(color),
                prior = 100.0 * child.prior(),
                pv = %pv,
                "move stats"
            );
        }
    }

    /// Principal variation below `node`: the chain of most-visited valid
    /// children, stopping at the first unvisited one.
    fn get_pv(&self, state: &mut GameState, node: &UctNode) -> String {
        let Some(best) = best_pv_child(node) else {
            return String::new();
        };
        if best.first_visit() {
            return String::new();
        }
        let mv = best.get_move();
        let mut res = state.move_to_text(mv);
        if mv.is_pass() {
            state.play_pass();
        } else if state.play_move(mv).is_err() {
            return res;
        }
        let next = self.get_pv(state, best);
        if !next.is_empty() {
            res.push(' ');
            res.push_str(&next);
        }
        res
    }

    pub(crate) fn record_failure(&self, err: SearchError) {
        let mut slot = self.lock_failure();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.running.store(false, Ordering::Release);
    }

    fn take_failure(&self) -> Option<SearchError> {
        self.lock_failure().take()
    }

    fn clear_failure(&self) {
        *self.lock_failure() = None;
    }

    fn lock_failure(&self) -> MutexGuard<'_, Option<SearchError>> {
        self.failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn fresh_root() -> Box<UctNode> {
    Box::new(UctNode::new(Move::PASS, 0.0))
}

fn saturate(limit: u32) -> u32 {
    if limit == 0 {
        u32::MAX
    } else {
        limit
    }
}

fn best_pv_child(node: &UctNode) -> Option<&UctNode> {
    node.children()
        .iter()
        .filter(|c| c.is_valid())
        .max_by_key(|c| c.get_visits())
}

fn centis_since(start: Instant) -> i64 {
    (start.elapsed().as_millis() / 10) as i64
}
