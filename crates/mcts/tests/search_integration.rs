use std::sync::atomic::{AtomicU32, Ordering};

use goban_core::{Color, GameState, Move};
use goban_mcts::{
    Evaluation, Evaluator, PassFlags, Result, SearchConfig, SimResult, UctNode, UctSearch,
    UniformEvaluator,
};

fn xy(x: usize, y: usize) -> Move {
    Move::from_xy(x, y, 5)
}

fn quiet() -> SearchConfig {
    SearchConfig::default().with_quiet(true)
}

/// Evaluator that funnels almost all prior mass onto one move.
struct HotMoveEvaluator {
    hot: Move,
}

impl Evaluator for HotMoveEvaluator {
    fn evaluate(&self, state: &GameState) -> Result<Evaluation> {
        let moves = state.legal_moves();
        let cold = 0.1 / moves.len() as f32;
        let priors = moves
            .into_iter()
            .map(|mv| (mv, if mv == self.hot { 0.9 } else { cold }))
            .collect();
        Ok(Evaluation { value: 0.5, priors })
    }
}

/// Build the classic 5x5 ko shape and take the ko with Black. The state
/// returned has White to move with the ko point at (2,2).
fn state_after_ko_capture() -> GameState {
    let mut state = GameState::new(5, 0.5);
    for (b, w) in [((1, 2), (3, 3)), ((2, 3), (3, 1)), ((2, 1), (4, 2))] {
        state.play_move(xy(b.0, b.1)).unwrap();
        state.play_move(xy(w.0, w.1)).unwrap();
    }
    state.play_move(xy(0, 0)).unwrap(); // Black tenuki
    state.play_move(xy(2, 2)).unwrap(); // White slides in
    state.play_move(xy(3, 2)).unwrap(); // Black takes the ko
    state
}

/// Continue to the position where the immediate ko retake is gone but
/// retaking would repeat the pre-capture position: superko territory.
fn state_with_superko_retake() -> GameState {
    let mut state = state_after_ko_capture();
    state.play_pass(); // White
    state.play_pass(); // Black
    state.set_passes(0);
    assert_eq!(state.to_move(), Color::White);
    state
}

fn assert_no_virtual_loss(node: &UctNode) {
    assert_eq!(node.virtual_losses(), 0);
    for child in node.children() {
        assert_no_virtual_loss(child);
    }
}

fn assert_visit_consistency(node: &UctNode) {
    // Terminal leaves collect repeat visits without ever expanding, so
    // the accounting identity applies to expanded nodes only: one visit
    // for the expansion itself, one per completed descent into a child.
    if node.has_children() {
        let child_sum: u32 = node.children().iter().map(UctNode::get_visits).sum();
        assert!(
            node.get_visits() <= child_sum + 1,
            "node visits {} exceed child total {} + 1",
            node.get_visits(),
            child_sum
        );
    }
    for child in node.children() {
        assert_visit_consistency(child);
    }
}

#[test]
fn two_consecutive_passes_score_the_game() {
    // Black owns the whole board, then both sides pass.
    let mut state = GameState::new(5, 0.5);
    state.play_move(xy(2, 2)).unwrap();
    state.play_pass();
    state.play_pass();
    assert_eq!(state.get_passes(), 2);

    let search = UctSearch::new(state.clone(), UniformEvaluator::new(), quiet());
    let mut sim_state = state;
    let result = search.play_simulation(&mut sim_state, search.root()).unwrap();
    assert_eq!(result, SimResult::Valid(1.0));
    // The terminal result was backed up into the root.
    assert_eq!(search.root().get_visits(), 1);
    assert_no_virtual_loss(search.root());
}

#[test]
fn two_consecutive_passes_score_white_win() {
    // Empty board: komi decides for White.
    let mut state = GameState::new(5, 7.5);
    state.play_pass();
    state.play_pass();

    let search = UctSearch::new(state.clone(), UniformEvaluator::new(), quiet());
    let mut sim_state = state;
    let result = search.play_simulation(&mut sim_state, search.root()).unwrap();
    assert_eq!(result, SimResult::Valid(0.0));
}

#[test]
fn superko_child_is_invalidated_by_simulation() {
    let state = state_with_superko_retake();
    let retake = xy(2, 2);
    assert!(state.is_legal(retake));

    let search = UctSearch::new(
        state.clone(),
        HotMoveEvaluator { hot: retake },
        quiet(),
    );

    // First simulation expands the root.
    let mut sim_state = state.clone();
    let result = search.play_simulation(&mut sim_state, search.root()).unwrap();
    assert!(result.is_valid());

    // The second one walks into the superko retake and invalidates it.
    let mut sim_state = state.clone();
    let result = search.play_simulation(&mut sim_state, search.root()).unwrap();
    assert_eq!(result, SimResult::Invalid);

    let child = search
        .root()
        .children()
        .iter()
        .find(|c| c.get_move() == retake)
        .unwrap();
    assert!(!child.is_valid());

    // Selection never offers the dead child again.
    for _ in 0..20 {
        let mut sim_state = state.clone();
        search.play_simulation(&mut sim_state, search.root()).unwrap();
        if let Some(next) = search.root().uct_select_child(Color::White, 1.5) {
            assert_ne!(next.get_move(), retake);
        }
    }
}

#[test]
fn kill_superkos_marks_the_retake() {
    let state = state_with_superko_retake();
    let retake = xy(2, 2);
    let root = UctNode::new(Move::PASS, 0.0);
    root.create_children(
        &std::sync::atomic::AtomicUsize::new(1),
        goban_mcts::MAX_TREE_SIZE,
        &state,
        &UniformEvaluator::new(),
    )
    .unwrap();
    root.kill_superkos(&state);

    for child in root.children() {
        if child.get_move() == retake {
            assert!(!child.is_valid());
        } else {
            assert!(child.is_valid(), "{:?} wrongly killed", child.get_move());
        }
    }
}

#[test]
fn tree_size_cap_stops_expansion() {
    let state = GameState::new(5, 0.5);
    let config = quiet().with_visit_limit(50).with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);
    search.set_max_tree_size(1);

    let mv = search
        .think(Color::Black, &state, PassFlags::NORESIGN)
        .unwrap();
    assert!(state.is_legal(mv));

    // The explicit root expansion is the only one: 1 + 26 children.
    assert!(search.node_count() <= 27);
    // The retained subtree is a childless leaf.
    assert_eq!(search.root().count_nodes(), 1);
}

#[test]
fn parallel_playout_limit_overshoot_is_bounded() {
    let threads = 4;
    let state = GameState::new(5, 0.5);
    let config = quiet()
        .with_threads(threads)
        .with_playout_limit(1000)
        .with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    let mv = search
        .think(Color::Black, &state, PassFlags::NORESIGN)
        .unwrap();
    assert!(state.is_legal(mv));

    let playouts = search.playouts();
    assert!(playouts >= 1000, "stopped early at {playouts}");
    assert!(
        playouts <= 1000 + threads as u32,
        "overshoot too large: {playouts}"
    );
}

#[test]
fn ponder_leaves_a_consistent_tree() {
    let state = GameState::new(5, 0.5);
    let config = quiet().with_threads(4).with_visit_limit(500).with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    // Simulated "input pending" probe: fires after a while.
    let polls = AtomicU32::new(0);
    search
        .ponder(&state, || polls.fetch_add(1, Ordering::Relaxed) >= 200)
        .unwrap();

    // All in-flight accounting has been unwound.
    assert_no_virtual_loss(search.root());
    assert_visit_consistency(search.root());
    // Every valid playout reached the root exactly once.
    assert_eq!(search.root().get_visits(), search.playouts());
}

#[test]
fn think_reuses_the_pondered_tree() {
    let state = GameState::new(5, 0.5);
    let config = quiet().with_visit_limit(200).with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    let polls = AtomicU32::new(0);
    search
        .ponder(&state, || polls.fetch_add(1, Ordering::Relaxed) >= 50)
        .unwrap();
    let pondered_visits = search.root().get_visits();
    assert!(pondered_visits > 0);

    let mv = search
        .think(Color::Black, &state, PassFlags::NORESIGN)
        .unwrap();
    assert!(state.is_legal(mv));
    // The pondered statistics were kept, not rebuilt.
    assert!(search.root_state().get_movenum() == 1);
}

#[test]
fn think_advances_the_root_state() {
    let state = GameState::new(5, 0.5);
    let config = quiet().with_visit_limit(100).with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    let mv = search
        .think(Color::Black, &state, PassFlags::NORESIGN)
        .unwrap();
    assert!(state.is_legal(mv));
    assert_eq!(search.root_state().get_movenum(), 1);
    assert_eq!(search.root_state().get_last_move(), Some(mv));
    assert_eq!(search.root_state().to_move(), Color::White);
}

#[test]
fn consecutive_thinks_play_a_game_opening() {
    let state = GameState::new(5, 0.5);
    let config = quiet().with_visit_limit(60).with_tt_size(0);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    let mut game = state;
    for _ in 0..6 {
        let color = game.to_move();
        let mv = search.think(color, &game, PassFlags::NORESIGN).unwrap();
        if mv.is_pass() {
            game.play_pass();
        } else {
            game.play_move(mv).unwrap();
        }
        if game.get_passes() >= 2 {
            break;
        }
    }
    assert!(game.get_movenum() >= 2);
}

#[test]
fn invalid_simulations_are_not_playouts() {
    let state = state_with_superko_retake();
    let retake = xy(2, 2);
    let search = UctSearch::new(
        state.clone(),
        HotMoveEvaluator { hot: retake },
        quiet(),
    );

    let mut sim_state = state.clone();
    search.play_simulation(&mut sim_state, search.root()).unwrap();
    let mut sim_state = state.clone();
    let invalid = search.play_simulation(&mut sim_state, search.root()).unwrap();
    assert_eq!(invalid, SimResult::Invalid);
    // The aborted simulation left no playout behind: the caller is the
    // one that counts valid results, and this one was not valid.
    assert!(!invalid.is_valid());
}

#[test]
fn transposition_table_shares_statistics_between_orders() {
    // Two searches on positions reached by transposed move orders hit
    // the same table slots; correctness holds either way, so just check
    // a full think with the table on stays consistent.
    let state = GameState::new(5, 0.5);
    let config = quiet().with_threads(2).with_visit_limit(300);
    let mut search = UctSearch::new(state.clone(), UniformEvaluator::new(), config);

    let mv = search
        .think(Color::Black, &state, PassFlags::NORESIGN)
        .unwrap();
    assert!(state.is_legal(mv));
    assert_no_virtual_loss(search.root());
}
