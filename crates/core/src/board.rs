use crate::error::BoardError;
use crate::moves::{Color, Move};
use crate::time_control::TimeControl;
use crate::zobrist::{zobrist_keys, MAX_SIZE};

/// A full game position: board grid, side to move, komi, pass and move
/// counters, simple-ko point, and the zobrist history used for
/// positional-superko detection.
///
/// Stone placement handles captures and rejects suicide and immediate ko
/// retakes. Positional superko is *not* rejected by `play_move`; the
/// search discovers it lazily through `superko()`, which checks the
/// current stone configuration against every earlier one in the game.
#[derive(Debug, Clone)]
pub struct GameState {
    size: usize,
    board: Vec<i8>,
    to_move: Color,
    komi: f32,
    handicap: u32,
    movenum: u32,
    passes: u32,
    ko_point: Option<usize>,
    last_move: Option<Move>,
    /// Zobrist hash over stones only.
    stone_hash: u64,
    /// Stone hashes after every action, oldest first. The last entry is
    /// the current position.
    position_history: Vec<u64>,
    /// Moves played so far, for walking a retained search tree forward.
    moves: Vec<Move>,
    time: TimeControl,
}

impl GameState {
    pub fn new(size: usize, komi: f32) -> Self {
        assert!(size >= 2 && size <= MAX_SIZE, "unsupported board size {size}");
        let mut time = TimeControl::default();
        time.set_boardsize(size);
        let mut state = Self {
            size,
            board: vec![0; size * size],
            to_move: Color::Black,
            komi,
            handicap: 0,
            movenum: 0,
            passes: 0,
            ko_point: None,
            last_move: None,
            stone_hash: 0,
            position_history: Vec::new(),
            moves: Vec::new(),
            time,
        };
        state.position_history.push(state.stone_hash);
        state
    }

    #[inline]
    pub fn boardsize(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn komi(&self) -> f32 {
        self.komi
    }

    pub fn set_komi(&mut self, komi: f32) {
        self.komi = komi;
    }

    #[inline]
    pub fn to_move(&self) -> Color {
        self.to_move
    }

    pub fn set_to_move(&mut self, color: Color) {
        self.to_move = color;
    }

    #[inline]
    pub fn get_passes(&self) -> u32 {
        self.passes
    }

    pub fn set_passes(&mut self, passes: u32) {
        self.passes = passes;
    }

    #[inline]
    pub fn get_movenum(&self) -> u32 {
        self.movenum
    }

    #[inline]
    pub fn get_handicap(&self) -> u32 {
        self.handicap
    }

    pub fn set_handicap(&mut self, handicap: u32) {
        self.handicap = handicap;
    }

    #[inline]
    pub fn get_last_move(&self) -> Option<Move> {
        self.last_move
    }

    /// All moves played from the initial position.
    pub fn history(&self) -> &[Move] {
        &self.moves
    }

    pub fn get_timecontrol(&self) -> &TimeControl {
        &self.time
    }

    pub fn get_timecontrol_mut(&mut self) -> &mut TimeControl {
        &mut self.time
    }

    pub fn start_clock(&mut self, color: Color) {
        self.time.start_clock(color);
    }

    pub fn stop_clock(&mut self, color: Color) {
        self.time.stop_clock(color);
    }

    /// Position hash covering stones, side to move, pass count, and the
    /// ko point. Identifies the position for caching and subtree reuse.
    pub fn hash(&self) -> u64 {
        let keys = zobrist_keys();
        let mut hash = self.stone_hash ^ keys.passes(self.passes);
        if self.to_move == Color::White {
            hash ^= keys.white_to_move();
        }
        if let Some(ko) = self.ko_point {
            hash ^= keys.ko(ko);
        }
        hash
    }

    /// True iff the current stone configuration repeats an earlier one.
    pub fn superko(&self) -> bool {
        self.position_history
            .iter()
            .rev()
            .skip(1)
            .any(|&h| h == self.stone_hash)
    }

    pub fn move_to_text(&self, mv: Move) -> String {
        mv.to_text(self.size)
    }

    #[inline]
    fn stone_at(&self, vertex: usize) -> i8 {
        self.board[vertex]
    }

    fn for_each_neighbor(&self, vertex: usize, mut f: impl FnMut(usize)) {
        let (x, y) = (vertex % self.size, vertex / self.size);
        if x > 0 {
            f(vertex - 1);
        }
        if x + 1 < self.size {
            f(vertex + 1);
        }
        if y > 0 {
            f(vertex - self.size);
        }
        if y + 1 < self.size {
            f(vertex + self.size);
        }
    }

    /// Flood-fill the group containing `vertex` into `group`.
    fn collect_group(&self, vertex: usize, group: &mut Vec<usize>) {
        group.clear();
        let color = self.board[vertex];
        if color == 0 {
            return;
        }
        let mut visited = vec![false; self.board.len()];
        let mut stack = vec![vertex];
        visited[vertex] = true;
        while let Some(v) = stack.pop() {
            group.push(v);
            self.for_each_neighbor(v, |n| {
                if !visited[n] && self.board[n] == color {
                    visited[n] = true;
                    stack.push(n);
                }
            });
        }
    }

    fn group_has_liberties(&self, group: &[usize]) -> bool {
        for &v in group {
            let mut found = false;
            self.for_each_neighbor(v, |n| {
                if self.board[n] == 0 {
                    found = true;
                }
            });
            if found {
                return true;
            }
        }
        false
    }

    fn count_group_liberties(&self, group: &[usize]) -> usize {
        let mut seen = vec![false; self.board.len()];
        let mut count = 0;
        for &v in group {
            self.for_each_neighbor(v, |n| {
                if self.board[n] == 0 && !seen[n] {
                    seen[n] = true;
                    count += 1;
                }
            });
        }
        count
    }

    fn set_stone(&mut self, vertex: usize, color: Color) {
        self.board[vertex] = color.stone();
        self.stone_hash ^= zobrist_keys().stone(color.index(), vertex);
    }

    fn clear_stone(&mut self, vertex: usize) {
        let stone = self.board[vertex];
        let color_index = if stone == 1 { 0 } else { 1 };
        self.board[vertex] = 0;
        self.stone_hash ^= zobrist_keys().stone(color_index, vertex);
    }

    fn remove_group(&mut self, group: &[usize]) {
        for &v in group {
            self.clear_stone(v);
        }
    }

    /// Whether `mv` can be played by the side to move. Pass is always
    /// legal; vertex moves must land on an empty point, must not retake
    /// the ko, and must not be suicide.
    pub fn is_legal(&self, mv: Move) -> bool {
        if mv.is_pass() {
            return true;
        }
        let Some(v) = mv.index() else {
            return false;
        };
        if v >= self.board.len() || self.board[v] != 0 {
            return false;
        }
        if self.ko_point == Some(v) {
            return false;
        }

        // Any empty neighbor means the stone has a liberty.
        let mut has_empty = false;
        self.for_each_neighbor(v, |n| {
            if self.board[n] == 0 {
                has_empty = true;
            }
        });
        if has_empty {
            return true;
        }

        let player = self.to_move.stone();
        let mut group = Vec::new();
        let mut neighbors = Vec::with_capacity(4);
        self.for_each_neighbor(v, |n| neighbors.push(n));

        // A capture gives the stone the captured vertex as a liberty.
        for &n in &neighbors {
            if self.board[n] == -player {
                self.collect_group(n, &mut group);
                let liberties = self.count_group_liberties(&group);
                if liberties == 1 {
                    return true;
                }
            }
        }

        // Connecting to a friendly group that keeps a liberty elsewhere.
        for &n in &neighbors {
            if self.board[n] == player {
                self.collect_group(n, &mut group);
                let mut other_liberty = false;
                for &g in &group {
                    self.for_each_neighbor(g, |l| {
                        if self.board[l] == 0 && l != v {
                            other_liberty = true;
                        }
                    });
                }
                if other_liberty {
                    return true;
                }
            }
        }

        false
    }

    /// All legal moves for the side to move, pass included (last).
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(self.board.len() + 1);
        for v in 0..self.board.len() {
            let mv = Move::from_index(v);
            if self.board[v] == 0 && self.is_legal(mv) {
                moves.push(mv);
            }
        }
        moves.push(Move::PASS);
        moves
    }

    /// Place a stone for the side to move, resolving captures. Rejects
    /// occupied vertices, immediate ko retakes, and suicide.
    pub fn play_move(&mut self, mv: Move) -> Result<(), BoardError> {
        let v = mv.index().ok_or(BoardError::NotAVertex(mv))?;
        if v >= self.board.len() {
            return Err(BoardError::OutOfBounds(mv));
        }
        if self.board[v] != 0 {
            return Err(BoardError::Occupied(mv));
        }
        if self.ko_point == Some(v) {
            return Err(BoardError::Ko(mv));
        }

        let color = self.to_move;
        let opponent = -color.stone();
        self.set_stone(v, color);

        // Capture adjacent opponent groups left without liberties.
        let mut neighbors = Vec::with_capacity(4);
        self.for_each_neighbor(v, |n| neighbors.push(n));
        let mut group = Vec::new();
        let mut captured = 0usize;
        let mut last_captured = 0usize;
        for &n in &neighbors {
            if self.stone_at(n) == opponent {
                self.collect_group(n, &mut group);
                if !self.group_has_liberties(&group) {
                    captured += group.len();
                    last_captured = group[0];
                    self.remove_group(&group);
                }
            }
        }

        if captured == 0 {
            self.collect_group(v, &mut group);
            if !self.group_has_liberties(&group) {
                self.clear_stone(v);
                return Err(BoardError::Suicide(mv));
            }
        }

        // Single-stone capture by a lone stone with one liberty opens a ko.
        self.ko_point = None;
        if captured == 1 {
            self.collect_group(v, &mut group);
            if group.len() == 1 && self.count_group_liberties(&group) == 1 {
                self.ko_point = Some(last_captured);
            }
        }

        self.passes = 0;
        self.movenum += 1;
        self.to_move = color.other();
        self.last_move = Some(mv);
        self.moves.push(mv);
        self.position_history.push(self.stone_hash);
        Ok(())
    }

    pub fn play_pass(&mut self) {
        self.ko_point = None;
        self.passes += 1;
        self.movenum += 1;
        self.to_move = self.to_move.other();
        self.last_move = Some(Move::PASS);
        self.moves.push(Move::PASS);
        self.position_history.push(self.stone_hash);
    }

    /// Final score by Tromp-Taylor area counting, minus komi. Positive
    /// means Black wins.
    pub fn final_score(&self) -> f32 {
        let mut black = 0.0f32;
        let mut white = self.komi;
        let mut visited = vec![false; self.board.len()];

        for v in 0..self.board.len() {
            if visited[v] {
                continue;
            }
            match self.board[v] {
                1 => black += 1.0,
                -1 => white += 1.0,
                _ => {
                    let (count, borders_black, borders_white) =
                        self.flood_territory(v, &mut visited);
                    if borders_black && !borders_white {
                        black += count as f32;
                    } else if borders_white && !borders_black {
                        white += count as f32;
                    }
                }
            }
        }

        black - white
    }

    fn flood_territory(&self, start: usize, visited: &mut [bool]) -> (usize, bool, bool) {
        let mut count = 0;
        let mut borders_black = false;
        let mut borders_white = false;
        let mut stack = vec![start];

        while let Some(v) = stack.pop() {
            match self.board[v] {
                1 => {
                    borders_black = true;
                    continue;
                }
                -1 => {
                    borders_white = true;
                    continue;
                }
                _ => {}
            }
            if visited[v] {
                continue;
            }
            visited[v] = true;
            count += 1;
            self.for_each_neighbor(v, |n| stack.push(n));
        }

        (count, borders_black, borders_white)
    }
}
