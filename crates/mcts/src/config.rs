/// Configuration for the search driver.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of search threads, including the driver thread.
    pub num_threads: usize,

    /// Playout limit per search; 0 means unlimited.
    pub max_playouts: u32,

    /// Root visit limit per search; 0 means unlimited.
    pub max_visits: u32,

    /// For the first N moves of the game, the move played is sampled
    /// proportionally to visit counts instead of taking the maximum.
    pub random_cnt: u32,

    /// Mix Dirichlet noise into the root priors (for self-play).
    pub noise: bool,

    /// Suppress periodic analysis and stats output.
    pub quiet: bool,

    /// Resign threshold in percent; -1 selects the default of 10,
    /// 0 disables resignation entirely.
    pub resign_pct: i32,

    /// Disable the pass sanity heuristics (for reinforcement learning).
    pub dumb_pass: bool,

    /// PUCT exploration constant.
    pub c_puct: f32,

    /// Transposition table size in entries; 0 disables the table.
    pub tt_size: usize,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n.max(1);
        self
    }

    pub fn with_playout_limit(mut self, n: u32) -> Self {
        self.max_playouts = n;
        self
    }

    pub fn with_visit_limit(mut self, n: u32) -> Self {
        self.max_visits = n;
        self
    }

    pub fn with_random_cnt(mut self, n: u32) -> Self {
        self.random_cnt = n;
        self
    }

    pub fn with_noise(mut self, noise: bool) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_resign_pct(mut self, pct: i32) -> Self {
        self.resign_pct = pct;
        self
    }

    pub fn with_dumb_pass(mut self, dumb: bool) -> Self {
        self.dumb_pass = dumb;
        self
    }

    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    pub fn with_tt_size(mut self, entries: usize) -> Self {
        self.tt_size = entries;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_threads: 2,
            max_playouts: 0,
            max_visits: 0,
            random_cnt: 0,
            noise: false,
            quiet: false,
            resign_pct: -1,
            dumb_pass: false,
            c_puct: 1.5,
            tt_size: 500_000,
        }
    }
}
