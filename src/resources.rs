// resources.rs - Global game resources (singleton data)
// Resources exist once for the entire game, unlike components which are per-entity.

use bevy::prelude::*;

/// Everything the blocks, enemies, pickups and UI push into during a run.
///
/// Lives carry over between levels; the counters and the clock are reset by
/// [`GameSession::start_level`].
#[derive(Resource, Debug, Clone)]
pub struct GameSession {
    pub starting_lives: u32,
    pub lives: u32,
    pub coins: u32,
    pub red_coins: u32,
    pub bricks: u32,
    pub golden_blocks: u32,
    pub level: String,
    pub time_limit: f32,
    pub time_left: f32,
    pub timer_running: bool,
    /// Clock time spent on this level, across time-out restarts.
    pub elapsed: f32,
    pub totals: LevelTotals,
}

/// How many of each collectible the current level contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelTotals {
    pub coins: u32,
    pub red_coins: u32,
    pub bricks: u32,
    pub golden_blocks: u32,
}

impl LevelTotals {
    fn sum(&self) -> u32 {
        self.coins + self.red_coins + self.bricks + self.golden_blocks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeLost {
    Remaining(u32),
    GameOver,
}

/// End-of-level numbers shown on the summary panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSummary {
    pub coins: (u32, u32),
    pub red_coins: (u32, u32),
    pub bricks: (u32, u32),
    pub golden_blocks: (u32, u32),
    pub time_taken: f32,
    pub percentage: u32,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(3)
    }
}

impl GameSession {
    pub fn new(starting_lives: u32) -> Self {
        Self {
            starting_lives,
            lives: starting_lives,
            coins: 0,
            red_coins: 0,
            bricks: 0,
            golden_blocks: 0,
            level: String::new(),
            time_limit: 0.0,
            time_left: 0.0,
            timer_running: false,
            elapsed: 0.0,
            totals: LevelTotals::default(),
        }
    }

    pub fn start_level(&mut self, name: &str, time_limit: f32, totals: LevelTotals) {
        self.level = name.to_string();
        self.coins = 0;
        self.red_coins = 0;
        self.bricks = 0;
        self.golden_blocks = 0;
        self.time_limit = time_limit;
        self.time_left = time_limit;
        self.timer_running = true;
        self.elapsed = 0.0;
        self.totals = totals;
    }

    pub fn add_life(&mut self, amount: u32) {
        self.lives += amount;
    }

    pub fn add_block(&mut self) {
        self.bricks += 1;
    }

    pub fn add_golden_block(&mut self) {
        self.golden_blocks += 1;
    }

    pub fn add_coin(&mut self, amount: u32) {
        self.coins += amount;
    }

    pub fn add_red_coin(&mut self) {
        self.red_coins += 1;
    }

    pub fn stop_timer(&mut self) {
        self.timer_running = false;
    }

    pub fn restart_timer(&mut self) {
        self.time_left = self.time_limit;
        self.timer_running = true;
    }

    /// Counts the clock down. Returns true on the tick it runs out.
    pub fn tick_timer(&mut self, delta_secs: f32) -> bool {
        if !self.timer_running || self.time_left <= 0.0 {
            return false;
        }
        self.elapsed += delta_secs.min(self.time_left);
        self.time_left = (self.time_left - delta_secs).max(0.0);
        self.time_left <= 0.0
    }

    /// Whole seconds left, rounded up so the HUD shows 1 until the very end.
    pub fn seconds_left(&self) -> u32 {
        self.time_left.ceil() as u32
    }

    /// Power-up capsule fill: share of the level's red coins collected.
    pub fn capsule_fill(&self) -> f32 {
        if self.totals.red_coins == 0 {
            return 0.0;
        }
        (self.red_coins as f32 / self.totals.red_coins as f32).clamp(0.0, 1.0)
    }

    pub fn lose_life(&mut self) -> LifeLost {
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            LifeLost::GameOver
        } else {
            LifeLost::Remaining(self.lives)
        }
    }

    pub fn reset_lives(&mut self) {
        self.lives = self.starting_lives;
    }

    pub fn summary(&self) -> LevelSummary {
        let totals = self.totals;
        // Coin blocks can pay out more coins than the level has lying around,
        // so each category is capped at its total before it counts.
        let collected = self.coins.min(totals.coins)
            + self.red_coins.min(totals.red_coins)
            + self.bricks.min(totals.bricks)
            + self.golden_blocks.min(totals.golden_blocks);

        let percentage = if totals.sum() == 0 {
            100
        } else {
            collected * 100 / totals.sum()
        };

        LevelSummary {
            coins: (self.coins, totals.coins),
            red_coins: (self.red_coins, totals.red_coins),
            bricks: (self.bricks, totals.bricks),
            golden_blocks: (self.golden_blocks, totals.golden_blocks),
            time_taken: self.elapsed,
            percentage,
        }
    }
}
