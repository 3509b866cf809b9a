//! Gameplay tuning.
//!
//! Every constant the games use lives here with its stock value as `Default`.
//! `ArcadeConfig` loads partial JSON overrides on top of those defaults.

use serde::{Deserialize, Serialize};

use crate::collector::CollectorGame;
use crate::crossing::CrossingGame;
use crate::defender::DefenderGame;
use crate::engine::Game;
use crate::error::ConfigError;

/// Default playfield size in surface pixels
pub const DEFAULT_WIDTH: f64 = 800.0;
pub const DEFAULT_HEIGHT: f64 = 600.0;

/// Pac-Man style maze game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorTuning {
    pub lives: u32,
    /// Layout grid; ghosts step one cell per move
    pub grid: f64,
    /// Player displacement per tick
    pub player_speed: f64,
    /// Distance the player keeps from the surface edges
    pub edge_margin: f64,
    /// Half-width of the square ghost pen in the middle of the field
    pub pen_half_size: f64,
    pub dot_spacing: f64,
    /// Dots start this far from the edges
    pub dot_edge_inset: f64,
    /// No dots closer than this to the pen center (per axis)
    pub dot_pen_clearance: f64,
    pub pickup_radius: f64,
    pub capture_radius: f64,
    pub dot_points: u64,
    pub power_points: u64,
    pub ghost_points: u64,
    /// Ticks ghosts stay vulnerable after a power pellet
    pub vulnerable_ticks: u32,
    /// Ticks before the first ghost leaves the pen
    pub ghost_release_ticks: u32,
    /// Extra ticks between consecutive ghost releases
    pub ghost_release_stagger: u32,
    pub max_ghosts: usize,
    /// Milliseconds between ghost steps at speed 1.0
    pub ghost_step_ms: f64,
    pub ghost_first_level_speed: f64,
    pub ghost_base_speed: f64,
    pub ghost_speed_per_level: f64,
    pub chase_radius: f64,
    pub chase_chance: f64,
    pub flee_radius: f64,
    pub flee_chance: f64,
    pub wander_chance: f64,
    /// Level timer in seconds at level 1
    pub base_seconds: f64,
    pub seconds_lost_per_level: f64,
    pub min_level_seconds: f64,
    pub dot_seconds: f64,
    pub power_seconds: f64,
    pub death_seconds: f64,
    /// Timer floor after a ghost contact
    pub min_seconds_after_death: f64,
    pub level_bonus: u64,
    pub bonus_per_second: u64,
    /// Delay before ghosts are scattered back to their corners after a death
    pub restagger_delay_ms: f64,
}

impl Default for CollectorTuning {
    fn default() -> Self {
        Self {
            lives: 5,
            grid: 40.0,
            player_speed: 1.0,
            edge_margin: 15.0,
            pen_half_size: 30.0,
            dot_spacing: 20.0,
            dot_edge_inset: 60.0,
            dot_pen_clearance: 35.0,
            pickup_radius: 25.0,
            capture_radius: 20.0,
            dot_points: 10,
            power_points: 50,
            ghost_points: 200,
            vulnerable_ticks: 600,
            ghost_release_ticks: 180,
            ghost_release_stagger: 60,
            max_ghosts: 3,
            ghost_step_ms: 150.0,
            ghost_first_level_speed: 0.1,
            ghost_base_speed: 0.3,
            ghost_speed_per_level: 0.05,
            chase_radius: 200.0,
            chase_chance: 0.4,
            flee_radius: 150.0,
            flee_chance: 0.6,
            wander_chance: 0.15,
            base_seconds: 60.0,
            seconds_lost_per_level: 5.0,
            min_level_seconds: 20.0,
            dot_seconds: 1.0,
            power_seconds: 3.0,
            death_seconds: 3.0,
            min_seconds_after_death: 10.0,
            level_bonus: 1000,
            bonus_per_second: 10,
            restagger_delay_ms: 100.0,
        }
    }
}

impl CollectorTuning {
    /// Seconds on the clock at the start of `level`.
    pub fn level_seconds(&self, level: u32) -> f64 {
        let lost = self.seconds_lost_per_level * level.saturating_sub(1) as f64;
        (self.base_seconds - lost).max(self.min_level_seconds)
    }

    pub fn ghost_count(&self, level: u32) -> usize {
        (level as usize + 1).min(self.max_ghosts)
    }

    pub fn ghost_speed(&self, level: u32) -> f64 {
        if level <= 1 {
            self.ghost_first_level_speed
        } else {
            self.ghost_base_speed + self.ghost_speed_per_level * level as f64
        }
    }
}

/// Galaga style shooter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenderTuning {
    pub lives: u32,
    pub player_speed: f64,
    pub max_player_speed: f64,
    /// Vertical speed as a fraction of horizontal speed
    pub vertical_factor: f64,
    pub edge_margin: f64,
    pub bullet_speed: f64,
    pub shoot_cooldown: u32,
    pub max_player_bullets: usize,
    pub enemy_bullet_speed: f64,
    pub max_enemy_bullet_speed: f64,
    /// Growth of enemy bullet speed every other wave
    pub enemy_bullet_step: f64,
    /// Growth of player speed every other wave
    pub player_speed_step: f64,
    /// Added to enemy bullets from wave 3 on
    pub late_wave_bullet_bonus: f64,
    pub bullet_hit_distance: f64,
    /// Half-size of the box around the player that enemy bullets hit
    pub player_hitbox: f64,
    pub hit_invulnerable_ticks: u32,
    pub timeout_invulnerable_ticks: u32,
    pub wave_ticks: u32,
    pub min_wave_ticks: u32,
    pub wave_ticks_step: u32,
    pub wave_bonus: u64,
    /// Bonus per ten ticks left on the wave timer
    pub time_bonus: u64,
    pub kill_explosion_ticks: u32,
    pub hit_explosion_ticks: u32,
    pub reset_delay_ms: f64,
}

impl Default for DefenderTuning {
    fn default() -> Self {
        Self {
            lives: 5,
            player_speed: 4.0,
            max_player_speed: 6.0,
            vertical_factor: 0.7,
            edge_margin: 25.0,
            bullet_speed: 7.0,
            shoot_cooldown: 15,
            max_player_bullets: 10,
            enemy_bullet_speed: 1.5,
            max_enemy_bullet_speed: 3.0,
            enemy_bullet_step: 0.25,
            player_speed_step: 0.1,
            late_wave_bullet_bonus: 0.3,
            bullet_hit_distance: 25.0,
            player_hitbox: 15.0,
            hit_invulnerable_ticks: 90,
            timeout_invulnerable_ticks: 120,
            wave_ticks: 3600,
            min_wave_ticks: 2400,
            wave_ticks_step: 300,
            wave_bonus: 500,
            time_bonus: 50,
            kill_explosion_ticks: 20,
            hit_explosion_ticks: 30,
            reset_delay_ms: 100.0,
        }
    }
}

impl DefenderTuning {
    /// Kills needed to clear `wave`.
    pub fn wave_objective(&self, wave: u32) -> u32 {
        (6 + 2 * wave).max(8)
    }

    pub fn initial_enemies(&self, wave: u32) -> usize {
        (5 + wave as usize).min(8)
    }

    pub fn max_enemies(&self, wave: u32) -> usize {
        (6 + wave as usize).min(12)
    }

    pub fn enemy_speed(&self, wave: u32) -> f64 {
        (0.4 + 0.15 * wave as f64).max(0.5)
    }

    pub fn spawn_chance(&self, wave: u32) -> f64 {
        if wave <= 1 {
            0.015
        } else {
            0.025
        }
    }
}

/// Frogger style lane crossing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingTuning {
    pub lives: u32,
    pub max_lives: u32,
    pub lane_height: f64,
    pub player_size: f64,
    /// Ticks between two steps while a direction is held
    pub move_cooldown: u32,
    pub time_ticks: u32,
    pub goal_slots: usize,
    pub goal_first_x: f64,
    pub goal_spacing: f64,
    pub goal_capture_radius: f64,
    pub goal_points: u64,
    pub progress_points: u64,
    pub level_points: u64,
    /// Per-level speed growth applied on top of a fresh layout
    pub difficulty_step: f64,
    pub car_width: f64,
    pub truck_width: f64,
    pub truck_chance: f64,
    pub vehicle_height: f64,
    pub log_width: f64,
    pub turtle_width: f64,
    pub log_chance: f64,
    pub platform_height: f64,
}

impl Default for CrossingTuning {
    fn default() -> Self {
        Self {
            lives: 8,
            max_lives: 8,
            lane_height: 50.0,
            player_size: 30.0,
            move_cooldown: 35,
            time_ticks: 3600,
            goal_slots: 5,
            goal_first_x: 50.0,
            goal_spacing: 140.0,
            goal_capture_radius: 50.0,
            goal_points: 200,
            progress_points: 10,
            level_points: 500,
            difficulty_step: 0.05,
            car_width: 50.0,
            truck_width: 80.0,
            truck_chance: 0.3,
            vehicle_height: 35.0,
            log_width: 140.0,
            turtle_width: 100.0,
            log_chance: 0.8,
            platform_height: 30.0,
        }
    }
}

/// Names accepted by `ArcadeConfig::build_game`.
pub const GAME_NAMES: &[&str] = &["collector", "defender", "crossing"];

/// All tuning for one arcade session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub collector: CollectorTuning,
    pub defender: DefenderTuning,
    pub crossing: CrossingTuning,
    /// Fixed RNG seed; a fresh one per game when unset
    pub seed: Option<u64>,
}

impl ArcadeConfig {
    /// Parse JSON overrides. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ArcadeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the named game on a `width` x `height` playfield.
    pub fn build_game(
        &self,
        name: &str,
        width: f64,
        height: f64,
    ) -> Result<Box<dyn Game>, ConfigError> {
        let seed = self.seed.unwrap_or_else(rand::random::<u64>);
        log::debug!("building {} with seed {}", name, seed);
        let game: Box<dyn Game> = match name {
            "collector" => Box::new(CollectorGame::new(width, height, self.collector.clone(), seed)),
            "defender" => Box::new(DefenderGame::new(width, height, self.defender.clone(), seed)),
            "crossing" => Box::new(CrossingGame::new(width, height, self.crossing.clone(), seed)),
            other => {
                return Err(ConfigError::Invalid {
                    field: "game",
                    reason: format!("unknown game {:?}, expected one of {:?}", other, GAME_NAMES),
                })
            }
        };
        Ok(game)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("collector.grid", self.collector.grid)?;
        positive("collector.player_speed", self.collector.player_speed)?;
        positive("collector.dot_spacing", self.collector.dot_spacing)?;
        positive("collector.ghost_step_ms", self.collector.ghost_step_ms)?;
        positive("collector.ghost_first_level_speed", self.collector.ghost_first_level_speed)?;
        positive("collector.ghost_base_speed", self.collector.ghost_base_speed)?;
        nonzero("collector.lives", self.collector.lives)?;

        positive("defender.player_speed", self.defender.player_speed)?;
        positive("defender.bullet_speed", self.defender.bullet_speed)?;
        nonzero("defender.lives", self.defender.lives)?;
        nonzero("defender.wave_ticks", self.defender.wave_ticks)?;
        if self.defender.min_wave_ticks > self.defender.wave_ticks {
            return Err(ConfigError::Invalid {
                field: "defender.min_wave_ticks",
                reason: format!(
                    "{} exceeds wave_ticks {}",
                    self.defender.min_wave_ticks, self.defender.wave_ticks
                ),
            });
        }

        positive("crossing.lane_height", self.crossing.lane_height)?;
        positive("crossing.player_size", self.crossing.player_size)?;
        nonzero("crossing.lives", self.crossing.lives)?;
        nonzero("crossing.time_ticks", self.crossing.time_ticks)?;
        if self.crossing.player_size >= self.crossing.lane_height {
            return Err(ConfigError::Invalid {
                field: "crossing.player_size",
                reason: "player must fit inside one lane".into(),
            });
        }
        if self.crossing.lives > self.crossing.max_lives {
            return Err(ConfigError::Invalid {
                field: "crossing.lives",
                reason: format!("more than max_lives {}", self.crossing.max_lives),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn nonzero(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Invalid {
            field,
            reason: "must be at least 1".into(),
        })
    } else {
        Ok(())
    }
}
