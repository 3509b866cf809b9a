//! Vertical shooter: clear each wave's kill objective before its timer runs out.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::{Tone, Waveform};
use crate::config::DefenderTuning;
use crate::engine::{Deferred, FrameContext, Game};
use crate::entity::{Lives, Position, Rect};
use crate::error::GameResult;
use crate::input::{Action, InputState};
use crate::renderer::{Color, Surface, TextAlign};

const SHOT_TONE: Tone = Tone::new(440.0, 0.1, Waveform::Square);
const ENEMY_SHOT_TONE: Tone = Tone::new(150.0, 0.1, Waveform::Square);
const KILL_TONE: Tone = Tone::new(400.0, 0.2, Waveform::Sine);
const HIT_TONE: Tone = Tone::new(300.0, 0.3, Waveform::Sawtooth);
const WAVE_TONE: Tone = Tone::new(800.0, 0.4, Waveform::Sine);
const TIMEOUT_TONE: Tone = Tone::new(200.0, 0.5, Waveform::Square);

/// Enemies below this line wrap back above the top
const WRAP_BELOW: f64 = 50.0;
/// Projectiles this far outside the surface are discarded
const PROJECTILE_SLACK: f64 = 10.0;
const ENEMY_HALF_SIZE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyClass {
    Basic,
    Fighter,
    Boss,
}

impl EnemyClass {
    pub fn health(&self) -> u32 {
        match self {
            EnemyClass::Basic => 1,
            EnemyClass::Fighter => 2,
            EnemyClass::Boss => 3,
        }
    }

    pub fn points(&self) -> u64 {
        match self {
            EnemyClass::Basic => 100,
            EnemyClass::Fighter => 200,
            EnemyClass::Boss => 300,
        }
    }

    /// Chance to fire each time the shot countdown runs out.
    pub fn shoot_chance(&self, wave: u32) -> f64 {
        if wave <= 1 {
            return match self {
                EnemyClass::Basic => 0.03,
                _ => 0.05,
            };
        }
        match self {
            EnemyClass::Basic => 0.08,
            EnemyClass::Fighter => 0.15,
            EnemyClass::Boss => 0.25,
        }
    }

    fn color(&self) -> Color {
        match self {
            EnemyClass::Basic => Color::rgb(0x22, 0xC5, 0x5E),
            EnemyClass::Fighter => Color::rgb(0xF5, 0x9E, 0x0B),
            EnemyClass::Boss => Color::rgb(0xEF, 0x44, 0x44),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enemy {
    pub position: Position,
    pub class: EnemyClass,
    pub health: u32,
    pub speed: f64,
    /// Ticks until the next shot attempt
    pub shoot_timer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub position: Position,
    /// Signed vertical speed, negative travels up
    pub speed: f64,
    pub owner: Owner,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explosion {
    pub position: Position,
    pub timer: u32,
}

pub struct DefenderGame {
    tuning: DefenderTuning,
    width: f64,
    height: f64,
    rng: StdRng,
    pub player: Position,
    pub player_speed: f64,
    pub projectiles: Vec<Projectile>,
    pub enemies: Vec<Enemy>,
    pub explosions: Vec<Explosion>,
    pub enemy_bullet_speed: f64,
    pub shoot_cooldown: u32,
    pub wave: u32,
    pub enemies_killed: u32,
    pub wave_objective: u32,
    pub wave_timer: u32,
    pub max_wave_time: u32,
    pub invulnerable: u32,
    pub lives: Lives,
    pub score: u64,
    pub state: GameState,
}

impl DefenderGame {
    pub fn new(width: f64, height: f64, tuning: DefenderTuning, seed: u64) -> Self {
        let mut game = Self {
            player: Position::new(width / 2.0, height - 50.0),
            player_speed: tuning.player_speed,
            enemy_bullet_speed: tuning.enemy_bullet_speed,
            max_wave_time: tuning.wave_ticks,
            lives: Lives::new(tuning.lives),
            tuning,
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            projectiles: Vec::new(),
            enemies: Vec::new(),
            explosions: Vec::new(),
            shoot_cooldown: 0,
            wave: 1,
            enemies_killed: 0,
            wave_objective: 0,
            wave_timer: 0,
            invulnerable: 0,
            score: 0,
            state: GameState::Playing,
        };
        game.initialize_wave();
        game
    }

    pub fn tuning(&self) -> &DefenderTuning {
        &self.tuning
    }

    pub fn player_start(&self) -> Position {
        Position::new(self.width / 2.0, self.height - 50.0)
    }

    pub fn player_bullets(&self) -> usize {
        self.projectiles
            .iter()
            .filter(|p| p.owner == Owner::Player)
            .count()
    }

    pub fn initialize_wave(&mut self) {
        self.enemies.clear();
        self.enemies_killed = 0;
        self.wave_timer = self.max_wave_time;
        self.wave_objective = self.tuning.wave_objective(self.wave);
        self.spawn_initial_enemies();
        log::debug!(
            "defender: wave {} needs {} kills in {} ticks",
            self.wave,
            self.wave_objective,
            self.wave_timer
        );
    }

    fn spawn_initial_enemies(&mut self) {
        for _ in 0..self.tuning.initial_enemies(self.wave) {
            self.spawn_enemy();
        }
    }

    fn pick_class(&mut self) -> EnemyClass {
        if self.wave == 1 {
            return EnemyClass::Basic;
        }
        let roll: f64 = self.rng.gen();
        if self.wave <= 3 {
            if roll < 0.7 {
                EnemyClass::Basic
            } else {
                EnemyClass::Fighter
            }
        } else if roll < 0.5 {
            EnemyClass::Basic
        } else if roll < 0.85 {
            EnemyClass::Fighter
        } else {
            EnemyClass::Boss
        }
    }

    fn entry_position(&mut self) -> Position {
        let x = self.rng.gen_range(ENEMY_HALF_SIZE..self.width - ENEMY_HALF_SIZE);
        let y = -50.0 - self.rng.gen_range(0.0..100.0);
        Position::new(x, y)
    }

    fn spawn_enemy(&mut self) {
        let class = self.pick_class();
        let position = self.entry_position();
        let shoot_timer = self.rng.gen_range(100..350);
        self.enemies.push(Enemy {
            position,
            class,
            health: class.health(),
            speed: self.tuning.enemy_speed(self.wave),
            shoot_timer,
        });
    }

    fn award(&mut self, ctx: &mut FrameContext<'_>, points: u64) {
        self.score += points;
        ctx.report_score(self.score);
    }

    fn update_player(&mut self, input: &InputState, ctx: &mut FrameContext<'_>) {
        let m = self.tuning.edge_margin;
        let vertical = self.player_speed * self.tuning.vertical_factor;

        if input.is_active(Action::Left) {
            self.player.x = (self.player.x - self.player_speed).max(m);
        }
        if input.is_active(Action::Right) {
            self.player.x = (self.player.x + self.player_speed).min(self.width - m);
        }
        if input.is_active(Action::Up) {
            self.player.y = (self.player.y - vertical).max(m);
        }
        if input.is_active(Action::Down) {
            self.player.y = (self.player.y + vertical).min(self.height - m);
        }

        if input.is_active(Action::Shoot)
            && self.shoot_cooldown == 0
            && self.player_bullets() < self.tuning.max_player_bullets
        {
            self.projectiles.push(Projectile {
                position: Position::new(self.player.x, self.player.y - 15.0),
                speed: -self.tuning.bullet_speed,
                owner: Owner::Player,
            });
            self.shoot_cooldown = self.tuning.shoot_cooldown;
            ctx.play(SHOT_TONE);
        }
    }

    fn update_projectiles(&mut self) {
        let (top, bottom) = (-PROJECTILE_SLACK, self.height + PROJECTILE_SLACK);
        self.projectiles.retain_mut(|p| {
            p.position.y += p.speed;
            p.position.y > top && p.position.y < bottom
        });
    }

    fn update_enemies(&mut self, ctx: &mut FrameContext<'_>) {
        if self.enemies.len() < self.tuning.max_enemies(self.wave)
            && self.rng.gen_bool(self.tuning.spawn_chance(self.wave))
        {
            self.spawn_enemy();
        }

        let phase = ctx.now_ms() * 0.0008;
        let bullet_speed = self.enemy_bullet_speed
            + if self.wave > 2 {
                self.tuning.late_wave_bullet_bonus
            } else {
                0.0
            };

        for i in 0..self.enemies.len() {
            let mut enemy = self.enemies[i];
            enemy.position.x += (phase + enemy.position.x * 0.01).sin() * enemy.speed * 0.7;
            enemy.position.y += enemy.speed * 0.6;

            // Leaving through the bottom is not a kill
            if enemy.position.y > self.height + WRAP_BELOW {
                enemy.position = self.entry_position();
                enemy.health = enemy.class.health();
            }

            enemy.shoot_timer = enemy.shoot_timer.saturating_sub(1);
            if enemy.shoot_timer == 0 {
                if self.rng.gen_bool(enemy.class.shoot_chance(self.wave)) {
                    self.projectiles.push(Projectile {
                        position: Position::new(enemy.position.x, enemy.position.y + 20.0),
                        speed: bullet_speed,
                        owner: Owner::Enemy,
                    });
                    ctx.play(ENEMY_SHOT_TONE);
                }
                enemy.shoot_timer = self.rng.gen_range(80..260);
            }
            self.enemies[i] = enemy;
        }
    }

    fn update_explosions(&mut self) {
        self.explosions.retain_mut(|e| {
            e.timer = e.timer.saturating_sub(1);
            e.timer > 0
        });
    }

    fn check_player_hits(&mut self, ctx: &mut FrameContext<'_>) {
        let reach = self.tuning.bullet_hit_distance;
        let mut i = self.projectiles.len();
        while i > 0 {
            i -= 1;
            let shot = self.projectiles[i];
            if shot.owner != Owner::Player {
                continue;
            }
            let Some(j) = self
                .enemies
                .iter()
                .rposition(|e| e.position.distance_to(shot.position) < reach)
            else {
                continue;
            };

            self.projectiles.remove(i);
            self.enemies[j].health = self.enemies[j].health.saturating_sub(1);
            if self.enemies[j].health == 0 {
                let enemy = self.enemies.remove(j);
                self.award(ctx, enemy.class.points());
                self.enemies_killed += 1;
                self.explosions.push(Explosion {
                    position: enemy.position,
                    timer: self.tuning.kill_explosion_ticks,
                });
                ctx.play(KILL_TONE);
            }
        }
    }

    fn check_enemy_hits(&mut self, ctx: &mut FrameContext<'_>) {
        if self.invulnerable > 0 {
            return;
        }
        let hb = self.tuning.player_hitbox;
        let player = self.player;
        let hit = self.projectiles.iter().rposition(|p| {
            p.owner == Owner::Enemy
                && (p.position.x - player.x).abs() <= hb
                && (p.position.y - player.y).abs() <= hb
        });
        let Some(i) = hit else {
            return;
        };

        self.projectiles.remove(i);
        self.lives.lose();
        self.invulnerable = self.tuning.hit_invulnerable_ticks;
        self.explosions.push(Explosion {
            position: player,
            timer: self.tuning.hit_explosion_ticks,
        });
        ctx.play(HIT_TONE);
        ctx.defer(self.tuning.reset_delay_ms, Deferred::ResetPlayer);
        log::debug!("defender: player hit, {} lives left", self.lives.get());
    }

    fn next_wave(&mut self, ctx: &mut FrameContext<'_>) {
        let time_bonus = (self.wave_timer / 10) as u64 * self.tuning.time_bonus;
        self.award(ctx, self.tuning.wave_bonus * self.wave as u64 + time_bonus);

        self.wave += 1;
        ctx.report_level(self.wave);

        if self.wave % 2 == 0 {
            let t = &self.tuning;
            self.enemy_bullet_speed =
                (self.enemy_bullet_speed + t.enemy_bullet_step).min(t.max_enemy_bullet_speed);
            self.player_speed = (self.player_speed + t.player_speed_step).min(t.max_player_speed);
            self.max_wave_time = self
                .max_wave_time
                .saturating_sub(t.wave_ticks_step)
                .max(t.min_wave_ticks);
        }

        ctx.play(WAVE_TONE);
        self.initialize_wave();
    }

    fn fail_wave(&mut self, ctx: &mut FrameContext<'_>) {
        self.lives.lose();
        self.invulnerable = self.tuning.timeout_invulnerable_ticks;
        ctx.play(TIMEOUT_TONE);
        log::debug!(
            "defender: wave {} timed out with {}/{} kills",
            self.wave,
            self.enemies_killed,
            self.wave_objective
        );
        if self.lives.is_exhausted() {
            return;
        }

        self.wave_timer = self.max_wave_time;
        self.enemies_killed = 0;
        self.enemies.clear();
        self.projectiles.retain(|p| p.owner == Owner::Player);
        self.spawn_initial_enemies();
    }
}

impl Game for DefenderGame {
    fn name(&self) -> &'static str {
        "defender"
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()> {
        if self.state != GameState::Playing {
            return Ok(());
        }

        self.update_player(ctx.input(), ctx);
        self.update_projectiles();
        self.update_enemies(ctx);
        self.update_explosions();
        self.check_player_hits(ctx);
        self.check_enemy_hits(ctx);

        self.shoot_cooldown = self.shoot_cooldown.saturating_sub(1);
        self.invulnerable = self.invulnerable.saturating_sub(1);
        self.wave_timer = self.wave_timer.saturating_sub(1);

        // A met objective wins even when the timer expires on the same tick.
        if self.enemies_killed >= self.wave_objective {
            self.next_wave(ctx);
        } else if self.wave_timer == 0 {
            self.fail_wave(ctx);
        }

        if self.lives.is_exhausted() {
            self.state = GameState::Over;
            ctx.report_game_over(self.score, self.wave);
        }
        Ok(())
    }

    fn render(&self, surface: &mut dyn Surface) -> GameResult<()> {
        surface.clear(Color::rgb(0x00, 0x00, 0x11))?;

        for i in 0..30u32 {
            let x = (i * 47) as f64 % self.width;
            let y = (i * 31) as f64 % self.height;
            surface.fill_rect(Rect::new(x, y, 2.0, 2.0), Color::WHITE.with_alpha(0x40))?;
        }

        // Blink while invulnerable
        if self.invulnerable == 0 || (self.invulnerable / 5) % 2 == 0 {
            let p = self.player;
            surface.fill_rect(Rect::new(p.x - 15.0, p.y - 10.0, 30.0, 20.0), Color::rgb(0x3B, 0x82, 0xF6))?;
            surface.fill_rect(Rect::new(p.x - 3.0, p.y - 18.0, 6.0, 8.0), Color::WHITE)?;
        }

        for enemy in &self.enemies {
            let e = enemy.position;
            surface.fill_rect(
                Rect::new(e.x - ENEMY_HALF_SIZE, e.y - ENEMY_HALF_SIZE, ENEMY_HALF_SIZE * 2.0, ENEMY_HALF_SIZE * 2.0),
                enemy.class.color(),
            )?;
        }

        for shot in &self.projectiles {
            let color = match shot.owner {
                Owner::Player => Color::rgb(0xFA, 0xCC, 0x15),
                Owner::Enemy => Color::rgb(0xF4, 0x3F, 0x5E),
            };
            surface.fill_rect(Rect::new(shot.position.x - 2.0, shot.position.y - 5.0, 4.0, 10.0), color)?;
        }

        for explosion in &self.explosions {
            let radius = 5.0 + explosion.timer as f64;
            surface.fill_circle(explosion.position, radius, Color::rgb(0xFF, 0x88, 0x00).with_alpha(0xB0))?;
        }

        let hud = Color::WHITE;
        surface.fill_text(&format!("Score: {}", self.score), Position::new(10.0, 25.0), 16.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Wave: {}", self.wave), Position::new(150.0, 25.0), 16.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Lives: {}", self.lives.get()), Position::new(250.0, 25.0), 16.0, TextAlign::Left, hud)?;
        surface.fill_text(
            &format!("Kills: {}/{}", self.enemies_killed, self.wave_objective),
            Position::new(350.0, 25.0),
            16.0,
            TextAlign::Left,
            hud,
        )?;

        let seconds = (self.wave_timer as f64 / 60.0).ceil();
        let time_color = if seconds <= 10.0 {
            Color::rgb(0xEF, 0x44, 0x44)
        } else {
            hud
        };
        surface.fill_text(
            &format!("Time: {}s", seconds),
            Position::new(self.width - 10.0, 25.0),
            16.0,
            TextAlign::Right,
            time_color,
        )?;
        Ok(())
    }

    fn score(&self) -> u64 {
        self.score
    }

    fn level(&self) -> u32 {
        self.wave
    }

    fn lives(&self) -> u32 {
        self.lives.get()
    }

    fn is_over(&self) -> bool {
        self.state == GameState::Over
    }

    fn run_deferred(&mut self, task: Deferred) {
        if task == Deferred::ResetPlayer {
            self.player = self.player_start();
        }
    }
}
