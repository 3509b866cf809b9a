//! Maze collector: eat every coin before the clock runs out while ghosts roam.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::audio::{Melody, Tone, Waveform};
use crate::config::CollectorTuning;
use crate::engine::{Deferred, FrameContext, Game};
use crate::entity::{Direction, Lives, Position, Rect};
use crate::error::GameResult;
use crate::input::InputState;
use crate::renderer::{Color, Surface, TextAlign};

const DOT_TONE: Tone = Tone::new(800.0, 0.1, Waveform::Square);
const POWER_TONE: Tone = Tone::new(220.0, 0.3, Waveform::Sine);
const CAPTURE_TONE: Tone = Tone::new(1000.0, 0.2, Waveform::Sine);
const DEATH_TONE: Tone = Tone::new(150.0, 0.5, Waveform::Sawtooth);
const LEVEL_TONE: Tone = Tone::new(660.0, 0.4, Waveform::Triangle);

/// Distance (per axis) at which a wall point blocks a ghost step
const WALL_REACH: f64 = 10.0;
/// Extra slack around the pen inside which the player may keep moving along its wall
const PEN_EDGE_SLACK: f64 = 20.0;
const UNSTICK_NUDGE: f64 = 5.0;

const GHOST_COLORS: [Color; 4] = [
    Color::rgb(0xFF, 0x00, 0x00),
    Color::rgb(0xFF, 0xB8, 0xFF),
    Color::rgb(0x00, 0xFF, 0xFF),
    Color::rgb(0xFF, 0xB8, 0x52),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ghost {
    pub position: Position,
    pub direction: Direction,
    pub vulnerable: bool,
    pub speed: f64,
    /// Ticks until the ghost may leave confinement
    pub release_in: u32,
    /// Wall-clock time of the last step, throttles movement independent of frame rate
    pub last_move_ms: Option<f64>,
}

impl Ghost {
    pub fn is_released(&self) -> bool {
        self.release_in == 0
    }

    fn current_speed(&self) -> f64 {
        if self.vulnerable {
            self.speed / 2.0
        } else {
            self.speed
        }
    }
}

pub struct CollectorGame {
    tuning: CollectorTuning,
    width: f64,
    height: f64,
    rng: StdRng,
    pub player: Position,
    pub facing: Option<Direction>,
    pub ghosts: Vec<Ghost>,
    pub dots: Vec<Position>,
    pub power_pellets: Vec<Position>,
    pub walls: Vec<Position>,
    pub lives: Lives,
    pub score: u64,
    pub level: u32,
    pub vulnerable_timer: u32,
    /// Seconds
    pub time_left: f64,
    pub max_time: f64,
    pub state: GameState,
    blocked_frames: u32,
}

impl CollectorGame {
    pub fn new(width: f64, height: f64, tuning: CollectorTuning, seed: u64) -> Self {
        let mut game = Self {
            lives: Lives::new(tuning.lives),
            tuning,
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            player: Position::default(),
            facing: None,
            ghosts: Vec::new(),
            dots: Vec::new(),
            power_pellets: Vec::new(),
            walls: Vec::new(),
            score: 0,
            level: 1,
            vulnerable_timer: 0,
            time_left: 0.0,
            max_time: 0.0,
            state: GameState::Playing,
            blocked_frames: 0,
        };
        game.initialize_level();
        game
    }

    pub fn tuning(&self) -> &CollectorTuning {
        &self.tuning
    }

    pub fn pen_center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }

    /// Where the player appears at the start of a level and after a death.
    pub fn player_start(&self) -> Position {
        self.snap(Position::new(200.0, 200.0))
    }

    /// Scatter corner for ghost `index`, far from the player start.
    pub fn ghost_corner(&self, index: usize) -> Position {
        let safe = self.tuning.grid * 6.0;
        match index {
            0 => Position::new(self.width - safe, safe),
            1 => Position::new(safe, self.height - safe),
            _ => Position::new(self.width - safe, self.height - safe),
        }
    }

    pub fn initialize_level(&mut self) {
        self.max_time = self.tuning.level_seconds(self.level);
        self.time_left = self.max_time;
        self.player = self.player_start();
        self.facing = None;
        self.blocked_frames = 0;
        self.vulnerable_timer = 0;

        self.walls = self.pen_walls();
        self.dots = self.layout_dots();

        let inset = self.tuning.grid * 2.0;
        self.power_pellets = vec![
            Position::new(inset, inset),
            Position::new(self.width - inset, inset),
            Position::new(inset, self.height - inset),
            Position::new(self.width - inset, self.height - inset),
        ];

        let speed = self.tuning.ghost_speed(self.level);
        let mut ghosts = Vec::new();
        for i in 0..self.tuning.ghost_count(self.level) {
            let direction = Direction::ALL[self.rng.gen_range(0..4)];
            ghosts.push(Ghost {
                position: self.ghost_corner(i),
                direction,
                vulnerable: false,
                speed,
                release_in: self.release_delay(i),
                last_move_ms: None,
            });
        }
        self.ghosts = ghosts;

        log::debug!(
            "collector: level {} with {} coins and {} ghosts",
            self.level,
            self.dots.len(),
            self.ghosts.len()
        );
    }

    fn release_delay(&self, index: usize) -> u32 {
        self.tuning.ghost_release_ticks + self.tuning.ghost_release_stagger * index as u32
    }

    fn snap(&self, p: Position) -> Position {
        let grid = self.tuning.grid;
        let m = self.tuning.edge_margin;
        Position::new((p.x / grid).round() * grid, (p.y / grid).round() * grid).clamped(
            m,
            self.width - m,
            m,
            self.height - m,
        )
    }

    // Outline of the pen with an opening in the top wall.
    fn pen_walls(&self) -> Vec<Position> {
        let c = self.pen_center();
        let half = self.tuning.pen_half_size;
        let step = 15.0;
        let mut walls = Vec::new();

        let mut x = c.x - half;
        while x <= c.x + half {
            walls.push(Position::new(x, c.y + half));
            if (x - c.x).abs() > step {
                walls.push(Position::new(x, c.y - half));
            }
            x += step;
        }
        let mut y = c.y - half + step;
        while y <= c.y + half {
            walls.push(Position::new(c.x - half, y));
            walls.push(Position::new(c.x + half, y));
            y += step;
        }
        walls
    }

    fn layout_dots(&self) -> Vec<Position> {
        let t = &self.tuning;
        let c = self.pen_center();
        let start = self.player_start();
        let mut dots = Vec::new();

        let mut x = t.dot_edge_inset;
        while x < self.width - t.dot_edge_inset {
            let mut y = t.dot_edge_inset;
            while y < self.height - t.dot_edge_inset {
                let dot = Position::new(x, y);
                let in_pen = (x - c.x).abs() < t.dot_pen_clearance
                    && (y - c.y).abs() < t.dot_pen_clearance;
                if !in_pen && dot.distance_to(start) > t.grid * 2.0 {
                    dots.push(dot);
                }
                y += t.dot_spacing;
            }
            x += t.dot_spacing;
        }
        dots
    }

    fn is_wall(&self, p: Position) -> bool {
        self.walls
            .iter()
            .any(|w| (w.x - p.x).abs() < WALL_REACH && (w.y - p.y).abs() < WALL_REACH)
    }

    /// Whether a ghost may stand on `p`.
    fn is_open(&self, p: Position) -> bool {
        let grid = self.tuning.grid;
        p.x >= grid
            && p.x < self.width - grid
            && p.y >= grid
            && p.y < self.height - grid
            && !self.is_wall(p)
    }

    fn award(&mut self, ctx: &mut FrameContext<'_>, points: u64) {
        self.score += points;
        ctx.report_score(self.score);
    }

    fn update_player(&mut self, input: &InputState) {
        let Some(direction) = input.primary_direction() else {
            self.blocked_frames = 0;
            return;
        };
        self.facing = Some(direction);

        let margin = self.tuning.edge_margin;
        let (max_x, max_y) = (self.width - margin, self.height - margin);
        let old = self.player;
        let next = old.moved(direction, self.tuning.player_speed);

        let mut can_x = next.x >= margin && next.x <= max_x;
        let mut can_y = next.y >= margin && next.y <= max_y;

        // Only block entering the pen from a distance; hugging its wall stays free.
        let c = self.pen_center();
        let half = self.tuning.pen_half_size;
        let inside_x = (next.x - c.x).abs() < half;
        let inside_y = (next.y - c.y).abs() < half;
        let mut pen_blocked = false;
        if inside_x && inside_y {
            if (old.x - c.x).abs() >= half + PEN_EDGE_SLACK {
                can_x = false;
                pen_blocked = true;
            }
            if (old.y - c.y).abs() >= half + PEN_EDGE_SLACK {
                can_y = false;
                pen_blocked = true;
            }
        }

        if can_x {
            self.player.x = next.x.clamp(margin, max_x);
        }
        if can_y {
            self.player.y = next.y.clamp(margin, max_y);
        }

        if self.player == old {
            self.blocked_frames += 1;
        } else {
            self.blocked_frames = 0;
        }

        if self.blocked_frames >= 2 && pen_blocked {
            self.player = self
                .player
                .moved(direction.opposite(), UNSTICK_NUDGE)
                .clamped(margin, max_x, margin, max_y);
            self.blocked_frames = 0;
            log::debug!("collector: nudged player away from the pen");
        }
    }

    fn update_ghosts(&mut self, now_ms: f64) {
        let grid = self.tuning.grid;

        for i in 0..self.ghosts.len() {
            let mut ghost = self.ghosts[i];
            if !ghost.is_released() {
                ghost.release_in -= 1;
                self.ghosts[i] = ghost;
                continue;
            }

            let interval = self.tuning.ghost_step_ms / ghost.current_speed();
            if let Some(last) = ghost.last_move_ms {
                if now_ms - last < interval {
                    continue;
                }
            }
            ghost.last_move_ms = Some(now_ms);

            let to_player = (self.player.x - ghost.position.x, self.player.y - ghost.position.y);
            let distance = ghost.position.manhattan_to(self.player);
            let toward = if to_player.0.abs() > to_player.1.abs() {
                if to_player.0 < 0.0 { Direction::Left } else { Direction::Right }
            } else if to_player.1 < 0.0 {
                Direction::Up
            } else {
                Direction::Down
            };

            if !ghost.vulnerable
                && distance < self.tuning.chase_radius
                && self.rng.gen_bool(self.tuning.chase_chance)
            {
                ghost.direction = toward;
            } else if ghost.vulnerable
                && distance < self.tuning.flee_radius
                && self.rng.gen_bool(self.tuning.flee_chance)
            {
                ghost.direction = toward.opposite();
            } else if self.rng.gen_bool(self.tuning.wander_chance) {
                ghost.direction = Direction::ALL[self.rng.gen_range(0..4)];
            }

            let mut next = ghost.position.moved(ghost.direction, grid);
            if !self.is_open(next) {
                let legal: Vec<Direction> = Direction::ALL
                    .into_iter()
                    .filter(|d| self.is_open(ghost.position.moved(*d, grid)))
                    .collect();
                if let Some(d) = legal.choose(&mut self.rng) {
                    ghost.direction = *d;
                    next = ghost.position.moved(*d, grid);
                }
            }
            if self.is_open(next) {
                ghost.position = next;
            }
            self.ghosts[i] = ghost;
        }
    }

    fn update_vulnerable_timer(&mut self) {
        if self.vulnerable_timer > 0 {
            self.vulnerable_timer -= 1;
            if self.vulnerable_timer == 0 {
                for ghost in &mut self.ghosts {
                    ghost.vulnerable = false;
                }
            }
        }
    }

    fn collect_pickups(&mut self, ctx: &mut FrameContext<'_>) {
        let radius = self.tuning.pickup_radius;
        let player = self.player;

        let before = self.dots.len();
        self.dots.retain(|dot| player.distance_to(*dot) >= radius);
        for _ in self.dots.len()..before {
            self.award(ctx, self.tuning.dot_points);
            self.time_left += self.tuning.dot_seconds;
            ctx.play(DOT_TONE);
        }

        let before = self.power_pellets.len();
        self.power_pellets.retain(|pellet| player.distance_to(*pellet) >= radius);
        for _ in self.power_pellets.len()..before {
            self.award(ctx, self.tuning.power_points);
            self.time_left += self.tuning.power_seconds;
            self.vulnerable_timer = self.tuning.vulnerable_ticks;
            for ghost in &mut self.ghosts {
                ghost.vulnerable = true;
            }
            ctx.play(POWER_TONE);
        }
    }

    fn check_ghost_contact(&mut self, ctx: &mut FrameContext<'_>) {
        let home = self.snap(self.pen_center());

        for i in 0..self.ghosts.len() {
            let ghost = self.ghosts[i];
            if !ghost.is_released()
                || ghost.position.distance_to(self.player) >= self.tuning.capture_radius
            {
                continue;
            }

            if ghost.vulnerable {
                self.award(ctx, self.tuning.ghost_points);
                let g = &mut self.ghosts[i];
                g.position = home;
                g.vulnerable = false;
                g.release_in = self.tuning.ghost_release_ticks;
                ctx.play(CAPTURE_TONE);
                log::debug!("collector: captured ghost {}", i);
                continue;
            }

            self.lives.lose();
            ctx.play(DEATH_TONE);
            log::debug!("collector: caught by ghost {}, {} lives left", i, self.lives.get());
            if !self.lives.is_exhausted() {
                self.player = self.player_start();
                self.facing = None;
                self.time_left = (self.time_left - self.tuning.death_seconds)
                    .max(self.tuning.min_seconds_after_death);
                for j in 0..self.ghosts.len() {
                    self.ghosts[j].release_in = self.tuning.ghost_release_ticks;
                }
                ctx.defer(self.tuning.restagger_delay_ms, Deferred::RestaggerPursuers);
            }
            // One death per frame.
            return;
        }
    }

    fn restagger_ghosts(&mut self) {
        for i in 0..self.ghosts.len() {
            self.ghosts[i].position = self.ghost_corner(i);
        }
    }

    fn ghost_color(&self, index: usize, ghost: &Ghost) -> Color {
        let base = if ghost.vulnerable {
            Color::rgb(0x63, 0x66, 0xF1)
        } else {
            GHOST_COLORS[index % GHOST_COLORS.len()]
        };
        if ghost.is_released() {
            base
        } else {
            base.with_alpha(0x4D)
        }
    }
}

impl Game for CollectorGame {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()> {
        if self.state != GameState::Playing {
            return Ok(());
        }

        self.time_left = (self.time_left - 1.0 / 60.0).max(0.0);
        self.update_player(ctx.input());
        self.update_ghosts(ctx.now_ms());
        self.update_vulnerable_timer();
        self.collect_pickups(ctx);
        self.check_ghost_contact(ctx);

        if self.lives.is_exhausted() {
            self.state = GameState::Over;
            ctx.report_game_over(self.score, self.level);
            return Ok(());
        }

        if self.dots.is_empty() {
            let bonus = self.tuning.level_bonus
                + self.tuning.bonus_per_second * self.time_left.floor() as u64;
            self.award(ctx, bonus);
            self.level += 1;
            ctx.report_level(self.level);
            ctx.play(LEVEL_TONE);
            self.initialize_level();
        } else if self.time_left <= 0.0 {
            self.lives.lose();
            ctx.play(DEATH_TONE);
            log::debug!("collector: out of time, {} lives left", self.lives.get());
            if self.lives.is_exhausted() {
                self.state = GameState::Over;
                ctx.report_game_over(self.score, self.level);
            } else {
                self.initialize_level();
            }
        }
        Ok(())
    }

    fn render(&self, surface: &mut dyn Surface) -> GameResult<()> {
        surface.clear(Color::rgb(0x1E, 0x1B, 0x4B))?;

        for wall in &self.walls {
            surface.fill_rect(
                Rect::new(wall.x - 6.0, wall.y - 6.0, 12.0, 12.0),
                Color::rgb(0x47, 0x55, 0x69),
            )?;
        }
        for dot in &self.dots {
            surface.fill_circle(*dot, 6.0, Color::rgb(0xF7, 0x93, 0x1A))?;
        }
        for pellet in &self.power_pellets {
            surface.fill_circle(*pellet, 10.0, Color::rgb(0x8B, 0x5C, 0xF6))?;
        }

        surface.fill_circle(self.player, 14.0, Color::rgb(0x3B, 0x82, 0xF6))?;
        if let Some(facing) = self.facing {
            surface.fill_circle(self.player.moved(facing, 8.0), 3.0, Color::WHITE)?;
        }

        for (i, ghost) in self.ghosts.iter().enumerate() {
            surface.fill_circle(ghost.position, 15.0, self.ghost_color(i, ghost))?;
            if !ghost.is_released() {
                let seconds = (ghost.release_in as f64 / 60.0).ceil();
                surface.fill_text(
                    &seconds.to_string(),
                    Position::new(ghost.position.x, ghost.position.y - 20.0),
                    12.0,
                    TextAlign::Center,
                    Color::WHITE.with_alpha(0xB3),
                )?;
            }
        }

        let hud = Color::rgb(0xE5, 0xE7, 0xEB);
        surface.fill_text(&format!("Score: {}", self.score), Position::new(10.0, 25.0), 16.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Level: {}", self.level), Position::new(150.0, 25.0), 16.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Lives: {}", self.lives.get()), Position::new(250.0, 25.0), 16.0, TextAlign::Left, hud)?;

        let time_color = if self.time_left <= 10.0 {
            Color::rgb(0xEF, 0x44, 0x44)
        } else if self.time_left <= 20.0 {
            Color::rgb(0xF5, 0x9E, 0x0B)
        } else {
            Color::rgb(0x10, 0xB9, 0x81)
        };
        surface.fill_text(
            &format!("Time: {}s", self.time_left.ceil()),
            Position::new(350.0, 25.0),
            16.0,
            TextAlign::Left,
            time_color,
        )?;
        surface.fill_text(
            &format!("Coins Left: {}", self.dots.len()),
            Position::new(10.0, 50.0),
            16.0,
            TextAlign::Left,
            Color::rgb(0x63, 0x66, 0xF1),
        )?;
        if self.vulnerable_timer > 0 {
            surface.fill_text(
                &format!("Power Mode: {}s", (self.vulnerable_timer as f64 / 60.0).ceil()),
                Position::new(10.0, 75.0),
                16.0,
                TextAlign::Left,
                Color::rgb(0x8B, 0x5C, 0xF6),
            )?;
        }
        Ok(())
    }

    fn score(&self) -> u64 {
        self.score
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn lives(&self) -> u32 {
        self.lives.get()
    }

    fn is_over(&self) -> bool {
        self.state == GameState::Over
    }

    fn run_deferred(&mut self, task: Deferred) {
        if task == Deferred::RestaggerPursuers {
            self.restagger_ghosts();
        }
    }

    fn exclusive_direction(&self) -> bool {
        true
    }

    fn steer(&mut self, direction: Option<Direction>) {
        if let Some(direction) = direction {
            self.facing = Some(direction);
            self.player = self.snap(self.player);
        }
    }

    fn melody(&self) -> Option<Melody> {
        Some(Melody::Crypto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameEvent;
    use crate::input::Action;
    use crate::renderer::HeadlessSurface;

    fn game() -> CollectorGame {
        CollectorGame::new(800.0, 600.0, CollectorTuning::default(), 42)
    }

    fn step(
        game: &mut CollectorGame,
        input: &InputState,
        now_ms: f64,
    ) -> (Vec<GameEvent>, Vec<(f64, Deferred)>) {
        let mut ctx = FrameContext::new(input, now_ms);
        game.update(&mut ctx).unwrap();
        (ctx.events().to_vec(), ctx.deferred().to_vec())
    }

    /// Put ghost 0 on the player, released and unable to step this frame.
    fn ghost_on_player(game: &mut CollectorGame, vulnerable: bool) {
        let player = game.player;
        let ghost = &mut game.ghosts[0];
        ghost.position = player;
        ghost.release_in = 0;
        ghost.vulnerable = vulnerable;
        ghost.last_move_ms = Some(0.0);
    }

    #[test]
    fn test_fresh_level_layout() {
        let game = game();
        assert_eq!(game.player, Position::new(200.0, 200.0));
        assert_eq!(game.ghosts.len(), 2);
        assert_eq!(game.power_pellets.len(), 4);
        assert_eq!(game.time_left, 60.0);
        assert!(!game.dots.is_empty());

        let c = game.pen_center();
        for dot in &game.dots {
            assert!(dot.distance_to(game.player) > 80.0);
            assert!((dot.x - c.x).abs() >= 35.0 || (dot.y - c.y).abs() >= 35.0);
        }
        assert!(game.ghosts.iter().all(|g| !g.is_released()));
    }

    #[test]
    fn test_power_pellet_pickup() {
        let mut game = game();
        game.dots = vec![Position::new(700.0, 500.0)];
        game.player = game.power_pellets[0];
        let time_before = game.time_left;
        let input = InputState::new();

        step(&mut game, &input, 0.0);
        assert_eq!(game.score, 50);
        assert!(game.ghosts.iter().all(|g| g.vulnerable));
        assert_eq!(game.power_pellets.len(), 3);
        assert_eq!(game.vulnerable_timer, 600);
        assert!(game.time_left > time_before + 2.9);

        step(&mut game, &input, 16.0);
        assert_eq!(game.score, 50);
        assert_eq!(game.power_pellets.len(), 3);
    }

    #[test]
    fn test_overlapping_dots_all_collected_once() {
        let mut game = game();
        game.dots = vec![
            Position::new(300.0, 300.0),
            Position::new(310.0, 300.0),
            Position::new(700.0, 500.0),
        ];
        game.player = Position::new(305.0, 300.0);
        let input = InputState::new();

        let (events, _) = step(&mut game, &input, 0.0);
        assert_eq!(game.score, 20);
        assert_eq!(game.dots.len(), 1);
        assert_eq!(
            events,
            vec![GameEvent::ScoreChanged(10), GameEvent::ScoreChanged(20)]
        );

        step(&mut game, &input, 16.0);
        assert_eq!(game.score, 20);
    }

    #[test]
    fn test_ghost_contact_costs_life_and_restaggers() {
        let mut game = game();
        game.player = Position::new(400.0, 30.0);
        game.time_left = 30.0;
        ghost_on_player(&mut game, false);

        let (_, deferred) = step(&mut game, &InputState::new(), 0.0);
        assert_eq!(game.lives.get(), 4);
        assert_eq!(game.player, game.player_start());
        assert!(game.time_left < 27.01 && game.time_left > 26.9);
        assert!(game.ghosts.iter().all(|g| !g.is_released()));
        assert_eq!(deferred, vec![(100.0, Deferred::RestaggerPursuers)]);

        game.run_deferred(Deferred::RestaggerPursuers);
        assert_eq!(game.ghosts[0].position, game.ghost_corner(0));
        assert_eq!(game.ghosts[1].position, game.ghost_corner(1));
    }

    #[test]
    fn test_death_time_penalty_has_floor() {
        let mut game = game();
        game.player = Position::new(400.0, 30.0);
        game.time_left = 11.0;
        ghost_on_player(&mut game, false);
        step(&mut game, &InputState::new(), 0.0);
        assert_eq!(game.time_left, 10.0);
    }

    #[test]
    fn test_vulnerable_ghost_is_captured() {
        let mut game = game();
        game.player = Position::new(400.0, 30.0);
        ghost_on_player(&mut game, true);

        step(&mut game, &InputState::new(), 0.0);
        assert_eq!(game.score, 200);
        assert_eq!(game.lives.get(), 5);
        let ghost = game.ghosts[0];
        assert!(!ghost.vulnerable);
        assert!(!ghost.is_released());
        assert!(ghost.position.distance_to(game.pen_center()) < 40.0);
    }

    #[test]
    fn test_confined_ghosts_do_not_move() {
        let mut game = game();
        let start: Vec<Position> = game.ghosts.iter().map(|g| g.position).collect();
        let input = InputState::new();
        for frame in 0..170 {
            step(&mut game, &input, frame as f64 * 16.0);
        }
        let now: Vec<Position> = game.ghosts.iter().map(|g| g.position).collect();
        assert_eq!(start, now);
        assert_eq!(game.ghosts[0].release_in, 10);
        assert_eq!(game.ghosts[1].release_in, 70);
    }

    #[test]
    fn test_released_ghost_steps_on_the_grid_and_stays_in_bounds() {
        let mut game = game();
        game.ghosts[0].release_in = 0;
        game.player = Position::new(60.0, 560.0);
        let input = InputState::new();
        for frame in 0..200 {
            step(&mut game, &input, frame as f64 * 1500.0);
            let g = game.ghosts[0];
            assert!(g.position.x >= 40.0 && g.position.x < 760.0);
            assert!(g.position.y >= 40.0 && g.position.y < 560.0);
        }
    }

    #[test]
    fn test_timer_expiry_restarts_level() {
        let mut game = game();
        game.dots.truncate(3);
        game.time_left = 0.01;

        step(&mut game, &InputState::new(), 0.0);
        assert_eq!(game.lives.get(), 4);
        assert_eq!(game.level, 1);
        assert!(game.dots.len() > 3);
        assert_eq!(game.time_left, 60.0);
    }

    #[test]
    fn test_clearing_coins_advances_level() {
        let mut game = game();
        game.dots = vec![Position::new(205.0, 200.0)];
        game.time_left = 30.5;

        let (events, _) = step(&mut game, &InputState::new(), 0.0);
        assert_eq!(game.level, 2);
        assert_eq!(game.score, 10 + 1000 + 310);
        assert!(events.contains(&GameEvent::LevelChanged(2)));
        assert_eq!(game.ghosts.len(), 3);
        assert_eq!(game.time_left, 55.0);
    }

    #[test]
    fn test_last_life_ends_game_once() {
        let mut game = game();
        game.lives = Lives::new(1);
        game.player = Position::new(400.0, 30.0);
        ghost_on_player(&mut game, false);

        let (events, _) = step(&mut game, &InputState::new(), 0.0);
        assert_eq!(events, vec![GameEvent::GameOver { score: 0, level: 1 }]);
        assert!(game.is_over());

        let (events, _) = step(&mut game, &InputState::new(), 16.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_player_moves_only_while_held() {
        let mut game = game();
        let mut input = InputState::new();
        input.press(Action::Right);
        step(&mut game, &input, 0.0);
        assert_eq!(game.player, Position::new(201.0, 200.0));

        input.release(Action::Right);
        step(&mut game, &input, 16.0);
        assert_eq!(game.player, Position::new(201.0, 200.0));
    }

    fn pen_runner() -> CollectorGame {
        let tuning = CollectorTuning {
            player_speed: 45.0,
            ..CollectorTuning::default()
        };
        let mut game = CollectorGame::new(800.0, 600.0, tuning, 42);
        let c = game.pen_center();
        game.player = Position::new(c.x - 70.0, c.y);
        game
    }

    #[test]
    fn test_player_cannot_jump_into_pen_from_afar() {
        let mut game = pen_runner();
        let c = game.pen_center();
        let mut input = InputState::new();
        input.press(Action::Right);
        step(&mut game, &input, 0.0);
        assert_eq!(game.player, Position::new(c.x - 70.0, c.y));
        assert_eq!(game.blocked_frames, 1);
    }

    #[test]
    fn test_player_pinned_by_pen_is_nudged_away() {
        let mut game = pen_runner();
        let c = game.pen_center();
        let mut input = InputState::new();
        input.press(Action::Right);
        step(&mut game, &input, 0.0);
        step(&mut game, &input, 16.0);
        assert_eq!(game.player, Position::new(c.x - 75.0, c.y));
        assert_eq!(game.blocked_frames, 0);
    }

    #[test]
    fn test_edge_block_does_not_nudge() {
        let mut game = game();
        game.player = Position::new(15.0, 200.0);
        let mut input = InputState::new();
        input.press(Action::Left);
        for frame in 0..4 {
            step(&mut game, &input, frame as f64 * 16.0);
        }
        assert_eq!(game.player, Position::new(15.0, 200.0));
    }

    #[test]
    fn test_joystick_snaps_to_grid() {
        let mut game = game();
        game.player = Position::new(213.0, 187.0);
        game.steer(Some(Direction::Left));
        assert_eq!(game.player, Position::new(200.0, 200.0));
        assert_eq!(game.facing, Some(Direction::Left));

        game.player = Position::new(16.0, 16.0);
        game.steer(Some(Direction::Up));
        assert_eq!(game.player, Position::new(15.0, 15.0));
    }

    #[test]
    fn test_render_shows_hud() {
        let game = game();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        game.render(&mut surface).unwrap();
        assert!(surface.texts().any(|t| t == "Score: 0"));
        assert!(surface.texts().any(|t| t == "Lives: 5"));
        assert!(surface.texts().any(|t| t == "Time: 60s"));
    }

    #[test]
    fn test_plays_its_own_melody() {
        assert_eq!(game().melody(), Some(Melody::Crypto));
    }
}
