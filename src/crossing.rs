//! Lane crossing: hop across traffic and river to fill every goal slot.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::{Melody, Tone, Waveform};
use crate::config::CrossingTuning;
use crate::engine::{FrameContext, Game};
use crate::entity::{Direction, Lives, Position, Rect};
use crate::error::GameResult;
use crate::input::{Action, InputState};
use crate::renderer::{Color, Surface, TextAlign};

const HOP_TONE: Tone = Tone::new(520.0, 0.05, Waveform::Square);
const GOAL_TONE: Tone = Tone::new(1200.0, 0.25, Waveform::Sine);
const DEATH_TONE: Tone = Tone::new(200.0, 0.5, Waveform::Sawtooth);
const LEVEL_TONE: Tone = Tone::new(800.0, 0.3, Waveform::Sine);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    Safe,
    Road,
    Water,
}

impl LaneKind {
    /// Kind of lane `index` counted from the bottom, out of `count` lanes.
    pub fn for_index(index: usize, count: usize) -> LaneKind {
        match index {
            i if i == 0 || i + 1 == count => LaneKind::Safe,
            2..=5 => LaneKind::Road,
            7..=10 => LaneKind::Water,
            _ => LaneKind::Safe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Car,
    Truck,
    Log,
    Turtle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub rect: Rect,
    /// Signed horizontal displacement per tick
    pub speed: f64,
    pub kind: ObstacleKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub top: f64,
    pub kind: LaneKind,
    /// +1 scrolls right, -1 scrolls left
    pub direction: f64,
    pub obstacles: Vec<Obstacle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalSlot {
    pub x: f64,
    pub completed: bool,
}

/// What killed the player this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Death {
    Traffic,
    Drowned,
    OutOfTime,
}

pub struct CrossingGame {
    tuning: CrossingTuning,
    width: f64,
    height: f64,
    rng: StdRng,
    /// Top-left corner of the player box
    pub player: Position,
    pub lanes: Vec<Lane>,
    pub goals: Vec<GoalSlot>,
    pub lives: Lives,
    pub score: u64,
    pub level: u32,
    /// Ticks
    pub time_left: u32,
    pub max_time: u32,
    pub move_cooldown: u32,
    /// Lane and obstacle index of the platform carrying the player this tick
    pub support: Option<(usize, usize)>,
    pub state: GameState,
}

impl CrossingGame {
    pub fn new(width: f64, height: f64, tuning: CrossingTuning, seed: u64) -> Self {
        let mut game = Self {
            lives: Lives::new(tuning.lives),
            max_time: tuning.time_ticks,
            tuning,
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            player: Position::default(),
            lanes: Vec::new(),
            goals: Vec::new(),
            score: 0,
            level: 1,
            time_left: 0,
            move_cooldown: 0,
            support: None,
            state: GameState::Playing,
        };
        game.initialize_level();
        game
    }

    pub fn tuning(&self) -> &CrossingTuning {
        &self.tuning
    }

    /// Centered horizontally, centered vertically in the bottom lane.
    pub fn player_start(&self) -> Position {
        let lh = self.tuning.lane_height;
        let inset = (lh - self.tuning.player_size) / 2.0;
        Position::new(self.width / 2.0, self.height - lh + inset)
    }

    pub fn player_rect(&self) -> Rect {
        let size = self.tuning.player_size;
        Rect::new(self.player.x, self.player.y, size, size)
    }

    /// Lane index (0 at the bottom) under the center of the player box.
    pub fn player_lane(&self) -> usize {
        let center = self.player_rect().center();
        let from_bottom = ((self.height - center.y) / self.tuning.lane_height).floor();
        (from_bottom.max(0.0) as usize).min(self.lanes.len().saturating_sub(1))
    }

    pub fn completed_goals(&self) -> usize {
        self.goals.iter().filter(|g| g.completed).count()
    }

    pub fn initialize_level(&mut self) {
        let lh = self.tuning.lane_height;
        let count = (self.height / lh).floor() as usize;

        let mut lanes = Vec::with_capacity(count);
        for i in 0..count {
            let kind = LaneKind::for_index(i, count);
            let mut lane = Lane {
                top: self.height - (i + 1) as f64 * lh,
                kind,
                direction: if i % 2 == 0 { 1.0 } else { -1.0 },
                obstacles: Vec::new(),
            };
            match kind {
                LaneKind::Road => self.fill_road(&mut lane),
                LaneKind::Water => self.fill_water(&mut lane),
                LaneKind::Safe => {}
            }
            lanes.push(lane);
        }
        self.lanes = lanes;

        self.goals = (0..self.tuning.goal_slots)
            .map(|i| GoalSlot {
                x: self.tuning.goal_first_x + i as f64 * self.tuning.goal_spacing,
                completed: false,
            })
            .collect();

        self.player = self.player_start();
        self.time_left = self.max_time;
        self.move_cooldown = 0;
        self.support = None;
    }

    fn fill_road(&mut self, lane: &mut Lane) {
        let t = self.tuning.clone();
        let count = 2 + self.rng.gen_range(0..2);
        let spacing = self.width / count as f64;
        for i in 0..count {
            let truck = self.rng.gen_bool(t.truck_chance);
            let speed = (0.2 + self.rng.gen::<f64>() * 0.5) * (1.0 + 0.02 * self.level as f64);
            let x = i as f64 * spacing + self.rng.gen::<f64>() * 150.0;
            let width = if truck { t.truck_width } else { t.car_width };
            lane.obstacles.push(Obstacle {
                rect: Rect::new(
                    x,
                    lane.top + (t.lane_height - t.vehicle_height) / 2.0,
                    width,
                    t.vehicle_height,
                ),
                speed: speed * lane.direction,
                kind: if truck { ObstacleKind::Truck } else { ObstacleKind::Car },
            });
        }
    }

    fn fill_water(&mut self, lane: &mut Lane) {
        let t = self.tuning.clone();
        let count = 2 + self.rng.gen_range(0..2);
        let spacing = self.width / count as f64;
        for i in 0..count {
            let log = self.rng.gen_bool(t.log_chance);
            let speed = (0.2 + self.rng.gen::<f64>() * 0.4) * (1.0 + 0.01 * self.level as f64);
            let x = i as f64 * spacing + self.rng.gen::<f64>() * 100.0;
            let width = if log { t.log_width } else { t.turtle_width };
            lane.obstacles.push(Obstacle {
                rect: Rect::new(
                    x,
                    lane.top + (t.lane_height - t.platform_height) / 2.0,
                    width,
                    t.platform_height,
                ),
                speed: speed * lane.direction,
                kind: if log { ObstacleKind::Log } else { ObstacleKind::Turtle },
            });
        }
    }

    fn clamp_player(&mut self) {
        let size = self.tuning.player_size;
        self.player = self
            .player
            .clamped(0.0, self.width - size, 0.0, self.height - size);
    }

    fn award(&mut self, ctx: &mut FrameContext<'_>, points: u64) {
        self.score += points;
        ctx.report_score(self.score);
    }

    fn held_direction(input: &InputState) -> Option<Direction> {
        if input.is_active(Action::Up) || input.is_active(Action::Shoot) {
            Some(Direction::Up)
        } else if input.is_active(Action::Down) {
            Some(Direction::Down)
        } else if input.is_active(Action::Left) {
            Some(Direction::Left)
        } else if input.is_active(Action::Right) {
            Some(Direction::Right)
        } else {
            None
        }
    }

    fn update_player(&mut self, input: &InputState, ctx: &mut FrameContext<'_>) {
        self.move_cooldown = self.move_cooldown.saturating_sub(1);
        if self.move_cooldown > 0 {
            return;
        }
        if let Some(direction) = Self::held_direction(input) {
            self.player = self.player.moved(direction, self.tuning.lane_height);
            self.move_cooldown = self.tuning.move_cooldown;
            self.clamp_player();
            ctx.play(HOP_TONE);
        }
    }

    /// Fill the goal slot the player reached, if any. Returns whether one was filled.
    fn capture_goal(&mut self, ctx: &mut FrameContext<'_>) -> bool {
        if self.player_lane() + 1 != self.lanes.len() {
            return false;
        }
        let radius = self.tuning.goal_capture_radius;
        let x = self.player.x;
        let Some(slot) = self
            .goals
            .iter_mut()
            .find(|g| !g.completed && (x - g.x).abs() < radius)
        else {
            return false;
        };
        slot.completed = true;

        self.award(ctx, self.tuning.goal_points);
        self.player = self.player_start();
        self.time_left = self.max_time;
        self.move_cooldown = 0;
        ctx.play(GOAL_TONE);
        log::debug!("crossing: goal {}/{}", self.completed_goals(), self.goals.len());
        true
    }

    fn move_obstacles(&mut self) {
        let width = self.width;
        for lane in &mut self.lanes {
            for obstacle in &mut lane.obstacles {
                let r = &mut obstacle.rect;
                r.x += obstacle.speed;
                // One belt per lane: leaving one edge re-enters at the other
                let span = width + r.width;
                if obstacle.speed > 0.0 && r.x > width {
                    r.x -= span;
                } else if obstacle.speed < 0.0 && r.x + r.width < 0.0 {
                    r.x += span;
                }
            }
        }
    }

    /// Find the platform under the player in a water lane and ride it.
    /// Returns `true` when the player is in water with nothing to stand on.
    fn carry_player(&mut self) -> bool {
        self.support = None;
        let lane_index = self.player_lane();
        let lane = &self.lanes[lane_index];
        if lane.kind != LaneKind::Water {
            return false;
        }

        let player = self.player_rect();
        let Some(i) = lane.obstacles.iter().position(|o| o.rect.overlaps(&player)) else {
            return true;
        };
        let speed = lane.obstacles[i].speed;
        self.support = Some((lane_index, i));
        self.player.x += speed;
        self.clamp_player();
        false
    }

    fn hit_by_traffic(&self) -> bool {
        let lane = &self.lanes[self.player_lane()];
        let player = self.player_rect();
        lane.kind == LaneKind::Road && lane.obstacles.iter().any(|o| o.rect.overlaps(&player))
    }

    fn die(&mut self, cause: Death, ctx: &mut FrameContext<'_>) {
        self.lives.lose();
        self.player = self.player_start();
        self.time_left = self.max_time;
        self.move_cooldown = 0;
        self.support = None;
        ctx.play(DEATH_TONE);
        log::debug!("crossing: {:?}, {} lives left", cause, self.lives.get());
    }

    fn next_level(&mut self, ctx: &mut FrameContext<'_>) {
        self.level += 1;
        ctx.report_level(self.level);
        self.award(ctx, self.tuning.level_points);
        self.lives.gain(self.tuning.max_lives);
        ctx.play(LEVEL_TONE);

        self.initialize_level();
        let factor = 1.0 + self.tuning.difficulty_step * self.level as f64;
        for lane in &mut self.lanes {
            for obstacle in &mut lane.obstacles {
                obstacle.speed *= factor;
            }
        }
    }
}

impl Game for CrossingGame {
    fn name(&self) -> &'static str {
        "crossing"
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()> {
        if self.state != GameState::Playing {
            return Ok(());
        }

        self.time_left = self.time_left.saturating_sub(1);

        let before = self.player.y;
        self.update_player(ctx.input(), ctx);
        let captured = self.capture_goal(ctx);
        if !captured && self.player.y < before {
            self.award(ctx, self.tuning.progress_points);
        }

        self.move_obstacles();
        let drowning = self.carry_player();

        let death = if self.hit_by_traffic() {
            Some(Death::Traffic)
        } else if drowning {
            Some(Death::Drowned)
        } else if self.time_left == 0 {
            Some(Death::OutOfTime)
        } else {
            None
        };
        if let Some(cause) = death {
            self.die(cause, ctx);
        }

        if self.lives.is_exhausted() {
            self.state = GameState::Over;
            ctx.report_game_over(self.score, self.level);
            return Ok(());
        }

        if self.goals.iter().all(|g| g.completed) {
            self.next_level(ctx);
        }
        Ok(())
    }

    fn render(&self, surface: &mut dyn Surface) -> GameResult<()> {
        surface.clear(Color::BLACK)?;

        for lane in &self.lanes {
            let color = match lane.kind {
                LaneKind::Road => Color::rgb(0x33, 0x33, 0x33),
                LaneKind::Water => Color::rgb(0x00, 0x66, 0xCC),
                LaneKind::Safe => Color::rgb(0x00, 0xCC, 0x66),
            };
            surface.fill_rect(Rect::new(0.0, lane.top, self.width, self.tuning.lane_height), color)?;
            for obstacle in &lane.obstacles {
                let color = match obstacle.kind {
                    ObstacleKind::Car => Color::rgb(0xFF, 0x00, 0x00),
                    ObstacleKind::Truck => Color::rgb(0xFF, 0x44, 0x00),
                    ObstacleKind::Log => Color::rgb(0x8B, 0x45, 0x13),
                    ObstacleKind::Turtle => Color::rgb(0x22, 0x8B, 0x22),
                };
                surface.fill_rect(obstacle.rect, color)?;
            }
        }

        let size = self.tuning.player_size;
        let goal_y = (self.tuning.lane_height - size) / 2.0;
        for goal in &self.goals {
            let color = if goal.completed {
                Color::rgb(0x00, 0xFF, 0x00)
            } else {
                Color::rgb(0xFF, 0xFF, 0x00)
            };
            surface.fill_rect(Rect::new(goal.x, goal_y, size, size), color)?;
        }

        surface.fill_rect(self.player_rect(), Color::rgb(0x00, 0xFF, 0x00))?;

        let hud = Color::WHITE;
        surface.fill_text(&format!("Score: {}", self.score), Position::new(10.0, 30.0), 20.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Level: {}", self.level), Position::new(10.0, 60.0), 20.0, TextAlign::Left, hud)?;
        surface.fill_text(&format!("Lives: {}", self.lives.get()), Position::new(10.0, 90.0), 20.0, TextAlign::Left, hud)?;
        surface.fill_text(
            &format!("Time: {}", (self.time_left as f64 / 60.0).ceil()),
            Position::new(10.0, 120.0),
            20.0,
            TextAlign::Left,
            hud,
        )?;
        surface.fill_text(
            &format!("Goals: {}/{}", self.completed_goals(), self.goals.len()),
            Position::new(self.width - 10.0, 50.0),
            14.0,
            TextAlign::Right,
            Color::rgb(0xFF, 0xFF, 0x00),
        )?;
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

    fn melody(&self) -> Option<Melody> {
        Some(Melody::Defi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameEvent;
    use crate::renderer::HeadlessSurface;

    fn game() -> CrossingGame {
        CrossingGame::new(800.0, 600.0, CrossingTuning::default(), 3)
    }

    fn step(game: &mut CrossingGame, input: &InputState) -> Vec<GameEvent> {
        let mut ctx = FrameContext::new(input, 0.0);
        game.update(&mut ctx).unwrap();
        ctx.events().to_vec()
    }

    /// Top y of a player standing in `lane`.
    fn lane_y(game: &CrossingGame, lane: usize) -> f64 {
        game.lanes[lane].top + 10.0
    }

    fn log_at(game: &CrossingGame, lane: usize, x: f64, speed: f64) -> Obstacle {
        Obstacle {
            rect: Rect::new(x, game.lanes[lane].top + 10.0, 140.0, 30.0),
            speed,
            kind: ObstacleKind::Log,
        }
    }

    #[test]
    fn test_lane_layout() {
        let game = game();
        assert_eq!(game.lanes.len(), 12);
        let kinds: Vec<LaneKind> = game.lanes.iter().map(|l| l.kind).collect();
        use LaneKind::*;
        assert_eq!(
            kinds,
            vec![Safe, Safe, Road, Road, Road, Road, Safe, Water, Water, Water, Water, Safe]
        );
        assert_eq!(game.lanes[0].top, 550.0);
        assert_eq!(game.lanes[11].top, 0.0);
        assert_eq!(game.lanes[2].direction, 1.0);
        assert_eq!(game.lanes[3].direction, -1.0);
        for lane in &game.lanes {
            match lane.kind {
                Safe => assert!(lane.obstacles.is_empty()),
                _ => assert!((2..=3).contains(&lane.obstacles.len())),
            }
        }
        assert_eq!(game.player, Position::new(400.0, 560.0));
        assert_eq!(game.player_lane(), 0);
        assert_eq!(game.goals.len(), 5);
    }

    #[test]
    fn test_hops_are_gated_by_cooldown() {
        let mut game = game();
        let mut input = InputState::new();
        input.press(Action::Left);

        for _ in 0..35 {
            step(&mut game, &input);
        }
        assert_eq!(game.player.x, 350.0);

        step(&mut game, &input);
        assert_eq!(game.player.x, 300.0);
        assert_eq!(game.score, 0);
    }

    #[test]
    fn test_forward_hop_scores() {
        let mut game = game();
        let mut input = InputState::new();
        input.press(Action::Shoot);
        let events = step(&mut game, &input);
        assert_eq!(game.player_lane(), 1);
        assert_eq!(game.score, 10);
        assert_eq!(events, vec![GameEvent::ScoreChanged(10)]);
    }

    #[test]
    fn test_goal_capture_resets_timer_not_progress() {
        let mut game = game();
        game.goals[0].completed = true;
        game.goals[1].completed = true;
        game.player = Position::new(game.goals[2].x + 10.0, lane_y(&game, 11));
        game.time_left = 100;

        step(&mut game, &InputState::new());
        assert_eq!(game.completed_goals(), 3);
        assert!(game.goals[2].completed);
        assert_eq!(game.time_left, game.max_time);
        assert_eq!(game.player, game.player_start());
        assert_eq!(game.score, 200);
    }

    #[test]
    fn test_goal_only_counts_in_top_lane() {
        let mut game = game();
        game.player = Position::new(game.goals[0].x, lane_y(&game, 6));
        step(&mut game, &InputState::new());
        assert_eq!(game.completed_goals(), 0);
    }

    #[test]
    fn test_platform_carries_player() {
        let mut game = game();
        game.lanes[7].obstacles = vec![log_at(&game, 7, 300.0, 0.5)];
        game.player = Position::new(320.0, lane_y(&game, 7));

        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 8);
        assert_eq!(game.support, Some((7, 0)));
        assert_eq!(game.player.x, 320.5);

        step(&mut game, &InputState::new());
        assert_eq!(game.player.x, 321.0);
    }

    #[test]
    fn test_open_water_drowns() {
        let mut game = game();
        game.lanes[8].obstacles.clear();
        game.player = Position::new(320.0, lane_y(&game, 8));

        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 7);
        assert_eq!(game.player, game.player_start());
        assert_eq!(game.support, None);
    }

    #[test]
    fn test_traffic_kills() {
        let mut game = game();
        let top = game.lanes[3].top;
        game.lanes[3].obstacles = vec![Obstacle {
            rect: Rect::new(300.0, top + 7.5, 80.0, 35.0),
            speed: 0.0,
            kind: ObstacleKind::Truck,
        }];
        game.player = Position::new(320.0, lane_y(&game, 3));

        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 7);
        assert_eq!(game.player, game.player_start());
    }

    #[test]
    fn test_one_death_per_tick() {
        let mut game = game();
        game.lanes[8].obstacles.clear();
        game.player = Position::new(320.0, lane_y(&game, 8));
        game.time_left = 1;

        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 7);
        assert_eq!(game.time_left, game.max_time);
    }

    #[test]
    fn test_timer_expiry_is_a_death() {
        let mut game = game();
        game.time_left = 1;
        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 7);
        assert_eq!(game.time_left, 3600);
        assert!(!game.is_over());
    }

    #[test]
    fn test_filling_last_goal_advances_level() {
        let mut game = game();
        game.lives = Lives::new(5);
        for goal in game.goals.iter_mut().take(4) {
            goal.completed = true;
        }
        game.player = Position::new(game.goals[4].x, lane_y(&game, 11));

        let events = step(&mut game, &InputState::new());
        assert_eq!(game.level, 2);
        assert_eq!(game.score, 700);
        assert_eq!(game.lives.get(), 6);
        assert_eq!(game.completed_goals(), 0);
        assert!(events.contains(&GameEvent::LevelChanged(2)));

        // Fresh layout runs 10% faster than its base draw
        for lane in &game.lanes {
            for o in &lane.obstacles {
                assert!(o.speed.abs() >= 0.2 * 1.1);
            }
        }
    }

    #[test]
    fn test_bonus_life_is_capped() {
        let mut game = game();
        for goal in game.goals.iter_mut().take(4) {
            goal.completed = true;
        }
        game.player = Position::new(game.goals[4].x, lane_y(&game, 11));
        step(&mut game, &InputState::new());
        assert_eq!(game.lives.get(), 8);
    }

    #[test]
    fn test_last_life_ends_game() {
        let mut game = game();
        game.lives = Lives::new(1);
        game.time_left = 1;
        let events = step(&mut game, &InputState::new());
        assert!(game.is_over());
        assert_eq!(events, vec![GameEvent::GameOver { score: 0, level: 1 }]);
    }

    #[test]
    fn test_render_shows_progress() {
        let game = game();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        game.render(&mut surface).unwrap();
        assert!(surface.texts().any(|t| t == "Goals: 0/5"));
        assert!(surface.texts().any(|t| t == "Time: 60"));
    }

    #[test]
    fn test_plays_its_own_melody() {
        assert_eq!(game().melody(), Some(Melody::Defi));
    }
}
