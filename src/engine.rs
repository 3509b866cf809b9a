//! The frame loop shared by every game.
//!
//! `Engine` owns one `Game`, the normalized input and the lifecycle
//! (`Idle -> Running <-> Paused -> Stopped`). The host calls `frame` once per
//! display refresh; the engine runs due deferred tasks, updates, dispatches the
//! frame's events and then renders. A failing frame is painted as an error banner
//! and the loop carries on.

use crate::audio::{AudioSink, Melody, Silence, Tone};
use crate::entity::Direction;
use crate::error::GameResult;
use crate::input::{Action, InputState, KeyResponse};
use crate::renderer::{draw_error_banner, Surface};

/// Nominal refresh rate the per-tick constants were tuned against.
pub const TICKS_PER_SECOND: u32 = 60;

/// How long a tap or swipe keeps its action held before the automatic release.
pub const TAP_HOLD_MS: f64 = 100.0;

/// One-shot mutation scheduled to run at the start of a later frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Release an action pressed by a tap or swipe.
    ReleaseAction(Action),
    /// Put the player back at its respawn point.
    ResetPlayer,
    /// Scatter pursuers back to their corner positions.
    RestaggerPursuers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    ScoreChanged(u64),
    LevelChanged(u32),
    GameOver { score: u64, level: u32 },
}

/// Everything a game sees and reports during one `update`.
pub struct FrameContext<'a> {
    input: &'a InputState,
    now_ms: f64,
    events: Vec<GameEvent>,
    deferred: Vec<(f64, Deferred)>,
    tones: Vec<Tone>,
}

impl<'a> FrameContext<'a> {
    pub fn new(input: &'a InputState, now_ms: f64) -> Self {
        Self {
            input,
            now_ms,
            events: Vec::new(),
            deferred: Vec::new(),
            tones: Vec::new(),
        }
    }

    pub fn input(&self) -> &'a InputState {
        self.input
    }

    /// Wall-clock time of this frame in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn report_score(&mut self, score: u64) {
        self.events.push(GameEvent::ScoreChanged(score));
    }

    pub fn report_level(&mut self, level: u32) {
        self.events.push(GameEvent::LevelChanged(level));
    }

    pub fn report_game_over(&mut self, score: u64, level: u32) {
        let already = self
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::GameOver { .. }));
        if !already {
            self.events.push(GameEvent::GameOver { score, level });
        }
    }

    pub fn defer(&mut self, delay_ms: f64, task: Deferred) {
        self.deferred.push((self.now_ms + delay_ms, task));
    }

    pub fn play(&mut self, tone: Tone) {
        self.tones.push(tone);
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Scheduled tasks as `(due_ms, task)`.
    pub fn deferred(&self) -> &[(f64, Deferred)] {
        &self.deferred
    }

    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    fn into_parts(self) -> (Vec<GameEvent>, Vec<(f64, Deferred)>, Vec<Tone>) {
        (self.events, self.deferred, self.tones)
    }
}

/// A concrete game plugged into the engine.
pub trait Game {
    fn name(&self) -> &'static str;

    /// Advance one tick: move entities, resolve collisions, check win/loss and
    /// report through `ctx`.
    fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()>;

    /// Paint the complete frame. Nothing from the previous frame survives.
    fn render(&self, surface: &mut dyn Surface) -> GameResult<()>;

    fn score(&self) -> u64;
    fn level(&self) -> u32;
    fn lives(&self) -> u32;
    fn is_over(&self) -> bool;

    /// Run a task this game scheduled earlier through `FrameContext::defer`.
    fn run_deferred(&mut self, _task: Deferred) {}

    /// Whether touch direction presses replace each other instead of accumulating.
    fn exclusive_direction(&self) -> bool {
        false
    }

    /// Continuous joystick steering hook, called after the input state is updated.
    fn steer(&mut self, _direction: Option<Direction>) {}

    /// Background loop played while the game is running.
    fn melody(&self) -> Option<Melody> {
        None
    }
}

/// Lets front-ends pick the game at runtime with `Engine<Box<dyn Game>>`.
impl<G: Game + ?Sized> Game for Box<G> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()> {
        (**self).update(ctx)
    }

    fn render(&self, surface: &mut dyn Surface) -> GameResult<()> {
        (**self).render(surface)
    }

    fn score(&self) -> u64 {
        (**self).score()
    }

    fn level(&self) -> u32 {
        (**self).level()
    }

    fn lives(&self) -> u32 {
        (**self).lives()
    }

    fn is_over(&self) -> bool {
        (**self).is_over()
    }

    fn run_deferred(&mut self, task: Deferred) {
        (**self).run_deferred(task)
    }

    fn exclusive_direction(&self) -> bool {
        (**self).exclusive_direction()
    }

    fn steer(&mut self, direction: Option<Direction>) {
        (**self).steer(direction)
    }

    fn melody(&self) -> Option<Melody> {
        (**self).melody()
    }
}

/// What the host loop does after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// Schedule another frame.
    Continue,
    /// Stop scheduling but keep the loop around for a later `start` or `resume`.
    Halt,
    /// The engine is gone; drop the loop once the current frame returns.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Host listener registration released on `destroy`.
pub trait Detach {
    fn detach(&mut self);
}

#[derive(Default)]
pub struct Callbacks {
    pub on_score_change: Option<Box<dyn FnMut(u64)>>,
    pub on_level_change: Option<Box<dyn FnMut(u32)>>,
    pub on_game_end: Option<Box<dyn FnMut(u64, u32)>>,
}

pub struct Engine<G: Game> {
    game: G,
    input: InputState,
    state: EngineState,
    destroyed: bool,
    callbacks: Callbacks,
    audio: Box<dyn AudioSink>,
    music_playing: bool,
    timers: Vec<(f64, Deferred)>,
    listeners: Vec<Box<dyn Detach>>,
    now_ms: f64,
    faults: u64,
}

impl<G: Game> Engine<G> {
    pub fn new(game: G) -> Self {
        Self {
            game,
            input: InputState::new(),
            state: EngineState::Idle,
            destroyed: false,
            callbacks: Callbacks::default(),
            audio: Box::new(Silence),
            music_playing: false,
            timers: Vec::new(),
            listeners: Vec::new(),
            now_ms: 0.0,
            faults: 0,
        }
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioSink>) -> Self {
        self.audio = audio;
        self
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.audio.set_volume(volume);
    }

    pub fn is_music_playing(&self) -> bool {
        self.music_playing
    }

    pub fn on_score_change(&mut self, callback: impl FnMut(u64) + 'static) {
        self.callbacks.on_score_change = Some(Box::new(callback));
    }

    pub fn on_level_change(&mut self, callback: impl FnMut(u32) + 'static) {
        self.callbacks.on_level_change = Some(Box::new(callback));
    }

    pub fn on_game_end(&mut self, callback: impl FnMut(u64, u32) + 'static) {
        self.callbacks.on_game_end = Some(Box::new(callback));
    }

    /// Keep a host listener alive until `destroy`.
    pub fn attach_listener(&mut self, listener: Box<dyn Detach>) {
        if self.destroyed {
            let mut listener = listener;
            listener.detach();
            return;
        }
        self.listeners.push(listener);
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of frames whose update or render failed.
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Whether the host should schedule another frame.
    pub fn wants_frame(&self) -> bool {
        !self.destroyed && matches!(self.state, EngineState::Running | EngineState::Paused)
    }

    /// Called by the host after `frame`. A teardown requested while the frame
    /// held the engine happens here.
    pub fn after_frame(&mut self, destroy_requested: bool) -> LoopStep {
        if destroy_requested {
            self.destroy();
        }
        if self.destroyed {
            LoopStep::Release
        } else if self.wants_frame() {
            LoopStep::Continue
        } else {
            LoopStep::Halt
        }
    }

    pub fn start(&mut self, surface: &mut dyn Surface) {
        if self.destroyed {
            return;
        }
        if matches!(self.state, EngineState::Idle | EngineState::Stopped) {
            log::info!("{}: starting", self.game.name());
            self.state = EngineState::Running;
            self.start_music();
            // First displayed frame must not be blank.
            self.render_contained(surface);
        }
    }

    pub fn pause(&mut self) {
        if self.state == EngineState::Running {
            self.state = EngineState::Paused;
            self.stop_music();
        }
    }

    pub fn resume(&mut self) {
        if self.state == EngineState::Paused {
            self.state = EngineState::Running;
            self.start_music();
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            EngineState::Running => self.pause(),
            EngineState::Paused => self.resume(),
            _ => {}
        }
    }

    pub fn stop(&mut self) {
        if matches!(self.state, EngineState::Running | EngineState::Paused) {
            log::info!("{}: stopped", self.game.name());
            self.state = EngineState::Stopped;
        }
        self.stop_music();
    }

    /// Stop, drop every listener and pending task. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        for mut listener in self.listeners.drain(..) {
            listener.detach();
        }
        self.timers.clear();
        self.input.clear();
        self.destroyed = true;
        log::debug!("{}: destroyed", self.game.name());
    }

    /// One iteration of the display-refresh loop.
    pub fn frame(&mut self, now_ms: f64, surface: &mut dyn Surface) {
        if !self.wants_frame() {
            return;
        }
        self.now_ms = now_ms;
        self.run_due_timers();

        if self.state == EngineState::Paused {
            self.render_contained(surface);
            return;
        }

        let mut ctx = FrameContext::new(&self.input, now_ms);
        let updated = self.game.update(&mut ctx);
        let (events, deferred, tones) = ctx.into_parts();

        self.timers.extend(deferred);
        for tone in tones {
            self.audio.play(tone);
        }
        self.dispatch(events);

        match updated {
            Ok(()) => self.render_contained(surface),
            Err(e) => self.fault(surface, &e.to_string()),
        }
    }

    pub fn handle_key_down(&mut self, key: &str, code: &str) -> KeyResponse {
        if self.destroyed {
            return KeyResponse::default();
        }
        let response = self.input.key_down(key, code);
        if response.toggle_pause {
            self.toggle_pause();
        }
        response
    }

    pub fn handle_key_up(&mut self, key: &str, code: &str) -> KeyResponse {
        if self.destroyed {
            return KeyResponse::default();
        }
        self.input.key_up(key, code)
    }

    pub fn handle_blur(&mut self) {
        self.input.clear_keys();
    }

    pub fn handle_mobile_press(&mut self, action: &str) {
        if self.destroyed {
            return;
        }
        let Some(action) = Action::parse(action) else {
            log::debug!("ignoring unknown mobile action {:?}", action);
            return;
        };
        if self.game.exclusive_direction() {
            self.input.press_exclusive(action);
        } else {
            self.input.press(action);
        }
    }

    pub fn handle_mobile_release(&mut self, action: &str) {
        if let Some(action) = Action::parse(action) {
            self.input.release(action);
        }
    }

    /// Press an action and release it automatically a moment later (swipes, single taps).
    pub fn tap(&mut self, action: Action) {
        if self.destroyed {
            return;
        }
        if self.game.exclusive_direction() {
            self.input.press_exclusive(action);
        } else {
            self.input.press(action);
        }
        self.timers
            .push((self.now_ms + TAP_HOLD_MS, Deferred::ReleaseAction(action)));
    }

    /// Continuous joystick control, bypassing press/release edges.
    pub fn set_player_direction(&mut self, direction: Option<Direction>) {
        if self.destroyed {
            return;
        }
        self.input.set_joystick(direction);
        self.game.steer(direction);
    }

    fn start_music(&mut self) {
        if self.music_playing {
            return;
        }
        if let Some(melody) = self.game.melody() {
            self.audio.start_music(melody);
            self.music_playing = true;
        }
    }

    fn stop_music(&mut self) {
        if self.music_playing {
            self.audio.stop_music();
            self.music_playing = false;
        }
    }

    fn run_due_timers(&mut self) {
        let now = self.now_ms;
        let (due, pending): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|(at, _)| *at <= now);
        self.timers = pending;

        for (_, task) in due {
            match task {
                Deferred::ReleaseAction(action) => self.input.release(action),
                other => self.game.run_deferred(other),
            }
        }
    }

    fn dispatch(&mut self, events: Vec<GameEvent>) {
        for event in events {
            match event {
                GameEvent::ScoreChanged(score) => {
                    if let Some(cb) = self.callbacks.on_score_change.as_mut() {
                        cb(score);
                    }
                }
                GameEvent::LevelChanged(level) => {
                    log::info!("{}: level {}", self.game.name(), level);
                    if let Some(cb) = self.callbacks.on_level_change.as_mut() {
                        cb(level);
                    }
                }
                GameEvent::GameOver { score, level } => {
                    log::info!(
                        "{}: game over, score {} at level {}",
                        self.game.name(),
                        score,
                        level
                    );
                    self.state = EngineState::Stopped;
                    self.stop_music();
                    if let Some(cb) = self.callbacks.on_game_end.as_mut() {
                        cb(score, level);
                    }
                }
            }
        }
    }

    fn render_contained(&mut self, surface: &mut dyn Surface) {
        let rendered = self
            .game
            .render(surface)
            .and_then(|()| surface.present().map_err(Into::into));
        if let Err(e) = rendered {
            self.fault(surface, &e.to_string());
        }
    }

    fn fault(&mut self, surface: &mut dyn Surface, message: &str) {
        self.faults += 1;
        log::error!("{}: frame failed: {}", self.game.name(), message);
        if let Err(e) = draw_error_banner(surface, message) {
            log::error!("{}: could not draw error banner: {}", self.game.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::renderer::{Color, HeadlessSurface};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Probe {
        updates: u32,
        renders: Cell<u32>,
        fail_update: bool,
        end_after: Option<u32>,
        deferred_seen: Vec<Deferred>,
        shoot_seen: u32,
        steered: Option<Direction>,
        exclusive: bool,
        melody: Option<Melody>,
    }

    impl Game for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn update(&mut self, ctx: &mut FrameContext<'_>) -> GameResult<()> {
            self.updates += 1;
            if ctx.input().is_active(Action::Shoot) {
                self.shoot_seen += 1;
            }
            if self.fail_update {
                return Err(GameError::InvalidState("probe failure".into()));
            }
            ctx.report_score(self.updates as u64 * 10);
            if self.updates == 1 {
                ctx.defer(50.0, Deferred::ResetPlayer);
            }
            if self.end_after == Some(self.updates) {
                ctx.report_game_over(self.score(), 1);
                ctx.report_game_over(self.score(), 1);
            }
            Ok(())
        }

        fn render(&self, surface: &mut dyn Surface) -> GameResult<()> {
            self.renders.set(self.renders.get() + 1);
            surface.clear(Color::BLACK)?;
            Ok(())
        }

        fn score(&self) -> u64 {
            self.updates as u64 * 10
        }

        fn level(&self) -> u32 {
            1
        }

        fn lives(&self) -> u32 {
            3
        }

        fn is_over(&self) -> bool {
            false
        }

        fn run_deferred(&mut self, task: Deferred) {
            self.deferred_seen.push(task);
        }

        fn exclusive_direction(&self) -> bool {
            self.exclusive
        }

        fn steer(&mut self, direction: Option<Direction>) {
            self.steered = direction;
        }

        fn melody(&self) -> Option<Melody> {
            self.melody
        }
    }

    struct CountingListener(Rc<Cell<u32>>);

    impl Detach for CountingListener {
        fn detach(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum MusicCall {
        Start(Melody),
        Stop,
        Volume(f32),
    }

    struct RecordingSink(Rc<RefCell<Vec<MusicCall>>>);

    impl AudioSink for RecordingSink {
        fn play(&mut self, _tone: Tone) {}

        fn start_music(&mut self, melody: Melody) {
            self.0.borrow_mut().push(MusicCall::Start(melody));
        }

        fn stop_music(&mut self) {
            self.0.borrow_mut().push(MusicCall::Stop);
        }

        fn set_volume(&mut self, volume: f32) {
            self.0.borrow_mut().push(MusicCall::Volume(volume));
        }
    }

    fn musical(melody: Option<Melody>) -> (Engine<Probe>, Rc<RefCell<Vec<MusicCall>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let engine = Engine::new(Probe {
            melody,
            ..Probe::default()
        })
        .with_audio(Box::new(RecordingSink(calls.clone())));
        (engine, calls)
    }

    fn surface() -> HeadlessSurface {
        HeadlessSurface::new(800.0, 600.0)
    }

    #[test]
    fn test_start_renders_immediately() {
        let mut engine = Engine::new(Probe::default());
        let mut s = surface();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.wants_frame());

        engine.start(&mut s);
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.game().renders.get(), 1);
        assert_eq!(engine.game().updates, 0);
        assert!(engine.wants_frame());
    }

    #[test]
    fn test_paused_frames_render_without_update() {
        let mut engine = Engine::new(Probe::default());
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        engine.pause();
        engine.frame(32.0, &mut s);
        engine.frame(48.0, &mut s);
        assert_eq!(engine.game().updates, 1);
        assert_eq!(engine.game().renders.get(), 4);

        engine.resume();
        engine.frame(64.0, &mut s);
        assert_eq!(engine.game().updates, 2);
    }

    #[test]
    fn test_pause_key_toggles() {
        let mut engine = Engine::new(Probe::default());
        let mut s = surface();
        engine.start(&mut s);
        engine.handle_key_down("p", "KeyP");
        assert_eq!(engine.state(), EngineState::Paused);
        engine.handle_key_down("p", "KeyP");
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn test_faulted_frame_shows_banner_and_loop_continues() {
        let mut engine = Engine::new(Probe {
            fail_update: true,
            ..Probe::default()
        });
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);

        assert_eq!(engine.faults(), 1);
        assert!(s.texts().any(|t| t.starts_with("Game Error:")));
        assert!(engine.wants_frame());

        engine.game_mut().fail_update = false;
        engine.frame(32.0, &mut s);
        assert_eq!(engine.faults(), 1);
        assert_eq!(engine.game().updates, 2);
    }

    #[test]
    fn test_callbacks_fire_and_game_end_halts() {
        let scores = Rc::new(RefCell::new(Vec::new()));
        let ends = Rc::new(Cell::new(0));
        let mut engine = Engine::new(Probe {
            end_after: Some(2),
            ..Probe::default()
        });
        let seen = scores.clone();
        engine.on_score_change(move |score| seen.borrow_mut().push(score));
        let ended = ends.clone();
        engine.on_game_end(move |_, _| ended.set(ended.get() + 1));

        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        engine.frame(32.0, &mut s);
        engine.frame(48.0, &mut s);

        assert_eq!(*scores.borrow(), vec![10, 20]);
        assert_eq!(ends.get(), 1);
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.game().updates, 2);
    }

    #[test]
    fn test_deferred_task_runs_on_later_frame() {
        let mut engine = Engine::new(Probe::default());
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(0.0, &mut s);
        engine.frame(16.0, &mut s);
        assert!(engine.game().deferred_seen.is_empty());
        engine.frame(60.0, &mut s);
        assert_eq!(engine.game().deferred_seen, vec![Deferred::ResetPlayer]);
    }

    #[test]
    fn test_tap_releases_after_hold() {
        let mut engine = Engine::new(Probe::default());
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(0.0, &mut s);
        engine.tap(Action::Shoot);
        engine.frame(50.0, &mut s);
        engine.frame(120.0, &mut s);
        engine.frame(140.0, &mut s);
        assert_eq!(engine.game().shoot_seen, 1);
        assert!(!engine.input().is_active(Action::Shoot));
    }

    #[test]
    fn test_mobile_press_policy() {
        let mut engine = Engine::new(Probe {
            exclusive: true,
            ..Probe::default()
        });
        engine.handle_mobile_press("left");
        engine.handle_mobile_press("up");
        engine.handle_mobile_press("fly");
        assert!(!engine.input().is_active(Action::Left));
        assert!(engine.input().is_active(Action::Up));

        engine.handle_mobile_release("up");
        assert!(engine.input().is_idle());
    }

    #[test]
    fn test_joystick_reaches_game() {
        let mut engine = Engine::new(Probe::default());
        engine.set_player_direction(Some(Direction::Left));
        assert_eq!(engine.game().steered, Some(Direction::Left));
        assert!(engine.input().is_active(Action::Left));
        engine.set_player_direction(None);
        assert!(engine.input().is_idle());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let detached = Rc::new(Cell::new(0));
        let mut engine = Engine::new(Probe::default());
        engine.attach_listener(Box::new(CountingListener(detached.clone())));
        engine.attach_listener(Box::new(CountingListener(detached.clone())));

        let mut s = surface();
        engine.start(&mut s);
        engine.frame(0.0, &mut s);
        engine.destroy();
        engine.destroy();

        assert_eq!(detached.get(), 2);
        assert!(!engine.wants_frame());
        assert_eq!(engine.state(), EngineState::Stopped);

        // Pending deferred work and later frames are no-ops after teardown.
        engine.frame(500.0, &mut s);
        assert!(engine.game().deferred_seen.is_empty());
        assert_eq!(engine.game().updates, 1);

        engine.start(&mut s);
        assert!(!engine.wants_frame());
    }

    #[test]
    fn test_start_begins_melody_and_pause_stops_it() {
        let (mut engine, calls) = musical(Some(Melody::Crypto));
        let mut s = surface();
        engine.start(&mut s);
        assert_eq!(*calls.borrow(), vec![MusicCall::Start(Melody::Crypto)]);
        assert!(engine.is_music_playing());

        engine.pause();
        engine.pause();
        engine.resume();
        engine.set_volume(0.5);
        assert_eq!(
            *calls.borrow(),
            vec![
                MusicCall::Start(Melody::Crypto),
                MusicCall::Stop,
                MusicCall::Start(Melody::Crypto),
                MusicCall::Volume(0.5),
            ]
        );
    }

    #[test]
    fn test_destroy_stops_music_exactly_once() {
        let (mut engine, calls) = musical(Some(Melody::Defi));
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        engine.destroy();
        engine.destroy();
        engine.stop();

        let stops = calls.borrow().iter().filter(|c| **c == MusicCall::Stop).count();
        assert_eq!(stops, 1);
        assert!(!engine.is_music_playing());
    }

    #[test]
    fn test_game_over_stops_music() {
        let (mut engine, calls) = musical(Some(Melody::Crypto));
        engine.game_mut().end_after = Some(1);
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(calls.borrow().last(), Some(&MusicCall::Stop));
    }

    #[test]
    fn test_silent_game_never_touches_music() {
        let (mut engine, calls) = musical(None);
        let mut s = surface();
        engine.start(&mut s);
        engine.pause();
        engine.resume();
        engine.destroy();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_loop_released_after_requested_teardown() {
        let detached = Rc::new(Cell::new(0));
        let mut engine = Engine::new(Probe::default());
        engine.attach_listener(Box::new(CountingListener(detached.clone())));
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        assert_eq!(engine.after_frame(false), LoopStep::Continue);

        engine.frame(32.0, &mut s);
        assert_eq!(engine.after_frame(true), LoopStep::Release);
        assert_eq!(detached.get(), 1);
        assert_eq!(engine.after_frame(false), LoopStep::Release);
    }

    #[test]
    fn test_loop_halts_after_game_over() {
        let mut engine = Engine::new(Probe {
            end_after: Some(1),
            ..Probe::default()
        });
        let mut s = surface();
        engine.start(&mut s);
        engine.frame(16.0, &mut s);
        assert_eq!(engine.after_frame(false), LoopStep::Halt);
        assert!(!engine.is_destroyed());
    }
}
