use crate::audio::browser_audio;
use crate::config::ArcadeConfig;
use crate::engine::{Engine, Game, LoopStep};
use crate::entity::Direction;
use crate::input::{joystick_direction, Action, JOYSTICK_DEAD_ZONE};
use crate::scores::Leaderboard;
use crate::web_renderer::{attach_keyboard, attach_touch, SharedEngine, WebSurface};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type FrameClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"[arcade] logger already installed".into());
        }
    });
}

/// One game mounted on a canvas. Dropping the handle from JS without calling
/// `destroy` leaves the listeners attached.
#[wasm_bindgen]
pub struct ArcadeHandle {
    engine: SharedEngine,
    surface: Rc<RefCell<WebSurface>>,
    frame: FrameClosure,
    raf_id: Rc<Cell<Option<i32>>>,
    destroy_requested: Rc<Cell<bool>>,
    leaderboard: Rc<RefCell<Leaderboard>>,
}

#[wasm_bindgen]
impl ArcadeHandle {
    /// Mount `game` ("collector", "defender" or "crossing") on the canvas with
    /// id `canvas_id`. `config_json` holds optional tuning overrides.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, game: &str, config_json: Option<String>) -> Result<ArcadeHandle, JsValue> {
        init_logging();

        let config = match config_json {
            Some(json) => ArcadeConfig::from_json(&json),
            None => Ok(ArcadeConfig::default()),
        }
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let surface = WebSurface::new(canvas_id)?;
        let built = config
            .build_game(game, surface.canvas().width() as f64, surface.canvas().height() as f64)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        log::info!("[arcade] mounting {} on #{}", game, canvas_id);

        let engine: SharedEngine = Rc::new(RefCell::new(Engine::new(built).with_audio(browser_audio())));
        let window = web_sys::window().ok_or("no window")?;
        attach_keyboard(&engine, &window)?;
        attach_touch(&engine, surface.canvas())?;

        let handle = ArcadeHandle {
            engine,
            surface: Rc::new(RefCell::new(surface)),
            frame: Rc::new(RefCell::new(None)),
            raf_id: Rc::new(Cell::new(None)),
            destroy_requested: Rc::new(Cell::new(false)),
            leaderboard: Rc::new(RefCell::new(Leaderboard::load())),
        };
        handle.install_game_end(None);
        Ok(handle)
    }

    pub fn start(&mut self) {
        {
            let Ok(mut engine) = self.engine.try_borrow_mut() else {
                return;
            };
            let Ok(mut surface) = self.surface.try_borrow_mut() else {
                return;
            };
            engine.start(&mut *surface);
        }
        self.schedule();
    }

    pub fn pause(&self) {
        self.with_engine(|engine| engine.pause());
    }

    /// Background music volume from 0 to 1.
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f32) {
        self.with_engine(|engine| engine.set_volume(volume));
    }

    pub fn resume(&mut self) {
        self.with_engine(|engine| engine.resume());
        self.schedule();
    }

    pub fn stop(&self) {
        self.with_engine(|engine| engine.stop());
        self.cancel_frame();
    }

    /// Stop the loop and release every listener. Safe to call more than once,
    /// including from inside a game callback.
    pub fn destroy(&self) {
        self.destroy_requested.set(true);
        self.cancel_frame();
        // Inside a callback the running frame finishes the teardown
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            return;
        };
        engine.destroy();
        drop(engine);
        if let Ok(mut frame) = self.frame.try_borrow_mut() {
            frame.take();
        }
    }

    #[wasm_bindgen(js_name = handleMobilePress)]
    pub fn handle_mobile_press(&self, action: &str) {
        self.with_engine(|engine| engine.handle_mobile_press(action));
    }

    #[wasm_bindgen(js_name = handleMobileRelease)]
    pub fn handle_mobile_release(&self, action: &str) {
        self.with_engine(|engine| engine.handle_mobile_release(action));
    }

    /// Joystick steering by name ("up", "down", "left", "right"); `None` releases.
    #[wasm_bindgen(js_name = setPlayerDirection)]
    pub fn set_player_direction(&self, direction: Option<String>) {
        let parsed: Option<Direction> = match direction.as_deref() {
            None => None,
            Some(name) => match Action::parse(name).and_then(|a| a.direction()) {
                Some(direction) => Some(direction),
                None => {
                    log::debug!("ignoring unknown direction {:?}", name);
                    return;
                }
            },
        };
        self.with_engine(|engine| engine.set_player_direction(parsed));
    }

    /// Joystick steering from the knob offset relative to its center.
    #[wasm_bindgen(js_name = setJoystick)]
    pub fn set_joystick(&self, dx: f64, dy: f64) {
        let direction = joystick_direction(dx, dy, JOYSTICK_DEAD_ZONE);
        self.with_engine(|engine| engine.set_player_direction(direction));
    }

    /// Register JS callbacks: `(score)`, `(level)` and `(score, level)` on game end.
    #[wasm_bindgen(js_name = setCallbacks)]
    pub fn set_callbacks(
        &self,
        on_score_change: Option<js_sys::Function>,
        on_level_change: Option<js_sys::Function>,
        on_game_end: Option<js_sys::Function>,
    ) {
        self.with_engine(|engine| {
            if let Some(f) = on_score_change {
                engine.on_score_change(move |score| {
                    if let Err(e) = f.call1(&JsValue::NULL, &JsValue::from_f64(score as f64)) {
                        log::error!("score callback failed: {:?}", e);
                    }
                });
            }
            if let Some(f) = on_level_change {
                engine.on_level_change(move |level| {
                    if let Err(e) = f.call1(&JsValue::NULL, &JsValue::from_f64(level as f64)) {
                        log::error!("level callback failed: {:?}", e);
                    }
                });
            }
        });
        self.install_game_end(on_game_end);
    }

    pub fn score(&self) -> f64 {
        self.engine.try_borrow().map(|e| e.game().score() as f64).unwrap_or(0.0)
    }

    pub fn level(&self) -> u32 {
        self.engine.try_borrow().map(|e| e.game().level()).unwrap_or(0)
    }

    pub fn lives(&self) -> u32 {
        self.engine.try_borrow().map(|e| e.game().lives()).unwrap_or(0)
    }

    #[wasm_bindgen(js_name = isOver)]
    pub fn is_over(&self) -> bool {
        self.engine.try_borrow().map(|e| e.game().is_over()).unwrap_or(false)
    }

    /// The local leaderboard as JSON.
    pub fn leaderboard(&self) -> Result<String, JsValue> {
        self.leaderboard
            .borrow()
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl ArcadeHandle {
    fn with_engine(&self, f: impl FnOnce(&mut Engine<Box<dyn Game>>)) {
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => f(&mut engine),
            Err(_) => log::warn!("engine busy, call ignored"),
        }
    }

    /// Record finished games into the leaderboard, then forward to JS.
    fn install_game_end(&self, callback: Option<js_sys::Function>) {
        let leaderboard = self.leaderboard.clone();
        self.with_engine(|engine| {
            let name = engine.game().name();
            engine.on_game_end(move |score, level| {
                if let Ok(mut board) = leaderboard.try_borrow_mut() {
                    if board.record(name, score, level).is_some() {
                        board.save();
                    }
                }
                if let Some(f) = &callback {
                    let result = f.call2(
                        &JsValue::NULL,
                        &JsValue::from_f64(score as f64),
                        &JsValue::from_f64(level as f64),
                    );
                    if let Err(e) = result {
                        log::error!("game end callback failed: {:?}", e);
                    }
                }
            });
        });
    }

    fn cancel_frame(&self) {
        if let Some(id) = self.raf_id.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
    }

    /// Start the requestAnimationFrame loop unless it is already running.
    fn schedule(&self) {
        if self.raf_id.get().is_some() || self.destroy_requested.get() {
            return;
        }

        let f = self.frame.clone();
        let engine = self.engine.clone();
        let surface = self.surface.clone();
        let raf_id = self.raf_id.clone();
        let destroy_requested = self.destroy_requested.clone();
        let Ok(mut slot) = self.frame.try_borrow_mut() else {
            return;
        };
        if slot.is_none() {
            *slot = Some(Closure::new(move |now: f64| {
                raf_id.set(None);
                {
                    let (Ok(mut engine), Ok(mut surface)) =
                        (engine.try_borrow_mut(), surface.try_borrow_mut())
                    else {
                        return;
                    };
                    engine.frame(now, &mut *surface);
                    match engine.after_frame(destroy_requested.get()) {
                        LoopStep::Continue => {}
                        LoopStep::Halt => return,
                        LoopStep::Release => {
                            release_frame_later(&f);
                            return;
                        }
                    }
                }
                request_frame(&f, &raf_id);
            }));
        }
        drop(slot);
        request_frame(&self.frame, &self.raf_id);
    }
}

/// Drop the frame closure once it has returned. The closure owns a clone of
/// its own slot, so leaving it in place keeps the whole loop alive.
fn release_frame_later(frame: &FrameClosure) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let slot = frame.clone();
    let release = Closure::once_into_js(move || {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            slot.take();
        }
    });
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(release.unchecked_ref(), 0) {
        log::error!("could not release the frame loop: {:?}", e);
    }
}

fn request_frame(frame: &FrameClosure, raf_id: &Rc<Cell<Option<i32>>>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let frame = frame.borrow();
    let Some(closure) = frame.as_ref() else {
        return;
    };
    match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        Ok(id) => raf_id.set(Some(id)),
        Err(e) => log::error!("requestAnimationFrame failed: {:?}", e),
    }
}
