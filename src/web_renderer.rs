use crate::engine::{Detach, Engine, Game};
use crate::entity::{Position, Rect};
use crate::error::RenderError;
use crate::input::{swipe_direction, Action};
use crate::renderer::{Color, Surface, TextAlign};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Event, EventTarget, HtmlCanvasElement, KeyboardEvent, TouchEvent};

/// Engine shared between the frame loop and the DOM listeners.
pub type SharedEngine = Rc<RefCell<Engine<Box<dyn Game>>>>;

fn js_error(value: JsValue) -> RenderError {
    RenderError::Backend(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

/// 2D canvas drawing target.
pub struct WebSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl WebSurface {
    pub fn new(canvas_id: &str) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| format!("canvas #{} not found", canvas_id))?
            .dyn_into::<HtmlCanvasElement>()?;
        let context = canvas
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        Ok(Self { canvas, context })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl Surface for WebSurface {
    fn width(&self) -> f64 {
        self.canvas.width() as f64
    }

    fn height(&self) -> f64 {
        self.canvas.height() as f64
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.context.set_fill_style_str(&color.to_css());
        self.context.fill_rect(rect.x, rect.y, rect.width, rect.height);
        Ok(())
    }

    fn fill_circle(&mut self, center: Position, radius: f64, color: Color) -> Result<(), RenderError> {
        self.context.set_fill_style_str(&color.to_css());
        self.context.begin_path();
        self.context
            .arc(center.x, center.y, radius, 0.0, std::f64::consts::TAU)
            .map_err(js_error)?;
        self.context.fill();
        Ok(())
    }

    fn fill_text(
        &mut self,
        text: &str,
        at: Position,
        size: f64,
        align: TextAlign,
        color: Color,
    ) -> Result<(), RenderError> {
        self.context.set_fill_style_str(&color.to_css());
        self.context.set_font(&format!("{}px monospace", size));
        self.context.set_text_align(match align {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        });
        self.context.fill_text(text, at.x, at.y).map_err(js_error)
    }
}

/// A DOM event listener that the engine removes on `destroy`.
pub struct DomListener {
    target: EventTarget,
    kind: &'static str,
    closure: Option<Closure<dyn FnMut(Event)>>,
}

impl DomListener {
    pub fn attach(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure: Some(closure),
        })
    }
}

impl Detach for DomListener {
    fn detach(&mut self) {
        if let Some(closure) = self.closure.take() {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.kind, closure.as_ref().unchecked_ref());
        }
    }
}

// Listeners hold the engine weakly so the engine can own their handles.
fn with_engine(engine: &Weak<RefCell<Engine<Box<dyn Game>>>>, f: impl FnOnce(&mut Engine<Box<dyn Game>>)) {
    let Some(engine) = engine.upgrade() else {
        return;
    };
    match engine.try_borrow_mut() {
        Ok(mut engine) => f(&mut engine),
        Err(_) => log::debug!("engine busy, dropping input event"),
    };
}

fn attach(engine: &SharedEngine, listener: Result<DomListener, JsValue>) -> Result<(), JsValue> {
    engine.borrow_mut().attach_listener(Box::new(listener?));
    Ok(())
}

/// Keyboard and focus listeners on the window.
pub fn attach_keyboard(engine: &SharedEngine, window: &web_sys::Window) -> Result<(), JsValue> {
    let weak = Rc::downgrade(engine);
    let keydown = DomListener::attach(window, "keydown", move |event: Event| {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        with_engine(&weak, |engine| {
            if engine.handle_key_down(&event.key(), &event.code()).captured {
                event.prevent_default();
            }
        });
    });
    attach(engine, keydown)?;

    let weak = Rc::downgrade(engine);
    let keyup = DomListener::attach(window, "keyup", move |event: Event| {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        with_engine(&weak, |engine| {
            if engine.handle_key_up(&event.key(), &event.code()).captured {
                event.prevent_default();
            }
        });
    });
    attach(engine, keyup)?;

    let weak = Rc::downgrade(engine);
    let blur = DomListener::attach(window, "blur", move |_event: Event| {
        with_engine(&weak, |engine| engine.handle_blur());
    });
    attach(engine, blur)
}

/// Swipe gestures on the canvas, each delivered as a short tap of a direction.
pub fn attach_touch(engine: &SharedEngine, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let start: Rc<Cell<Option<(f64, f64)>>> = Rc::new(Cell::new(None));

    let origin = start.clone();
    let touchstart = DomListener::attach(canvas, "touchstart", move |event: Event| {
        let Some(event) = event.dyn_ref::<TouchEvent>() else {
            return;
        };
        event.prevent_default();
        if let Some(touch) = event.touches().item(0) {
            origin.set(Some((touch.client_x() as f64, touch.client_y() as f64)));
        }
    });
    attach(engine, touchstart)?;

    let touchmove = DomListener::attach(canvas, "touchmove", move |event: Event| {
        event.prevent_default();
    });
    attach(engine, touchmove)?;

    let weak = Rc::downgrade(engine);
    let origin = start.clone();
    let touchend = DomListener::attach(canvas, "touchend", move |event: Event| {
        let Some(event) = event.dyn_ref::<TouchEvent>() else {
            return;
        };
        event.prevent_default();
        let (Some((x0, y0)), Some(touch)) = (origin.take(), event.changed_touches().item(0)) else {
            return;
        };
        let dx = touch.client_x() as f64 - x0;
        let dy = touch.client_y() as f64 - y0;
        if let Some(direction) = swipe_direction(dx, dy) {
            with_engine(&weak, |engine| engine.tap(Action::from_direction(direction)));
        }
    });
    attach(engine, touchend)?;

    let touchcancel = DomListener::attach(canvas, "touchcancel", move |_event: Event| {
        start.set(None);
    });
    attach(engine, touchcancel)
}
