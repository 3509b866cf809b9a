//! Input normalization.
//!
//! Keyboard keys, on-screen touch buttons and the virtual joystick all feed one
//! `InputState`; games only ever ask "is this logical action held".

use std::collections::HashSet;

use crate::entity::Direction;

/// Minimum knob offset (in CSS pixels) before the joystick reports a direction.
pub const JOYSTICK_DEAD_ZONE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Shoot,
}

impl Action {
    /// Parse a mobile-control action name. Unknown names are not an error, they simply map to nothing.
    pub fn parse(name: &str) -> Option<Action> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            "left" => Some(Action::Left),
            "right" => Some(Action::Right),
            "shoot" => Some(Action::Shoot),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Action::Up => Some(Direction::Up),
            Action::Down => Some(Direction::Down),
            Action::Left => Some(Direction::Left),
            Action::Right => Some(Direction::Right),
            Action::Shoot => None,
        }
    }

    pub fn from_direction(direction: Direction) -> Action {
        match direction {
            Direction::Up => Action::Up,
            Direction::Down => Action::Down,
            Direction::Left => Action::Left,
            Direction::Right => Action::Right,
        }
    }
}

// Arrow keys and WASD are aliases; the spacebar is reported both as " " and "spacebar".
const KEY_BINDINGS: &[(&str, Action)] = &[
    ("arrowup", Action::Up),
    ("w", Action::Up),
    ("arrowdown", Action::Down),
    ("s", Action::Down),
    ("arrowleft", Action::Left),
    ("a", Action::Left),
    ("arrowright", Action::Right),
    ("d", Action::Right),
    (" ", Action::Shoot),
    ("spacebar", Action::Shoot),
];

const CAPTURED_CODES: &[&str] = &["Space", "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight"];

/// Logical action bound to a normalized (lowercase) key name.
pub fn binding_for(key: &str) -> Option<Action> {
    KEY_BINDINGS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, action)| *action)
}

/// What the host should do with a key event after it was fed to `InputState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyResponse {
    /// Suppress the browser default (page scroll) for this key.
    pub captured: bool,
    /// The pause key was pressed.
    pub toggle_pause: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    held_keys: HashSet<String>,
    touch: HashSet<Action>,
    joystick: Option<Direction>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Touch/mobile press. Idempotent.
    pub fn press(&mut self, action: Action) {
        self.touch.insert(action);
    }

    /// Touch/mobile release. Idempotent.
    pub fn release(&mut self, action: Action) {
        self.touch.remove(&action);
    }

    /// Press a direction, replacing whichever touch direction was held before.
    ///
    /// Used by games that only steer in one direction at a time, so a missed
    /// release can never leave two directions latched.
    pub fn press_exclusive(&mut self, action: Action) {
        if action.direction().is_some() {
            self.touch.retain(|held| held.direction().is_none());
        }
        self.touch.insert(action);
    }

    pub fn key_down(&mut self, key: &str, code: &str) -> KeyResponse {
        let normalized = key.to_lowercase();
        let captured = CAPTURED_CODES.contains(&code);

        if code == "Space" {
            self.held_keys.insert(" ".to_string());
            self.held_keys.insert("spacebar".to_string());
        } else {
            self.held_keys.insert(normalized.clone());
        }

        KeyResponse {
            captured,
            toggle_pause: normalized == "p",
        }
    }

    pub fn key_up(&mut self, key: &str, code: &str) -> KeyResponse {
        if code == "Space" {
            self.held_keys.remove(" ");
            self.held_keys.remove("spacebar");
        } else {
            self.held_keys.remove(&key.to_lowercase());
        }

        KeyResponse {
            captured: CAPTURED_CODES.contains(&code),
            toggle_pause: false,
        }
    }

    /// Continuous joystick control. `None` releases the stick.
    pub fn set_joystick(&mut self, direction: Option<Direction>) {
        self.joystick = direction;
    }

    pub fn joystick(&self) -> Option<Direction> {
        self.joystick
    }

    pub fn is_active(&self, action: Action) -> bool {
        if self.touch.contains(&action) {
            return true;
        }
        if let (Some(stick), Some(direction)) = (self.joystick, action.direction()) {
            if stick == direction {
                return true;
            }
        }
        self.held_keys
            .iter()
            .any(|key| binding_for(key) == Some(action))
    }

    /// The single direction a one-direction-at-a-time game should follow.
    ///
    /// The joystick wins over touch buttons, touch buttons win over keys; within a
    /// source the order is up, down, left, right.
    pub fn primary_direction(&self) -> Option<Direction> {
        if let Some(stick) = self.joystick {
            return Some(stick);
        }
        let touched = Direction::ALL
            .into_iter()
            .find(|d| self.touch.contains(&Action::from_direction(*d)));
        if touched.is_some() {
            return touched;
        }
        Direction::ALL.into_iter().find(|d| {
            let action = Action::from_direction(*d);
            self.held_keys.iter().any(|key| binding_for(key) == Some(action))
        })
    }

    pub fn is_idle(&self) -> bool {
        self.joystick.is_none()
            && self.touch.is_empty()
            && !self.held_keys.iter().any(|key| binding_for(key).is_some())
    }

    /// Keyboard focus was lost; drop every held key.
    pub fn clear_keys(&mut self) {
        self.held_keys.clear();
    }

    pub fn clear(&mut self) {
        self.held_keys.clear();
        self.touch.clear();
        self.joystick = None;
    }
}

/// Map a joystick knob offset from its center to one of four directions.
///
/// Offsets shorter than `dead_zone` report `None`. The four sectors are 90 degrees
/// wide and centered on the axes; y grows downward as on screen.
pub fn joystick_direction(dx: f64, dy: f64, dead_zone: f64) -> Option<Direction> {
    if (dx * dx + dy * dy).sqrt() < dead_zone {
        return None;
    }

    let angle = dy.atan2(dx).to_degrees();
    if (-45.0..45.0).contains(&angle) {
        Some(Direction::Right)
    } else if (45.0..135.0).contains(&angle) {
        Some(Direction::Down)
    } else if (-135.0..-45.0).contains(&angle) {
        Some(Direction::Up)
    } else {
        Some(Direction::Left)
    }
}

/// Minimum travel in pixels before a touch drag counts as a swipe.
pub const SWIPE_THRESHOLD: f64 = 30.0;

/// Direction of a finished touch drag, along its dominant axis.
pub fn swipe_direction(dx: f64, dy: f64) -> Option<Direction> {
    if dx.abs() <= SWIPE_THRESHOLD && dy.abs() <= SWIPE_THRESHOLD {
        return None;
    }
    if dx.abs() > dy.abs() {
        Some(if dx > 0.0 { Direction::Right } else { Direction::Left })
    } else {
        Some(if dy > 0.0 { Direction::Down } else { Direction::Up })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swipes_need_thirty_pixels() {
        assert_eq!(swipe_direction(30.0, 0.0), None);
        assert_eq!(swipe_direction(31.0, 10.0), Some(Direction::Right));
        assert_eq!(swipe_direction(-5.0, -40.0), Some(Direction::Up));
        assert_eq!(swipe_direction(-50.0, 45.0), Some(Direction::Left));
        assert_eq!(swipe_direction(0.0, 90.0), Some(Direction::Down));
    }

    #[test]
    fn test_arrow_and_wasd_are_aliases() {
        let mut input = InputState::new();
        input.key_down("ArrowUp", "ArrowUp");
        input.key_down("w", "KeyW");
        assert!(input.is_active(Action::Up));

        input.key_up("w", "KeyW");
        assert!(input.is_active(Action::Up), "arrow key still held");

        input.key_up("ArrowUp", "ArrowUp");
        assert!(!input.is_active(Action::Up));
    }

    #[test]
    fn test_spacebar_sets_shoot_and_is_captured() {
        let mut input = InputState::new();
        let response = input.key_down(" ", "Space");
        assert!(response.captured);
        assert!(input.is_active(Action::Shoot));

        input.key_up(" ", "Space");
        assert!(!input.is_active(Action::Shoot));
    }

    #[test]
    fn test_letter_keys_are_not_captured() {
        let mut input = InputState::new();
        assert!(!input.key_down("a", "KeyA").captured);
        assert!(input.key_down("ArrowLeft", "ArrowLeft").captured);
    }

    #[test]
    fn test_pause_key_requests_toggle() {
        let mut input = InputState::new();
        assert!(input.key_down("P", "KeyP").toggle_pause);
        assert!(!input.key_up("P", "KeyP").toggle_pause);
    }

    #[test]
    fn test_press_release_idempotent() {
        let mut input = InputState::new();
        input.press(Action::Left);
        input.press(Action::Left);
        input.release(Action::Left);
        assert!(!input.is_active(Action::Left));
        input.release(Action::Left);
        assert!(input.is_idle());
    }

    #[test]
    fn test_exclusive_press_overwrites_direction() {
        let mut input = InputState::new();
        input.press_exclusive(Action::Left);
        input.press(Action::Shoot);
        input.press_exclusive(Action::Up);
        assert!(!input.is_active(Action::Left));
        assert!(input.is_active(Action::Up));
        assert!(input.is_active(Action::Shoot), "shoot is not a direction");
        assert_eq!(input.primary_direction(), Some(Direction::Up));
    }

    #[test]
    fn test_joystick_takes_priority() {
        let mut input = InputState::new();
        input.key_down("ArrowDown", "ArrowDown");
        input.set_joystick(Some(Direction::Right));
        assert_eq!(input.primary_direction(), Some(Direction::Right));
        input.set_joystick(None);
        assert_eq!(input.primary_direction(), Some(Direction::Down));
    }

    #[test]
    fn test_joystick_sectors() {
        assert_eq!(joystick_direction(5.0, 5.0, JOYSTICK_DEAD_ZONE), None);
        assert_eq!(joystick_direction(40.0, 10.0, JOYSTICK_DEAD_ZONE), Some(Direction::Right));
        assert_eq!(joystick_direction(-40.0, 10.0, JOYSTICK_DEAD_ZONE), Some(Direction::Left));
        assert_eq!(joystick_direction(10.0, -40.0, JOYSTICK_DEAD_ZONE), Some(Direction::Up));
        assert_eq!(joystick_direction(10.0, 40.0, JOYSTICK_DEAD_ZONE), Some(Direction::Down));
    }

    #[test]
    fn test_unknown_action_name_is_ignored() {
        assert_eq!(Action::parse("jump"), None);
        assert_eq!(Action::parse(" Shoot "), Some(Action::Shoot));
    }

    #[test]
    fn test_blur_clears_keys_only() {
        let mut input = InputState::new();
        input.key_down("d", "KeyD");
        input.press(Action::Shoot);
        input.clear_keys();
        assert!(!input.is_active(Action::Right));
        assert!(input.is_active(Action::Shoot));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Outside the dead zone every offset maps to the sector its dominant axis points at.
        #[test]
        fn prop_joystick_matches_dominant_axis(
            dx in -200.0f64..200.0,
            dy in -200.0f64..200.0,
        ) {
            prop_assume!((dx * dx + dy * dy).sqrt() >= JOYSTICK_DEAD_ZONE);
            prop_assume!((dx.abs() - dy.abs()).abs() > 1e-6);

            let expected = if dx.abs() > dy.abs() {
                if dx > 0.0 { Direction::Right } else { Direction::Left }
            } else if dy > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            };
            prop_assert_eq!(joystick_direction(dx, dy, JOYSTICK_DEAD_ZONE), Some(expected));
        }
    }
}
