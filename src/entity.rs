use serde::{Deserialize, Serialize};

/// A point on the playfield in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn moved(&self, direction: Direction, step: f64) -> Self {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx * step, self.y + dy * step)
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Manhattan distance, used by the pursuer AI for its chase/flee radius.
    pub fn manhattan_to(&self, other: Position) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn clamped(&self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Position::new(self.x.clamp(min_x, max_x), self.y.clamp(min_y, max_y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Unit step in screen space (y grows downward).
    pub fn delta(&self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// Axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Strict overlap: boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x + self.width > other.x
            && self.x < other.x + other.width
            && self.y + self.height > other.y
            && self.y < other.y + other.height
    }

    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Remaining-lives counter. Never goes below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lives(u32);

impl Lives {
    pub fn new(count: u32) -> Self {
        Self(count)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn lose(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    /// Grant one bonus life without exceeding `cap`.
    pub fn gain(&mut self, cap: u32) {
        self.0 = (self.0 + 1).min(cap.max(self.0));
    }

    pub fn is_exhausted(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moved_follows_screen_axes() {
        let p = Position::new(10.0, 10.0);
        assert_eq!(p.moved(Direction::Up, 5.0), Position::new(10.0, 5.0));
        assert_eq!(p.moved(Direction::Right, 2.5), Position::new(12.5, 10.0));
    }

    #[test]
    fn test_edge_contact_is_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
        let c = Rect::new(9.5, 9.5, 1.0, 1.0);
        assert!(a.overlaps(&c));
    }

    #[test]
    fn test_lives_floor_and_cap() {
        let mut lives = Lives::new(1);
        lives.lose();
        lives.lose();
        assert_eq!(lives.get(), 0);
        assert!(lives.is_exhausted());

        let mut lives = Lives::new(8);
        lives.gain(8);
        assert_eq!(lives.get(), 8);
        let mut lives = Lives::new(3);
        lives.gain(8);
        assert_eq!(lives.get(), 4);
    }
}
