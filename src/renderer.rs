use crate::entity::{Position, Rect};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const RED: Color = Color::rgb(0xFF, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn to_css(&self) -> String {
        if self.a == 0xFF {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!(
                "rgba({}, {}, {}, {:.3})",
                self.r,
                self.g,
                self.b,
                self.a as f64 / 255.0
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Trait that abstracts the drawing target.
/// Games paint every frame from scratch through this; backends are the browser
/// canvas, the terminal and a headless recorder.
pub trait Surface {
    /// Playfield width in surface pixels
    fn width(&self) -> f64;

    /// Playfield height in surface pixels
    fn height(&self) -> f64;

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError>;

    fn fill_circle(&mut self, center: Position, radius: f64, color: Color) -> Result<(), RenderError>;

    fn fill_text(
        &mut self,
        text: &str,
        at: Position,
        size: f64,
        align: TextAlign,
        color: Color,
    ) -> Result<(), RenderError>;

    /// Paint the whole surface one color
    fn clear(&mut self, color: Color) -> Result<(), RenderError> {
        let full = Rect::new(0.0, 0.0, self.width(), self.height());
        self.fill_rect(full, color)
    }

    /// Flush the finished frame to the display
    fn present(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Paint the fault indicator shown when a frame fails.
pub fn draw_error_banner(surface: &mut dyn Surface, message: &str) -> Result<(), RenderError> {
    surface.clear(Color::RED)?;
    surface.fill_text(
        &format!("Game Error: {}", message),
        Position::new(10.0, 50.0),
        20.0,
        TextAlign::Left,
        Color::WHITE,
    )?;
    surface.present()
}

/// One recorded draw operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Rect(Rect, Color),
    Circle(Position, f64, Color),
    Text(String, Position, Color),
}

/// Surface that records draw calls instead of painting.
/// Used for headless simulation and by tests.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    width: f64,
    height: f64,
    calls: Vec<DrawCall>,
    frames_presented: usize,
}

impl HeadlessSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
            frames_presented: 0,
        }
    }

    /// Draw calls made since the last `present`.
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().filter_map(|call| match call {
            DrawCall::Text(text, _, _) => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Surface for HeadlessSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.calls.push(DrawCall::Rect(rect, color));
        Ok(())
    }

    fn fill_circle(&mut self, center: Position, radius: f64, color: Color) -> Result<(), RenderError> {
        self.calls.push(DrawCall::Circle(center, radius, color));
        Ok(())
    }

    fn fill_text(
        &mut self,
        text: &str,
        at: Position,
        _size: f64,
        _align: TextAlign,
        color: Color,
    ) -> Result<(), RenderError> {
        self.calls.push(DrawCall::Text(text.to_string(), at, color));
        Ok(())
    }

    fn clear(&mut self, color: Color) -> Result<(), RenderError> {
        // A full repaint makes everything drawn before it invisible.
        self.calls.clear();
        self.calls
            .push(DrawCall::Rect(Rect::new(0.0, 0.0, self.width, self.height), color));
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_colors() {
        assert_eq!(Color::rgb(0xF7, 0x93, 0x1A).to_css(), "#F7931A");
        assert_eq!(Color::WHITE.with_alpha(0).to_css(), "rgba(255, 255, 255, 0.000)");
    }

    #[test]
    fn test_clear_starts_a_fresh_frame() {
        let mut surface = HeadlessSurface::new(100.0, 50.0);
        surface.fill_circle(Position::new(1.0, 1.0), 2.0, Color::WHITE).unwrap();
        surface.clear(Color::BLACK).unwrap();
        assert_eq!(
            surface.calls(),
            &[DrawCall::Rect(Rect::new(0.0, 0.0, 100.0, 50.0), Color::BLACK)]
        );
    }

    #[test]
    fn test_error_banner_is_visible() {
        let mut surface = HeadlessSurface::new(100.0, 50.0);
        draw_error_banner(&mut surface, "boom").unwrap();
        assert!(surface.texts().any(|t| t == "Game Error: boom"));
        assert_eq!(surface.frames_presented(), 1);
    }
}
