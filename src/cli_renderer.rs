use crate::entity::{Position, Rect};
use crate::error::RenderError;
use crate::renderer::{Color, Surface, TextAlign};
use crossterm::{
    cursor,
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{self, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

// Without key-release reporting a key counts as held until it stops repeating.
// The first window covers the terminal's initial repeat delay.
const FIRST_HOLD: Duration = Duration::from_millis(550);
const REPEAT_HOLD: Duration = Duration::from_millis(120);

const HELP_LINE: &str = "Arrows/WASD move | Space shoot | P pause | Q quit";

/// A key event translated into the browser vocabulary the engine expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermInput {
    Key {
        key: String,
        code: String,
        pressed: bool,
    },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::WHITE,
            bg: Color::BLACK,
        }
    }
}

/// Character grid the playfield is scaled onto.
#[derive(Debug, Clone)]
pub struct CellGrid {
    cols: usize,
    rows: usize,
    width: f64,
    height: f64,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn new(cols: usize, rows: usize, width: f64, height: f64) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            width,
            height,
            cells: vec![Cell::default(); cols * rows],
        }
    }

    fn cell_width(&self) -> f64 {
        self.width / self.cols as f64
    }

    fn cell_height(&self) -> f64 {
        self.height / self.rows as f64
    }

    fn col_of(&self, x: f64) -> isize {
        (x / self.cell_width()).floor() as isize
    }

    fn row_of(&self, y: f64) -> isize {
        (y / self.cell_height()).floor() as isize
    }

    fn cell_mut(&mut self, col: isize, row: isize) -> Option<&mut Cell> {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        let i = row as usize * self.cols + col as usize;
        self.cells.get_mut(i)
    }

    fn paint(&mut self, col: isize, row: isize, color: Color) {
        if color.a == 0 {
            return;
        }
        if let Some(cell) = self.cell_mut(col, row) {
            cell.bg = blend(cell.bg, color);
            cell.ch = ' ';
        }
    }

    /// Characters of one row; empty past the bottom of the grid.
    pub fn row_text(&self, row: usize) -> String {
        if row >= self.rows {
            return String::new();
        }
        let start = row * self.cols;
        self.cells
            .get(start..start + self.cols)
            .map(|cells| cells.iter().map(|c| c.ch).collect())
            .unwrap_or_default()
    }

    pub fn background_at(&self, col: usize, row: usize) -> Option<Color> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols + col).map(|c| c.bg)
    }
}

fn blend(under: Color, over: Color) -> Color {
    if over.a == 0xFF {
        return over;
    }
    let a = over.a as f64 / 255.0;
    let mix = |u: u8, o: u8| (u as f64 * (1.0 - a) + o as f64 * a).round() as u8;
    Color::rgb(mix(under.r, over.r), mix(under.g, over.g), mix(under.b, over.b))
}

impl Surface for CellGrid {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        let c0 = self.col_of(rect.x);
        let r0 = self.row_of(rect.y);
        // Anything thinner than a cell still shows up as one cell
        let c1 = self.col_of(rect.x + rect.width).max(c0 + 1);
        let r1 = self.row_of(rect.y + rect.height).max(r0 + 1);
        for row in r0..r1 {
            for col in c0..c1 {
                self.paint(col, row, color);
            }
        }
        Ok(())
    }

    fn fill_circle(&mut self, center: Position, radius: f64, color: Color) -> Result<(), RenderError> {
        let (cw, ch) = (self.cell_width(), self.cell_height());
        let c0 = self.col_of(center.x - radius);
        let c1 = self.col_of(center.x + radius);
        let r0 = self.row_of(center.y - radius);
        let r1 = self.row_of(center.y + radius);
        let mut painted = false;
        for row in r0..=r1 {
            for col in c0..=c1 {
                let mid = Position::new((col as f64 + 0.5) * cw, (row as f64 + 0.5) * ch);
                if mid.distance_to(center) <= radius {
                    self.paint(col, row, color);
                    painted = true;
                }
            }
        }
        if !painted {
            self.paint(self.col_of(center.x), self.row_of(center.y), color);
        }
        Ok(())
    }

    fn fill_text(
        &mut self,
        text: &str,
        at: Position,
        _size: f64,
        align: TextAlign,
        color: Color,
    ) -> Result<(), RenderError> {
        let len = text.chars().count() as isize;
        let col = self.col_of(at.x);
        let start = match align {
            TextAlign::Left => col,
            TextAlign::Center => col - len / 2,
            TextAlign::Right => col - len,
        };
        // Canvas text sits on its baseline; the glyphs are above `at.y`
        let row = self.row_of(at.y - 1.0);
        for (i, ch) in text.chars().enumerate() {
            if let Some(cell) = self.cell_mut(start + i as isize, row) {
                cell.ch = ch;
                cell.fg = color;
            }
        }
        Ok(())
    }
}

fn term_color(color: Color) -> style::Color {
    style::Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

/// Key name and code as a browser would report them.
fn browser_key(code: KeyCode) -> Option<(String, String)> {
    let pair = |key: &str, code: &str| Some((key.to_string(), code.to_string()));
    match code {
        KeyCode::Up => pair("ArrowUp", "ArrowUp"),
        KeyCode::Down => pair("ArrowDown", "ArrowDown"),
        KeyCode::Left => pair("ArrowLeft", "ArrowLeft"),
        KeyCode::Right => pair("ArrowRight", "ArrowRight"),
        KeyCode::Char(' ') => pair(" ", "Space"),
        KeyCode::Char(c) if c.is_ascii_alphabetic() => {
            let upper = c.to_ascii_uppercase();
            Some((c.to_string(), format!("Key{}", upper)))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Held {
    last_seen: Instant,
    repeated: bool,
}

/// Terminal front-end: draws the playfield through crossterm and turns
/// keyboard events into engine key presses.
pub struct CliRenderer {
    grid: CellGrid,
    enhanced: bool,
    active: bool,
    held: HashMap<KeyCode, Held>,
}

impl CliRenderer {
    /// Size the grid to the current terminal, keeping the last row for help.
    pub fn new(width: f64, height: f64) -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        let rows = rows.saturating_sub(1).max(10);
        Ok(Self {
            grid: CellGrid::new(cols.max(20) as usize, rows as usize, width, height),
            enhanced: false,
            active: false,
            held: HashMap::new(),
        })
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            terminal::Clear(ClearType::All),
            cursor::Hide
        )?;
        // Key-release reporting only exists on kitty-protocol terminals
        self.enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        log::debug!("terminal key release events: {}", self.enhanced);
        self.active = true;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let mut stdout = io::stdout();
        if self.enhanced {
            let _ = execute!(stdout, PopKeyboardEnhancementFlags);
        }
        execute!(
            stdout,
            cursor::Show,
            terminal::LeaveAlternateScreen,
            ResetColor
        )?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Drain pending terminal events without blocking.
    pub fn poll_input(&mut self) -> io::Result<Vec<TermInput>> {
        let mut inputs = Vec::new();
        while event::poll(Duration::ZERO)? {
            let Event::Key(KeyEvent {
                code,
                kind,
                modifiers,
                ..
            }) = event::read()?
            else {
                continue;
            };

            let quit = matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q'))
                || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL));
            if quit && kind != KeyEventKind::Release {
                inputs.push(TermInput::Quit);
                continue;
            }
            let Some((key, key_code)) = browser_key(code) else {
                continue;
            };

            match kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    let now = Instant::now();
                    let fresh = match self.held.get_mut(&code) {
                        Some(held) => {
                            held.last_seen = now;
                            held.repeated = true;
                            false
                        }
                        None => {
                            self.held.insert(
                                code,
                                Held {
                                    last_seen: now,
                                    repeated: false,
                                },
                            );
                            true
                        }
                    };
                    if fresh {
                        inputs.push(TermInput::Key {
                            key,
                            code: key_code,
                            pressed: true,
                        });
                    }
                }
                KeyEventKind::Release => {
                    self.held.remove(&code);
                    inputs.push(TermInput::Key {
                        key,
                        code: key_code,
                        pressed: false,
                    });
                }
            }
        }

        if !self.enhanced {
            self.expire_held(Instant::now(), &mut inputs);
        }
        Ok(inputs)
    }

    fn expire_held(&mut self, now: Instant, inputs: &mut Vec<TermInput>) {
        let expired: Vec<KeyCode> = self
            .held
            .iter()
            .filter(|(_, held)| {
                let window = if held.repeated { REPEAT_HOLD } else { FIRST_HOLD };
                now.duration_since(held.last_seen) > window
            })
            .map(|(code, _)| *code)
            .collect();
        for code in expired {
            self.held.remove(&code);
            if let Some((key, key_code)) = browser_key(code) {
                inputs.push(TermInput::Key {
                    key,
                    code: key_code,
                    pressed: false,
                });
            }
        }
    }

    /// Block until any key is pressed.
    pub fn wait_for_key(&mut self) -> io::Result<()> {
        loop {
            if let Event::Key(KeyEvent { kind, .. }) = event::read()? {
                if kind != KeyEventKind::Release {
                    return Ok(());
                }
            }
        }
    }
}

impl Surface for CliRenderer {
    fn width(&self) -> f64 {
        self.grid.width()
    }

    fn height(&self) -> f64 {
        self.grid.height()
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.grid.fill_rect(rect, color)
    }

    fn fill_circle(&mut self, center: Position, radius: f64, color: Color) -> Result<(), RenderError> {
        self.grid.fill_circle(center, radius, color)
    }

    fn fill_text(
        &mut self,
        text: &str,
        at: Position,
        size: f64,
        align: TextAlign,
        color: Color,
    ) -> Result<(), RenderError> {
        self.grid.fill_text(text, at, size, align, color)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let mut stdout = io::stdout();
        for row in 0..self.grid.rows {
            queue!(stdout, cursor::MoveTo(0, row as u16))?;
            let cells = &self.grid.cells[row * self.grid.cols..(row + 1) * self.grid.cols];
            for cell in cells {
                queue!(
                    stdout,
                    SetBackgroundColor(term_color(cell.bg)),
                    SetForegroundColor(term_color(cell.fg)),
                    Print(cell.ch)
                )?;
            }
        }
        queue!(
            stdout,
            cursor::MoveTo(0, self.grid.rows as u16),
            ResetColor,
            Print(HELP_LINE)
        )?;
        stdout.flush()?;
        Ok(())
    }
}

impl Drop for CliRenderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
