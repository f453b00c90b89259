//! Screen component: three parallel cell grids plus the host window they
//! are mirrored into.
//!
//! The grids are flat `width * height` arrays indexed `y * width + x`.
//! Every cell always holds a defined (bg, fg, codepoint) triple; resize
//! reinitialises to black-on-black spaces and the guest repaints.

use core_bus::{MethodError, MethodResult, Value};
use core_window::{CellPatch, WindowSurface};

pub(crate) const METHODS: &[&str] = &["getKeyboards"];

/// Static screen hardware parameters from the component's `config.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    pub color_depth: u32,
    pub ratio_width: u32,
    pub ratio_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

pub struct Screen {
    pub color_depth: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub ratio_width: u32,
    pub ratio_height: u32,
    width: u32,
    height: u32,
    viewport_width: u32,
    viewport_height: u32,
    font_width: u32,
    font_height: u32,
    keyboards: Vec<String>,
    bg: Vec<u32>,
    fg: Vec<u32>,
    ch: Vec<u32>,
    surface: Box<dyn WindowSurface>,
}

impl Screen {
    pub fn new(
        config: ScreenConfig,
        keyboards: Vec<String>,
        font_cell: (u32, u32),
        surface: Box<dyn WindowSurface>,
    ) -> Self {
        let mut screen = Self {
            color_depth: config.color_depth,
            max_width: config.max_width,
            max_height: config.max_height,
            ratio_width: config.ratio_width,
            ratio_height: config.ratio_height,
            width: 0,
            height: 0,
            viewport_width: 0,
            viewport_height: 0,
            font_width: font_cell.0,
            font_height: font_cell.1,
            keyboards,
            bg: Vec::new(),
            fg: Vec::new(),
            ch: Vec::new(),
            surface,
        };
        screen.update_size(config.max_width, config.max_height);
        screen
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Viewport changes do not touch the grids (they may even exceed the
    /// resolution; nothing in this core observes the value beyond get).
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn keyboards(&self) -> &[String] {
        &self.keyboards
    }

    pub fn window_id(&self) -> core_window::WindowId {
        self.surface.id()
    }

    /// Reallocate the grids, reset the viewport, resize and clear the host
    /// window. Surface failures are logged, never guest-surfaced.
    pub fn update_size(&mut self, width: u32, height: u32) {
        let cells = (width as usize) * (height as usize);
        self.width = width;
        self.height = height;
        self.viewport_width = width;
        self.viewport_height = height;
        self.bg = vec![0; cells];
        self.fg = vec![0; cells];
        self.ch = vec![' ' as u32; cells];
        if let Err(err) = self
            .surface
            .resize(width * self.font_width, height * self.font_height)
        {
            tracing::warn!(target: "component.screen", %err, "window resize failed");
        }
        if let Err(err) = self.surface.clear(0x000000) {
            tracing::warn!(target: "component.screen", %err, "window clear failed");
        }
        self.update();
    }

    /// The (bg, fg, codepoint) triple at in-bounds coordinates.
    pub fn cell(&self, x: u32, y: u32) -> Option<(u32, u32, u32)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) as usize;
        Some((self.bg[idx], self.fg[idx], self.ch[idx]))
    }

    /// Write one cell and mirror it into the window surface. Out-of-bounds
    /// writes are ignored; callers bound-check for their own semantics.
    pub fn set_char(&mut self, x: u32, y: u32, bg: u32, fg: u32, codepoint: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize;
        self.bg[idx] = bg;
        self.fg[idx] = fg;
        self.ch[idx] = codepoint;
        let patch = CellPatch {
            px_x: x * self.font_width,
            px_y: y * self.font_height,
            px_w: self.font_width,
            px_h: self.font_height,
            bg,
            fg,
            codepoint,
        };
        if let Err(err) = self.surface.paint_cell(&patch) {
            tracing::warn!(target: "component.screen", %err, "cell paint failed");
        }
    }

    /// Flush buffered painting to the host window.
    pub fn update(&mut self) {
        if let Err(err) = self.surface.present() {
            tracing::warn!(target: "component.screen", %err, "present failed");
        }
    }

    pub fn invoke(&mut self, method: &str, _args: &[Value]) -> MethodResult {
        match method {
            "getKeyboards" => {
                let count = self.keyboards.len() as i64;
                let mut pairs: Vec<(Value, Value)> = self
                    .keyboards
                    .iter()
                    .enumerate()
                    .map(|(i, addr)| (Value::Int(i as i64 + 1), Value::str(addr)))
                    .collect();
                pairs.push((Value::str("n"), Value::Int(count)));
                Ok(vec![Value::Table(pairs)])
            }
            _ => Err(MethodError::no_such_method(super::SCREEN, method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_window::{HeadlessWindow, SurfaceStats, WindowId};
    use std::sync::{Arc, Mutex};

    fn config() -> ScreenConfig {
        ScreenConfig {
            color_depth: 24,
            ratio_width: 2,
            ratio_height: 1,
            max_width: 80,
            max_height: 25,
        }
    }

    fn screen_with_stats(keyboards: Vec<String>) -> (Screen, Arc<Mutex<SurfaceStats>>) {
        let window = HeadlessWindow::new(WindowId(1));
        let stats = window.stats();
        let screen = Screen::new(config(), keyboards, (8, 16), Box::new(window));
        (screen, stats)
    }

    #[test]
    fn initial_grid_is_defined_and_window_sized() {
        let (screen, stats) = screen_with_stats(vec![]);
        assert_eq!(screen.resolution(), (80, 25));
        assert_eq!(screen.viewport(), (80, 25));
        assert_eq!(screen.cell(0, 0), Some((0, 0, ' ' as u32)));
        assert_eq!(screen.cell(79, 24), Some((0, 0, ' ' as u32)));
        assert_eq!(screen.cell(80, 0), None);
        let stats = stats.lock().unwrap();
        assert_eq!((stats.width_px, stats.height_px), (80 * 8, 25 * 16));
        assert_eq!(stats.clears, 1);
    }

    #[test]
    fn set_char_updates_grids_and_paints() {
        let (mut screen, stats) = screen_with_stats(vec![]);
        screen.set_char(3, 2, 0x112233, 0x445566, 'A' as u32);
        assert_eq!(screen.cell(3, 2), Some((0x112233, 0x445566, 'A' as u32)));
        let stats = stats.lock().unwrap();
        let patch = stats.last_patch.unwrap();
        assert_eq!((patch.px_x, patch.px_y), (24, 32));
        assert_eq!((patch.bg, patch.fg), (0x112233, 0x445566));
    }

    #[test]
    fn resize_reinitialises_cells_and_resets_viewport() {
        let (mut screen, _stats) = screen_with_stats(vec![]);
        screen.set_char(0, 0, 1, 2, 'x' as u32);
        screen.set_viewport(10, 4);
        screen.update_size(10, 5);
        assert_eq!(screen.resolution(), (10, 5));
        assert_eq!(screen.viewport(), (10, 5));
        assert_eq!(screen.cell(0, 0), Some((0, 0, ' ' as u32)));
        assert_eq!(screen.cell(9, 4), Some((0, 0, ' ' as u32)));
    }

    #[test]
    fn get_keyboards_lists_addresses_in_order() {
        let (mut screen, _stats) =
            screen_with_stats(vec!["kb-one".to_string(), "kb-two".to_string()]);
        let result = screen.invoke("getKeyboards", &[]).unwrap();
        assert_eq!(
            result,
            vec![Value::Table(vec![
                (Value::Int(1), Value::str("kb-one")),
                (Value::Int(2), Value::str("kb-two")),
                (Value::str("n"), Value::Int(2)),
            ])]
        );
    }

    #[test]
    fn unknown_method_errors() {
        let (mut screen, _stats) = screen_with_stats(vec![]);
        let err = screen.invoke("turnOff", &[]).unwrap_err();
        assert_eq!(err.to_string(), "screen: no such method: turnOff");
    }
}
