//! Windowing boundary.
//!
//! The emulator core paints cells and consumes key events through these
//! traits; the concrete SDL/TTF layer lives outside this repository. The
//! headless backend implements the same contract with an in-memory surface
//! and an injectable event channel, and is what the CLI and the tests run
//! against.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};

pub mod scancode;
pub use scancode::{scancode_for, Key};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL  = 0b0000_0001;
        const SHIFT = 0b0000_0010;
        const ALT   = 0b0000_0100;
    }
}

/// Identifies which screen's window an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u32);

/// Events delivered by the windowing layer.
///
/// `text` carries the translated text codepoint for printable presses; the
/// raw key identity is always present so control chords stay resolvable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    KeyDown {
        window: WindowId,
        key: Key,
        text: Option<char>,
        mods: Modifiers,
    },
    KeyUp {
        window: WindowId,
        key: Key,
        mods: Modifiers,
    },
    Quit,
}

/// One cell's worth of painting: a background rectangle in pixel space plus
/// a foreground glyph. Glyph rasterisation (lazy font load included) is the
/// backend's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPatch {
    pub px_x: u32,
    pub px_y: u32,
    pub px_w: u32,
    pub px_h: u32,
    pub bg: u32,
    pub fg: u32,
    pub codepoint: u32,
}

/// A screen's host window. Painting is buffered; `present` flushes.
///
/// `Send` because components are assembled on the boot thread and handed to
/// the guest thread whole; all painting happens on the guest thread after
/// that.
pub trait WindowSurface: Send {
    fn id(&self) -> WindowId;
    fn resize(&mut self, px_w: u32, px_h: u32) -> Result<()>;
    fn clear(&mut self, rgb: u32) -> Result<()>;
    fn paint_cell(&mut self, patch: &CellPatch) -> Result<()>;
    fn present(&mut self) -> Result<()>;
}

/// Creates windows and owns the event stream feeding the host pump.
pub trait WindowBackend {
    fn open_window(&mut self, title: &str, px_w: u32, px_h: u32) -> Result<Box<dyn WindowSurface>>;
    fn events(&self) -> Receiver<WindowEvent>;
}

// -------------------------------------------------------------------------
// Headless backend
// -------------------------------------------------------------------------

/// Observable state of a headless surface, shared with tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfaceStats {
    pub width_px: u32,
    pub height_px: u32,
    pub clears: u64,
    pub cells_painted: u64,
    pub presents: u64,
    pub last_patch: Option<CellPatch>,
}

pub struct HeadlessWindow {
    id: WindowId,
    stats: Arc<Mutex<SurfaceStats>>,
}

impl HeadlessWindow {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            stats: Arc::new(Mutex::new(SurfaceStats::default())),
        }
    }

    /// Handle for inspecting the surface after it has been boxed away.
    pub fn stats(&self) -> Arc<Mutex<SurfaceStats>> {
        Arc::clone(&self.stats)
    }
}

impl WindowSurface for HeadlessWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn resize(&mut self, px_w: u32, px_h: u32) -> Result<()> {
        let mut stats = self.stats.lock().expect("surface stats poisoned");
        stats.width_px = px_w;
        stats.height_px = px_h;
        Ok(())
    }

    fn clear(&mut self, _rgb: u32) -> Result<()> {
        self.stats.lock().expect("surface stats poisoned").clears += 1;
        Ok(())
    }

    fn paint_cell(&mut self, patch: &CellPatch) -> Result<()> {
        let mut stats = self.stats.lock().expect("surface stats poisoned");
        stats.cells_painted += 1;
        stats.last_patch = Some(*patch);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.stats.lock().expect("surface stats poisoned").presents += 1;
        Ok(())
    }
}

/// Backend with no real windows: surfaces record what would be painted and
/// the event stream only carries what callers inject (tests, the shutdown
/// path).
pub struct HeadlessBackend {
    tx: Sender<WindowEvent>,
    rx: Receiver<WindowEvent>,
    next_id: u32,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx, next_id: 0 }
    }

    /// Sender half for injecting events into the pump.
    pub fn injector(&self) -> Sender<WindowEvent> {
        self.tx.clone()
    }
}

impl WindowBackend for HeadlessBackend {
    fn open_window(&mut self, title: &str, px_w: u32, px_h: u32) -> Result<Box<dyn WindowSurface>> {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        tracing::debug!(target: "window", title, px_w, px_h, id = id.0, "open headless window");
        let mut window = HeadlessWindow::new(id);
        window.resize(px_w, px_h)?;
        Ok(Box::new(window))
    }

    fn events(&self) -> Receiver<WindowEvent> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_surface_records_operations() {
        let window = HeadlessWindow::new(WindowId(9));
        let stats = window.stats();
        let mut window: Box<dyn WindowSurface> = Box::new(window);
        assert_eq!(window.id(), WindowId(9));
        window.resize(64, 128).unwrap();
        window
            .paint_cell(&CellPatch {
                px_x: 0,
                px_y: 0,
                px_w: 8,
                px_h: 16,
                bg: 0x112233,
                fg: 0xffffff,
                codepoint: 'A' as u32,
            })
            .unwrap();
        window.present().unwrap();
        let stats = stats.lock().unwrap();
        assert_eq!((stats.width_px, stats.height_px), (64, 128));
        assert_eq!(stats.cells_painted, 1);
        assert_eq!(stats.presents, 1);
        assert_eq!(stats.last_patch.unwrap().codepoint, 'A' as u32);
    }

    #[test]
    fn injected_events_reach_the_receiver() {
        let backend = HeadlessBackend::new();
        let rx = backend.events();
        backend.injector().send(WindowEvent::Quit).unwrap();
        assert_eq!(rx.recv().unwrap(), WindowEvent::Quit);
    }
}
