//! GPU component: two colour registers and a weak handle to the screen the
//! GPU paints into.
//!
//! With no bound screen only `bind`, the colour/depth registers,
//! `maxResolution` and `getScreen` answer; everything else is an
//! "unbound GPU" guest error.

use crate::{Component, ComponentKind, Registry, Screen, SCREEN};
use core_bus::{Args, MethodError, MethodResult, Value};
use std::cell::{Ref, RefMut};
use std::rc::{Rc, Weak};

pub(crate) const METHODS: &[&str] = &[
    "bind",
    "getResolution",
    "setResolution",
    "setBackground",
    "setForeground",
    "getBackground",
    "getForeground",
    "fill",
    "set",
    "get",
    "getScreen",
    "maxResolution",
    "getDepth",
    "maxDepth",
    "setDepth",
    "getViewport",
    "setViewport",
    "copy",
];

/// Static GPU hardware parameters from the component's `config.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuConfig {
    pub color_depth: u32,
    pub max_width: u32,
    pub max_height: u32,
}

pub struct Gpu {
    pub color_depth: u32,
    pub max_width: u32,
    pub max_height: u32,
    background: u32,
    foreground: u32,
    bound: Option<Weak<Component>>,
}

fn screen_ref<'a>(comp: &'a Rc<Component>, method: &str) -> Result<Ref<'a, Screen>, MethodError> {
    Ref::filter_map(comp.kind(), ComponentKind::as_screen)
        .map_err(|_| MethodError::call(format!("{method}(): unbound GPU")))
}

fn screen_mut<'a>(comp: &'a Rc<Component>, method: &str) -> Result<RefMut<'a, Screen>, MethodError> {
    RefMut::filter_map(comp.kind_mut(), ComponentKind::as_screen_mut)
        .map_err(|_| MethodError::call(format!("{method}(): unbound GPU")))
}

impl Gpu {
    pub fn new(config: GpuConfig) -> Self {
        Self {
            color_depth: config.color_depth,
            max_width: config.max_width,
            max_height: config.max_height,
            background: 0x000000,
            foreground: 0xFFFFFF,
            bound: None,
        }
    }

    pub fn background(&self) -> u32 {
        self.background
    }

    pub fn foreground(&self) -> u32 {
        self.foreground
    }

    fn bound_component(&self, method: &str) -> Result<Rc<Component>, MethodError> {
        self.bound
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MethodError::call(format!("{method}(): unbound GPU")))
    }

    /// GPU limits, further clamped by the bound screen's when present.
    fn max_resolution(&self) -> (u32, u32) {
        let mut max = (self.max_width, self.max_height);
        if let Some(comp) = self.bound.as_ref().and_then(Weak::upgrade) {
            if let Ok(screen) = screen_ref(&comp, "maxResolution") {
                max.0 = max.0.min(screen.max_width);
                max.1 = max.1.min(screen.max_height);
            }
        }
        max
    }

    pub fn invoke(&mut self, registry: &Registry, method: &str, values: &[Value]) -> MethodResult {
        let args = Args::new(method, values);
        match method {
            "bind" => {
                args.between(1, 2)?;
                let address = args.str_utf8(0)?;
                let _reset = args.opt_bool(1);
                match registry.by_address(&address) {
                    None => Ok(vec![Value::Bool(false), Value::str("no such component")]),
                    Some(comp) if comp.type_name() != SCREEN => Ok(vec![
                        Value::Bool(false),
                        Value::str("component is not a screen"),
                    ]),
                    Some(comp) => {
                        self.bound = Some(Rc::downgrade(comp));
                        Ok(vec![Value::Bool(true)])
                    }
                }
            }
            "getScreen" => match self.bound.as_ref().and_then(Weak::upgrade) {
                Some(comp) => Ok(vec![Value::str(comp.address())]),
                None => Ok(vec![]),
            },
            "getResolution" => {
                let comp = self.bound_component(method)?;
                let screen = screen_ref(&comp, method)?;
                let (w, h) = screen.resolution();
                Ok(vec![Value::from(w), Value::from(h)])
            }
            "setResolution" => {
                let comp = self.bound_component(method)?;
                args.exactly(2)?;
                let w = args.number(0)? as i64;
                let h = args.number(1)? as i64;
                let (max_w, max_h) = self.max_resolution();
                {
                    let screen = screen_ref(&comp, method)?;
                    let (cur_w, cur_h) = screen.resolution();
                    if i64::from(cur_w) == w && i64::from(cur_h) == h {
                        return Ok(vec![Value::Bool(false)]);
                    }
                }
                if w < 1 || w > i64::from(max_w) || h < 1 || h > i64::from(max_h) {
                    return Err(MethodError::call("setResolution(): invalid resolution"));
                }
                let mut screen = screen_mut(&comp, method)?;
                screen.update_size(w as u32, h as u32);
                Ok(vec![Value::Bool(true)])
            }
            "maxResolution" => {
                let (w, h) = self.max_resolution();
                Ok(vec![Value::from(w), Value::from(h)])
            }
            "getViewport" => {
                let comp = self.bound_component(method)?;
                let screen = screen_ref(&comp, method)?;
                let (w, h) = screen.viewport();
                Ok(vec![Value::from(w), Value::from(h)])
            }
            "setViewport" => {
                let comp = self.bound_component(method)?;
                args.exactly(2)?;
                let w = args.number(0)? as i64;
                let h = args.number(1)? as i64;
                {
                    let screen = screen_ref(&comp, method)?;
                    let (cur_w, cur_h) = screen.viewport();
                    if i64::from(cur_w) == w && i64::from(cur_h) == h {
                        return Ok(vec![Value::Bool(false)]);
                    }
                }
                if w < 1 || h < 1 {
                    return Err(MethodError::call("setViewport(): invalid viewport"));
                }
                let mut screen = screen_mut(&comp, method)?;
                screen.set_viewport(w as u32, h as u32);
                Ok(vec![Value::Bool(true)])
            }
            "getDepth" => Ok(vec![Value::from(self.color_depth)]),
            "maxDepth" => {
                let screen_depth = self
                    .bound
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .and_then(|comp| screen_ref(&comp, method).ok().map(|s| s.color_depth))
                    .unwrap_or(24);
                Ok(vec![Value::from(screen_depth.min(self.color_depth))])
            }
            "setDepth" => {
                args.exactly(1)?;
                let _depth = args.number(0)?;
                Ok(vec![Value::Bool(true)])
            }
            "setBackground" | "setForeground" => {
                args.between(1, 2)?;
                let color = args.number(0)? as i64 as u32;
                if args.opt_bool(1) {
                    return Err(MethodError::call(format!(
                        "{method}(): palette is not implemented yet"
                    )));
                }
                let register = if method == "setBackground" {
                    &mut self.background
                } else {
                    &mut self.foreground
                };
                let old = *register;
                *register = color;
                Ok(vec![Value::Int(i64::from(old))])
            }
            "getBackground" => Ok(vec![Value::Int(i64::from(self.background))]),
            "getForeground" => Ok(vec![Value::Int(i64::from(self.foreground))]),
            "fill" => {
                let comp = self.bound_component(method)?;
                args.exactly(5)?;
                let x = args.number(0)? as i64 - 1;
                let y = args.number(1)? as i64 - 1;
                let w = args.number(2)? as i64;
                let h = args.number(3)? as i64;
                let text = args.str_utf8(4)?;
                let codepoint = text
                    .chars()
                    .next()
                    .ok_or_else(|| MethodError::bad_arg(method, 5))? as u32;
                let mut screen = screen_mut(&comp, method)?;
                let (sw, sh) = screen.resolution();
                let (sw, sh) = (i64::from(sw), i64::from(sh));
                if x < 0 || x + w > sw || y < 0 || y + h > sh {
                    return Ok(vec![Value::Bool(false)]);
                }
                for cx in x..x + w {
                    for cy in y..y + h {
                        screen.set_char(
                            cx as u32,
                            cy as u32,
                            self.background,
                            self.foreground,
                            codepoint,
                        );
                    }
                }
                screen.update();
                Ok(vec![Value::Bool(true)])
            }
            "set" => {
                let comp = self.bound_component(method)?;
                args.between(3, 4)?;
                let x = args.number(0)? as i64 - 1;
                let y = args.number(1)? as i64 - 1;
                let text = args.str_utf8(2)?;
                let vertical = args.opt_bool(3);
                let codepoints: Vec<u32> = text.chars().map(|c| c as u32).collect();
                let len = codepoints.len() as i64;
                let mut screen = screen_mut(&comp, method)?;
                let (sw, sh) = screen.resolution();
                let (sw, sh) = (i64::from(sw), i64::from(sh));
                if vertical {
                    if x < 0 || x >= sw || y < 0 || y + len > sh {
                        return Ok(vec![Value::Bool(false)]);
                    }
                    for (i, &cp) in codepoints.iter().enumerate() {
                        screen.set_char(
                            x as u32,
                            (y + i as i64) as u32,
                            self.background,
                            self.foreground,
                            cp,
                        );
                    }
                } else {
                    if x < 0 || x + len > sw || y < 0 || y >= sh {
                        return Ok(vec![Value::Bool(false)]);
                    }
                    for (i, &cp) in codepoints.iter().enumerate() {
                        screen.set_char(
                            (x + i as i64) as u32,
                            y as u32,
                            self.background,
                            self.foreground,
                            cp,
                        );
                    }
                }
                screen.update();
                Ok(vec![Value::Bool(true)])
            }
            "get" => {
                let comp = self.bound_component(method)?;
                args.exactly(2)?;
                let x = args.number(0)? as i64 - 1;
                let y = args.number(1)? as i64 - 1;
                let screen = screen_ref(&comp, method)?;
                let (sw, sh) = screen.resolution();
                if x < 0 || x >= i64::from(sw) || y < 0 || y >= i64::from(sh) {
                    return Err(MethodError::call("coordinates out of bounds"));
                }
                let (bg, fg, cp) = screen
                    .cell(x as u32, y as u32)
                    .ok_or_else(|| MethodError::call("coordinates out of bounds"))?;
                let text = char::from_u32(cp).unwrap_or('\u{FFFD}').to_string();
                Ok(vec![
                    Value::from(text),
                    Value::Int(i64::from(fg)),
                    Value::Int(i64::from(bg)),
                ])
            }
            "copy" => {
                let comp = self.bound_component(method)?;
                args.exactly(6)?;
                let x = args.number(0)? as i64 - 1;
                let y = args.number(1)? as i64 - 1;
                let w = args.number(2)? as i64;
                let h = args.number(3)? as i64;
                let tx = args.number(4)? as i64;
                let ty = args.number(5)? as i64;
                let mut screen = screen_mut(&comp, method)?;
                let (sw, sh) = screen.resolution();
                let (sw, sh) = (i64::from(sw), i64::from(sh));
                // Snapshot the source sub-rectangle before writing anything:
                // source and destination may overlap.
                let mut snapshot = Vec::new();
                for cx in x..x + w {
                    for cy in y..y + h {
                        let cell = if (0..sw).contains(&cx) && (0..sh).contains(&cy) {
                            screen.cell(cx as u32, cy as u32)
                        } else {
                            None
                        };
                        snapshot.push(cell);
                    }
                }
                let mut written = 0u64;
                let mut cursor = snapshot.into_iter();
                for cx in x..x + w {
                    for cy in y..y + h {
                        let cell = cursor.next().flatten();
                        let (dx, dy) = (cx + tx, cy + ty);
                        if let Some((bg, fg, cp)) = cell {
                            if (0..sw).contains(&dx) && (0..sh).contains(&dy) {
                                screen.set_char(dx as u32, dy as u32, bg, fg, cp);
                                written += 1;
                            }
                        }
                    }
                }
                screen.update();
                Ok(vec![Value::Bool(written > 0)])
            }
            _ => Err(MethodError::no_such_method(super::GPU, method)),
        }
    }
}
