//! Virtual hardware components and the registry that the bus dispatches
//! into.
//!
//! A `Component` is the uniform surface (address, name, type, invoke,
//! method list); `ComponentKind` is the closed set of concrete variants.
//! Components are shared `Rc`s: the owning computer holds the registry,
//! a GPU holds a weak handle to its bound screen, and all mutation is
//! interior and guest-thread-only.

use core_bus::{MethodError, MethodResult, Value};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

pub mod eeprom;
pub mod filesystem;
pub mod gpu;
pub mod screen;

pub use eeprom::Eeprom;
pub use filesystem::Filesystem;
pub use gpu::{Gpu, GpuConfig};
pub use screen::{Screen, ScreenConfig};

pub const EEPROM: &str = "eeprom";
pub const FILESYSTEM: &str = "filesystem";
pub const SCREEN: &str = "screen";
pub const GPU: &str = "gpu";
pub const KEYBOARD: &str = "keyboard";
pub const INTERNET: &str = "internet";
pub const COMPUTER: &str = "computer";

/// Passive input device: it only exists so signals can name it.
#[derive(Debug, Default)]
pub struct Keyboard;

/// Methodless placeholder; no network client lives in this core.
#[derive(Debug, Default)]
pub struct Internet;

/// The computer's self-reflective component.
#[derive(Debug, Default)]
pub struct Machine;

pub enum ComponentKind {
    Eeprom(Eeprom),
    Filesystem(Filesystem),
    Screen(Screen),
    Gpu(Gpu),
    Keyboard(Keyboard),
    Internet(Internet),
    Machine(Machine),
}

impl ComponentKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Eeprom(_) => EEPROM,
            ComponentKind::Filesystem(_) => FILESYSTEM,
            ComponentKind::Screen(_) => SCREEN,
            ComponentKind::Gpu(_) => GPU,
            ComponentKind::Keyboard(_) => KEYBOARD,
            ComponentKind::Internet(_) => INTERNET,
            ComponentKind::Machine(_) => COMPUTER,
        }
    }

    pub fn as_screen(&self) -> Option<&Screen> {
        match self {
            ComponentKind::Screen(screen) => Some(screen),
            _ => None,
        }
    }

    pub fn as_screen_mut(&mut self) -> Option<&mut Screen> {
        match self {
            ComponentKind::Screen(screen) => Some(screen),
            _ => None,
        }
    }

    pub fn as_filesystem_mut(&mut self) -> Option<&mut Filesystem> {
        match self {
            ComponentKind::Filesystem(fs) => Some(fs),
            _ => None,
        }
    }
}

pub struct Component {
    address: String,
    name: String,
    type_name: &'static str,
    kind: RefCell<ComponentKind>,
}

impl Component {
    pub fn new(name: impl Into<String>, address: impl Into<String>, kind: ComponentKind) -> Rc<Self> {
        let type_name = kind.type_name();
        Rc::new(Self {
            address: address.into(),
            name: name.into(),
            type_name,
            kind: RefCell::new(kind),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component's type tag. Lives outside the `RefCell` so lookups and
    /// type checks never contend with an in-flight method call.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> Ref<'_, ComponentKind> {
        self.kind.borrow()
    }

    pub fn kind_mut(&self) -> RefMut<'_, ComponentKind> {
        self.kind.borrow_mut()
    }

    /// Guest-callable method names, used by `component.proxy`.
    pub fn methods(&self) -> &'static [&'static str] {
        match self.type_name {
            EEPROM => eeprom::METHODS,
            FILESYSTEM => filesystem::METHODS,
            SCREEN => screen::METHODS,
            GPU => gpu::METHODS,
            _ => &[],
        }
    }

    /// Dispatch one bus call. Every error is guest-surfaced; nothing here
    /// may panic the host.
    pub fn invoke(&self, registry: &Registry, method: &str, args: &[Value]) -> MethodResult {
        tracing::trace!(
            target: "bus",
            component = self.type_name,
            address = self.address.as_str(),
            method,
            args = args.len(),
            "invoke"
        );
        let mut kind = self.kind.borrow_mut();
        match &mut *kind {
            ComponentKind::Eeprom(eeprom) => eeprom.invoke(method, args),
            ComponentKind::Filesystem(fs) => fs.invoke(method, args),
            ComponentKind::Screen(screen) => screen.invoke(method, args),
            ComponentKind::Gpu(gpu) => gpu.invoke(registry, method, args),
            ComponentKind::Keyboard(_) => Err(MethodError::no_such_method(KEYBOARD, method)),
            ComponentKind::Internet(_) => Err(MethodError::no_such_method(INTERNET, method)),
            ComponentKind::Machine(_) => Err(MethodError::no_such_method(COMPUTER, method)),
        }
    }
}

/// A computer's ordered component set. Immutable after boot; components do
/// not hot-plug.
pub struct Registry {
    components: Vec<Rc<Component>>,
}

impl Registry {
    pub fn new(components: Vec<Rc<Component>>) -> Self {
        Self { components }
    }

    pub fn by_address(&self, address: &str) -> Option<&Rc<Component>> {
        self.components.iter().find(|c| c.address() == address)
    }

    pub fn by_name(&self, name: &str) -> Option<&Rc<Component>> {
        self.components.iter().find(|c| c.name() == name)
    }

    pub fn components(&self) -> &[Rc<Component>] {
        &self.components
    }
}
