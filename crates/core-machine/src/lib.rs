//! The computer: identity, memory ceiling, component registry, signal
//! queue, and the host-control handshake that ties the guest thread to the
//! event pump.

use core_components::{Component, ComponentKind, Machine, Registry, EEPROM, FILESYSTEM};
use core_signal::SignalQueue;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod input;

pub use input::{KeyTranslator, ScreenWiring};

/// Events the guest side posts to the host event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Terminate,
}

/// Sender half of the host event channel. Cloneable; the pump owns the
/// receiver.
#[derive(Clone)]
pub struct HostControl {
    tx: crossbeam_channel::Sender<HostEvent>,
}

impl HostControl {
    pub fn channel() -> (Self, crossbeam_channel::Receiver<HostEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn post(&self, event: HostEvent) {
        // The pump may already be gone during teardown; that's fine.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("duplicate component address: {address}")]
    DuplicateAddress { address: String },
    #[error("computer {computer} has no eeprom component")]
    NoEeprom { computer: String },
    #[error("temporary filesystem {name} is not a filesystem component")]
    BadTempFs { name: String },
    #[error("temporary filesystem {name} not found")]
    UnknownTempFs { name: String },
}

/// Static description of a computer, read from the project directory.
#[derive(Debug, Clone)]
pub struct ComputerConfig {
    pub name: String,
    pub address: String,
    pub memory: usize,
    pub tmp_fs_name: String,
}

pub struct Computer {
    name: String,
    address: String,
    start_time_ms: i64,
    memory_limit: usize,
    registry: Registry,
    tmp_fs: Weak<Component>,
    signals: Arc<SignalQueue>,
    control: HostControl,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computer")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Computer {
    /// Assemble a computer from its loaded components. Appends the
    /// self-reflective "computer" component and enforces the boot
    /// invariants: addresses unique, an EEPROM present, the designated
    /// temporary filesystem present and of filesystem type.
    pub fn boot(
        config: ComputerConfig,
        mut components: Vec<Rc<Component>>,
        signals: Arc<SignalQueue>,
        control: HostControl,
    ) -> Result<Rc<Self>, MachineError> {
        components.push(Component::new(
            config.name.clone(),
            config.address.clone(),
            ComponentKind::Machine(Machine),
        ));

        for (i, component) in components.iter().enumerate() {
            if components[..i]
                .iter()
                .any(|other| other.address() == component.address())
            {
                return Err(MachineError::DuplicateAddress {
                    address: component.address().to_string(),
                });
            }
        }

        if !components.iter().any(|c| c.type_name() == EEPROM) {
            return Err(MachineError::NoEeprom {
                computer: config.name,
            });
        }

        let tmp_fs = components
            .iter()
            .find(|c| c.name() == config.tmp_fs_name)
            .ok_or_else(|| MachineError::UnknownTempFs {
                name: config.tmp_fs_name.clone(),
            })?;
        if tmp_fs.type_name() != FILESYSTEM {
            return Err(MachineError::BadTempFs {
                name: config.tmp_fs_name.clone(),
            });
        }
        let tmp_fs = Rc::downgrade(tmp_fs);

        let start_time_ms = now_ms();
        tracing::info!(
            target: "machine",
            name = config.name.as_str(),
            address = config.address.as_str(),
            memory = config.memory,
            components = components.len(),
            "boot"
        );
        Ok(Rc::new(Self {
            name: config.name,
            address: config.address,
            start_time_ms,
            memory_limit: config.memory,
            registry: Registry::new(components),
            tmp_fs,
            signals,
            control,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn signals(&self) -> &Arc<SignalQueue> {
        &self.signals
    }

    pub fn uptime_seconds(&self) -> f64 {
        (now_ms() - self.start_time_ms) as f64 / 1000.0
    }

    pub fn tmp_address(&self) -> Option<String> {
        self.tmp_fs
            .upgrade()
            .map(|fs| fs.address().to_string())
    }

    /// The EEPROM primary blob this computer boots from.
    pub fn boot_payload(&self) -> Option<Vec<u8>> {
        let component = self
            .registry
            .components()
            .iter()
            .find(|c| c.type_name() == EEPROM)?;
        let kind = component.kind();
        match &*kind {
            ComponentKind::Eeprom(eeprom) => Some(eeprom.primary()),
            _ => None,
        }
    }

    /// Guest-requested shutdown: log the goodbye traceback, then tear down.
    pub fn shutdown(&self, reboot: bool, traceback: &str) {
        tracing::info!(target: "machine", name = self.name.as_str(), "{traceback}");
        if reboot {
            tracing::warn!(
                target: "machine",
                "rebooting is not supported, restart the computer manually"
            );
        }
        self.teardown();
    }

    /// Wake every signal waiter and tell the event pump to stop.
    /// Idempotent; called on every path out of the guest run loop.
    pub fn teardown(&self) {
        self.signals.terminate();
        self.control.post(HostEvent::Terminate);
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_components::{Eeprom, Filesystem, Keyboard};
    use core_signal::DEFAULT_CAPACITY;

    fn parts(dir: &std::path::Path) -> Vec<Rc<Component>> {
        std::fs::create_dir_all(dir.join("tmp.filesystem/data")).unwrap();
        vec![
            Component::new(
                "bios",
                "addr-eeprom",
                ComponentKind::Eeprom(Eeprom::new(dir.join("bios.eeprom"))),
            ),
            Component::new(
                "tmp",
                "addr-tmpfs",
                ComponentKind::Filesystem(Filesystem::new(dir.join("tmp.filesystem"))),
            ),
        ]
    }

    fn config() -> ComputerConfig {
        ComputerConfig {
            name: "pc".to_string(),
            address: "addr-pc".to_string(),
            memory: 1 << 20,
            tmp_fs_name: "tmp".to_string(),
        }
    }

    fn boot(components: Vec<Rc<Component>>) -> Result<Rc<Computer>, MachineError> {
        let (control, _rx) = HostControl::channel();
        Computer::boot(
            config(),
            components,
            Arc::new(SignalQueue::new(DEFAULT_CAPACITY)),
            control,
        )
    }

    #[test]
    fn boot_appends_self_component() {
        let dir = tempfile::tempdir().unwrap();
        let computer = boot(parts(dir.path())).unwrap();
        let own = computer.registry().by_address("addr-pc").unwrap();
        assert_eq!(own.type_name(), "computer");
        assert_eq!(own.name(), "pc");
        assert_eq!(computer.tmp_address().unwrap(), "addr-tmpfs");
    }

    #[test]
    fn duplicate_addresses_fail_boot() {
        let dir = tempfile::tempdir().unwrap();
        let mut components = parts(dir.path());
        components.push(Component::new(
            "kb",
            "addr-eeprom",
            ComponentKind::Keyboard(Keyboard),
        ));
        let err = boot(components).unwrap_err();
        assert!(matches!(err, MachineError::DuplicateAddress { .. }));
    }

    #[test]
    fn missing_eeprom_fails_boot() {
        let dir = tempfile::tempdir().unwrap();
        let components = vec![parts(dir.path()).remove(1)];
        let err = boot(components).unwrap_err();
        assert!(matches!(err, MachineError::NoEeprom { .. }));
    }

    #[test]
    fn tmp_fs_must_exist_and_be_a_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let components = vec![parts(dir.path()).remove(0)];
        let err = boot(components).unwrap_err();
        assert!(matches!(err, MachineError::UnknownTempFs { .. }));

        let mut components = parts(dir.path());
        components.push(Component::new(
            "oops",
            "addr-kb",
            ComponentKind::Keyboard(Keyboard),
        ));
        let mut cfg = config();
        cfg.tmp_fs_name = "oops".to_string();
        let (control, _rx) = HostControl::channel();
        let err = Computer::boot(
            cfg,
            components,
            Arc::new(SignalQueue::new(DEFAULT_CAPACITY)),
            control,
        )
        .unwrap_err();
        assert!(matches!(err, MachineError::BadTempFs { .. }));
    }

    #[test]
    fn shutdown_terminates_queue_and_posts_event() {
        let dir = tempfile::tempdir().unwrap();
        let (control, rx) = HostControl::channel();
        let computer = Computer::boot(
            config(),
            parts(dir.path()),
            Arc::new(SignalQueue::new(DEFAULT_CAPACITY)),
            control,
        )
        .unwrap();
        computer.shutdown(false, "Computer shut down.");
        assert!(computer.signals().is_terminated());
        assert_eq!(rx.try_recv().unwrap(), HostEvent::Terminate);
    }
}
