//! EEPROM component: file-backed, read-through, bounded.

use core_bus::{MethodError, MethodResult, Value};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const MAX_PRIMARY_SIZE: usize = 4096;
pub const MAX_SECONDARY_SIZE: usize = 256;

const PRIMARY_FILE: &str = "primary.lua";
const SECONDARY_FILE: &str = "secondary.bin";
const LABEL_FILE: &str = "label.txt";

pub(crate) const METHODS: &[&str] = &["getSize", "get", "getData", "getLabel", "getDataSize"];

pub struct Eeprom {
    folder: PathBuf,
}

impl Eeprom {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self { folder: folder.into() }
    }

    /// The boot payload. Never longer than `MAX_PRIMARY_SIZE`, even when the
    /// backing file is; absent file reads as empty.
    pub fn primary(&self) -> Vec<u8> {
        bounded_read(&self.folder.join(PRIMARY_FILE), MAX_PRIMARY_SIZE)
    }

    pub fn secondary(&self) -> Vec<u8> {
        bounded_read(&self.folder.join(SECONDARY_FILE), MAX_SECONDARY_SIZE)
    }

    pub fn label(&self) -> String {
        let content = std::fs::read_to_string(self.folder.join(LABEL_FILE)).unwrap_or_default();
        content.lines().next().unwrap_or_default().to_string()
    }

    pub fn invoke(&self, method: &str, _args: &[Value]) -> MethodResult {
        match method {
            "getSize" => Ok(vec![Value::Int(MAX_PRIMARY_SIZE as i64)]),
            "getDataSize" => Ok(vec![Value::Int(MAX_SECONDARY_SIZE as i64)]),
            "get" => Ok(vec![Value::Str(self.primary())]),
            "getData" => Ok(vec![Value::Str(self.secondary())]),
            "getLabel" => Ok(vec![Value::from(self.label())]),
            _ => Err(MethodError::no_such_method(super::EEPROM, method)),
        }
    }
}

fn bounded_read(path: &Path, limit: usize) -> Vec<u8> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let mut buffer = Vec::with_capacity(limit);
    if let Err(err) = file.take(limit as u64).read_to_end(&mut buffer) {
        tracing::warn!(target: "component.eeprom", path = %path.display(), %err, "read failed");
        return Vec::new();
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, Eeprom) {
        let dir = tempfile::tempdir().unwrap();
        let eeprom = Eeprom::new(dir.path());
        (dir, eeprom)
    }

    #[test]
    fn absent_files_read_empty() {
        let (_dir, eeprom) = fixture();
        assert!(eeprom.primary().is_empty());
        assert!(eeprom.secondary().is_empty());
        assert_eq!(eeprom.label(), "");
    }

    #[test]
    fn primary_is_clamped_to_declared_size() {
        let (dir, eeprom) = fixture();
        std::fs::write(dir.path().join("primary.lua"), vec![b'x'; MAX_PRIMARY_SIZE + 100]).unwrap();
        assert_eq!(eeprom.primary().len(), MAX_PRIMARY_SIZE);
    }

    #[test]
    fn secondary_is_clamped_to_declared_size() {
        let (dir, eeprom) = fixture();
        std::fs::write(dir.path().join("secondary.bin"), vec![0u8; MAX_SECONDARY_SIZE * 2]).unwrap();
        assert_eq!(eeprom.secondary().len(), MAX_SECONDARY_SIZE);
    }

    #[test]
    fn label_is_first_line() {
        let (dir, eeprom) = fixture();
        std::fs::write(dir.path().join("label.txt"), "BIOS\nsecond line").unwrap();
        assert_eq!(eeprom.label(), "BIOS");
    }

    #[test]
    fn invoke_surface() {
        let (dir, eeprom) = fixture();
        std::fs::write(dir.path().join("primary.lua"), "print('hi')").unwrap();
        assert_eq!(
            eeprom.invoke("getSize", &[]).unwrap(),
            vec![Value::Int(4096)]
        );
        assert_eq!(
            eeprom.invoke("getDataSize", &[]).unwrap(),
            vec![Value::Int(256)]
        );
        assert_eq!(
            eeprom.invoke("get", &[]).unwrap(),
            vec![Value::str("print('hi')")]
        );
        let err = eeprom.invoke("set", &[]).unwrap_err();
        assert_eq!(err.to_string(), "eeprom: no such method: set");
    }
}
