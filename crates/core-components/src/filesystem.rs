//! Filesystem component: descriptor-indexed handles over a sandboxed data
//! directory.
//!
//! Every guest path is resolved lexically against the sandbox root; `..`
//! never climbs above it. Descriptors are zero-based integers; freed slots
//! are reused FIFO.

use core_bus::{Args, MethodError, MethodResult, Value};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const MAX_READ_BUFFER: usize = 4096;

const DATA_DIR: &str = "data";
const LABEL_FILE: &str = "label.txt";
const READONLY_MARKER: &str = "readonly.txt";

pub(crate) const METHODS: &[&str] = &[
    "isDirectory",
    "exists",
    "size",
    "lastModified",
    "remove",
    "rename",
    "open",
    "read",
    "write",
    "seek",
    "close",
    "list",
    "isReadOnly",
    "getLabel",
    "setLabel",
    "makeDirectory",
    "spaceUsed",
    "spaceTotal",
];

struct Handle {
    file: File,
    mode: &'static str,
}

pub struct Filesystem {
    folder: PathBuf,
    descriptors: Vec<Option<Handle>>,
    free_slots: VecDeque<usize>,
}

impl Filesystem {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            descriptors: Vec::new(),
            free_slots: VecDeque::new(),
        }
    }

    pub fn data_root(&self) -> PathBuf {
        self.folder.join(DATA_DIR)
    }

    pub fn is_readonly(&self) -> bool {
        self.folder.join(READONLY_MARKER).is_file()
    }

    pub fn label(&self) -> String {
        let content =
            std::fs::read_to_string(self.folder.join(LABEL_FILE)).unwrap_or_default();
        content.lines().next().unwrap_or_default().to_string()
    }

    pub fn set_label(&self, label: &str) -> std::io::Result<()> {
        std::fs::write(self.folder.join(LABEL_FILE), label)
    }

    /// Bytes of regular files under the sandbox, recursively.
    pub fn space_used(&self) -> u64 {
        fn walk(dir: &Path) -> u64 {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return 0;
            };
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    match entry.metadata() {
                        Ok(md) if md.is_file() => md.len(),
                        Ok(md) if md.is_dir() => walk(&path),
                        _ => 0,
                    }
                })
                .sum()
        }
        walk(&self.data_root())
    }

    /// Resolve a guest path to a host path inside the sandbox. Lexical:
    /// `.` and empty segments vanish, `..` pops, popping past the root is
    /// an escape and yields `None`.
    pub fn resolve(&self, guest_path: &str) -> Option<PathBuf> {
        let mut kept: Vec<&str> = Vec::new();
        for segment in guest_path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    kept.pop()?;
                }
                other => kept.push(other),
            }
        }
        let mut path = self.data_root();
        path.extend(&kept);
        Some(path)
    }

    // -- descriptor table ---------------------------------------------------

    /// Current size of the descriptor table (open and freed slots alike).
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptor_is_open(&self, idx: usize) -> bool {
        matches!(self.descriptors.get(idx), Some(Some(_)))
    }

    pub fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.free_slots.iter().copied()
    }

    fn allocate(&mut self, handle: Handle) -> usize {
        match self.free_slots.pop_front() {
            Some(idx) => {
                self.descriptors[idx] = Some(handle);
                idx
            }
            None => {
                self.descriptors.push(Some(handle));
                self.descriptors.len() - 1
            }
        }
    }

    fn handle_mut(&mut self, fd: i64, method: &str) -> Result<&mut Handle, MethodError> {
        let missing = || MethodError::call(format!("{method}(): no such descriptor"));
        let idx = usize::try_from(fd).map_err(|_| missing())?;
        self.descriptors
            .get_mut(idx)
            .and_then(Option::as_mut)
            .ok_or_else(missing)
    }

    // -- dispatch -----------------------------------------------------------

    pub fn invoke(&mut self, method: &str, values: &[Value]) -> MethodResult {
        let args = Args::new(method, values);
        match method {
            "isDirectory" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                let is_dir = self.resolve(&path).is_some_and(|p| p.is_dir());
                Ok(vec![Value::Bool(is_dir)])
            }
            "exists" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                let exists = self.resolve(&path).is_some_and(|p| p.exists());
                Ok(vec![Value::Bool(exists)])
            }
            "size" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                let size = self
                    .resolve(&path)
                    .and_then(|p| std::fs::metadata(p).ok())
                    .filter(|md| md.is_file())
                    .map(|md| md.len() as i64)
                    .unwrap_or(0);
                Ok(vec![Value::Int(size)])
            }
            "lastModified" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                let seconds = self
                    .resolve(&path)
                    .and_then(|p| std::fs::metadata(p).ok())
                    .and_then(|md| md.modified().ok())
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                Ok(vec![Value::Int(seconds)])
            }
            "remove" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                if self.is_readonly() {
                    return Ok(vec![Value::Bool(false)]);
                }
                let removed = self.resolve(&path).is_some_and(|p| {
                    if p.is_dir() {
                        std::fs::remove_dir_all(&p).is_ok()
                    } else {
                        std::fs::remove_file(&p).is_ok()
                    }
                });
                Ok(vec![Value::Bool(removed)])
            }
            "makeDirectory" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                if self.is_readonly() {
                    return Ok(vec![Value::Bool(false)]);
                }
                let created = self
                    .resolve(&path)
                    .filter(|p| !p.exists())
                    .is_some_and(|p| std::fs::create_dir_all(p).is_ok());
                Ok(vec![Value::Bool(created)])
            }
            "rename" => {
                args.exactly(2)?;
                let src = args.str_utf8(0)?;
                let dst = args.str_utf8(1)?;
                if self.is_readonly() {
                    return Ok(vec![Value::Bool(false)]);
                }
                let renamed = match (self.resolve(&src), self.resolve(&dst)) {
                    (Some(src), Some(dst)) => std::fs::rename(src, dst).is_ok(),
                    _ => false,
                };
                Ok(vec![Value::Bool(renamed)])
            }
            "open" => {
                args.between(1, 2)?;
                let path = args.str_utf8(0)?;
                let mode = args.opt_str_utf8(1)?.unwrap_or_else(|| "r".to_string());
                self.open(&path, &mode)
            }
            "read" => {
                args.exactly(2)?;
                let fd = args.int(0)?;
                let count = args.number(1)? as i64;
                self.read(fd, count)
            }
            "write" => {
                args.exactly(2)?;
                let fd = args.int(0)?;
                let bytes = args.str(1)?.to_vec();
                let handle = self.handle_mut(fd, "write")?;
                let ok = handle.file.write_all(&bytes).is_ok();
                Ok(vec![Value::Bool(ok)])
            }
            "seek" => {
                args.exactly(3)?;
                let fd = args.int(0)?;
                let whence = args.str_utf8(1)?;
                let offset = args.number(2)? as i64;
                self.seek(fd, &whence, offset)
            }
            "close" => {
                args.exactly(1)?;
                let fd = args.int(0)?;
                // A bogus fd must never reach the free list.
                self.handle_mut(fd, "close")?;
                let idx = fd as usize;
                if let Some(handle) = self.descriptors[idx].take() {
                    tracing::debug!(target: "component.fs", fd = idx, mode = handle.mode, "close");
                    drop(handle);
                }
                self.free_slots.push_back(idx);
                Ok(vec![])
            }
            "list" => {
                args.exactly(1)?;
                let path = args.str_utf8(0)?;
                Ok(self.list(&path))
            }
            "isReadOnly" => Ok(vec![Value::Bool(self.is_readonly())]),
            "getLabel" => Ok(vec![Value::from(self.label())]),
            "setLabel" => {
                args.exactly(1)?;
                let label = args.str_utf8(0)?;
                if self.is_readonly() {
                    return Err(MethodError::call("setLabel(): filesystem is read-only"));
                }
                self.set_label(&label)
                    .map_err(|err| MethodError::call(format!("setLabel(): {err}")))?;
                Ok(vec![Value::from(label)])
            }
            "spaceUsed" => Ok(vec![Value::Int(self.space_used() as i64)]),
            "spaceTotal" => {
                let free = fs2::available_space(self.data_root()).unwrap_or(0);
                Ok(vec![Value::Int((self.space_used() + free) as i64)])
            }
            _ => Err(MethodError::no_such_method(super::FILESYSTEM, method)),
        }
    }

    fn open(&mut self, guest_path: &str, mode: &str) -> MethodResult {
        let (options, mode, write) = match mode {
            "r" | "rb" => {
                let mut opts = OpenOptions::new();
                opts.read(true);
                (opts, "r", false)
            }
            "w" | "wb" => {
                let mut opts = OpenOptions::new();
                opts.write(true).create(true).truncate(true);
                (opts, "w", true)
            }
            "a" | "ab" => {
                let mut opts = OpenOptions::new();
                opts.write(true).create(true);
                (opts, "a", true)
            }
            other => {
                return Err(MethodError::call(format!("open(): unknown mode: {other}")));
            }
        };
        if write && self.is_readonly() {
            return Err(MethodError::call("open(): filesystem is read-only"));
        }
        let path = self
            .resolve(guest_path)
            .ok_or_else(|| MethodError::call("open(): invalid path"))?;
        let mut file = options
            .open(&path)
            .map_err(|err| MethodError::call(format!("open(): {err}")))?;
        if mode == "a" {
            file.seek(SeekFrom::End(0))
                .map_err(|err| MethodError::call(format!("open(): {err}")))?;
        }
        let fd = self.allocate(Handle { file, mode });
        tracing::debug!(target: "component.fs", fd, path = guest_path, mode, "open");
        Ok(vec![Value::Int(fd as i64)])
    }

    fn read(&mut self, fd: i64, count: i64) -> MethodResult {
        let count = if count <= 0 {
            MAX_READ_BUFFER
        } else {
            (count as usize).min(MAX_READ_BUFFER)
        };
        let handle = self.handle_mut(fd, "read")?;
        let mut buffer = vec![0u8; count];
        let read = handle
            .file
            .read(&mut buffer)
            .map_err(|err| MethodError::call(format!("read(): {err}")))?;
        if read == 0 {
            return Ok(vec![]);
        }
        buffer.truncate(read);
        Ok(vec![Value::Str(buffer)])
    }

    /// Seek with the target clamped into `[0, end]`; returns the resulting
    /// absolute position.
    fn seek(&mut self, fd: i64, whence: &str, offset: i64) -> MethodResult {
        let handle = self.handle_mut(fd, "seek")?;
        let io_err = |err: std::io::Error| MethodError::call(format!("seek(): {err}"));
        let current = handle.file.stream_position().map_err(io_err)? as i64;
        let end = handle.file.seek(SeekFrom::End(0)).map_err(io_err)? as i64;
        let target = match whence {
            "set" => offset,
            "cur" => current.saturating_add(offset),
            "end" => end.saturating_add(offset),
            _ => return Err(MethodError::call("seek(): invalid argument #2")),
        };
        let clamped = target.clamp(0, end);
        handle
            .file
            .seek(SeekFrom::Start(clamped as u64))
            .map_err(io_err)?;
        Ok(vec![Value::Int(clamped)])
    }

    /// Directory listing: sorted names, directories with a trailing slash,
    /// plus an `n` count field. Not a directory yields no values.
    fn list(&self, guest_path: &str) -> Vec<Value> {
        let Some(path) = self.resolve(guest_path) else {
            return vec![];
        };
        if !path.is_dir() {
            return vec![];
        }
        let Ok(entries) = std::fs::read_dir(&path) else {
            return vec![];
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort();
        let count = names.len() as i64;
        let mut pairs: Vec<(Value, Value)> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (Value::Int(i as i64 + 1), Value::from(name)))
            .collect();
        pairs.push((Value::str("n"), Value::Int(count)));
        vec![Value::Table(pairs)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixture() -> (tempfile::TempDir, Filesystem) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let fs = Filesystem::new(dir.path());
        (dir, fs)
    }

    fn call(fs: &mut Filesystem, method: &str, args: Vec<Value>) -> Vec<Value> {
        fs.invoke(method, &args).unwrap()
    }

    #[test]
    fn write_then_read_round_trip() {
        let (_dir, mut fs) = fixture();
        let fd = call(&mut fs, "open", vec![Value::str("/a.txt"), Value::str("w")]);
        let fd = fd[0].clone();
        assert_eq!(
            call(&mut fs, "write", vec![fd.clone(), Value::str("hello")]),
            vec![Value::Bool(true)]
        );
        call(&mut fs, "close", vec![fd]);

        let fd = call(&mut fs, "open", vec![Value::str("/a.txt")])[0].clone();
        let read = call(&mut fs, "read", vec![fd.clone(), Value::Int(100)]);
        assert_eq!(read, vec![Value::str("hello")]);
        // Subsequent read is at end-of-file: no values.
        assert!(call(&mut fs, "read", vec![fd.clone(), Value::Int(100)]).is_empty());
        call(&mut fs, "close", vec![fd]);
    }

    #[test]
    fn descriptors_reuse_freed_slots_fifo() {
        let (_dir, mut fs) = fixture();
        let open = |fs: &mut Filesystem, p: &str| {
            fs.invoke("open", &[Value::str(p), Value::str("w")]).unwrap()[0]
                .as_int()
                .unwrap()
        };
        let a = open(&mut fs, "/a");
        let b = open(&mut fs, "/b");
        let c = open(&mut fs, "/c");
        assert_eq!((a, b, c), (0, 1, 2));
        fs.invoke("close", &[Value::Int(b)]).unwrap();
        fs.invoke("close", &[Value::Int(a)]).unwrap();
        // Slots come back in release order.
        assert_eq!(open(&mut fs, "/d"), 1);
        assert_eq!(open(&mut fs, "/e"), 0);
        assert_eq!(open(&mut fs, "/f"), 3);
    }

    #[test]
    fn closed_descriptor_rejects_io() {
        let (_dir, mut fs) = fixture();
        let fd = call(&mut fs, "open", vec![Value::str("/a"), Value::str("w")])[0].clone();
        call(&mut fs, "close", vec![fd.clone()]);
        let err = fs.invoke("read", &[fd.clone(), Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "read(): no such descriptor");
        let err = fs.invoke("close", &[fd]).unwrap_err();
        assert_eq!(err.to_string(), "close(): no such descriptor");
    }

    #[test]
    fn sandbox_rejects_escapes() {
        let (dir, mut fs) = fixture();
        std::fs::write(dir.path().join("outside.txt"), "secret").unwrap();

        assert_eq!(
            call(&mut fs, "exists", vec![Value::str("../outside.txt")]),
            vec![Value::Bool(false)]
        );
        let err = fs
            .invoke("open", &[Value::str("/../outside.txt")])
            .unwrap_err();
        assert_eq!(err.to_string(), "open(): invalid path");

        // `..` inside the sandbox is fine as long as it stays inside.
        call(&mut fs, "makeDirectory", vec![Value::str("/sub")]);
        assert_eq!(
            fs.resolve("/sub/../a.txt").unwrap(),
            fs.data_root().join("a.txt")
        );
    }

    #[test]
    fn seek_clamps_to_file_bounds() {
        let (_dir, mut fs) = fixture();
        let fd = call(&mut fs, "open", vec![Value::str("/a"), Value::str("w")])[0].clone();
        call(&mut fs, "write", vec![fd.clone(), Value::str("0123456789")]);

        let pos = call(
            &mut fs,
            "seek",
            vec![fd.clone(), Value::str("set"), Value::Int(-5)],
        );
        assert_eq!(pos, vec![Value::Int(0)]);
        let pos = call(
            &mut fs,
            "seek",
            vec![fd.clone(), Value::str("end"), Value::Int(100)],
        );
        assert_eq!(pos, vec![Value::Int(10)]);
        let pos = call(
            &mut fs,
            "seek",
            vec![fd.clone(), Value::str("cur"), Value::Int(-4)],
        );
        assert_eq!(pos, vec![Value::Int(6)]);

        let err = fs
            .invoke("seek", &[fd.clone(), Value::str("sideways"), Value::Int(0)])
            .unwrap_err();
        assert_eq!(err.to_string(), "seek(): invalid argument #2");
        call(&mut fs, "close", vec![fd]);
    }

    #[test]
    fn append_mode_positions_at_end() {
        let (_dir, mut fs) = fixture();
        let fd = call(&mut fs, "open", vec![Value::str("/a"), Value::str("w")])[0].clone();
        call(&mut fs, "write", vec![fd.clone(), Value::str("head")]);
        call(&mut fs, "close", vec![fd]);

        let fd = call(&mut fs, "open", vec![Value::str("/a"), Value::str("a")])[0].clone();
        call(&mut fs, "write", vec![fd.clone(), Value::str("+tail")]);
        call(&mut fs, "close", vec![fd]);

        assert_eq!(
            std::fs::read_to_string(fs.data_root().join("a")).unwrap(),
            "head+tail"
        );
    }

    #[test]
    fn unknown_mode_errors() {
        let (_dir, mut fs) = fixture();
        let err = fs
            .invoke("open", &[Value::str("/a"), Value::str("rw")])
            .unwrap_err();
        assert_eq!(err.to_string(), "open(): unknown mode: rw");
    }

    #[test]
    fn read_caps_at_buffer_size_and_treats_nonpositive_as_max() {
        let (_dir, mut fs) = fixture();
        let payload = vec![b'z'; MAX_READ_BUFFER + 500];
        std::fs::write(fs.data_root().join("big"), &payload).unwrap();
        let fd = call(&mut fs, "open", vec![Value::str("/big")])[0].clone();
        let chunk = call(&mut fs, "read", vec![fd.clone(), Value::Int(1 << 20)]);
        assert_eq!(chunk[0].as_str().unwrap().len(), MAX_READ_BUFFER);
        let rest = call(&mut fs, "read", vec![fd.clone(), Value::Int(-1)]);
        assert_eq!(rest[0].as_str().unwrap().len(), 500);
        call(&mut fs, "close", vec![fd]);
    }

    #[test]
    fn list_marks_directories_and_counts() {
        let (_dir, mut fs) = fixture();
        call(&mut fs, "makeDirectory", vec![Value::str("/sub")]);
        std::fs::write(fs.data_root().join("file.txt"), "x").unwrap();

        let listed = call(&mut fs, "list", vec![Value::str("/")]);
        let Value::Table(pairs) = &listed[0] else {
            panic!("expected table");
        };
        assert_eq!(
            pairs,
            &vec![
                (Value::Int(1), Value::str("file.txt")),
                (Value::Int(2), Value::str("sub/")),
                (Value::str("n"), Value::Int(2)),
            ]
        );

        // Not a directory: no values, which the bridge turns into nil.
        assert!(call(&mut fs, "list", vec![Value::str("/file.txt")]).is_empty());
    }

    #[test]
    fn metadata_methods() {
        let (_dir, mut fs) = fixture();
        std::fs::write(fs.data_root().join("f"), "12345").unwrap();
        call(&mut fs, "makeDirectory", vec![Value::str("/d")]);

        assert_eq!(call(&mut fs, "size", vec![Value::str("/f")]), vec![Value::Int(5)]);
        assert_eq!(call(&mut fs, "size", vec![Value::str("/d")]), vec![Value::Int(0)]);
        assert_eq!(call(&mut fs, "size", vec![Value::str("/missing")]), vec![Value::Int(0)]);
        assert_eq!(
            call(&mut fs, "isDirectory", vec![Value::str("/d")]),
            vec![Value::Bool(true)]
        );
        let modified = call(&mut fs, "lastModified", vec![Value::str("/f")]);
        let Value::Int(seconds) = modified[0] else {
            panic!("expected integer mtime");
        };
        // Plain Unix epoch seconds, no exotic offsets.
        assert!(seconds > 1_500_000_000 && seconds < 4_000_000_000);
        assert_eq!(
            call(&mut fs, "lastModified", vec![Value::str("/missing")]),
            vec![Value::Int(0)]
        );

        assert_eq!(call(&mut fs, "spaceUsed", vec![]), vec![Value::Int(5)]);
        let total = call(&mut fs, "spaceTotal", vec![]);
        assert!(total[0].as_int().unwrap() >= 5);
    }

    #[test]
    fn rename_and_remove() {
        let (_dir, mut fs) = fixture();
        std::fs::write(fs.data_root().join("a"), "x").unwrap();
        assert_eq!(
            call(&mut fs, "rename", vec![Value::str("/a"), Value::str("/b")]),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(&mut fs, "exists", vec![Value::str("/b")]),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(&mut fs, "remove", vec![Value::str("/b")]),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(&mut fs, "remove", vec![Value::str("/b")]),
            vec![Value::Bool(false)]
        );
    }

    #[test]
    fn readonly_marker_is_enforced() {
        let (dir, mut fs) = fixture();
        std::fs::write(fs.data_root().join("present"), "x").unwrap();
        std::fs::write(dir.path().join("readonly.txt"), "").unwrap();

        assert_eq!(call(&mut fs, "isReadOnly", vec![]), vec![Value::Bool(true)]);
        let err = fs
            .invoke("open", &[Value::str("/new"), Value::str("w")])
            .unwrap_err();
        assert_eq!(err.to_string(), "open(): filesystem is read-only");
        assert_eq!(
            call(&mut fs, "makeDirectory", vec![Value::str("/d")]),
            vec![Value::Bool(false)]
        );
        assert_eq!(
            call(&mut fs, "remove", vec![Value::str("/present")]),
            vec![Value::Bool(false)]
        );
        let err = fs.invoke("setLabel", &[Value::str("x")]).unwrap_err();
        assert_eq!(err.to_string(), "setLabel(): filesystem is read-only");

        // Reading still works.
        let fd = call(&mut fs, "open", vec![Value::str("/present")])[0].clone();
        assert_eq!(
            call(&mut fs, "read", vec![fd.clone(), Value::Int(10)]),
            vec![Value::str("x")]
        );
        call(&mut fs, "close", vec![fd]);
    }

    #[test]
    fn labels_round_trip() {
        let (_dir, mut fs) = fixture();
        assert_eq!(call(&mut fs, "getLabel", vec![]), vec![Value::str("")]);
        assert_eq!(
            call(&mut fs, "setLabel", vec![Value::str("data0")]),
            vec![Value::str("data0")]
        );
        assert_eq!(call(&mut fs, "getLabel", vec![]), vec![Value::str("data0")]);
    }

    proptest! {
        /// Descriptor-table complementarity: a slot is open exactly when its
        /// index is not on the free list.
        #[test]
        fn descriptor_table_invariant(ops in proptest::collection::vec(0u8..4, 1..64)) {
            let (_dir, mut fs) = fixture();
            let mut open_fds: Vec<i64> = Vec::new();
            for op in ops {
                if op == 0 && !open_fds.is_empty() {
                    let fd = open_fds.remove(0);
                    fs.invoke("close", &[Value::Int(fd)]).unwrap();
                } else {
                    let fd = fs
                        .invoke("open", &[Value::str("/scratch"), Value::str("w")])
                        .unwrap()[0]
                        .as_int()
                        .unwrap();
                    open_fds.push(fd);
                }
                let free: Vec<usize> = fs.free_indices().collect();
                for idx in 0..fs.descriptor_count() {
                    prop_assert_eq!(
                        fs.descriptor_is_open(idx),
                        !free.contains(&idx),
                        "slot {} inconsistent",
                        idx
                    );
                }
            }
        }
    }
}
