//! Project directory loading.
//!
//! A project is a directory of component folders (`<name>.<type>` under
//! `components/`) and computer descriptions (under `computers/`), plus an
//! optional `ochre.toml`. Loading is host-fatal on malformed layout; the
//! guest never runs against a half-loaded project.

use anyhow::{bail, Context, Result};
use core_components::{
    Component, ComponentKind, Eeprom, Filesystem, Gpu, GpuConfig, Internet, Keyboard, Screen,
    ScreenConfig,
};
use core_machine::{ComputerConfig, ScreenWiring};
use core_window::{WindowBackend, WindowSurface};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod config;

pub use config::{load_host_config, HostConfig};

const COMPONENTS_DIR: &str = "components";
const COMPUTERS_DIR: &str = "computers";
const ADDRESS_FILE: &str = "address.txt";
const CONFIG_FILE: &str = "config.txt";
const KEYBOARDS_FILE: &str = "keyboards.txt";
const MEMORY_FILE: &str = "memory.txt";
const COMPONENTS_FILE: &str = "components.txt";
const TEMPFS_FILE: &str = "tempfs.txt";

/// A component as loaded from disk, not yet instantiated. Everything here
/// is `Send`: specs are produced on the boot thread and assembled into
/// `Rc<Component>`s on the guest thread.
pub struct ComponentSpec {
    pub name: String,
    pub address: String,
    pub hardware: HardwareSpec,
}

impl std::fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("hardware", &self.hardware)
            .finish()
    }
}

pub enum HardwareSpec {
    Eeprom {
        folder: PathBuf,
    },
    Filesystem {
        folder: PathBuf,
    },
    Screen {
        config: ScreenConfig,
        keyboards: Vec<String>,
        font_cell: (u32, u32),
        surface: Box<dyn WindowSurface>,
    },
    Gpu {
        config: GpuConfig,
    },
    Keyboard,
    Internet,
}

impl std::fmt::Debug for HardwareSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareSpec::Eeprom { folder } => {
                f.debug_struct("Eeprom").field("folder", folder).finish()
            }
            HardwareSpec::Filesystem { folder } => f
                .debug_struct("Filesystem")
                .field("folder", folder)
                .finish(),
            HardwareSpec::Screen {
                config,
                keyboards,
                font_cell,
                ..
            } => f
                .debug_struct("Screen")
                .field("config", config)
                .field("keyboards", keyboards)
                .field("font_cell", font_cell)
                .finish(),
            HardwareSpec::Gpu { config } => f.debug_struct("Gpu").field("config", config).finish(),
            HardwareSpec::Keyboard => write!(f, "Keyboard"),
            HardwareSpec::Internet => write!(f, "Internet"),
        }
    }
}

impl ComponentSpec {
    /// Instantiate the component. Screens size and clear their window here,
    /// which is why this runs on the guest thread.
    pub fn into_component(self) -> Rc<Component> {
        let kind = match self.hardware {
            HardwareSpec::Eeprom { folder } => ComponentKind::Eeprom(Eeprom::new(folder)),
            HardwareSpec::Filesystem { folder } => {
                ComponentKind::Filesystem(Filesystem::new(folder))
            }
            HardwareSpec::Screen {
                config,
                keyboards,
                font_cell,
                surface,
            } => ComponentKind::Screen(Screen::new(config, keyboards, font_cell, surface)),
            HardwareSpec::Gpu { config } => ComponentKind::Gpu(Gpu::new(config)),
            HardwareSpec::Keyboard => ComponentKind::Keyboard(Keyboard),
            HardwareSpec::Internet => ComponentKind::Internet(Internet),
        };
        Component::new(self.name, self.address, kind)
    }
}

/// Everything the guest thread needs to boot one computer.
#[derive(Debug)]
pub struct ComputerBundle {
    pub config: ComputerConfig,
    pub components: Vec<ComponentSpec>,
}

/// Load the named computer and its components, opening a window per
/// attached screen. Returns the bundle for the guest thread and the
/// screen-to-keyboard wiring snapshot for the event pump.
pub fn load_computer_bundle(
    project_dir: &Path,
    computer_name: &str,
    host: &HostConfig,
    backend: &mut dyn WindowBackend,
) -> Result<(ComputerBundle, Vec<ScreenWiring>)> {
    let mut components = load_components(project_dir, host, backend)?;
    let config = load_computer_config(project_dir, computer_name)?;

    let computer_dir = project_dir.join(COMPUTERS_DIR).join(computer_name);
    let names = read_tokens(&computer_dir.join(COMPONENTS_FILE))
        .with_context(|| format!("reading {computer_name}'s component list"))?;

    let mut selected = Vec::new();
    for name in &names {
        let idx = components
            .iter()
            .position(|spec| &spec.name == name)
            .with_context(|| format!("computer {computer_name} lists unknown component {name}"))?;
        selected.push(components.swap_remove(idx));
    }

    let wirings = selected
        .iter()
        .filter_map(|spec| match &spec.hardware {
            HardwareSpec::Screen {
                keyboards, surface, ..
            } => Some(ScreenWiring {
                window: surface.id(),
                keyboards: keyboards.clone(),
            }),
            _ => None,
        })
        .collect();

    Ok((
        ComputerBundle {
            config,
            components: selected,
        },
        wirings,
    ))
}

/// Scan `components/` and load every recognised `<name>.<type>` folder.
/// Unrecognised type suffixes are skipped with a warning.
pub fn load_components(
    project_dir: &Path,
    host: &HostConfig,
    backend: &mut dyn WindowBackend,
) -> Result<Vec<ComponentSpec>> {
    let components_dir = project_dir.join(COMPONENTS_DIR);
    let entries = std::fs::read_dir(&components_dir)
        .with_context(|| format!("reading {}", components_dir.display()))?;

    let mut folders: Vec<PathBuf> = entries
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading {}", components_dir.display()))?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    // Deterministic registry order regardless of directory iteration order.
    folders.sort();

    let mut specs = Vec::new();
    for folder in folders {
        let folder_name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let Some((name, type_name)) = folder_name.rsplit_once('.') else {
            tracing::warn!(target: "io", folder = folder_name.as_str(), "component folder without type suffix");
            continue;
        };
        let address = read_token(&folder.join(ADDRESS_FILE))
            .with_context(|| format!("reading address of component {name}"))?;

        let hardware = match type_name {
            "eeprom" => HardwareSpec::Eeprom { folder: folder.clone() },
            "filesystem" => {
                let data = folder.join("data");
                if !data.is_dir() {
                    std::fs::create_dir_all(&data)
                        .with_context(|| format!("creating {}", data.display()))?;
                }
                HardwareSpec::Filesystem { folder: folder.clone() }
            }
            "screen" => {
                let config = parse_screen_config(&folder.join(CONFIG_FILE))
                    .with_context(|| format!("reading config of screen {name}"))?;
                let keyboards = read_tokens(&folder.join(KEYBOARDS_FILE)).unwrap_or_default();
                let font_cell = host.screen.font_cell();
                let surface = backend.open_window(
                    name,
                    config.max_width * font_cell.0,
                    config.max_height * font_cell.1,
                )?;
                HardwareSpec::Screen {
                    config,
                    keyboards,
                    font_cell,
                    surface,
                }
            }
            "gpu" => {
                let config = parse_gpu_config(&folder.join(CONFIG_FILE))
                    .with_context(|| format!("reading config of gpu {name}"))?;
                HardwareSpec::Gpu { config }
            }
            "keyboard" => HardwareSpec::Keyboard,
            "internet" => HardwareSpec::Internet,
            other => {
                tracing::warn!(target: "io", folder = folder_name.as_str(), type_name = other, "unknown component type");
                continue;
            }
        };
        tracing::debug!(
            target: "io",
            name,
            type_name,
            address = address.as_str(),
            "component loaded"
        );
        specs.push(ComponentSpec {
            name: name.to_string(),
            address,
            hardware,
        });
    }
    Ok(specs)
}

fn load_computer_config(project_dir: &Path, computer_name: &str) -> Result<ComputerConfig> {
    let computer_dir = project_dir.join(COMPUTERS_DIR).join(computer_name);
    if !computer_dir.is_dir() {
        bail!("no such computer: {computer_name}");
    }
    let address = read_token(&computer_dir.join(ADDRESS_FILE))
        .with_context(|| format!("reading address of computer {computer_name}"))?;
    let memory: usize = read_token(&computer_dir.join(MEMORY_FILE))
        .with_context(|| format!("reading memory of computer {computer_name}"))?
        .parse()
        .with_context(|| format!("parsing memory of computer {computer_name}"))?;
    let tmp_fs_name = read_token(&computer_dir.join(TEMPFS_FILE))
        .with_context(|| format!("reading tempfs of computer {computer_name}"))?;
    Ok(ComputerConfig {
        name: computer_name.to_string(),
        address,
        memory,
        tmp_fs_name,
    })
}

/// `config.txt` of a screen: `depth ratio_w ratio_h max_w max_h`.
fn parse_screen_config(path: &Path) -> Result<ScreenConfig> {
    let fields = read_numbers(path, 5)?;
    Ok(ScreenConfig {
        color_depth: fields[0],
        ratio_width: fields[1],
        ratio_height: fields[2],
        max_width: fields[3],
        max_height: fields[4],
    })
}

/// `config.txt` of a GPU: `depth max_w max_h`.
fn parse_gpu_config(path: &Path) -> Result<GpuConfig> {
    let fields = read_numbers(path, 3)?;
    Ok(GpuConfig {
        color_depth: fields[0],
        max_width: fields[1],
        max_height: fields[2],
    })
}

fn read_numbers(path: &Path, count: usize) -> Result<Vec<u32>> {
    let tokens = read_tokens(path)?;
    if tokens.len() < count {
        bail!(
            "{}: expected {count} fields, found {}",
            path.display(),
            tokens.len()
        );
    }
    tokens[..count]
        .iter()
        .map(|t| {
            t.parse::<u32>()
                .with_context(|| format!("{}: bad number {t}", path.display()))
        })
        .collect()
}

/// First whitespace-delimited token of a file.
fn read_token(path: &Path) -> Result<String> {
    let tokens = read_tokens(path)?;
    tokens
        .into_iter()
        .next()
        .with_context(|| format!("{} is empty", path.display()))
}

fn read_tokens(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(content.split_whitespace().map(str::to_string).collect())
}
