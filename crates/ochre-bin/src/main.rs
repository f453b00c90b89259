//! Ochre entrypoint: boot a virtual computer from a project directory and
//! pump host input into its signal queue until shutdown.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_guest::RunOutcome;
use core_machine::{Computer, HostControl, HostEvent, KeyTranslator};
use core_project::{load_computer_bundle, load_host_config, ComponentSpec};
use core_signal::SignalQueue;
use core_window::{HeadlessBackend, WindowBackend, WindowEvent};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ochre", version, about = "OpenComputers-style computer emulator")]
struct Args {
    /// Project directory containing `components/` and `computers/`.
    project_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boot the named computer and run it until shutdown.
    Start { computer: String },
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();

    let args = Args::parse();
    info!(target: "runtime", project = %args.project_dir.display(), "startup");
    match args.command {
        Command::Start { computer } => start(&args.project_dir, &computer),
    }
}

fn start(project_dir: &Path, computer_name: &str) -> Result<()> {
    let host = load_host_config(project_dir)?;
    let mut backend = HeadlessBackend::new();
    let (bundle, wirings) = load_computer_bundle(project_dir, computer_name, &host, &mut backend)?;

    let queue = Arc::new(SignalQueue::new(host.signals.capacity));
    let (control, control_rx) = HostControl::channel();
    let translator = KeyTranslator::new(wirings, host.host.user.clone());
    let events = backend.events();

    // Exactly two threads per computer: this one pumps input, the spawned
    // one owns the interpreter. Components are assembled guest-side; the
    // signal queue is the only shared state.
    let guest = std::thread::Builder::new()
        .name(format!("guest-{computer_name}"))
        .spawn({
            let queue = Arc::clone(&queue);
            let control = control.clone();
            move || -> Result<RunOutcome> {
                let components = bundle
                    .components
                    .into_iter()
                    .map(ComponentSpec::into_component)
                    .collect();
                let computer = Computer::boot(bundle.config, components, queue, control)?;
                core_guest::run(computer)
            }
        })
        .context("spawning guest thread")?;

    pump(&events, &control_rx, &translator, &queue);

    let outcome = guest
        .join()
        .map_err(|_| anyhow::anyhow!("guest thread panicked"))??;
    info!(target: "runtime", ?outcome, "run finished");
    Ok(())
}

/// Host event pump: translate window key events into signals, stop on quit
/// or guest termination.
fn pump(
    events: &Receiver<WindowEvent>,
    control: &Receiver<HostEvent>,
    translator: &KeyTranslator,
    queue: &SignalQueue,
) {
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(WindowEvent::Quit) | Err(_) => {
                    queue.terminate();
                    break;
                }
                Ok(event) => {
                    if let Some(signal) = translator.translate(&event) {
                        queue.push(&signal);
                    }
                }
            },
            recv(control) -> event => match event {
                Ok(HostEvent::Terminate) | Err(_) => break,
            },
        }
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("ochre.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "ochre.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_start_command() {
        let args = Args::try_parse_from(["ochre", "/tmp/project", "start", "pc"]).unwrap();
        assert_eq!(args.project_dir, PathBuf::from("/tmp/project"));
        match args.command {
            Command::Start { computer } => assert_eq!(computer, "pc"),
        }
    }

    #[test]
    fn cli_requires_a_command() {
        assert!(Args::try_parse_from(["ochre", "/tmp/project"]).is_err());
    }
}
