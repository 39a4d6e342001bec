//! kiosk - interactive Hair Analysis Lab session
//!
//! Reads guest commands (one per line) from stdin or a script file:
//!   consent [yes|no], start, goto <1-3>, capture, retake, analyze, back, new
//! plus `wait <ms>` for scripts and `quit`.
//!
//! Camera acquisition and the analysis delay run off the session thread; Ctrl-C,
//! `quit` or end of input stop the runtime and release the camera.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use hairlab_kiosk::ui::Ui;
use hairlab_kiosk::{build_controller, KioskCommand, KioskConfig, KioskEvent, KioskRuntime};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output style: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
    /// Camera device override (stub://..., /dev/videoN).
    #[arg(long)]
    device: Option<String>,
    /// Read commands from a file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = KioskConfig::load()?;
    if let Some(device) = args.device {
        config.camera.device = device;
    }

    let mut controller = build_controller(&config)?;
    let views = controller.subscribe();
    let runtime = KioskRuntime::new(controller);
    let tx = runtime.sender();

    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(KioskEvent::Shutdown);
    })
    .expect("error setting Ctrl-C handler");

    let mut ui = Ui::from_args(args.ui.as_deref(), std::io::stdout().is_terminal());
    let render = std::thread::spawn(move || {
        for view in views {
            ui.render(&view);
        }
    });

    let input: Box<dyn BufRead + Send> = match &args.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening script {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    std::thread::spawn(move || read_commands(input, tx));

    runtime.run()?;
    // the controller is gone, so the view channel has closed
    let _ = render.join();
    log::info!("kiosk stopped");
    Ok(())
}

fn read_commands(input: Box<dyn BufRead + Send>, tx: Sender<KioskEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("reading commands failed: {}", err);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Some(ms) = line.strip_prefix("wait ") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => std::thread::sleep(Duration::from_millis(ms)),
                Err(_) => eprintln!("wait expects milliseconds"),
            }
            continue;
        }
        match line.parse::<KioskCommand>() {
            Ok(command) => {
                if tx.send(KioskEvent::Command(command)).is_err() {
                    return;
                }
            }
            Err(err) => eprintln!("{}", err),
        }
    }
    let _ = tx.send(KioskEvent::Shutdown);
}
