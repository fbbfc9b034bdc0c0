// src/main.rs

use std::io::stdout;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};

use waveplay::audio::CpalFactory;
use waveplay::controller::PlayerController;
use waveplay::decoder;
use waveplay::player::HostContainer;
use waveplay::PlayerConfig;

struct Args {
    file: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut file = None;
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            _ if file.is_none() => file = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {arg}"),
        }
    }
    let file = file.context("usage: waveplay <file> [--config <json>]")?;
    Ok(Args { file, config })
}

/// Restores the terminal even when the loop bails out early.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, EnableMouseCapture, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => PlayerConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PlayerConfig::terminal(),
    };
    let frame_interval = config.frame_interval();

    let bytes = decoder::read_file(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let (cols, rows) = terminal::size().context("querying terminal size")?;
    let container = HostContainer::new(cols as f64, rows.saturating_sub(1) as f64);

    let mut controller = PlayerController::new(config, CpalFactory, bytes, container)
        .with_context(|| format!("opening {}", args.file.display()))?;
    log::info!("Playing {}", args.file.display());

    let _guard = TerminalGuard::enter()?;
    controller.run_tick(Instant::now())?;

    loop {
        if event::poll(frame_interval)? {
            match event::read()? {
                Event::Key(ev) if ev.kind == KeyEventKind::Press => {
                    if controller.should_quit(ev.code, ev.modifiers) {
                        break;
                    }
                    controller.handle_key(ev.code);
                }
                Event::Mouse(ev) => controller.handle_mouse(ev, Instant::now()),
                Event::Resize(cols, rows) => controller.handle_resize(cols, rows),
                _ => {}
            }
        }
        controller.run_tick(Instant::now())?;
    }

    Ok(())
}
