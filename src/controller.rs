// src/controller.rs

use std::cell::RefCell;
use std::fmt::Write as FmtWrite;
use std::io::{stdout, Write};
use std::rc::Rc;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::config::PlayerConfig;
use crate::engine::format_time;
use crate::engine::{OutputFactory, Phase};
use crate::error::Result;
use crate::player::{HostContainer, Player, PlayerEvent};

const SEEK_STEP_SECS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.1;

/// Keyboard and mouse front end for a [`Player`] drawn as text.
pub struct PlayerController<F: OutputFactory> {
    player: Player<F>,
    /// Bytes of the open file, kept so `r` can reload it.
    source: Vec<u8>,
    message: Rc<RefCell<Option<String>>>,
    dragging: bool,
    last_frame: String,
    draw_buffer: String,
}

impl<F: OutputFactory> PlayerController<F> {
    pub fn new(config: PlayerConfig, factory: F, source: Vec<u8>, container: HostContainer) -> Result<Self> {
        let mut player = Player::new(config, factory)?;

        let message = Rc::new(RefCell::new(None));
        let sink = message.clone();
        player.subscribe(move |event| match event {
            PlayerEvent::Error { kind, message } => {
                *sink.borrow_mut() = Some(format!("{kind}: {message}"));
            }
            PlayerEvent::Loaded { .. } | PlayerEvent::SeekCommitted { .. } => {
                *sink.borrow_mut() = None;
            }
            _ => {}
        });

        player.mount(container)?;
        player.load_file(source.clone(), None)?;

        Ok(Self {
            player,
            source,
            message,
            dragging: false,
            last_frame: String::new(),
            draw_buffer: String::with_capacity(16 * 1024),
        })
    }

    pub fn player(&self) -> &Player<F> {
        &self.player
    }

    pub fn should_quit(&self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        matches!(code, KeyCode::Char('q') | KeyCode::Esc)
            || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL))
    }

    // Command errors are ignored here: they reach the status line through
    // PlayerEvent::Error.
    pub fn handle_key(&mut self, code: KeyCode) {
        let _ = match code {
            KeyCode::Char(' ') => self.player.toggle(),
            KeyCode::Char('s') => self.player.stop(),
            KeyCode::Left => self.player.seek_by(-SEEK_STEP_SECS),
            KeyCode::Right => self.player.seek_by(SEEK_STEP_SECS),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.player.set_volume(self.player.volume() + VOLUME_STEP).map(|_| ())
            }
            KeyCode::Char('-') => self.player.set_volume(self.player.volume() - VOLUME_STEP).map(|_| ()),
            KeyCode::Char('r') => self.reload(),
            _ => Ok(()),
        };
    }

    pub fn handle_mouse(&mut self, event: MouseEvent, now: Instant) {
        let rows = self.player.container().map(|c| c.height as u16).unwrap_or(0);
        let x = event.column as f64;
        let _ = match event.kind {
            MouseEventKind::Down(MouseButton::Left) if event.row < rows => {
                self.dragging = true;
                self.player.pointer_down_at(x, now)
            }
            MouseEventKind::Drag(MouseButton::Left) if self.dragging => self.player.pointer_move_at(x, now),
            MouseEventKind::Up(MouseButton::Left) if self.dragging => {
                self.dragging = false;
                self.player.pointer_up()
            }
            _ => Ok(()),
        };
    }

    pub fn handle_resize(&mut self, cols: u16, rows: u16) {
        let container = HostContainer::new(cols as f64, rows.saturating_sub(1) as f64);
        let _ = self.player.mount(container);
        self.last_frame.clear();
        let _ = execute!(stdout(), Clear(ClearType::All));
    }

    /// Resets the session and loads the same file again.
    fn reload(&mut self) -> Result<()> {
        self.dragging = false;
        self.player.reset()?;
        self.player.load_file(self.source.clone(), None)
    }

    /// Advances the player one frame and redraws if anything visible changed.
    pub fn run_tick(&mut self, now: Instant) -> std::io::Result<()> {
        self.player.tick(now);

        self.draw_buffer.clear();
        let rows = self.player.rows();
        for (y, line) in rows.iter().enumerate() {
            let _ = write!(self.draw_buffer, "{}{}", MoveTo(0, y as u16), line);
        }

        let _ = write!(self.draw_buffer, "{}{}", MoveTo(0, rows.len() as u16), Clear(ClearType::UntilNewLine));
        let _ = write!(self.draw_buffer, "{}", self.status_line());

        if self.draw_buffer == self.last_frame {
            return Ok(());
        }

        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;

        std::mem::swap(&mut self.last_frame, &mut self.draw_buffer);
        Ok(())
    }

    fn status_line(&self) -> String {
        let state = match self.player.phase() {
            Phase::Playing => "▶ playing",
            Phase::Paused => "⏸ paused",
            Phase::Idle => "■ stopped",
        };
        let mut line = format!(
            "{} / {}  {}  vol {:>3.0}%",
            format_time(self.player.current_time()),
            format_time(self.player.duration()),
            state,
            self.player.volume() * 100.0
        );
        match self.message.borrow().as_deref() {
            Some(message) => {
                let _ = write!(line, "  ! {message}");
            }
            None => line.push_str("  [space] play/pause [s] stop [←/→] seek [+/-] volume [r] reset [q] quit"),
        }
        line
    }
}
