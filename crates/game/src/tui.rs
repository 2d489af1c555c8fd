//! Crossterm front end: raw-mode guard, input mapping, arena rendering,
//! and the tick loop driving the chaos pipeline.

use std::io::{Stdout, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use tracing::info;

use serpent_chaos::{BindingManager, StatusLine};

use crate::snake::{random_food_position, Direction, Game, Input, Phase};

const TICK: Duration = Duration::from_millis(33);

/// Restores the terminal on drop, including panic and error paths.
struct TermGuard;

impl TermGuard {
    fn new(out: &mut Stdout) -> Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TermGuard {
    fn drop(&mut self) {
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, Show);
        let _ = terminal::disable_raw_mode();
    }
}

fn map_key(key: KeyEvent) -> Option<Input> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Input::Quit);
    }
    match key.code {
        KeyCode::Up => Some(Input::Turn(Direction::Up)),
        KeyCode::Down => Some(Input::Turn(Direction::Down)),
        KeyCode::Left => Some(Input::Turn(Direction::Left)),
        KeyCode::Right => Some(Input::Turn(Direction::Right)),
        KeyCode::Char(' ') => Some(Input::TogglePause),
        KeyCode::Char('q') | KeyCode::Esc => Some(Input::Quit),
        _ => None,
    }
}

fn draw(out: &mut Stdout, game: &Game, status: &StatusLine) -> Result<()> {
    queue!(out, Clear(ClearType::All))?;
    for x in 0..game.width {
        queue!(out, MoveTo(x as u16, 0), Print('-'))?;
        queue!(out, MoveTo(x as u16, (game.height - 1) as u16), Print('-'))?;
    }
    for y in 0..game.height {
        queue!(out, MoveTo(0, y as u16), Print('|'))?;
        queue!(out, MoveTo((game.width - 1) as u16, y as u16), Print('|'))?;
    }
    if let Some(f) = game.food.pos {
        queue!(out, MoveTo(f.x as u16, f.y as u16), Print('O'))?;
    }
    queue!(out, SetForegroundColor(Color::Green))?;
    for seg in game.snake.segments() {
        if seg.x >= 0 && seg.x < game.width && seg.y >= 0 && seg.y < game.height {
            queue!(out, MoveTo(seg.x as u16, seg.y as u16), Print('■'))?;
        }
    }
    queue!(out, ResetColor)?;
    queue!(out, MoveTo(1, 0), Print(format!("Score: {}", game.score)))?;
    queue!(out, MoveTo(1, game.height as u16), Print(status.get().as_str()))?;
    if game.phase == Phase::Paused {
        let msg = "GAME PAUSED. Press space to resume or q to quit.";
        let x = ((game.width - msg.len() as i32) / 2).max(0) as u16;
        queue!(out, MoveTo(x, (game.height / 2) as u16), Print(msg))?;
    }
    out.flush()?;
    Ok(())
}

fn draw_final(out: &mut Stdout, game: &Game) -> Result<()> {
    queue!(out, Clear(ClearType::All))?;
    let score = format!("Final Score: {}", game.score);
    let quit = "Press q to quit";
    let mid_y = (game.height / 2 - 1) as u16;
    let center = |msg: &str| ((game.width - msg.len() as i32) / 2).max(0) as u16;
    queue!(out, MoveTo(center(&score), mid_y), Print(&score))?;
    queue!(out, MoveTo(center(quit), mid_y + 2), Print(quit))?;
    out.flush()?;
    Ok(())
}

/// Run the game to completion and return the final score.
///
/// One tick handles one input batch and one physics step. The only
/// blocking work on this task is the bounded-timeout candidate fallback
/// inside `BindingManager::bind`; deletions are dispatched fire-and-forget.
pub async fn run(mut game: Game, manager: BindingManager, status: StatusLine) -> Result<u32> {
    let mut out = std::io::stdout();
    let _guard = TermGuard::new(&mut out)?;
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                match map_key(key) {
                    Some(Input::Quit) => {
                        info!(score = game.score, "quit requested");
                        return Ok(game.score);
                    }
                    Some(input) => game.handle_input(input),
                    None => {}
                }
            }
        }

        // Re-arming happens here so the tick after a consumption already
        // sees a fresh placement.
        if game.phase == Phase::Running && !game.food.placed() {
            let pos = random_food_position(&mut rand::thread_rng(), game.width, game.height);
            let binding = manager.bind().await;
            game.food.place(pos, binding);
        }

        let outcome = game.tick();
        if outcome.consumed {
            manager.consume(outcome.binding).await;
        }
        if outcome.game_over {
            info!(score = game.score, "game over");
            draw_final(&mut out, &game)?;
            loop {
                if event::poll(Duration::from_millis(100))? {
                    if let Event::Key(key) = event::read()? {
                        if matches!(map_key(key), Some(Input::Quit)) {
                            return Ok(game.score);
                        }
                    }
                }
            }
        }
        draw(&mut out, &game, &status)?;
    }
}
