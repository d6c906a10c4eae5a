use std::{collections::HashMap, io, thread, time::Duration};

use anyhow::Result;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, BorderType, Paragraph, Widget},
};

use crate::{
    agent::TabularAgent,
    env::DiscreteStateSpace,
    experiment::Monitor,
    gym::{Action, Cell, GridWorld, Pos},
};

mod context;
mod tui;
mod user;

pub use context::{color_scale, value_bounds, value_color, wedge_at, DisplayContext};
pub use user::User;

const EDGE_COLOR: Color = Color::White;
const OBSTACLE_COLOR: Color = Color::Rgb(128, 128, 128);
const TEXT_COLOR: Color = Color::White;
const LOCATION_COLOR: Color = Color::Blue;

/// Renders a gridworld's state values or Q-values as a colored grid in the
/// terminal.
///
/// The display has two states: uninitialized until [`start`](Self::start),
/// ready afterwards. Any number of renders and pauses may follow.
pub struct GridDisplay {
    ctx: DisplayContext,
    title: String,
    speed: f64,
    terminal: Option<tui::Tui>,
}

impl GridDisplay {
    pub fn new(env: &GridWorld, cell_size: u16, speed: f64, title: impl Into<String>) -> Self {
        Self {
            ctx: DisplayContext::new(env.width(), env.height(), cell_size),
            title: title.into(),
            speed,
            terminal: None,
        }
    }

    /// Enter the alternate screen and become ready to render
    pub fn start(&mut self) -> io::Result<()> {
        self.terminal = Some(tui::init()?);
        Ok(())
    }

    /// Block until a key press; a quit key abandons the run
    pub fn pause(&mut self) -> io::Result<()> {
        let (code, modifiers) = user::wait_for_key()?;
        if user::is_quit(code, modifiers) {
            tui::exit();
        }
        Ok(())
    }

    /// Draw every cell colored by the agent's state value, with the greedy
    /// policy's action marked on each open cell
    pub fn render_values(
        &mut self,
        env: &GridWorld,
        agent: &dyn TabularAgent<Pos, Action>,
        current: Option<Pos>,
        caption: &str,
    ) -> io::Result<()> {
        let mut values = HashMap::new();
        let mut policy = HashMap::new();
        for state in env.states() {
            values.insert(state, agent.value(state));
            policy.insert(state, agent.policy(state));
        }
        self.draw(env, ViewMode::Values { values, policy }, current, caption)
    }

    /// Draw every open cell subdivided into four wedges, one per movement
    /// action, colored by that action's Q-value
    pub fn render_q_values(
        &mut self,
        env: &GridWorld,
        agent: &dyn TabularAgent<Pos, Action>,
        current: Option<Pos>,
        caption: &str,
    ) -> io::Result<()> {
        let mut q_values = HashMap::new();
        for state in env.states() {
            for action in Action::MOVES {
                q_values.insert((state, action), agent.q_value(state, action));
            }
        }
        self.draw(env, ViewMode::QValues { q_values }, current, caption)
    }

    fn draw(
        &mut self,
        env: &GridWorld,
        mode: ViewMode,
        current: Option<Pos>,
        caption: &str,
    ) -> io::Result<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            return Err(io::Error::other("render called before start"));
        };
        let view = GridView {
            env,
            ctx: self.ctx,
            title: &self.title,
            mode,
            current,
            caption,
        };
        terminal.draw(|frame| frame.render_widget(&view, frame.size()))?;
        thread::sleep(Duration::from_secs_f64(0.05 / self.speed));
        Ok(())
    }
}

impl Drop for GridDisplay {
    fn drop(&mut self) {
        if self.terminal.is_some() {
            let _ = tui::restore();
        }
    }
}

impl Monitor<GridWorld> for GridDisplay {
    fn on_step(
        &mut self,
        env: &GridWorld,
        agent: &dyn TabularAgent<Pos, Action>,
        state: Pos,
    ) -> Result<()> {
        self.render_q_values(env, agent, Some(state), "CURRENT Q-VALUES")?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(GridDisplay::pause(self)?)
    }
}

enum ViewMode {
    Values {
        values: HashMap<Pos, f64>,
        policy: HashMap<Pos, Action>,
    },
    QValues {
        q_values: HashMap<(Pos, Action), f64>,
    },
}

struct GridView<'a> {
    env: &'a GridWorld,
    ctx: DisplayContext,
    title: &'a str,
    mode: ViewMode,
    current: Option<Pos>,
    caption: &'a str,
}

impl Widget for &GridView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (min, max) = match &self.mode {
            ViewMode::Values { values, .. } => value_bounds(values.values()),
            ViewMode::QValues { q_values } => value_bounds(q_values.values()),
        };

        for x in 0..self.env.width() {
            for y in 0..self.env.height() {
                let pos = (x, y);
                let rect = self.ctx.cell_rect(pos);
                if rect.intersection(area) != rect || rect.width < 3 || rect.height < 3 {
                    continue; // clipped by a too-small terminal
                }
                let is_current = self.current == Some(pos);

                match (self.env.cell(pos), &self.mode) {
                    (Cell::Wall, _) => draw_wall(buf, rect),
                    (cell, _) if cell.is_terminal() => {
                        let payoff = self.env.exit_payoff(pos).unwrap_or(0.0);
                        // in the Q view terminal squares render at the top of
                        // the color scale, in the value view at their payoff
                        let color_value = match &self.mode {
                            ViewMode::Values { .. } => payoff,
                            ViewMode::QValues { .. } => max,
                        };
                        draw_value_square(
                            buf, rect, payoff, color_value, min, max, None, true, is_current,
                        );
                    }
                    (_, ViewMode::Values { values, policy }) => {
                        let value = values.get(&pos).copied().unwrap_or(0.0);
                        draw_value_square(
                            buf,
                            rect,
                            value,
                            value,
                            min,
                            max,
                            policy.get(&pos).copied(),
                            false,
                            is_current,
                        );
                    }
                    (_, ViewMode::QValues { q_values }) => {
                        draw_q_square(buf, rect, pos, q_values, min, max, is_current);
                    }
                }
            }
        }

        for (text, rect) in [
            (self.title, self.ctx.title_rect()),
            (self.caption, self.ctx.caption_rect()),
        ] {
            let rect = rect.intersection(area);
            if rect.height == 1 {
                Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .style(Style::new().fg(TEXT_COLOR).add_modifier(Modifier::BOLD))
                    .render(rect, buf);
            }
        }
    }
}

fn draw_wall(buf: &mut Buffer, rect: Rect) {
    let block = Block::bordered().border_style(Style::new().fg(EDGE_COLOR));
    let inner = block.inner(rect);
    block.render(rect, buf);
    buf.set_style(inner, Style::new().bg(OBSTACLE_COLOR));
}

#[allow(clippy::too_many_arguments)]
fn draw_value_square(
    buf: &mut Buffer,
    rect: Rect,
    value: f64,
    color_value: f64,
    min: f64,
    max: f64,
    action: Option<Action>,
    is_terminal: bool,
    is_current: bool,
) {
    let block = if is_terminal {
        Block::bordered().border_type(BorderType::Double)
    } else {
        Block::bordered()
    }
    .border_style(Style::new().fg(EDGE_COLOR));
    let inner = block.inner(rect);
    block.render(rect, buf);
    buf.set_style(inner, Style::new().bg(value_color(color_value, min, max)));

    if let Some(action) = action {
        if let Some(glyph) = arrow_glyph(action) {
            let (x, y) = arrow_position(inner, action);
            buf.set_string(x, y, glyph, Style::new().fg(EDGE_COLOR));
        }
    }

    let text_style = Style::new().fg(TEXT_COLOR).add_modifier(Modifier::BOLD);
    centered(buf, inner, middle_row(inner), &format!("{value:.2}"), text_style);

    if is_current {
        draw_location_marker(buf, inner);
    }
}

fn draw_q_square(
    buf: &mut Buffer,
    rect: Rect,
    pos: Pos,
    q_values: &HashMap<(Pos, Action), f64>,
    min: f64,
    max: f64,
    is_current: bool,
) {
    let block = Block::bordered().border_style(Style::new().fg(EDGE_COLOR));
    let inner = block.inner(rect);
    block.render(rect, buf);

    let q = |action: Action| q_values.get(&(pos, action)).copied().unwrap_or(0.0);

    for y in inner.y..inner.y + inner.height {
        for x in inner.x..inner.x + inner.width {
            let wedge = wedge_at(x - inner.x, y - inner.y, inner.width, inner.height);
            buf.get_mut(x, y).set_bg(value_color(q(wedge), min, max));
        }
    }

    let best = Action::MOVES
        .into_iter()
        .map(q)
        .max_by(|a, b| a.partial_cmp(b).unwrap())
        .unwrap_or(0.0);
    for action in Action::MOVES {
        let style = if q(action) < best {
            Style::new().fg(TEXT_COLOR).add_modifier(Modifier::DIM)
        } else {
            Style::new().fg(TEXT_COLOR).add_modifier(Modifier::BOLD)
        };
        let text = format!("{:.2}", q(action));
        match action {
            Action::Up => centered(buf, inner, inner.y, &text, style),
            Action::Down => centered(buf, inner, inner.y + inner.height - 1, &text, style),
            Action::Left => {
                buf.set_stringn(inner.x, middle_row(inner), &text, inner.width as usize, style);
            }
            Action::Right => {
                let x = (inner.x + inner.width)
                    .saturating_sub(text.len() as u16)
                    .max(inner.x);
                buf.set_stringn(x, middle_row(inner), &text, inner.width as usize, style);
            }
            Action::Exit => unreachable!("MOVES holds no exit"),
        }
    }

    if is_current {
        draw_location_marker(buf, inner);
    }
}

fn middle_row(inner: Rect) -> u16 {
    inner.y + inner.height / 2
}

fn centered(buf: &mut Buffer, inner: Rect, y: u16, text: &str, style: Style) {
    let width = inner.width as usize;
    let x = inner.x + (inner.width.saturating_sub(text.len().min(width) as u16)) / 2;
    buf.set_stringn(x, y, text, width, style);
}

fn draw_location_marker(buf: &mut Buffer, inner: Rect) {
    let x = inner.x + inner.width / 2;
    let y = if middle_row(inner) + 1 < inner.y + inner.height {
        middle_row(inner) + 1
    } else {
        middle_row(inner)
    };
    buf.set_string(x, y, "●", Style::new().fg(LOCATION_COLOR));
}

fn arrow_glyph(action: Action) -> Option<&'static str> {
    match action {
        Action::Up => Some("▲"),
        Action::Down => Some("▼"),
        Action::Left => Some("◀"),
        Action::Right => Some("▶"),
        Action::Exit => None,
    }
}

fn arrow_position(inner: Rect, action: Action) -> (u16, u16) {
    let cx = inner.x + inner.width / 2;
    let cy = middle_row(inner);
    match action {
        Action::Up => (cx, inner.y),
        Action::Down => (cx, inner.y + inner.height - 1),
        Action::Left => (inner.x, cy),
        Action::Right | Action::Exit => (inner.x + inner.width - 1, cy),
    }
}
