use std::{
    io::{self, stdout, Stdout},
    panic, process,
};

use crossterm as ct;
use ct::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};

/// A type alias for the terminal type used by the grid display
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the tui
pub fn init() -> io::Result<Tui> {
    init_panic_hook();
    ct::execute!(stdout(), EnterAlternateScreen)?;
    enable_raw_mode()?;
    Terminal::new(CrosstermBackend::new(stdout()))
}

/// Restore the terminal to its original state
pub fn restore() -> io::Result<()> {
    ct::execute!(stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Abandon the run on a quit key: restore the terminal, then exit without
/// returning to the caller
pub fn exit() -> ! {
    let _ = restore();
    process::exit(0)
}

/// Setup panic hook
fn init_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
