//! Console progress bars for long-running operations.
//!
//! A bar renders as fifty cells between brackets; updates repaint only the
//! delta since the last reported percentage. Escape-code rendering assumes a
//! VT100 terminal and is skipped entirely when the console is not in
//! terminal mode.

use crate::console::Console;
use std::sync::Arc;

/// Requested change to a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    /// Advance to the supplied percentage.
    Increment,
    /// Fall back to the supplied percentage.
    Decrement,
    /// Repaint empty at 0%.
    Reset,
    /// Jump straight to 100%.
    Fill,
    /// Paint the full width with error markers.
    FillError,
}

/// A named progress-bar handle tracking its last reported percentage.
pub struct ProgressBar {
    console: Arc<Console>,
    enabled: bool,
    last: i32,
}

impl ProgressBar {
    /// Prints the empty bar and returns its handle. When `enabled` is false
    /// the handle swallows every update.
    pub fn create(console: Arc<Console>, enabled: bool) -> Self {
        if enabled {
            console.write("\x1b[2K\x1b[100D\x1b[34;47mTask Progress: [");
            console.write("\x1b[s");
        }
        ProgressBar {
            console,
            enabled,
            last: 0,
        }
    }

    /// Applies one action, repainting only the cells that changed.
    pub fn update(&mut self, action: ProgressAction, value: i32) {
        if !self.enabled {
            return;
        }
        if self.last >= 100 && action != ProgressAction::Fill {
            return;
        }
        self.console.write("\x1b[u");

        let value = match action {
            ProgressAction::Reset => {
                self.console.write("\x1b[2K\x1b[100D\x1b[34;47mTask Progress: [");
                self.last = 0;
                0
            }
            ProgressAction::Fill => 100,
            ProgressAction::FillError => {
                self.console.write("\x1b[2K\x1b[100DTask Progress: [");
                self.console.write(&"!".repeat(50));
                self.console.write("]\x1b[0m");
                self.last = 100;
                return;
            }
            ProgressAction::Increment | ProgressAction::Decrement => value.clamp(0, 100),
        };

        let cells = (value / 2 - self.last / 2).max(0) as usize;
        self.console.write(&"#".repeat(cells));
        self.console.write("\x1b[s");
        self.last = value;
        self.console.write(&" ".repeat((50 - value / 2).max(0) as usize));
        self.console.write("]\x1b[0m");
    }

    /// Finishes the bar at 100%.
    pub fn finish(&mut self) {
        self.update(ProgressAction::Fill, 100);
        if self.enabled {
            self.console.write("\n");
        }
    }

    /// Paints the bar as failed.
    pub fn fail(&mut self) {
        self.update(ProgressAction::FillError, 0);
        if self.enabled {
            self.console.write("\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delta_rendering() {
        let (console, _tx, capture) = Console::piped();
        let mut bar = ProgressBar::create(console, true);
        capture.take();

        bar.update(ProgressAction::Increment, 50);
        let painted = capture.take();
        assert_eq!(painted.matches('#').count(), 25);

        // Same percentage again paints no new cells.
        bar.update(ProgressAction::Increment, 50);
        assert_eq!(capture.take().matches('#').count(), 0);

        bar.update(ProgressAction::Increment, 100);
        assert_eq!(capture.take().matches('#').count(), 25);
    }

    #[tokio::test]
    async fn test_disabled_bar_is_silent() {
        let (console, _tx, capture) = Console::piped();
        let mut bar = ProgressBar::create(console, false);
        bar.update(ProgressAction::Increment, 80);
        bar.finish();
        assert_eq!(capture.take(), "");
    }

    #[tokio::test]
    async fn test_error_fill() {
        let (console, _tx, capture) = Console::piped();
        let mut bar = ProgressBar::create(console, true);
        capture.take();
        bar.fail();
        assert_eq!(capture.take().matches('!').count(), 50);
    }
}
