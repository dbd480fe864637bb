//! OS input synthesis through enigo.

use anyhow::anyhow;
use enigo::{Axis, Button, Direction, Enigo, Mouse, Settings};

use crate::dispatch::ActionSink;

/// Sends real scroll and click events to the desktop. Moving the pointer into
/// any screen corner trips the failsafe and stops the frame loop.
pub struct EnigoSink {
    enigo: Enigo,
    failsafe_margin: i32,
}

impl EnigoSink {
    /// `failsafe_margin` is the distance from a corner, in pixels, that still
    /// counts as being in it. Zero disables the failsafe.
    pub fn new(failsafe_margin: i32) -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("failed to initialize input backend: {e:?}"))?;
        Ok(Self {
            enigo,
            failsafe_margin,
        })
    }
}

impl ActionSink for EnigoSink {
    fn scroll(&mut self, amount: i32) -> anyhow::Result<()> {
        // enigo scrolls down for positive values.
        self.enigo
            .scroll(-amount, Axis::Vertical)
            .map_err(|e| anyhow!("scroll failed: {e:?}"))
    }

    fn left_click(&mut self) -> anyhow::Result<()> {
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| anyhow!("left click failed: {e:?}"))
    }

    fn right_click(&mut self) -> anyhow::Result<()> {
        self.enigo
            .button(Button::Right, Direction::Click)
            .map_err(|e| anyhow!("right click failed: {e:?}"))
    }

    fn failsafe_triggered(&mut self) -> bool {
        if self.failsafe_margin <= 0 {
            return false;
        }
        let (Ok(position), Ok(display)) = (self.enigo.location(), self.enigo.main_display()) else {
            return false;
        };
        in_corner(position, display, self.failsafe_margin)
    }
}

fn in_corner((x, y): (i32, i32), (width, height): (i32, i32), margin: i32) -> bool {
    let near_x = x < margin || x >= width - margin;
    let near_y = y < margin || y >= height - margin;
    near_x && near_y
}

#[cfg(test)]
mod tests {
    use super::in_corner;

    #[test]
    fn corners_trip_edges_do_not() {
        let display = (1920, 1080);
        assert!(in_corner((0, 0), display, 2));
        assert!(in_corner((1919, 1079), display, 2));
        assert!(in_corner((1, 1078), display, 2));
        assert!(!in_corner((0, 500), display, 2));
        assert!(!in_corner((960, 0), display, 2));
        assert!(!in_corner((960, 540), display, 2));
    }
}
