use std::{
    fmt,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::types::GestureLabel;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(800);
pub const DEFAULT_SCROLL_MAGNITUDE: i32 = 3;

/// OS input injection. Calls are fire-and-forget: an `Err` is reported as a
/// warning and never stops the frame loop.
pub trait ActionSink {
    /// Scrolls vertically; positive amounts scroll up.
    fn scroll(&mut self, amount: i32) -> anyhow::Result<()>;
    fn left_click(&mut self) -> anyhow::Result<()>;
    fn right_click(&mut self) -> anyhow::Result<()>;

    /// Emergency stop requested through the input device, e.g. the pointer
    /// parked in a screen corner. Polled once per frame.
    fn failsafe_triggered(&mut self) -> bool {
        false
    }
}

impl<S: ActionSink + ?Sized> ActionSink for Box<S> {
    fn scroll(&mut self, amount: i32) -> anyhow::Result<()> {
        (**self).scroll(amount)
    }

    fn left_click(&mut self) -> anyhow::Result<()> {
        (**self).left_click()
    }

    fn right_click(&mut self) -> anyhow::Result<()> {
        (**self).right_click()
    }

    fn failsafe_triggered(&mut self) -> bool {
        (**self).failsafe_triggered()
    }
}

/// Dry-run sink: logs what would have been injected.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn scroll(&mut self, amount: i32) -> anyhow::Result<()> {
        log::info!("[dry run] scroll {amount:+}");
        Ok(())
    }

    fn left_click(&mut self) -> anyhow::Result<()> {
        log::info!("[dry run] left click");
        Ok(())
    }

    fn right_click(&mut self) -> anyhow::Result<()> {
        log::info!("[dry run] right click");
        Ok(())
    }
}

/// Action a gesture is bound to in the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ScrollUp,
    ScrollDown,
    LeftClick,
    RightClick,
    Ignore,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ActionKind::ScrollUp => "scroll up",
            ActionKind::ScrollDown => "scroll down",
            ActionKind::LeftClick => "left click",
            ActionKind::RightClick => "right click",
            ActionKind::Ignore => "nothing",
        })
    }
}

/// Concrete command sent to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Scroll(i32),
    LeftClick,
    RightClick,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Scroll(amount) if *amount >= 0 => write!(f, "scroll up {amount}"),
            Action::Scroll(amount) => write!(f, "scroll down {}", amount.unsigned_abs()),
            Action::LeftClick => f.write_str("left click"),
            Action::RightClick => f.write_str("right click"),
        }
    }
}

/// Gesture to action table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionMap {
    pub palm: ActionKind,
    pub fist: ActionKind,
    pub peace: ActionKind,
    pub thumbs_up: ActionKind,
}

impl Default for ActionMap {
    fn default() -> Self {
        Self {
            palm: ActionKind::ScrollUp,
            fist: ActionKind::ScrollDown,
            peace: ActionKind::LeftClick,
            thumbs_up: ActionKind::RightClick,
        }
    }
}

impl ActionMap {
    pub fn kind(&self, label: GestureLabel) -> ActionKind {
        match label {
            GestureLabel::Palm => self.palm,
            GestureLabel::Fist => self.fist,
            GestureLabel::Peace => self.peace,
            GestureLabel::ThumbsUp => self.thumbs_up,
        }
    }

    pub fn action(&self, label: GestureLabel, scroll_magnitude: i32) -> Option<Action> {
        match self.kind(label) {
            ActionKind::ScrollUp => Some(Action::Scroll(scroll_magnitude)),
            ActionKind::ScrollDown => Some(Action::Scroll(-scroll_magnitude)),
            ActionKind::LeftClick => Some(Action::LeftClick),
            ActionKind::RightClick => Some(Action::RightClick),
            ActionKind::Ignore => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(Action),
    /// Nothing to do: no stable gesture, or the gesture is not bound.
    NoAction,
    /// Inside the cooldown interval of the previous action.
    Suppressed,
    /// The sink reported an error; the dispatcher stays idle.
    Failed(Action),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Cooling,
}

/// Turns stabilized gestures into rate-limited sink calls.
pub struct Dispatcher<S> {
    sink: S,
    actions: ActionMap,
    scroll_magnitude: i32,
    cooldown: Duration,
    last_action: Option<Instant>,
}

impl<S: ActionSink> Dispatcher<S> {
    pub fn new(sink: S, actions: ActionMap, scroll_magnitude: i32, cooldown: Duration) -> Self {
        Self {
            sink,
            actions,
            scroll_magnitude,
            cooldown,
            last_action: None,
        }
    }

    pub fn with_defaults(sink: S) -> Self {
        Self::new(
            sink,
            ActionMap::default(),
            DEFAULT_SCROLL_MAGNITUDE,
            DEFAULT_COOLDOWN,
        )
    }

    pub fn state(&self, now: Instant) -> DispatchState {
        match self.last_action {
            Some(last) if now.saturating_duration_since(last) < self.cooldown => {
                DispatchState::Cooling
            }
            _ => DispatchState::Idle,
        }
    }

    pub fn dispatch(&mut self, label: Option<GestureLabel>, now: Instant) -> DispatchOutcome {
        if self.state(now) == DispatchState::Cooling {
            return DispatchOutcome::Suppressed;
        }

        let Some(action) = label.and_then(|l| self.actions.action(l, self.scroll_magnitude))
        else {
            return DispatchOutcome::NoAction;
        };

        let result = match action {
            Action::Scroll(amount) => self.sink.scroll(amount),
            Action::LeftClick => self.sink.left_click(),
            Action::RightClick => self.sink.right_click(),
        };

        match result {
            Ok(()) => {
                self.last_action = Some(now);
                DispatchOutcome::Dispatched(action)
            }
            Err(err) => {
                log::warn!("{action} failed: {err:#}");
                DispatchOutcome::Failed(action)
            }
        }
    }

    pub fn failsafe_triggered(&mut self) -> bool {
        self.sink.failsafe_triggered()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
