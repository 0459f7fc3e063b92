//! ==============================================================================
//! dialog.rs - menus, number entry and confirmation as one state machine
//! ==============================================================================
//!
//! purpose:
//!     every interaction the wearer can have with the face is a transition of
//!     DialogState. `handle` is pure: it takes the current state, one event
//!     and the current time, and returns the next state plus at most one
//!     effect for the caller to carry out.
//!
//! flows:
//!     treatment:       carbs -> insulin -> ActionBolusPreCheck
//!     temp target:     preset menu -> ActionTempTargetPreCheck
//!     profile switch:  percent -> duration -> ActionProfileSwitchPreCheck
//!     confirmation:    phone prompt -> confirm / cancel / time out
//!
//! back navigation:
//!     insulin -> carbs (carbs kept), carbs -> main menu,
//!     duration -> percent (percent kept), percent -> main menu,
//!     temp target menu -> main menu, main menu -> idle
//!
//! ==============================================================================

use crate::command::{Command, TempTargetPreset};
use crate::domain::Timestamp;
use crate::events::ConfirmPrompt;

/// a bounded stepper, the watch's only numeric input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberEntry {
    pub value: f64,
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl NumberEntry {
    pub fn carbs(value: f64) -> Self {
        Self { value, step: 5.0, min: 0.0, max: 300.0 }
    }

    pub fn insulin(value: f64) -> Self {
        Self { value, step: 0.5, min: 0.0, max: 20.0 }
    }

    pub fn percent(value: f64) -> Self {
        Self { value, step: 10.0, min: 10.0, max: 200.0 }
    }

    pub fn duration(value: f64) -> Self {
        Self { value, step: 30.0, min: 0.0, max: 1440.0 }
    }

    fn increased(self) -> Self {
        Self { value: (self.value + self.step).min(self.max), ..self }
    }

    fn decreased(self) -> Self {
        Self { value: (self.value - self.step).max(self.min), ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Treatment,
    TempTarget,
    ProfileSwitch,
    RefreshData,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    MainMenu,
    TempTargetMenu,
    EnteringCarbs(NumberEntry),
    EnteringInsulin { carbs: f64, entry: NumberEntry },
    EnteringPercent(NumberEntry),
    EnteringDuration { percentage: f64, entry: NumberEntry },
    AwaitingConfirmation { prompt: ConfirmPrompt, deadline: Timestamp },
    /// a command went out; the face is shown again
    Done,
    /// the wearer backed out or a prompt expired; the face is shown again
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogEvent {
    Tap,
    DoubleTap,
    Select(MenuItem),
    SelectPreset(TempTargetPreset),
    Increase,
    Decrease,
    Accept,
    Back,
    ConfirmRequested(ConfirmPrompt),
    Confirm,
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Command),
    /// drop buffered history and ask the phone for everything again
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: DialogState,
    pub effect: Option<Effect>,
}

impl Transition {
    fn to(state: DialogState) -> Self {
        Self { state, effect: None }
    }

    fn send(command: Command) -> Self {
        Self { state: DialogState::Done, effect: Some(Effect::Send(command)) }
    }
}

impl DialogState {
    /// true while something covers the watch face
    pub fn is_active(&self) -> bool {
        !matches!(self, DialogState::Idle | DialogState::Done | DialogState::Cancelled)
    }

    pub fn title(&self) -> Option<&'static str> {
        Some(match self {
            DialogState::MainMenu => "AAPS Menu",
            DialogState::TempTargetMenu => "Temp Target",
            DialogState::EnteringCarbs(_) => "Carbs (g)",
            DialogState::EnteringInsulin { .. } => "Insulin (U)",
            DialogState::EnteringPercent(_) => "Percent (%)",
            DialogState::EnteringDuration { .. } => "Duration (min)",
            DialogState::AwaitingConfirmation { .. } => "ConfirmAction",
            _ => return None,
        })
    }

    pub fn handle(self, event: DialogEvent, now: Timestamp, confirm_timeout: Timestamp) -> Transition {
        use DialogEvent as E;
        use DialogState as S;

        // a phone prompt always takes over the screen
        if let E::ConfirmRequested(prompt) = event {
            return Transition::to(S::AwaitingConfirmation { prompt, deadline: now + confirm_timeout });
        }

        match (self, event) {
            (S::Idle | S::Done | S::Cancelled, E::Tap) => Transition::to(S::MainMenu),
            (S::Idle | S::Done | S::Cancelled, E::DoubleTap) => {
                Transition::to(S::EnteringCarbs(NumberEntry::carbs(0.0)))
            }

            (S::MainMenu, E::Select(item)) => match item {
                MenuItem::Treatment => Transition::to(S::EnteringCarbs(NumberEntry::carbs(0.0))),
                MenuItem::TempTarget => Transition::to(S::TempTargetMenu),
                MenuItem::ProfileSwitch => Transition::to(S::EnteringPercent(NumberEntry::percent(100.0))),
                MenuItem::RefreshData => Transition { state: S::Done, effect: Some(Effect::Refresh) },
            },
            (S::MainMenu, E::Back) => Transition::to(S::Idle),

            (S::TempTargetMenu, E::SelectPreset(preset)) => {
                Transition::send(Command::TempTargetPreCheck(preset))
            }
            (S::TempTargetMenu, E::Back) => Transition::to(S::MainMenu),

            (S::EnteringCarbs(entry), E::Increase) => Transition::to(S::EnteringCarbs(entry.increased())),
            (S::EnteringCarbs(entry), E::Decrease) => Transition::to(S::EnteringCarbs(entry.decreased())),
            (S::EnteringCarbs(entry), E::Accept) => Transition::to(S::EnteringInsulin {
                carbs: entry.value,
                entry: NumberEntry::insulin(0.0),
            }),
            (S::EnteringCarbs(_), E::Back) => Transition::to(S::MainMenu),

            (S::EnteringInsulin { carbs, entry }, E::Increase) => {
                Transition::to(S::EnteringInsulin { carbs, entry: entry.increased() })
            }
            (S::EnteringInsulin { carbs, entry }, E::Decrease) => {
                Transition::to(S::EnteringInsulin { carbs, entry: entry.decreased() })
            }
            (S::EnteringInsulin { carbs, entry }, E::Accept) => {
                Transition::send(Command::BolusPreCheck { carbs, insulin: entry.value })
            }
            (S::EnteringInsulin { carbs, .. }, E::Back) => {
                Transition::to(S::EnteringCarbs(NumberEntry::carbs(carbs)))
            }

            (S::EnteringPercent(entry), E::Increase) => Transition::to(S::EnteringPercent(entry.increased())),
            (S::EnteringPercent(entry), E::Decrease) => Transition::to(S::EnteringPercent(entry.decreased())),
            (S::EnteringPercent(entry), E::Accept) => Transition::to(S::EnteringDuration {
                percentage: entry.value,
                entry: NumberEntry::duration(0.0),
            }),
            (S::EnteringPercent(_), E::Back) => Transition::to(S::MainMenu),

            (S::EnteringDuration { percentage, entry }, E::Increase) => {
                Transition::to(S::EnteringDuration { percentage, entry: entry.increased() })
            }
            (S::EnteringDuration { percentage, entry }, E::Decrease) => {
                Transition::to(S::EnteringDuration { percentage, entry: entry.decreased() })
            }
            (S::EnteringDuration { percentage, entry }, E::Accept) => {
                Transition::send(Command::ProfileSwitchPreCheck { percentage, duration: entry.value })
            }
            (S::EnteringDuration { percentage, .. }, E::Back) => {
                Transition::to(S::EnteringPercent(NumberEntry::percent(percentage)))
            }

            (S::AwaitingConfirmation { prompt, .. }, E::Confirm | E::Accept) => {
                Transition::send(prompt.confirmed_command())
            }
            (S::AwaitingConfirmation { .. }, E::Back) => Transition::to(S::Cancelled),
            (S::AwaitingConfirmation { prompt, deadline }, E::Tick) => {
                if now >= deadline {
                    Transition::to(S::Cancelled)
                } else {
                    Transition::to(S::AwaitingConfirmation { prompt, deadline })
                }
            }

            // anything else leaves the state alone
            (state, _) => Transition::to(state),
        }
    }
}
