//! Wearer input from a terminal.
//!
//! Without a touch screen the runtime reads one word per line from stdin and
//! maps it to the gesture or button it stands for.

use crate::command::TempTargetPreset;
use crate::dialog::{DialogEvent, MenuItem};

pub const HELP: &str = "\
tap | double | menu            open the menu / quick treatment
treatment | temp | profile     pick a menu item
refresh                        resync history from the phone
eating | activity | hypo | cancel-target
+ | - | ok | back | confirm";

/// Map one console line to a dialog event. Unknown words give `None`.
pub fn parse_console_command(line: &str) -> Option<DialogEvent> {
    let word = line.trim().to_ascii_lowercase();
    let event = match word.as_str() {
        "tap" | "menu" => DialogEvent::Tap,
        "double" | "doubletap" | "bolus" => DialogEvent::DoubleTap,
        "treatment" => DialogEvent::Select(MenuItem::Treatment),
        "temp" | "temptarget" => DialogEvent::Select(MenuItem::TempTarget),
        "profile" => DialogEvent::Select(MenuItem::ProfileSwitch),
        "refresh" => DialogEvent::Select(MenuItem::RefreshData),
        "eating" => DialogEvent::SelectPreset(TempTargetPreset::EatingSoon),
        "activity" => DialogEvent::SelectPreset(TempTargetPreset::Activity),
        "hypo" => DialogEvent::SelectPreset(TempTargetPreset::Hypo),
        "cancel-target" => DialogEvent::SelectPreset(TempTargetPreset::Cancel),
        "+" | "up" => DialogEvent::Increase,
        "-" | "down" => DialogEvent::Decrease,
        "ok" | "accept" => DialogEvent::Accept,
        "back" | "cancel" => DialogEvent::Back,
        "confirm" | "yes" => DialogEvent::Confirm,
        _ => return None,
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_map_to_events() {
        assert_eq!(parse_console_command("menu"), Some(DialogEvent::Tap));
        assert_eq!(parse_console_command("  +\n"), Some(DialogEvent::Increase));
        assert_eq!(
            parse_console_command("Hypo"),
            Some(DialogEvent::SelectPreset(TempTargetPreset::Hypo))
        );
        assert_eq!(
            parse_console_command("refresh"),
            Some(DialogEvent::Select(MenuItem::RefreshData))
        );
    }

    #[test]
    fn unknown_words_are_ignored() {
        assert_eq!(parse_console_command(""), None);
        assert_eq!(parse_console_command("launch"), None);
    }
}
