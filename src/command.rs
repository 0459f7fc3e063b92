//! ==============================================================================
//! command.rs - commands sent from the watch to the phone app
//! ==============================================================================
//!
//! purpose:
//!     a command is a type name plus a JSON payload. the phone answers
//!     "pre-check" commands with a ConfirmAction event, and the wearer's
//!     confirmation is sent back as a raw command.
//!
//! relationships:
//!     - implemented by: bridge.rs (HttpBridge), RecordingSink (tests)
//!     - used by: dialog.rs (effects), watchface.rs (dispatch)
//!
//! ==============================================================================

use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempTargetPreset {
    EatingSoon,
    Activity,
    Hypo,
    Cancel,
}

impl TempTargetPreset {
    pub fn wire_name(self) -> &'static str {
        match self {
            TempTargetPreset::EatingSoon => "PRESET_EATING",
            TempTargetPreset::Activity => "PRESET_ACTIVITY",
            TempTargetPreset::Hypo => "PRESET_HYPO",
            TempTargetPreset::Cancel => "CANCEL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// ask the phone to resend status and full history
    RequestInitialData,
    BolusPreCheck { carbs: f64, insulin: f64 },
    TempTargetPreCheck(TempTargetPreset),
    /// percentage of the active profile, duration in minutes
    ProfileSwitchPreCheck { percentage: f64, duration: f64 },
    /// a command whose type and payload came from the phone
    Raw { command_type: String, json: Value },
}

impl Command {
    pub fn command_type(&self) -> &str {
        match self {
            Command::RequestInitialData => "RequestInitialData",
            Command::BolusPreCheck { .. } => "ActionBolusPreCheck",
            Command::TempTargetPreCheck(_) => "ActionTempTargetPreCheck",
            Command::ProfileSwitchPreCheck { .. } => "ActionProfileSwitchPreCheck",
            Command::Raw { command_type, .. } => command_type,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Command::RequestInitialData => json!({}),
            Command::BolusPreCheck { carbs, insulin } => json!({ "carbs": carbs, "insulin": insulin }),
            Command::TempTargetPreCheck(preset) => json!({ "command": preset.wire_name() }),
            Command::ProfileSwitchPreCheck { percentage, duration } => json!({
                "percentage": percentage,
                "duration": duration,
                "timeShift": 0,
            }),
            Command::Raw { json, .. } => json.clone(),
        }
    }

    /// payload as it goes on the wire: the JSON encoding of `payload()`,
    /// with an empty payload (null, "", false, 0) sent as `{}`
    pub fn payload_text(&self) -> String {
        let payload = self.payload();
        let empty = match &payload {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            Value::Bool(flag) => !flag,
            Value::Number(n) => n.as_f64() == Some(0.0),
            _ => false,
        };
        if empty {
            "{}".to_string()
        } else {
            payload.to_string()
        }
    }
}

/// where commands go; sending is fire-and-forget
pub trait CommandSink {
    fn send(&self, command: Command);
}

/// keeps every command it is given
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: Rc<RefCell<Vec<Command>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Command> {
        self.sent.borrow().clone()
    }

    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, command: Command) {
        self.sent.borrow_mut().push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InboundEvent;

    #[test]
    fn bolus_payload_field_names() {
        let cmd = Command::BolusPreCheck { carbs: 20.0, insulin: 1.5 };
        assert_eq!(cmd.command_type(), "ActionBolusPreCheck");
        assert_eq!(cmd.payload(), json!({"carbs": 20.0, "insulin": 1.5}));
    }

    #[test]
    fn profile_switch_has_zero_time_shift() {
        let cmd = Command::ProfileSwitchPreCheck { percentage: 120.0, duration: 60.0 };
        assert_eq!(cmd.payload()["timeShift"], 0);
        assert_eq!(cmd.payload()["percentage"], 120.0);
    }

    #[test]
    fn temp_target_uses_wire_names() {
        let cmd = Command::TempTargetPreCheck(TempTargetPreset::EatingSoon);
        assert_eq!(cmd.payload_text(), r#"{"command":"PRESET_EATING"}"#);
    }

    #[test]
    fn raw_string_payload_is_encoded_as_a_json_string() {
        let cmd = Command::Raw {
            command_type: "ActionBolusConfirmed".into(),
            json: Value::String(r#"{"id":7}"#.into()),
        };
        assert_eq!(cmd.payload_text(), r#""{\"id\":7}""#);
    }

    #[test]
    fn empty_payloads_go_out_as_empty_object() {
        let raw = |json| Command::Raw { command_type: "ActionX".into(), json };
        assert_eq!(raw(Value::Null).payload_text(), "{}");
        assert_eq!(raw(json!("")).payload_text(), "{}");
        assert_eq!(raw(json!(false)).payload_text(), "{}");
        assert_eq!(raw(json!(0)).payload_text(), "{}");
        assert_eq!(raw(json!({"id": 7})).payload_text(), r#"{"id":7}"#);
        assert_eq!(Command::RequestInitialData.payload_text(), "{}");
    }

    #[test]
    fn confirmed_prompt_with_string_payload_is_reencoded() {
        let line = r#"{"eventType":"ConfirmAction","message":"m","returnCommandType":"ActionX","returnCommandJson":"{\"id\":7}"}"#;
        let InboundEvent::ConfirmAction(prompt) = InboundEvent::parse(line).unwrap() else {
            panic!("expected a ConfirmAction");
        };
        let sent = prompt.confirmed_command().payload_text();
        assert_eq!(sent, serde_json::to_string(&json!(r#"{"id":7}"#)).unwrap());
    }

    #[test]
    fn recording_sink_shares_history_between_clones() {
        let sink = RecordingSink::new();
        let handle = sink.clone();
        sink.send(Command::RequestInitialData);
        assert_eq!(handle.take(), vec![Command::RequestInitialData]);
        assert!(sink.sent().is_empty());
    }
}
