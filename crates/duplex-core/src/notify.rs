//! Fire-and-forget notifications on the secondary channel.
//!
//! Notifications never touch the primary channel, so they cannot corrupt a
//! JSON response or an active event stream. Write failures are swallowed:
//! a notification is advisory, never part of the program's contract.

use serde_json::{json, Value};

use crate::context::OutputChannel;

/// Notification emitter bound to the secondary channel.
#[derive(Clone)]
pub struct Notifier {
    channel: OutputChannel,
}

impl Notifier {
    pub(crate) fn new(channel: OutputChannel) -> Self {
        Self { channel }
    }

    fn emit(&self, event: Value) {
        let _ = self.channel.write_json(&event);
    }

    /// Progress notification with an optional completion percentage.
    pub fn progress(&self, message: impl Into<String>, percent: Option<u8>) {
        let mut event = json!({
            "type": "notification",
            "kind": "progress",
            "message": message.into(),
        });
        if let (Some(obj), Some(pct)) = (event.as_object_mut(), percent) {
            obj.insert("percent".into(), json!(pct));
        }
        self.emit(event);
    }

    /// Log notification at the given level.
    pub fn log(&self, level: impl Into<String>, message: impl Into<String>) {
        self.emit(json!({
            "type": "notification",
            "kind": "log",
            "level": level.into(),
            "message": message.into(),
        }));
    }

    /// Artifact notification pointing at a produced resource.
    pub fn artifact(&self, name: impl Into<String>, uri: impl Into<String>) {
        self.emit(json!({
            "type": "notification",
            "kind": "artifact",
            "name": name.into(),
            "uri": uri.into(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn notifications_are_lines_on_their_own_channel() {
        let (channel, handle) = OutputChannel::buffer();
        let notify = Notifier::new(channel);

        notify.log("info", "starting");
        notify.progress("halfway", Some(50));
        notify.progress("still going", None);
        notify.artifact("out.json", "/tmp/out.json");

        let lines = handle.lines();
        assert_eq!(lines.len(), 4);

        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["type"], "notification");
        assert_eq!(first["kind"], "log");
        assert_eq!(first["level"], "info");

        let second: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["kind"], "progress");
        assert_eq!(second["percent"], 50);

        let third: Value = serde_json::from_str(&lines[2]).unwrap();
        assert!(third.get("percent").is_none());

        let fourth: Value = serde_json::from_str(&lines[3]).unwrap();
        assert_eq!(fourth["kind"], "artifact");
        assert_eq!(fourth["uri"], "/tmp/out.json");
    }
}
