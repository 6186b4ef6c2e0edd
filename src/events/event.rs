//! # Wire data model: task events and command acknowledgements.
//!
//! [`TaskEvent`] is the outbound notification produced by workers. It is both
//! the in-process bus message and the JSON body published on the event
//! endpoint, tagged by its `status` field:
//!
//! ```text
//! progress  {"status":"running","id":"ab12cd34","value":40,"message":"Processing step 2 of 5..."}
//! result    {"status":"completed","id":"ab12cd34","data":"Analysis of 'hello' is complete."}
//! failed    {"status":"failed","id":"ab12cd34","error":"execution failed: boom"}
//! ```
//!
//! The published frame is `"<topic> <json>"` where the topic is derived from
//! the variant (see [`TaskEvent::topic`]).
//!
//! ## Rules
//! - `result` and `failed` are **terminal**: exactly one per task id, always
//!   last. `progress` values are strictly increasing in `[0, 100]`.
//! - Every payload round-trips through serde field-for-field.

use serde::{Deserialize, Serialize};

/// Outbound notification for one task, also the in-process bus message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum TaskEvent {
    /// The task advanced one step. Published on topic `progress`.
    #[serde(rename = "running")]
    Progress {
        /// Task id the event belongs to.
        id: String,
        /// Percentage in `[0, 100]`, strictly increasing per id.
        value: u8,
        /// Human-readable step description.
        message: String,
    },

    /// The task finished successfully. Terminal; published on topic `result`.
    #[serde(rename = "completed")]
    Completed {
        /// Task id the event belongs to.
        id: String,
        /// Result payload produced by the job.
        data: String,
    },

    /// The task failed (error, cancellation, or panic). Terminal; published
    /// on topic `failed`.
    #[serde(rename = "failed")]
    Failed {
        /// Task id the event belongs to.
        id: String,
        /// Human-readable failure description.
        error: String,
    },
}

impl TaskEvent {
    /// Creates a progress event. `value` is clamped to 100.
    pub fn progress(id: impl Into<String>, value: u8, message: impl Into<String>) -> Self {
        TaskEvent::Progress {
            id: id.into(),
            value: value.min(100),
            message: message.into(),
        }
    }

    /// Creates the successful terminal event.
    pub fn completed(id: impl Into<String>, data: impl Into<String>) -> Self {
        TaskEvent::Completed {
            id: id.into(),
            data: data.into(),
        }
    }

    /// Creates the failure terminal event.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        TaskEvent::Failed {
            id: id.into(),
            error: error.into(),
        }
    }

    /// Returns the task id the event belongs to.
    pub fn id(&self) -> &str {
        match self {
            TaskEvent::Progress { id, .. }
            | TaskEvent::Completed { id, .. }
            | TaskEvent::Failed { id, .. } => id,
        }
    }

    /// Returns the publish topic for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            TaskEvent::Progress { .. } => "progress",
            TaskEvent::Completed { .. } => "result",
            TaskEvent::Failed { .. } => "failed",
        }
    }

    /// Returns true for `result` and `failed` events, which end a task's
    /// event stream and trigger registry cleanup.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Progress { .. })
    }

    /// Encodes the event as a single publish frame: `"<topic> <json>"`.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{} {}", self.topic(), json))
    }
}

/// Synchronous reply sent on the command channel for each accepted command.
///
/// Wire shape: `{"status":"started","id":"<8-hex>","original_request":"<echo>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Always `"started"`: execution begins immediately on acceptance,
    /// there is no queued state.
    pub status: String,
    /// The freshly allocated task id.
    pub id: String,
    /// Echo of the received command payload.
    pub original_request: String,
}

impl Ack {
    /// Creates the acknowledgement for a just-started task.
    pub fn started(id: impl Into<String>, original_request: impl Into<String>) -> Self {
        Self {
            status: "started".to_string(),
            id: id.into(),
            original_request: original_request.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_round_trips() {
        let ev = TaskEvent::progress("ab12cd34", 40, "Processing step 2 of 5...");
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        let back: TaskEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn terminal_round_trips() {
        let done = TaskEvent::completed("ab12cd34", "Analysis of 'hello' is complete.");
        let failed = TaskEvent::failed("ab12cd34", "boom");
        for ev in [done, failed] {
            let back: TaskEvent =
                serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
            assert_eq!(back, ev);
            assert!(ev.is_terminal());
        }
    }

    #[test]
    fn topics_match_variants() {
        assert_eq!(TaskEvent::progress("x", 1, "m").topic(), "progress");
        assert_eq!(TaskEvent::completed("x", "d").topic(), "result");
        assert_eq!(TaskEvent::failed("x", "e").topic(), "failed");
        assert!(!TaskEvent::progress("x", 1, "m").is_terminal());
    }

    #[test]
    fn frame_has_topic_prefix() {
        let frame = TaskEvent::completed("ab12cd34", "done").to_frame().unwrap();
        let (topic, json) = frame.split_once(' ').unwrap();
        assert_eq!(topic, "result");
        let back: TaskEvent = serde_json::from_str(json).unwrap();
        assert_eq!(back.id(), "ab12cd34");
    }

    #[test]
    fn progress_value_is_clamped() {
        let ev = TaskEvent::progress("x", 250, "m");
        match ev {
            TaskEvent::Progress { value, .. } => assert_eq!(value, 100),
            _ => unreachable!(),
        }
    }

    #[test]
    fn ack_round_trips() {
        let ack = Ack::started("ab12cd34", "hello");
        let json = serde_json::to_string(&ack).unwrap();
        let back: Ack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ack);
        assert_eq!(back.status, "started");
        assert_eq!(back.original_request, "hello");
    }
}
