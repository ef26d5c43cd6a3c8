use crate::models::{CameraSnapshot, PcSnapshot};

pub const UNAVAILABLE: &str = "(unavailable)";

pub const SYSTEM_PROMPT: &str = r#"You classify a person's working state from facial-feature and PC-usage readings.

STATES: focused, drowsy, distracted, away, idle
If unsure, answer "focused". It is the normal working state.

GUIDANCE:
- focused: working, reading, in a meeting or conversation, using several monitors. A turned head is normal. No keyboard or mouse input can still be focused (video, meeting, reading).
- drowsy: needs several strong signals together, such as a very low eye aspect ratio (<0.22) with perclos_drowsy=true, or yawning with low eye openness. One weak signal is never enough.
- distracted: rapid switching between many applications (more than 6 switches across more than 4 apps). Head turning alone is not distraction.
- away: no face in front of the camera.
- idle: present but disengaged. No PC input for a long time AND nothing on screen is holding attention. Only choose idle when both data sources agree.

A data source shown as "(unavailable)" is missing; reason from the other one.

Answer with a single JSON object and nothing else:
{"state":"<one of the states>","confidence":<0.0-1.0>,"reasoning":"<short phrase>"}"#;

/// Render a snapshot as pretty JSON, or the placeholder when it is missing.
fn render<T: serde::Serialize>(snapshot: Option<&T>) -> String {
    snapshot
        .and_then(|value| serde_json::to_string_pretty(value).ok())
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

pub fn format_user_prompt(camera: Option<&CameraSnapshot>, pc: Option<&PcSnapshot>) -> String {
    format!(
        "Classify the person's state using both data sources.\n\n\
         Facial features:\n{}\n\n\
         PC usage:\n{}\n\n\
         Respond with ONLY a JSON object.",
        render(camera),
        render(pc),
    )
}
