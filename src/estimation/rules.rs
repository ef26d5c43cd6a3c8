//! Deterministic classification.
//!
//! `RULES` decides the unambiguous cases before any inference call is made.
//! `fallback_classify` is the last resort when inference is disabled or
//! fails, and always produces a verdict.

use crate::models::{
    BehaviorState, CameraSnapshot, ClassificationResult, ClassificationSource, PcSnapshot,
};

pub const AWAY_FACE_NOT_DETECTED_RATIO: f64 = 0.7;
pub const FOCUSED_MIN_EAR: f64 = 0.27;
pub const FOCUSED_MAX_YAW_DEG: f64 = 25.0;
pub const FOCUSED_MAX_PITCH_DEG: f64 = 25.0;
pub const PC_NOT_IDLE_MAX_SECONDS: f64 = 60.0;
pub const FALLBACK_DISTRACTED_YAW_DEG: f64 = 45.0;
pub const FALLBACK_DISTRACTED_APP_SWITCHES: u32 = 6;
pub const FALLBACK_DISTRACTED_UNIQUE_APPS: u32 = 4;

type RuleFn = fn(Option<&CameraSnapshot>, Option<&PcSnapshot>) -> Option<ClassificationResult>;

/// A single predicate-to-verdict entry of the rule table.
pub struct Rule {
    pub name: &'static str,
    pub evaluate: RuleFn,
}

/// Evaluated in order; the first rule returning a verdict wins.
pub const RULES: [Rule; 4] = [
    Rule {
        name: "no_signal",
        evaluate: no_signal,
    },
    Rule {
        name: "no_face",
        evaluate: no_face,
    },
    Rule {
        name: "face_mostly_missing",
        evaluate: face_mostly_missing,
    },
    Rule {
        name: "attentive_and_active",
        evaluate: attentive_and_active,
    },
];

fn rule_verdict(state: BehaviorState, confidence: f64, reasoning: String) -> ClassificationResult {
    ClassificationResult::new(state, confidence, reasoning, ClassificationSource::Rule)
}

fn fallback_verdict(
    state: BehaviorState,
    confidence: f64,
    reasoning: String,
) -> ClassificationResult {
    ClassificationResult::new(state, confidence, reasoning, ClassificationSource::Fallback)
}

fn no_signal(
    camera: Option<&CameraSnapshot>,
    pc: Option<&PcSnapshot>,
) -> Option<ClassificationResult> {
    if camera.is_none() && pc.is_none() {
        return Some(rule_verdict(
            BehaviorState::Unknown,
            0.0,
            "No data from camera or PC monitor".to_string(),
        ));
    }
    None
}

fn no_face(camera: Option<&CameraSnapshot>, _pc: Option<&PcSnapshot>) -> Option<ClassificationResult> {
    let camera = camera?;
    if camera.face_detected {
        return None;
    }
    Some(rule_verdict(
        BehaviorState::Away,
        1.0,
        "No face detected in frame".to_string(),
    ))
}

fn face_mostly_missing(
    camera: Option<&CameraSnapshot>,
    _pc: Option<&PcSnapshot>,
) -> Option<ClassificationResult> {
    let ratio = camera?.face_not_detected_ratio?;
    if ratio <= AWAY_FACE_NOT_DETECTED_RATIO {
        return None;
    }
    Some(rule_verdict(
        BehaviorState::Away,
        0.9,
        format!("Face not detected in {:.0}% of recent frames", ratio * 100.0),
    ))
}

fn attentive_and_active(
    camera: Option<&CameraSnapshot>,
    pc: Option<&PcSnapshot>,
) -> Option<ClassificationResult> {
    let camera = camera?;
    let pc = pc?;

    if camera.perclos_drowsy || camera.yawning {
        return None;
    }
    let ear = camera.ear_average?;
    let pose = camera.head_pose?;
    let eyes_open = ear > FOCUSED_MIN_EAR;
    let facing_screen =
        pose.abs_yaw() < FOCUSED_MAX_YAW_DEG && pose.abs_pitch() < FOCUSED_MAX_PITCH_DEG;
    let pc_active = pc.idle_seconds <= PC_NOT_IDLE_MAX_SECONDS;

    if eyes_open && facing_screen && pc_active {
        return Some(rule_verdict(
            BehaviorState::Focused,
            0.9,
            "Eyes open, facing screen, no drowsiness signals, PC active".to_string(),
        ));
    }
    None
}

/// Run the rule table. `None` means the case is ambiguous.
pub fn apply_rules(
    camera: Option<&CameraSnapshot>,
    pc: Option<&PcSnapshot>,
) -> Option<(&'static str, ClassificationResult)> {
    RULES
        .iter()
        .find_map(|rule| (rule.evaluate)(camera, pc).map(|result| (rule.name, result)))
}

/// Deterministic verdict for when the generative stage is unavailable.
///
/// PC idleness alone never yields `idle` here; ambiguous input resolves to a
/// low-confidence `focused`.
pub fn fallback_classify(
    camera: Option<&CameraSnapshot>,
    pc: Option<&PcSnapshot>,
) -> ClassificationResult {
    if let Some(camera) = camera {
        if camera.perclos_drowsy && camera.yawning {
            return fallback_verdict(
                BehaviorState::Drowsy,
                0.7,
                "PERCLOS drowsy and yawning detected".to_string(),
            );
        }
        if camera.yawning {
            return fallback_verdict(BehaviorState::Drowsy, 0.6, "Yawning detected".to_string());
        }
        if let Some(pose) = camera.head_pose {
            if pose.abs_yaw() > FALLBACK_DISTRACTED_YAW_DEG {
                return fallback_verdict(
                    BehaviorState::Distracted,
                    0.6,
                    format!("Head turned significantly (yaw={:.0})", pose.abs_yaw()),
                );
            }
        }
    }

    if let Some(pc) = pc {
        if pc.app_switches_in_window > FALLBACK_DISTRACTED_APP_SWITCHES
            && pc.unique_apps_in_window > FALLBACK_DISTRACTED_UNIQUE_APPS
        {
            return fallback_verdict(
                BehaviorState::Distracted,
                0.6,
                format!(
                    "{} app switches across {} apps",
                    pc.app_switches_in_window, pc.unique_apps_in_window
                ),
            );
        }
    }

    fallback_verdict(
        BehaviorState::Focused,
        0.5,
        "No strong signals detected, assuming focused".to_string(),
    )
}
