//! Point-in-time readings pushed by the external signal producers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HeadPose {
    /// Degrees, signed. Rules compare the absolute value.
    pub yaw: f64,
    pub pitch: f64,
}

impl HeadPose {
    pub fn abs_yaw(&self) -> f64 {
        self.yaw.abs()
    }

    pub fn abs_pitch(&self) -> f64 {
        self.pitch.abs()
    }
}

/// Facial-feature summary from the camera tracker, refreshed roughly every 5s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSnapshot {
    pub face_detected: bool,
    pub ear_average: Option<f64>,
    pub perclos_drowsy: bool,
    pub yawning: bool,
    pub head_pose: Option<HeadPose>,
    pub face_not_detected_ratio: Option<f64>,
    pub gaze_off_screen_ratio: Option<f64>,
    pub blinks_per_minute: Option<f64>,
}

impl Default for CameraSnapshot {
    fn default() -> Self {
        Self {
            face_detected: true,
            ear_average: None,
            perclos_drowsy: false,
            yawning: false,
            head_pose: None,
            face_not_detected_ratio: None,
            gaze_off_screen_ratio: None,
            blinks_per_minute: None,
        }
    }
}

/// Input-activity summary from the PC monitor, refreshed roughly every 30s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PcSnapshot {
    pub active_app: Option<String>,
    pub idle_seconds: f64,
    pub keyboard_rate_window: f64,
    pub mouse_rate_window: f64,
    pub app_switches_in_window: u32,
    pub unique_apps_in_window: u32,
    pub seconds_since_last_keyboard: Option<f64>,
}
