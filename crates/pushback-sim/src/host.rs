//! Host seams: the asset/audio subsystem and the operator notifier.
//!
//! The simulator never talks to a rendering or audio API directly. Everything
//! goes through [`AssetHost`] and [`Notifier`], implemented by the embedding
//! host (or by [`crate::headless::RecordingHost`] when running standalone).

use pushback_domain::Vec2;
use serde::{Deserialize, Serialize};

/// Loaded visual object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

/// Loaded sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle(pub u32);

/// Where to draw one object instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub pos: Vec2,
    pub hdg: f64,
    /// Height above the ground in meters
    pub elev: f64,
    /// Wheel roll angle in degrees, zero for non-wheel parts
    pub roll_angle: f64,
}

/// Rendering and audio services of the host
pub trait AssetHost {
    /// Load an object by path, `None` when it does not exist.
    fn load_object(&mut self, path: &str) -> Option<ObjectHandle>;
    fn unload_object(&mut self, handle: ObjectHandle);
    fn draw_object(&mut self, handle: ObjectHandle, placement: &Placement);

    /// Load a sound by path, `None` when it does not exist.
    fn load_sound(&mut self, path: &str) -> Option<SoundHandle>;
    fn unload_sound(&mut self, handle: SoundHandle);
    fn play_sound(&mut self, handle: SoundHandle, looped: bool);
    fn stop_sound(&mut self, handle: SoundHandle);
    fn set_sound_params(&mut self, handle: SoundHandle, gain: f64, pitch: f64);
}

/// Spoken operator messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    PlanStart,
    PlanEnd,
    SyncFailure,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Self::PlanStart => "Pushback planner open. Place the end point and close the planner to start.",
            Self::PlanEnd => "Pushback plan saved. Start pushback when ready.",
            Self::SyncFailure => {
                "Pushback failure: the partner instance attempted to switch master/slave \
                 or the network connection was lost. Stopping operation."
            }
        }
    }
}

/// Audible operator feedback
pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_texts_are_distinct() {
        let texts = [Notice::PlanStart, Notice::PlanEnd, Notice::SyncFailure].map(|n| n.text());
        assert_ne!(texts[0], texts[1]);
        assert!(texts[2].starts_with("Pushback failure"));
    }
}
