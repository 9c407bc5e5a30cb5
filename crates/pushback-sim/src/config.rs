//! # Simulation Configuration
//!
//! Environment-based configuration for the pushback simulator. Every field
//! has a default, so an empty environment yields a working setup.

use std::env;

use crate::follower::FollowerConfig;
use crate::sound::SoundPrefs;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Segment follower tuning
    pub follower: FollowerConfig,

    /// Minimum time between cradle air toggles, in seconds
    pub cradle_air_dwell: f64,

    /// Partner-link poll interval, in seconds
    pub sync_interval: f64,

    /// Time the cradle takes to grip or release the nose gear, in seconds
    pub connect_time: f64,

    /// Sound preferences
    pub sound: SoundPrefs,
}

impl SimConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let num = |key: &str, default: f64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };
        let follower = FollowerConfig::default();

        Self {
            follower: FollowerConfig {
                steer_gain: num("PB_STEER_GAIN", follower.steer_gain),
                cross_track_gain: num("PB_CROSS_TRACK_GAIN", follower.cross_track_gain),
                speed_softening: follower.speed_softening,
                pos_tolerance: num("PB_POS_TOLERANCE", follower.pos_tolerance),
                hdg_tolerance: num("PB_HDG_TOLERANCE", follower.hdg_tolerance),
                min_speed: num("PB_MIN_SPEED", follower.min_speed),
                reapproach_dist: num("PB_REAPPROACH_DIST", follower.reapproach_dist),
                max_reapproaches: follower.max_reapproaches,
            },

            cradle_air_dwell: num("PB_CRADLE_AIR_DWELL", 2.0),

            sync_interval: num("PB_SYNC_INTERVAL", 1.0),

            connect_time: num("PB_CONNECT_TIME", 3.0),

            sound: SoundPrefs {
                sound_enabled: lookup("PB_SOUND_ENABLED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
                ext_volume: num("PB_EXT_VOLUME", 1.0).clamp(0.0, 1.0),
            },
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
