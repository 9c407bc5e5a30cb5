//! Tug sound emitters: engine tone, cradle air and reversing beeper.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::host::{AssetHost, SoundHandle};

/// Externally settable sound preferences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundPrefs {
    /// Master switch
    pub sound_enabled: bool,
    /// External (outside-view) volume ratio, 0..=1
    pub ext_volume: f64,
}

impl Default for SoundPrefs {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            ext_volume: 1.0,
        }
    }
}

impl SoundPrefs {
    /// Gain multiplier for every emitter.
    pub fn master_gain(&self) -> f64 {
        if self.sound_enabled {
            self.ext_volume.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One loaded sound and its playback state
#[derive(Debug, Default)]
pub struct Emitter {
    handle: Option<SoundHandle>,
    playing: bool,
}

impl Emitter {
    pub fn new(handle: SoundHandle) -> Self {
        Self {
            handle: Some(handle),
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start or stop looped playback, only touching the host on change.
    pub fn set_playing<H: AssetHost + ?Sized>(&mut self, host: &mut H, on: bool) {
        let Some(handle) = self.handle else { return };
        if on == self.playing {
            return;
        }
        if on {
            host.play_sound(handle, true);
        } else {
            host.stop_sound(handle);
        }
        self.playing = on;
    }

    pub fn set_params<H: AssetHost + ?Sized>(&self, host: &mut H, gain: f64, pitch: f64) {
        if let Some(handle) = self.handle {
            host.set_sound_params(handle, gain, pitch);
        }
    }

    /// Stop and unload. Safe to call more than once.
    pub fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(handle) = self.handle.take() {
            if self.playing {
                host.stop_sound(handle);
            }
            host.unload_sound(handle);
        }
        self.playing = false;
    }
}

/// Engine tone driven by the tractive-effort fraction
#[derive(Debug, Default)]
pub struct EngineSound {
    emitter: Emitter,
    pitch: f64,
}

impl EngineSound {
    const IDLE_PITCH: f64 = 0.7;
    const IDLE_GAIN: f64 = 0.4;

    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            pitch: Self::IDLE_PITCH,
        }
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn update<H: AssetHost + ?Sized>(&mut self, host: &mut H, prefs: &SoundPrefs, te_fract: f64) {
        let te = te_fract.clamp(0.0, 1.0);
        self.pitch = Self::IDLE_PITCH + (1.0 - Self::IDLE_PITCH) * te * 1.5;
        let gain = (Self::IDLE_GAIN + (1.0 - Self::IDLE_GAIN) * te) * prefs.master_gain();
        self.emitter.set_playing(host, true);
        self.emitter.set_params(host, gain, self.pitch);
    }

    pub fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        self.emitter.release(host);
    }
}

/// Cradle air hiss. Toggles at most once per dwell period.
#[derive(Debug, Default)]
pub struct CradleAir {
    emitter: Emitter,
    requested: bool,
    last_toggle_t: Option<f64>,
    dwell: f64,
}

impl CradleAir {
    pub fn new(emitter: Emitter, dwell: f64) -> Self {
        Self {
            emitter,
            requested: false,
            last_toggle_t: None,
            dwell,
        }
    }

    pub fn set_requested(&mut self, on: bool) {
        self.requested = on;
    }

    pub fn requested(&self) -> bool {
        self.requested
    }

    pub fn is_on(&self) -> bool {
        self.emitter.is_playing()
    }

    pub fn update<H: AssetHost + ?Sized>(&mut self, host: &mut H, prefs: &SoundPrefs, cur_t: f64) {
        if self.requested != self.emitter.is_playing() {
            let settled = self
                .last_toggle_t
                .is_none_or(|t| cur_t - t >= self.dwell);
            if settled {
                trace!(on = self.requested, cur_t, "cradle air toggled");
                self.emitter.set_playing(host, self.requested);
                self.last_toggle_t = Some(cur_t);
            }
        }
        if self.emitter.is_playing() {
            self.emitter.set_params(host, prefs.master_gain(), 1.0);
        }
    }

    pub fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        self.emitter.release(host);
    }
}

/// Maneuvering beeper
#[derive(Debug, Default)]
pub struct Beeper {
    emitter: Emitter,
    requested: bool,
}

impl Beeper {
    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            requested: false,
        }
    }

    pub fn set_requested(&mut self, on: bool) {
        self.requested = on;
    }

    pub fn is_on(&self) -> bool {
        self.emitter.is_playing()
    }

    pub fn update<H: AssetHost + ?Sized>(&mut self, host: &mut H, prefs: &SoundPrefs) {
        self.emitter.set_playing(host, self.requested);
        if self.requested {
            self.emitter.set_params(host, prefs.master_gain(), 1.0);
        }
    }

    pub fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        self.emitter.release(host);
    }
}
