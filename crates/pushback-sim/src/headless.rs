//! In-memory host used by the CLI and the tests.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::host::{AssetHost, Notice, Notifier, ObjectHandle, Placement, SoundHandle};

#[derive(Debug, Clone, PartialEq)]
struct SoundSlot {
    path: String,
    playing: bool,
    gain: f64,
    pitch: f64,
}

/// Host that keeps every resource in memory and records what was asked of it
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_handle: u32,
    objects: HashMap<ObjectHandle, String>,
    sounds: HashMap<SoundHandle, SoundSlot>,
    failing: HashSet<String>,
    loaded: Vec<String>,
    draws: usize,
    notices: Vec<Notice>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later load of `path` fail.
    pub fn fail_asset(&mut self, path: impl Into<String>) {
        self.failing.insert(path.into());
    }

    pub fn was_loaded(&self, path: &str) -> bool {
        self.loaded.iter().any(|p| p == path)
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn live_sounds(&self) -> usize {
        self.sounds.len()
    }

    pub fn playing_count(&self) -> usize {
        self.sounds.values().filter(|s| s.playing).count()
    }

    /// Gain and pitch of the loaded sound at `path`, if playing.
    pub fn sound_params(&self, path: &str) -> Option<(f64, f64)> {
        self.sounds
            .values()
            .find(|s| s.path == path && s.playing)
            .map(|s| (s.gain, s.pitch))
    }

    pub fn draw_count(&self) -> usize {
        self.draws
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn try_load(&mut self, path: &str) -> bool {
        if self.failing.contains(path) {
            debug!(path, "asset load refused");
            return false;
        }
        self.loaded.push(path.to_string());
        true
    }
}

impl AssetHost for RecordingHost {
    fn load_object(&mut self, path: &str) -> Option<ObjectHandle> {
        if !self.try_load(path) {
            return None;
        }
        let handle = ObjectHandle(self.handle());
        self.objects.insert(handle, path.to_string());
        Some(handle)
    }

    fn unload_object(&mut self, handle: ObjectHandle) {
        self.objects.remove(&handle);
    }

    fn draw_object(&mut self, handle: ObjectHandle, _placement: &Placement) {
        if self.objects.contains_key(&handle) {
            self.draws += 1;
        }
    }

    fn load_sound(&mut self, path: &str) -> Option<SoundHandle> {
        if !self.try_load(path) {
            return None;
        }
        let handle = SoundHandle(self.handle());
        self.sounds.insert(handle, SoundSlot {
            path: path.to_string(),
            playing: false,
            gain: 1.0,
            pitch: 1.0,
        });
        Some(handle)
    }

    fn unload_sound(&mut self, handle: SoundHandle) {
        self.sounds.remove(&handle);
    }

    fn play_sound(&mut self, handle: SoundHandle, _looped: bool) {
        if let Some(slot) = self.sounds.get_mut(&handle) {
            slot.playing = true;
        }
    }

    fn stop_sound(&mut self, handle: SoundHandle) {
        if let Some(slot) = self.sounds.get_mut(&handle) {
            slot.playing = false;
        }
    }

    fn set_sound_params(&mut self, handle: SoundHandle, gain: f64, pitch: f64) {
        if let Some(slot) = self.sounds.get_mut(&handle) {
            slot.gain = gain;
            slot.pitch = pitch;
        }
    }
}

impl Notifier for RecordingHost {
    fn notify(&mut self, notice: Notice) {
        info!(?notice, "{}", notice.text());
        self.notices.push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_asset() {
        let mut host = RecordingHost::new();
        host.fail_asset("a.obj");
        assert!(host.load_object("a.obj").is_none());
        assert!(host.load_object("b.obj").is_some());
        assert!(!host.was_loaded("a.obj"));
        assert_eq!(host.live_objects(), 1);
    }

    #[test]
    fn test_sound_lifecycle() {
        let mut host = RecordingHost::new();
        let h = host.load_sound("engine.wav").unwrap();
        host.play_sound(h, true);
        host.set_sound_params(h, 0.5, 1.2);
        assert_eq!(host.sound_params("engine.wav"), Some((0.5, 1.2)));
        host.unload_sound(h);
        assert_eq!(host.live_sounds(), 0);
        assert_eq!(host.playing_count(), 0);
    }
}
