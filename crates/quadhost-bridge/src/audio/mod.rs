//! Audio bridge: sound registry and playback slot pool.
//!
//! Sounds are registered from raw encoded bytes and decoded out of band by
//! the [`AudioBackend`]. Each sound is `Pending` until the backend reports
//! the decode, then `Ready` or `Failed`. Only `Ready` sounds can be heard;
//! a failed decode is logged and otherwise looks like a sound that never
//! finished loading.
//!
//! Every playback occupies one [`PlaybackSlot`]. Slots are never freed from
//! the pool: a stopped slot keeps its voice and is recycled by the next
//! `play` (first free slot wins).

mod backend;
mod headless;

pub use backend::{
    AudioBackend, AudioEvent, BufferId, PlaybackKey, SoundKey, StartParams, VoiceId,
};
pub use headless::HeadlessAudio;

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::error::{BridgeError, Result};

/// Load state of a registered sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundState {
    /// Decode still running
    Pending,
    /// Decoded and playable
    Ready(BufferId),
    /// Decoder rejected the payload
    Failed,
}

/// One reusable unit of playback resources.
#[derive(Debug, Clone)]
pub struct PlaybackSlot {
    sound: SoundKey,
    playback: PlaybackKey,
    voice: VoiceId,
}

impl PlaybackSlot {
    /// Whether the slot can be recycled.
    pub fn is_free(&self) -> bool {
        self.sound.0 == 0
    }

    /// Owning sound (0 when free).
    pub fn sound(&self) -> SoundKey {
        self.sound
    }

    /// Playback currently bound to the slot (0 when free).
    pub fn playback(&self) -> PlaybackKey {
        self.playback
    }
}

/// Sound registry and playback pool driving an [`AudioBackend`].
pub struct AudioBridge {
    backend: Box<dyn AudioBackend>,
    initialized: bool,
    sounds: HashMap<SoundKey, SoundState>,
    slots: Vec<PlaybackSlot>,
    next_sound: u32,
    next_playback: u32,
}

impl AudioBridge {
    /// Create a bridge over `backend`. No audio context exists until [`init`](Self::init).
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            initialized: false,
            sounds: HashMap::new(),
            slots: Vec::new(),
            next_sound: 1,
            next_playback: 1,
        }
    }

    /// Create the audio context. Later calls are no-ops.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.backend.init()?;
        self.initialized = true;
        debug!("audio context initialized");
        Ok(())
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Register encoded sound data. Returns before decoding completes.
    pub fn register_sound(&mut self, data: Vec<u8>) -> Result<SoundKey> {
        self.require_init()?;
        self.pump();

        let key = SoundKey(self.next_sound);
        self.next_sound = key
            .0
            .checked_add(1)
            .ok_or(BridgeError::KeysExhausted("sound"))?;
        self.sounds.insert(key, SoundState::Pending);
        debug!(sound = key.0, bytes = data.len(), "sound registered");
        self.backend.begin_decode(key, data);
        Ok(key)
    }

    /// Whether the sound has finished decoding successfully.
    pub fn is_ready(&mut self, sound: SoundKey) -> bool {
        self.pump();
        matches!(self.sounds.get(&sound), Some(SoundState::Ready(_)))
    }

    /// Load state of a sound, `None` if unknown or deleted.
    pub fn sound_state(&self, sound: SoundKey) -> Option<SoundState> {
        self.sounds.get(&sound).copied()
    }

    /// Start playing a sound and return the new playback key.
    pub fn play(&mut self, sound: SoundKey, volume: f32, looped: bool) -> Result<PlaybackKey> {
        self.require_init()?;
        self.pump();

        let playback = PlaybackKey(self.next_playback);
        self.next_playback = playback
            .0
            .checked_add(1)
            .ok_or(BridgeError::KeysExhausted("playback"))?;

        let idx = self.recycle_slot()?;
        let slot = &mut self.slots[idx];
        slot.sound = sound;
        slot.playback = playback;
        let voice = slot.voice;

        match self.sounds.get(&sound).copied() {
            Some(SoundState::Ready(buffer)) => {
                let params = StartParams {
                    volume,
                    looped,
                    token: playback,
                };
                if let Err(e) = self.backend.start(voice, buffer, params) {
                    error!(sound = sound.0, "Error starting sound: {}", e);
                }
                debug!(sound = sound.0, playback = playback.0, slot = idx, "playback started");
            }
            _ => {
                warn!(sound = sound.0, "sound is not loaded, playback {} is silent", playback.0);
                self.stop_slot(idx);
            }
        }

        Ok(playback)
    }

    /// Stop one playback.
    pub fn stop(&mut self, playback: PlaybackKey) {
        self.pump();
        if let Some(idx) = self.find_playback(playback) {
            self.stop_slot(idx);
        }
    }

    /// Change the volume of every playback of a sound.
    pub fn set_volume(&mut self, sound: SoundKey, volume: f32) {
        self.pump();
        if sound.0 == 0 {
            return;
        }
        for slot in self.slots.iter().filter(|s| s.sound == sound) {
            self.backend.set_gain(slot.voice, volume);
        }
    }

    /// Change the volume of one playback.
    pub fn set_playback_volume(&mut self, playback: PlaybackKey, volume: f32) {
        self.pump();
        if let Some(idx) = self.find_playback(playback) {
            self.backend.set_gain(self.slots[idx].voice, volume);
        }
    }

    /// Stop every playback of a sound.
    pub fn stop_all(&mut self, sound: SoundKey) {
        self.pump();
        if sound.0 == 0 {
            return;
        }
        for idx in 0..self.slots.len() {
            if self.slots[idx].sound == sound {
                self.stop_slot(idx);
            }
        }
    }

    /// Stop every playback of a sound and forget the sound.
    pub fn delete_sound(&mut self, sound: SoundKey) {
        self.stop_all(sound);
        if let Some(SoundState::Ready(buffer)) = self.sounds.remove(&sound) {
            self.backend.release_buffer(buffer);
        }
        debug!(sound = sound.0, "sound deleted");
    }

    /// Apply queued decode completions and end-of-playback notifications.
    pub fn pump(&mut self) {
        for event in self.backend.drain_events() {
            match event {
                AudioEvent::Decoded { sound, result } => self.complete_decode(sound, result),
                AudioEvent::Ended { token } => {
                    if let Some(idx) = self.find_playback(token) {
                        debug!(playback = token.0, "playback ended");
                        self.stop_slot(idx);
                    }
                }
            }
        }
    }

    /// All slots in the pool, free ones included.
    pub fn slots(&self) -> &[PlaybackSlot] {
        &self.slots
    }

    /// Number of slots currently playing.
    pub fn active_playbacks(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// Stop every playback and drop every sound.
    pub fn shutdown(&mut self) {
        for idx in 0..self.slots.len() {
            if !self.slots[idx].is_free() {
                self.stop_slot(idx);
            }
        }
        for (_, state) in self.sounds.drain() {
            if let SoundState::Ready(buffer) = state {
                self.backend.release_buffer(buffer);
            }
        }
    }

    fn complete_decode(&mut self, sound: SoundKey, result: std::result::Result<BufferId, String>) {
        match (self.sounds.get_mut(&sound), result) {
            (Some(state @ SoundState::Pending), Ok(buffer)) => {
                *state = SoundState::Ready(buffer);
                debug!(sound = sound.0, "sound decoded");
            }
            (Some(state @ SoundState::Pending), Err(e)) => {
                *state = SoundState::Failed;
                error!(sound = sound.0, "Failed to decode audio buffer: {}", e);
            }
            // deleted while decoding
            (_, Ok(buffer)) => self.backend.release_buffer(buffer),
            (_, Err(_)) => {}
        }
    }

    fn recycle_slot(&mut self) -> Result<usize> {
        if let Some(idx) = self.slots.iter().position(PlaybackSlot::is_free) {
            return Ok(idx);
        }
        let voice = self.backend.create_voice()?;
        self.slots.push(PlaybackSlot {
            sound: SoundKey(0),
            playback: PlaybackKey(0),
            voice,
        });
        Ok(self.slots.len() - 1)
    }

    fn find_playback(&self, playback: PlaybackKey) -> Option<usize> {
        if playback.0 == 0 {
            return None;
        }
        self.slots.iter().position(|s| s.playback == playback)
    }

    fn stop_slot(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        if let Err(e) = self.backend.disconnect(slot.voice) {
            error!(playback = slot.playback.0, "Error stopping sound: {}", e);
        }
        slot.sound = SoundKey(0);
        slot.playback = PlaybackKey(0);
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(BridgeError::AudioNotInitialized)
        }
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AudioBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBridge")
            .field("initialized", &self.initialized)
            .field("sounds", &self.sounds.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> (AudioBridge, HeadlessAudio) {
        let audio = HeadlessAudio::new();
        let mut bridge = AudioBridge::new(Box::new(audio.clone()));
        bridge.init().unwrap();
        (bridge, audio)
    }

    fn ready_sound(bridge: &mut AudioBridge) -> SoundKey {
        let sound = bridge.register_sound(vec![1, 2, 3]).unwrap();
        assert!(bridge.is_ready(sound));
        sound
    }

    #[test]
    fn test_calls_before_init_fail() {
        let mut bridge = AudioBridge::new(Box::new(HeadlessAudio::new()));
        assert!(matches!(
            bridge.register_sound(vec![1]),
            Err(BridgeError::AudioNotInitialized)
        ));
        assert!(matches!(
            bridge.play(SoundKey(1), 1.0, false),
            Err(BridgeError::AudioNotInitialized)
        ));
    }

    #[test]
    fn test_init_is_idempotent() {
        let (mut bridge, audio) = bridge();
        bridge.init().unwrap();
        assert!(audio.is_initialized());
        assert!(bridge.is_initialized());
    }

    #[test]
    fn test_not_ready_until_decoded() {
        let (mut bridge, audio) = bridge();
        audio.hold_decodes(true);

        let sound = bridge.register_sound(vec![0u8; 16]).unwrap();
        assert!(!bridge.is_ready(sound));
        assert_eq!(bridge.sound_state(sound), Some(SoundState::Pending));

        audio.complete_decodes();
        assert!(bridge.is_ready(sound));
    }

    #[test]
    fn test_failed_decode_never_ready() {
        let (mut bridge, _audio) = bridge();
        let sound = bridge.register_sound(Vec::new()).unwrap();

        assert!(!bridge.is_ready(sound));
        assert_eq!(bridge.sound_state(sound), Some(SoundState::Failed));
    }

    #[test]
    fn test_keys_are_monotonic_and_independent() {
        let (mut bridge, _audio) = bridge();
        let a = ready_sound(&mut bridge);
        let b = ready_sound(&mut bridge);
        assert_eq!((a, b), (SoundKey(1), SoundKey(2)));

        let p1 = bridge.play(a, 1.0, false).unwrap();
        let p2 = bridge.play(b, 1.0, false).unwrap();
        assert_eq!((p1, p2), (PlaybackKey(1), PlaybackKey(2)));
    }

    #[test]
    fn test_concurrent_plays_use_distinct_slots() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);

        for _ in 0..3 {
            bridge.play(sound, 0.5, false).unwrap();
        }
        assert_eq!(bridge.slots().len(), 3);
        assert_eq!(bridge.active_playbacks(), 3);
        assert_eq!(audio.playing_count(), 3);
    }

    #[test]
    fn test_stopped_slot_is_recycled() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);

        let first = bridge.play(sound, 1.0, false).unwrap();
        bridge.play(sound, 1.0, false).unwrap();
        bridge.stop(first);
        assert_eq!(bridge.active_playbacks(), 1);

        let third = bridge.play(sound, 1.0, false).unwrap();
        assert_eq!(bridge.slots().len(), 2);
        assert_eq!(audio.voices_created(), 2);
        assert_eq!(bridge.slots()[0].playback(), third);
    }

    #[test]
    fn test_natural_end_frees_slot() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        let playback = bridge.play(sound, 1.0, false).unwrap();

        assert!(audio.finish(playback));
        bridge.pump();
        assert_eq!(bridge.active_playbacks(), 0);
        assert!(bridge.slots()[0].is_free());
    }

    #[test]
    fn test_end_frees_only_its_own_slot() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        let first = bridge.play(sound, 1.0, false).unwrap();
        let second = bridge.play(sound, 1.0, false).unwrap();

        assert!(audio.finish(first));
        bridge.pump();
        assert!(bridge.slots()[0].is_free());
        assert_eq!(bridge.slots()[1].playback(), second);
        // already finished
        assert!(!audio.finish(first));
    }

    #[test]
    fn test_volume_by_sound_and_by_playback() {
        let (mut bridge, audio) = bridge();
        let a = ready_sound(&mut bridge);
        let b = ready_sound(&mut bridge);
        let pa1 = bridge.play(a, 1.0, true).unwrap();
        let pa2 = bridge.play(a, 1.0, true).unwrap();
        let pb = bridge.play(b, 1.0, true).unwrap();

        bridge.set_volume(a, 0.25);
        assert_eq!(audio.gain_of(pa1), Some(0.25));
        assert_eq!(audio.gain_of(pa2), Some(0.25));
        assert_eq!(audio.gain_of(pb), Some(1.0));

        bridge.set_playback_volume(pb, 0.75);
        assert_eq!(audio.gain_of(pb), Some(0.75));
    }

    #[test]
    fn test_stop_all_then_delete() {
        let (mut bridge, audio) = bridge();
        let a = ready_sound(&mut bridge);
        let b = ready_sound(&mut bridge);
        bridge.play(a, 1.0, false).unwrap();
        bridge.play(b, 1.0, false).unwrap();
        bridge.play(a, 1.0, false).unwrap();

        bridge.stop_all(a);
        bridge.delete_sound(a);

        assert!(bridge.slots().iter().all(|s| s.sound() != a));
        assert_eq!(bridge.active_playbacks(), 1);
        assert_eq!(bridge.sound_state(a), None);
        assert!(!bridge.is_ready(a));
        assert_eq!(audio.buffer_count(), 1);
    }

    #[test]
    fn test_delete_while_pending_drops_late_decode() {
        let (mut bridge, audio) = bridge();
        audio.hold_decodes(true);
        let sound = bridge.register_sound(vec![1, 2]).unwrap();
        bridge.delete_sound(sound);

        audio.complete_decodes();
        assert!(!bridge.is_ready(sound));
        assert_eq!(audio.buffer_count(), 0);
    }

    #[test]
    fn test_disconnect_failure_still_frees_slot() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        let playback = bridge.play(sound, 1.0, false).unwrap();

        audio.fail_disconnects(true);
        bridge.stop(playback);
        assert!(bridge.slots()[0].is_free());
    }

    #[test]
    fn test_play_unloaded_sound_is_silent() {
        let (mut bridge, audio) = bridge();
        audio.hold_decodes(true);
        let sound = bridge.register_sound(vec![1]).unwrap();

        let playback = bridge.play(sound, 1.0, false).unwrap();
        assert_eq!(playback, PlaybackKey(1));
        assert_eq!(bridge.active_playbacks(), 0);
        assert_eq!(audio.playing_count(), 0);
    }

    #[test]
    fn test_zero_keys_are_ignored() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        let playback = bridge.play(sound, 1.0, false).unwrap();
        bridge.stop(playback);

        // free slots carry sound 0 and must not be touched
        audio.fail_disconnects(true);
        bridge.stop_all(SoundKey(0));
        bridge.stop(PlaybackKey(0));
        assert_eq!(bridge.slots().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        bridge.play(sound, 1.0, true).unwrap();
        bridge.play(sound, 1.0, true).unwrap();

        bridge.shutdown();
        assert_eq!(audio.playing_count(), 0);
        assert_eq!(audio.buffer_count(), 0);
        assert_eq!(bridge.active_playbacks(), 0);
    }

    #[test]
    fn test_sound_keys_exhausted() {
        let (mut bridge, audio) = bridge();
        bridge.next_sound = u32::MAX - 1;
        let last = bridge.register_sound(vec![1]).unwrap();
        assert_eq!(last, SoundKey(u32::MAX - 1));

        assert!(matches!(
            bridge.register_sound(vec![2]),
            Err(BridgeError::KeysExhausted("sound"))
        ));
        // nothing was registered or decoded for the failed call
        assert!(bridge.sound_state(SoundKey(u32::MAX)).is_none());
        assert_eq!(audio.buffer_count(), 1);
    }

    #[test]
    fn test_playback_keys_exhausted() {
        let (mut bridge, audio) = bridge();
        let sound = ready_sound(&mut bridge);
        bridge.next_playback = u32::MAX - 1;
        bridge.play(sound, 1.0, true).unwrap();

        assert!(matches!(
            bridge.play(sound, 1.0, true),
            Err(BridgeError::KeysExhausted("playback"))
        ));
        assert_eq!(bridge.slots().len(), 1);
        assert_eq!(audio.playing_count(), 1);
    }
}
