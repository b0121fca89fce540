//! Headless audio backend.
//!
//! Produces no sound. Any non-empty payload "decodes" successfully and a
//! voice plays until it is disconnected or [`HeadlessAudio::finish`] is
//! called. Clones share state, so a caller can keep one clone as a control
//! handle after boxing another into the bridge.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{
    AudioBackend, AudioEvent, BufferId, PlaybackKey, SoundKey, StartParams, VoiceId,
};
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct Voice {
    playing: Option<(BufferId, StartParams)>,
    gain: f32,
}

#[derive(Debug, Default)]
struct State {
    initialized: bool,
    hold_decodes: bool,
    fail_disconnects: bool,
    next_buffer: u64,
    next_voice: u64,
    buffers: HashMap<BufferId, usize>,
    voices: HashMap<VoiceId, Voice>,
    held: Vec<(SoundKey, Vec<u8>)>,
    events: VecDeque<AudioEvent>,
}

impl State {
    fn decode(&mut self, sound: SoundKey, data: Vec<u8>) {
        let result = if data.is_empty() {
            Err("empty audio payload".to_string())
        } else {
            self.next_buffer += 1;
            let id = BufferId(self.next_buffer);
            self.buffers.insert(id, data.len());
            Ok(id)
        };
        self.events.push_back(AudioEvent::Decoded { sound, result });
    }
}

/// Audio backend that tracks state without an output device.
#[derive(Debug, Clone, Default)]
pub struct HeadlessAudio {
    state: Arc<Mutex<State>>,
}

impl HeadlessAudio {
    /// Create a backend that completes decodes on the next drain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep decodes pending until [`complete_decodes`](Self::complete_decodes).
    pub fn hold_decodes(&self, hold: bool) {
        self.state.lock().hold_decodes = hold;
    }

    /// Finish every held decode.
    pub fn complete_decodes(&self) {
        let mut state = self.state.lock();
        let held = std::mem::take(&mut state.held);
        for (sound, data) in held {
            state.decode(sound, data);
        }
    }

    /// Make every following `disconnect` fail.
    pub fn fail_disconnects(&self, fail: bool) {
        self.state.lock().fail_disconnects = fail;
    }

    /// Simulate the natural end of the playback started with `token`.
    ///
    /// Returns false if no voice is playing it.
    pub fn finish(&self, token: PlaybackKey) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let found = state
            .voices
            .values_mut()
            .find(|v| matches!(v.playing, Some((_, p)) if p.token == token));
        match found {
            Some(voice) => {
                voice.playing = None;
                state.events.push_back(AudioEvent::Ended { token });
                true
            }
            None => false,
        }
    }

    /// Whether the audio context was created.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Number of voices ever created.
    pub fn voices_created(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Number of voices currently playing.
    pub fn playing_count(&self) -> usize {
        self.state
            .lock()
            .voices
            .values()
            .filter(|v| v.playing.is_some())
            .count()
    }

    /// Gain of the voice playing `token`.
    pub fn gain_of(&self, token: PlaybackKey) -> Option<f32> {
        self.state
            .lock()
            .voices
            .values()
            .find(|v| matches!(v.playing, Some((_, p)) if p.token == token))
            .map(|v| v.gain)
    }

    /// Number of decoded buffers still held.
    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }
}

impl AudioBackend for HeadlessAudio {
    fn init(&mut self) -> Result<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn begin_decode(&mut self, sound: SoundKey, data: Vec<u8>) {
        let mut state = self.state.lock();
        if state.hold_decodes {
            state.held.push((sound, data));
        } else {
            state.decode(sound, data);
        }
    }

    fn create_voice(&mut self) -> Result<VoiceId> {
        let mut state = self.state.lock();
        state.next_voice += 1;
        let id = VoiceId(state.next_voice);
        state.voices.insert(id, Voice::default());
        Ok(id)
    }

    fn start(&mut self, voice: VoiceId, buffer: BufferId, params: StartParams) -> Result<()> {
        let mut state = self.state.lock();
        if !state.buffers.contains_key(&buffer) {
            return Err(BridgeError::AudioBackend(format!("unknown buffer {}", buffer.0)));
        }
        let v = state
            .voices
            .get_mut(&voice)
            .ok_or_else(|| BridgeError::AudioBackend(format!("unknown voice {}", voice.0)))?;
        v.gain = params.volume;
        v.playing = Some((buffer, params));
        Ok(())
    }

    fn set_gain(&mut self, voice: VoiceId, volume: f32) {
        if let Some(v) = self.state.lock().voices.get_mut(&voice) {
            v.gain = volume;
        }
    }

    fn disconnect(&mut self, voice: VoiceId) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_disconnects {
            return Err(BridgeError::AudioBackend("disconnect failed".to_string()));
        }
        if let Some(v) = state.voices.get_mut(&voice) {
            v.playing = None;
        }
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn drain_events(&mut self) -> Vec<AudioEvent> {
        self.state.lock().events.drain(..).collect()
    }
}
