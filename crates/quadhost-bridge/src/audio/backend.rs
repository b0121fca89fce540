//! Audio backend abstraction.
//!
//! The bridge never talks to an audio device itself. It drives an
//! [`AudioBackend`], which owns the audio context, decoded buffers and
//! voices (a buffer source routed through a gain stage). Asynchronous work
//! (decode completion, natural end of playback) is reported back as
//! [`AudioEvent`]s that the bridge drains cooperatively.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Key of a registered sound (0 = none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundKey(pub u32);

/// Key of a single playback (0 = none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaybackKey(pub u32);

/// Backend-owned decoded audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Backend-owned voice: buffer source plus gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Parameters for starting a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartParams {
    /// Linear gain
    pub volume: f32,
    /// Restart at end of buffer
    pub looped: bool,
    /// Echoed back in [`AudioEvent::Ended`]
    pub token: PlaybackKey,
}

/// Completion notification from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Decoding of a registered sound finished
    Decoded {
        /// Sound the decode was started for
        sound: SoundKey,
        /// Decoded buffer, or the decoder's error message
        result: std::result::Result<BufferId, String>,
    },
    /// A non-looping voice reached the end of its buffer
    Ended {
        /// Token passed in [`StartParams`]
        token: PlaybackKey,
    },
}

/// Host audio subsystem driven by the bridge.
pub trait AudioBackend: Send {
    /// Create the audio context. Called once by the bridge.
    fn init(&mut self) -> Result<()>;

    /// Start decoding `data`; completion arrives as [`AudioEvent::Decoded`].
    fn begin_decode(&mut self, sound: SoundKey, data: Vec<u8>);

    /// Create a voice (source + gain) for a new playback slot.
    fn create_voice(&mut self) -> Result<VoiceId>;

    /// Bind a fresh source for `buffer` to the voice and start it.
    fn start(&mut self, voice: VoiceId, buffer: BufferId, params: StartParams) -> Result<()>;

    /// Change the gain of a voice.
    fn set_gain(&mut self, voice: VoiceId, volume: f32);

    /// Stop the voice's source and disconnect it from the output.
    fn disconnect(&mut self, voice: VoiceId) -> Result<()>;

    /// Free a decoded buffer.
    fn release_buffer(&mut self, buffer: BufferId);

    /// Take all pending completion events.
    fn drain_events(&mut self) -> Vec<AudioEvent>;
}
