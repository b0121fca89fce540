//! The bridge context.
//!
//! A [`Bridge`] owns everything the bridge functions share for one guest:
//! the object table, the audio bridge and the page location. It is created
//! before the guest is instantiated and lives in the wasm store, so two
//! guests never share handles, sounds or history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{AudioBackend, AudioBridge, HeadlessAudio};
use crate::error::Result;
use crate::marshal;
use crate::objects::{Handle, ObjectTable};
use crate::page::PageBridge;

/// Bridge behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Location the page starts at
    pub initial_url: String,

    /// Make `js_have_field` return true when the field is *absent*,
    /// for guests built against that older behaviour
    pub inverted_have_field: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_url: "http://localhost/".to_string(),
            inverted_have_field: false,
        }
    }
}

impl BridgeConfig {
    /// Builder: set the initial page URL
    pub fn initial_url(mut self, url: impl Into<String>) -> Self {
        self.initial_url = url.into();
        self
    }

    /// Builder: select the inverted `js_have_field` sense
    pub fn inverted_have_field(mut self, inverted: bool) -> Self {
        self.inverted_have_field = inverted;
        self
    }
}

/// Per-guest bridge state.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    objects: ObjectTable,
    audio: AudioBridge,
    page: PageBridge,
}

impl Bridge {
    /// Create a bridge with its own tables, driving `audio` for playback.
    pub fn new(config: BridgeConfig, audio: Box<dyn AudioBackend>) -> Result<Self> {
        let page = PageBridge::new(&config.initial_url)?;
        debug!(url = config.initial_url.as_str(), "bridge created");
        Ok(Self {
            config,
            objects: ObjectTable::new(),
            audio: AudioBridge::new(audio),
            page,
        })
    }

    /// Create a bridge backed by [`HeadlessAudio`].
    pub fn headless(config: BridgeConfig) -> Result<Self> {
        Self::new(config, Box::new(HeadlessAudio::new()))
    }

    /// Bridge settings.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Object table.
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Mutable object table.
    pub fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    /// Audio bridge.
    pub fn audio(&self) -> &AudioBridge {
        &self.audio
    }

    /// Mutable audio bridge.
    pub fn audio_mut(&mut self) -> &mut AudioBridge {
        &mut self.audio
    }

    /// Page location.
    pub fn page(&self) -> &PageBridge {
        &self.page
    }

    /// Mutable page location.
    pub fn page_mut(&mut self) -> &mut PageBridge {
        &mut self.page
    }

    /// Decode guest text and register it as a string value.
    pub fn create_text_from(&mut self, mem: &[u8], offset: u32, max_len: u32) -> Result<Handle> {
        let text = marshal::decode_text(mem, offset, max_len)?;
        self.objects.create(text)
    }

    /// Copy guest bytes into an owned buffer and register it.
    pub fn clone_bytes_from(&mut self, mem: &[u8], offset: u32, len: u32) -> Result<Handle> {
        let bytes = marshal::clone_bytes_from(mem, offset, len)?;
        self.objects.create(bytes)
    }

    /// Register UTF-16 text from the embedder (for example a JavaScript
    /// string handed over by a page shim). Unpaired surrogates become U+FFFD.
    pub fn create_text_from_utf16(&mut self, units: &[u16]) -> Result<Handle> {
        self.objects.create(marshal::string_from_utf16(units))
    }

    /// UTF-16 code units of the string behind `handle`.
    pub fn text_as_utf16(&self, handle: Handle) -> Result<Vec<u16>> {
        Ok(marshal::string_to_utf16(self.objects.get_str(handle)?))
    }

    /// Field presence as reported to the guest, honouring
    /// [`BridgeConfig::inverted_have_field`].
    pub fn have_field(&self, handle: Handle, field: &str) -> Result<bool> {
        let present = self.objects.has_field(handle, field)?;
        Ok(present != self.config.inverted_have_field)
    }

    /// Apply pending audio completions.
    pub fn pump(&mut self) {
        self.audio.pump();
    }

    /// Stop all audio and release every object.
    pub fn shutdown(&mut self) {
        self.audio.shutdown();
        self.objects.clear();
        debug!("bridge shut down");
    }
}
