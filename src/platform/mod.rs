//! Collaborators the battle core talks to
//!
//! The core only plays sound effects, requests assets, and polls input.
//! Everything behind these traits lives outside the crate.

use std::cell::Cell;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::data::SoundEffect;

/// Fire-and-forget sound playback
pub trait AudioSink {
    fn play_se(&mut self, se: &SoundEffect);
}

/// Kind of asset a script or scene can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Picture,
    Battler,
    Backdrop,
    System,
}

/// Opaque handle for an outstanding asset request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRequest(pub u32);

/// Asynchronous asset loading
///
/// `request` starts (or reuses) a load; the caller polls `is_ready` once per frame and
/// runs its bound continuation on the first frame it reports true.
pub trait AssetLoader {
    fn request(&mut self, kind: AssetKind, name: &str) -> AssetRequest;
    fn is_ready(&self, request: AssetRequest) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Decision,
    Cancel,
    Shift,
    Up,
    Down,
    Left,
    Right,
    DebugMenu,
}

/// Polled input, never blocking
pub trait InputSource {
    /// Pressed this frame but not the previous one
    fn is_triggered(&self, button: Button) -> bool;
    /// Held down this frame
    fn is_pressed(&self, button: Button) -> bool;
}

/// Input snapshot for one frame
#[derive(Debug, Clone, Default)]
pub struct InputState {
    triggered: AHashSet<Button>,
    pressed: AHashSet<Button>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press a button this frame (edge and level)
    pub fn press(&mut self, button: Button) {
        self.triggered.insert(button);
        self.pressed.insert(button);
    }

    /// Keep a button held without a new edge
    pub fn hold(&mut self, button: Button) {
        self.pressed.insert(button);
    }

    /// Advance to the next frame: edges expire, held buttons stay held
    pub fn next_frame(&mut self) {
        self.triggered.clear();
    }

    pub fn release_all(&mut self) {
        self.triggered.clear();
        self.pressed.clear();
    }
}

impl InputSource for InputState {
    fn is_triggered(&self, button: Button) -> bool {
        self.triggered.contains(&button)
    }

    fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }
}

/// Audio sink that records what was played
#[derive(Debug, Clone, Default)]
pub struct SoundLog {
    pub played: Vec<SoundEffect>,
}

impl SoundLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.played.iter().filter(|se| se.name == name).count()
    }
}

impl AudioSink for SoundLog {
    fn play_se(&mut self, se: &SoundEffect) {
        tracing::trace!("play se {}", se.name);
        self.played.push(se.clone());
    }
}

/// Loader whose assets are always resident
#[derive(Debug, Clone, Default)]
pub struct InstantAssets {
    next_id: u32,
}

impl AssetLoader for InstantAssets {
    fn request(&mut self, _kind: AssetKind, _name: &str) -> AssetRequest {
        self.next_id += 1;
        AssetRequest(self.next_id)
    }

    fn is_ready(&self, _request: AssetRequest) -> bool {
        true
    }
}

/// Loader that only finishes a request after a fixed number of readiness polls
#[derive(Debug, Clone)]
pub struct DeferredAssets {
    latency: u32,
    next_id: u32,
    pending: Vec<(AssetRequest, Cell<u32>)>,
}

impl DeferredAssets {
    pub fn new(latency: u32) -> Self {
        Self {
            latency,
            next_id: 0,
            pending: Vec::new(),
        }
    }
}

impl AssetLoader for DeferredAssets {
    fn request(&mut self, _kind: AssetKind, _name: &str) -> AssetRequest {
        self.next_id += 1;
        let request = AssetRequest(self.next_id);
        self.pending.push((request, Cell::new(self.latency)));
        request
    }

    fn is_ready(&self, request: AssetRequest) -> bool {
        match self.pending.iter().find(|(r, _)| *r == request) {
            Some((_, remaining)) => {
                let left = remaining.get();
                if left == 0 {
                    true
                } else {
                    remaining.set(left - 1);
                    false
                }
            }
            None => true,
        }
    }
}
