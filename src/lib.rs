//! ATB Engine - frame-stepped active-time battles with event scripting
//!
//! A headless battle core: a scene state machine that advances one frame at a time,
//! composed with a cooperative event interpreter running troop pages and common
//! events. Rendering, audio, input, and asset loading are supplied by the host
//! through the traits in `platform`.

pub mod battle;
pub mod core;
pub mod data;
pub mod event;
pub mod interpreter;
pub mod platform;
