//! Boundary to the host application's session model.
//!
//! The host owns the scene/track matrix and the transport. The grid engine
//! only ever reaches it through [`Host`], and learns about changes through
//! [`Event`]s pushed onto the queue the host was handed in
//! [`Host::add_listeners`].

use crate::messages::IncomingMessage;
use serde::Serialize;
use tokio::sync::mpsc;

/// Handle to a host clip slot. Resolved against live host state on every use,
/// so a slot that disappears between trigger and stop is simply not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotRef {
    pub scene: usize,
    pub track: usize,
}

impl SlotRef {
    pub fn new(scene: usize, track: usize) -> Self {
        Self { scene, track }
    }
}

/// Playback state of a single clip slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotState {
    pub has_clip: bool,
    pub is_triggered: bool,
    pub is_playing: bool,
}

/// Everything the dispatch loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ScenesChanged,
    TracksChanged,
    SelectedSceneChanged,
    SongTimeChanged,
    RefreshTick,
    Grid(IncomingMessage),
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub trait Host {
    fn scene_count(&self) -> usize;
    /// Number of clip slots (tracks) in a scene, 0 if the scene does not exist.
    fn track_count(&self, scene: usize) -> usize;
    fn selected_scene(&self) -> Option<usize>;
    fn select_scene(&mut self, index: usize);
    /// `None` when the slot is outside the current matrix.
    fn slot_state(&self, slot: SlotRef) -> Option<SlotState>;

    fn fire_scene(&mut self, index: usize);
    fn fire_slot(&mut self, slot: SlotRef);
    fn stop_slot(&mut self, slot: SlotRef);

    fn start_playing(&mut self);
    fn stop_playing(&mut self);
    fn stop_all_clips(&mut self);
    fn is_playing(&self) -> bool;
    /// Sixteenth within the current beat, 1-based.
    fn sub_beat_tick(&self) -> i32;

    fn add_listeners(&mut self, events: EventSender);
    fn remove_listeners(&mut self);
}
