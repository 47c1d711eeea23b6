//! In-memory host session.
//!
//! Stands in for a live DAW: a scene/track matrix of clips with a quantized
//! launcher and a running song clock. The binary drives it with `advance` on
//! every refresh tick; tests inspect what the engine asked of it through
//! [`SessionHost::history`].

use crate::config::SessionConfig;
use crate::host::{Event, EventSender, Host, SlotRef, SlotState};
use std::time::Duration;
use tracing::{debug, info};

const SIXTEENTHS_PER_BEAT: f64 = 4.0;

/// A request the engine made of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    SelectScene(usize),
    FireScene(usize),
    FireSlot(SlotRef),
    StopSlot(SlotRef),
    StartPlaying,
    StopPlaying,
    StopAllClips,
}

#[derive(Debug, Clone)]
struct Clip {
    name: String,
    triggered: bool,
    playing: bool,
}

impl Clip {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggered: false,
            playing: false,
        }
    }

    fn stop(&mut self) {
        self.triggered = false;
        self.playing = false;
    }
}

#[derive(Debug, Clone)]
struct Scene {
    name: String,
    slots: Vec<Option<Clip>>,
}

pub struct SessionHost {
    scenes: Vec<Scene>,
    selected: usize,
    tempo: f64,
    launch_quantization: f64,
    select_next_on_launch: bool,
    playing: bool,
    song_time: f64,
    listeners: Option<EventSender>,
    history: Vec<HostCommand>,
}

impl SessionHost {
    pub fn from_config(config: &SessionConfig) -> Self {
        let scenes = config
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| Scene {
                name: scene
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Scene {}", index + 1)),
                slots: scene
                    .clips
                    .iter()
                    .map(|clip| clip.as_ref().map(Clip::new))
                    .collect(),
            })
            .collect();

        Self {
            scenes,
            selected: 0,
            tempo: config.tempo,
            launch_quantization: config.launch_quantization,
            select_next_on_launch: config.select_next_on_launch,
            playing: false,
            song_time: 0.0,
            listeners: None,
            history: Vec::new(),
        }
    }

    /// A set where every slot holds a clip. Launches on the next `advance`
    /// and keeps the selection where it is.
    pub fn uniform(scenes: usize, tracks: usize) -> Self {
        let mut host = Self::from_config(&SessionConfig {
            tempo: 120.0,
            launch_quantization: 0.0,
            select_next_on_launch: false,
            scenes: Vec::new(),
        });
        for scene in 0..scenes {
            let clips = (0..tracks)
                .map(|track| Some(format!("clip {}-{}", scene + 1, track + 1)))
                .collect();
            host.scenes.push(Scene {
                name: format!("Scene {}", scene + 1),
                slots: clips_from(clips),
            });
        }
        host
    }

    pub fn with_select_next_on_launch(mut self, enabled: bool) -> Self {
        self.select_next_on_launch = enabled;
        self
    }

    pub fn with_launch_quantization(mut self, beats: f64) -> Self {
        self.launch_quantization = beats;
        self
    }

    pub fn history(&self) -> &[HostCommand] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn has_listeners(&self) -> bool {
        self.listeners.is_some()
    }

    pub fn song_time(&self) -> f64 {
        self.song_time
    }

    pub fn scene_name(&self, index: usize) -> Option<&str> {
        self.scenes.get(index).map(|s| s.name.as_str())
    }

    pub fn clip_name(&self, slot: SlotRef) -> Option<&str> {
        self.clip(slot).map(|c| c.name.as_str())
    }

    pub fn add_scene(&mut self, name: impl Into<String>, clips: Vec<Option<String>>) {
        self.scenes.push(Scene {
            name: name.into(),
            slots: clips_from(clips),
        });
        info!("Scene added, {} scenes", self.scenes.len());
        self.notify(Event::ScenesChanged);
    }

    pub fn remove_scene(&mut self, index: usize) {
        if index >= self.scenes.len() {
            return;
        }
        self.scenes.remove(index);
        self.notify(Event::ScenesChanged);

        let last = self.scenes.len().saturating_sub(1);
        if self.selected > last {
            self.selected = last;
            self.notify(Event::SelectedSceneChanged);
        }
    }

    pub fn add_track(&mut self) {
        for scene in &mut self.scenes {
            scene.slots.push(None);
        }
        self.notify(Event::TracksChanged);
    }

    /// Load or clear a slot without launching anything.
    pub fn set_clip(&mut self, slot: SlotRef, name: Option<&str>) {
        if let Some(cell) = self
            .scenes
            .get_mut(slot.scene)
            .and_then(|scene| scene.slots.get_mut(slot.track))
        {
            *cell = name.map(Clip::new);
        }
    }

    /// Move the song clock forward. Triggered clips launch when a
    /// quantization boundary is crossed.
    pub fn advance(&mut self, elapsed: Duration) {
        if !self.playing {
            return;
        }
        let before = self.song_time;
        self.song_time += elapsed.as_secs_f64() * self.tempo / 60.0;

        if self.crossed_launch_boundary(before, self.song_time) {
            self.launch_triggered();
        }
        self.notify(Event::SongTimeChanged);
    }

    fn crossed_launch_boundary(&self, before: f64, after: f64) -> bool {
        if self.launch_quantization <= 0.0 {
            return true;
        }
        let q = self.launch_quantization;
        (after / q).floor() > (before / q).floor()
    }

    fn launch_triggered(&mut self) {
        let tracks = self.scenes.iter().map(|s| s.slots.len()).max().unwrap_or(0);
        for track in 0..tracks {
            let Some(launching) = self.scenes.iter().position(|scene| {
                matches!(scene.slots.get(track), Some(Some(clip)) if clip.triggered)
            }) else {
                continue;
            };

            for (index, scene) in self.scenes.iter_mut().enumerate() {
                if let Some(Some(clip)) = scene.slots.get_mut(track) {
                    if index == launching {
                        clip.triggered = false;
                        clip.playing = true;
                        debug!("Launched {} on track {}", clip.name, track);
                    } else {
                        clip.stop();
                    }
                }
            }
        }
    }

    fn start_transport(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        // Starting from stopped launches whatever is queued right away
        self.launch_triggered();
        self.notify(Event::SongTimeChanged);
    }

    fn trigger(&mut self, slot: SlotRef) {
        match self.clip_mut(slot) {
            Some(clip) => clip.triggered = true,
            None => self.stop_track(slot.track),
        }
    }

    fn stop_track(&mut self, track: usize) {
        for scene in &mut self.scenes {
            if let Some(Some(clip)) = scene.slots.get_mut(track) {
                clip.stop();
            }
        }
    }

    fn clips_mut(&mut self) -> impl Iterator<Item = &mut Clip> {
        self.scenes
            .iter_mut()
            .flat_map(|scene| scene.slots.iter_mut().flatten())
    }

    fn clip(&self, slot: SlotRef) -> Option<&Clip> {
        self.scenes
            .get(slot.scene)?
            .slots
            .get(slot.track)?
            .as_ref()
    }

    fn clip_mut(&mut self, slot: SlotRef) -> Option<&mut Clip> {
        self.scenes
            .get_mut(slot.scene)?
            .slots
            .get_mut(slot.track)?
            .as_mut()
    }

    fn notify(&self, event: Event) {
        if let Some(listeners) = &self.listeners {
            if listeners.send(event).is_err() {
                debug!("Host listener queue closed");
            }
        }
    }
}

fn clips_from(clips: Vec<Option<String>>) -> Vec<Option<Clip>> {
    clips.into_iter().map(|clip| clip.map(Clip::new)).collect()
}

impl Host for SessionHost {
    fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    fn track_count(&self, scene: usize) -> usize {
        self.scenes.get(scene).map_or(0, |s| s.slots.len())
    }

    fn selected_scene(&self) -> Option<usize> {
        if self.scenes.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    fn select_scene(&mut self, index: usize) {
        self.history.push(HostCommand::SelectScene(index));
        if index >= self.scenes.len() || index == self.selected {
            return;
        }
        self.selected = index;
        self.notify(Event::SelectedSceneChanged);
    }

    fn slot_state(&self, slot: SlotRef) -> Option<SlotState> {
        let cell = self.scenes.get(slot.scene)?.slots.get(slot.track)?;
        Some(match cell {
            Some(clip) => SlotState {
                has_clip: true,
                is_triggered: clip.triggered,
                is_playing: clip.playing,
            },
            None => SlotState::default(),
        })
    }

    fn fire_scene(&mut self, index: usize) {
        self.history.push(HostCommand::FireScene(index));
        let Some(tracks) = self.scenes.get(index).map(|s| s.slots.len()) else {
            return;
        };
        for track in 0..tracks {
            self.trigger(SlotRef::new(index, track));
        }
        self.start_transport();

        if self.select_next_on_launch && index + 1 < self.scenes.len() {
            self.selected = index + 1;
            self.notify(Event::SelectedSceneChanged);
        }
    }

    fn fire_slot(&mut self, slot: SlotRef) {
        self.history.push(HostCommand::FireSlot(slot));
        if slot.scene >= self.scenes.len() {
            return;
        }
        self.trigger(slot);
        self.start_transport();
    }

    fn stop_slot(&mut self, slot: SlotRef) {
        self.history.push(HostCommand::StopSlot(slot));
        if let Some(clip) = self.clip_mut(slot) {
            clip.stop();
        }
    }

    fn start_playing(&mut self) {
        self.history.push(HostCommand::StartPlaying);
        self.start_transport();
    }

    fn stop_playing(&mut self) {
        self.history.push(HostCommand::StopPlaying);
        if !self.playing {
            return;
        }
        self.playing = false;
        self.clips_mut().for_each(Clip::stop);
        self.notify(Event::SongTimeChanged);
    }

    fn stop_all_clips(&mut self) {
        self.history.push(HostCommand::StopAllClips);
        self.clips_mut().for_each(Clip::stop);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn sub_beat_tick(&self) -> i32 {
        (self.song_time.fract() * SIXTEENTHS_PER_BEAT).floor() as i32 + 1
    }

    fn add_listeners(&mut self, events: EventSender) {
        self.listeners = Some(events);
    }

    fn remove_listeners(&mut self) {
        self.listeners = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn state(host: &SessionHost, scene: usize, track: usize) -> SlotState {
        host.slot_state(SlotRef::new(scene, track)).unwrap()
    }

    #[test]
    fn test_from_config_builds_matrix() {
        let host = SessionHost::from_config(&SessionConfig::demo());
        assert_eq!(host.scene_count(), 6);
        assert_eq!(host.track_count(0), 4);
        assert_eq!(host.track_count(6), 0);
        assert_eq!(host.selected_scene(), Some(0));
        assert_eq!(host.scene_name(0), Some("Scene 1"));
        assert_eq!(host.clip_name(SlotRef::new(0, 0)), Some("clip 1-1"));
        assert!(!state(&host, 0, 2).has_clip);
        assert!(host.slot_state(SlotRef::new(0, 4)).is_none());
    }

    #[test]
    fn test_fire_slot_starts_transport_and_plays() {
        let mut host = SessionHost::uniform(2, 2).with_launch_quantization(4.0);
        host.fire_slot(SlotRef::new(0, 1));

        assert!(host.is_playing());
        // Transport started from stopped, so the clip launches immediately
        assert!(state(&host, 0, 1).is_playing);
        assert!(!state(&host, 0, 1).is_triggered);
    }

    #[test]
    fn test_quantized_launch_replaces_clip_in_track() {
        let mut host = SessionHost::uniform(2, 1).with_launch_quantization(1.0);
        host.fire_slot(SlotRef::new(0, 0));
        host.fire_slot(SlotRef::new(1, 0));

        assert!(state(&host, 1, 0).is_triggered);
        assert!(state(&host, 0, 0).is_playing);

        // 120 bpm: 250ms is half a beat, no boundary yet
        host.advance(Duration::from_millis(250));
        assert!(state(&host, 1, 0).is_triggered);

        host.advance(Duration::from_millis(300));
        assert!(state(&host, 1, 0).is_playing);
        assert!(!state(&host, 0, 0).is_playing);
    }

    #[test]
    fn test_firing_empty_slot_stops_track() {
        let mut host = SessionHost::uniform(2, 1);
        host.fire_slot(SlotRef::new(0, 0));
        host.set_clip(SlotRef::new(1, 0), None);
        host.fire_slot(SlotRef::new(1, 0));

        assert!(!state(&host, 0, 0).is_playing);
    }

    #[test]
    fn test_fire_scene_selects_next_when_enabled() {
        let mut host = SessionHost::uniform(3, 2).with_select_next_on_launch(true);
        host.fire_scene(0);

        assert_eq!(host.selected_scene(), Some(1));
        assert!(state(&host, 0, 0).is_playing);
        assert!(state(&host, 0, 1).is_playing);

        host.fire_scene(2);
        assert_eq!(host.selected_scene(), Some(1));
    }

    #[test]
    fn test_sub_beat_tick_counts_sixteenths() {
        let mut host = SessionHost::uniform(1, 1);
        host.start_playing();
        assert_eq!(host.sub_beat_tick(), 1);

        // 120 bpm: 125ms is one sixteenth
        host.advance(Duration::from_millis(130));
        assert_eq!(host.sub_beat_tick(), 2);
        host.advance(Duration::from_millis(250));
        assert_eq!(host.sub_beat_tick(), 4);
        host.advance(Duration::from_millis(125));
        assert_eq!(host.sub_beat_tick(), 1);
    }

    #[test]
    fn test_stop_playing_stops_clips() {
        let mut host = SessionHost::uniform(1, 2);
        host.fire_scene(0);
        host.stop_playing();

        assert!(!host.is_playing());
        assert!(!state(&host, 0, 0).is_playing);
        assert!(!state(&host, 0, 1).is_playing);
    }

    #[test]
    fn test_listeners_receive_structural_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = SessionHost::uniform(2, 1);

        host.add_scene("silent", vec![]);
        assert!(rx.try_recv().is_err());

        host.add_listeners(tx);
        host.add_scene("Scene 4", vec![Some("a".to_string())]);
        host.add_track();
        host.select_scene(3);
        host.remove_scene(3);

        assert_eq!(rx.try_recv().unwrap(), Event::ScenesChanged);
        assert_eq!(rx.try_recv().unwrap(), Event::TracksChanged);
        assert_eq!(rx.try_recv().unwrap(), Event::SelectedSceneChanged);
        assert_eq!(rx.try_recv().unwrap(), Event::ScenesChanged);
        assert_eq!(rx.try_recv().unwrap(), Event::SelectedSceneChanged);
        assert_eq!(host.selected_scene(), Some(2));

        host.remove_listeners();
        host.add_track();
        assert!(rx.try_recv().is_err());
    }
}
