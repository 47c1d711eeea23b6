use crate::buttons::{ButtonAction, ButtonOutcome, ButtonRegistry};
use crate::config::GridConfig;
use crate::host::{Event, EventSender, Host, SlotRef};
use crate::link::{GridLink, LinkStats, PollResult};
use crate::messages::{GridPress, IncomingMessage, OutgoingMessage};
use crate::scroll::ScrollWindow;
use crate::slots::{PlayingClips, SlotMatrix};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

// Bounds the inbound drain so a flood of presses cannot stall a refresh
const MAX_POLLS_PER_TICK: usize = 64;

// Sub-beat position that lights the beat indicator
const BEAT_TICK: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Uninitialized,
    Active,
    Disconnected,
}

/// Point-in-time view of the grid for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub lifecycle: Lifecycle,
    pub width: u8,
    pub height: u8,
    pub scene_offset: usize,
    pub scene_count: usize,
    pub is_playing: bool,
    /// Lit clip cells, one bitmask per clip row.
    pub rows: Vec<u32>,
    pub playing_clips: Vec<Option<SlotRef>>,
    pub link: LinkStats,
    pub captured_at: DateTime<Utc>,
}

/// Clip launcher for a monome-style grid.
///
/// Owns every piece of grid state and is the single consumer of [`Event`]s.
/// Nothing here blocks or panics on bad input; the worst case is a no-op
/// until the next refresh.
pub struct MonomeMatrix<H: Host, L: GridLink> {
    config: GridConfig,
    host: H,
    link: L,
    events: EventSender,
    lifecycle: Lifecycle,
    buttons: ButtonRegistry,
    window: ScrollWindow,
    slots: SlotMatrix,
    playing_clips: PlayingClips,
    last_sub_beat: i32,
}

impl<H: Host, L: GridLink> MonomeMatrix<H, L> {
    pub fn new(config: GridConfig, host: H, link: L, events: EventSender) -> Self {
        let slots = SlotMatrix::new(config.clip_columns(), config.clip_rows());
        let playing_clips = PlayingClips::new(config.clip_columns());

        Self {
            config,
            host,
            link,
            events,
            lifecycle: Lifecycle::Uninitialized,
            buttons: ButtonRegistry::new(),
            window: ScrollWindow::default(),
            slots,
            playing_clips,
            last_sub_beat: 0,
        }
    }

    pub fn activate(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Uninitialized {
            bail!("cannot activate from {:?}", self.lifecycle);
        }
        info!("MonomeMatrix - Initializing");

        self.buttons = ButtonRegistry::with_default_layout(&self.config);
        self.link.open()?;
        self.link
            .send(&OutgoingMessage::SysPrefix(self.config.prefix.clone()));
        self.host.add_listeners(self.events.clone());

        self.window = ScrollWindow::from_host(&self.host);
        self.slots.rebuild(&self.window, &self.host);

        for x in 0..self.config.width {
            self.link.send(&OutgoingMessage::LedCol { x, mask: 0 });
        }

        self.lifecycle = Lifecycle::Active;
        info!(
            "Grid {}x{} active on {}, {} scenes",
            self.config.width,
            self.config.height,
            self.config.prefix,
            self.window.total()
        );
        Ok(())
    }

    /// Terminal. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if self.lifecycle == Lifecycle::Disconnected {
            return;
        }
        self.link.shutdown();
        self.host.remove_listeners();
        self.lifecycle = Lifecycle::Disconnected;
        info!("MonomeMatrix disconnected");
    }

    pub fn handle(&mut self, event: Event) {
        if self.lifecycle != Lifecycle::Active {
            debug!("Ignoring {:?} while {:?}", event, self.lifecycle);
            return;
        }

        match event {
            Event::ScenesChanged => {
                self.window.on_scene_count_changed(&self.host);
                self.slots.rebuild(&self.window, &self.host);
            }
            Event::TracksChanged => self.slots.rebuild(&self.window, &self.host),
            Event::SelectedSceneChanged => self.window.on_host_selection_changed(&self.host),
            Event::SongTimeChanged => self.update_beat_indicator(),
            Event::RefreshTick => self.render(),
            Event::Grid(IncomingMessage::Press(press)) => self.handle_press(press),
        }
    }

    fn render(&mut self) {
        self.slots.rebuild(&self.window, &self.host);

        for y in 0..self.slots.rows() {
            let mask = self.slots.row_mask(y, &self.host);
            self.link.send(&OutgoingMessage::LedRow { y: y as u8, mask });
        }

        self.update_beat_indicator();
        self.poll_link();
    }

    fn update_beat_indicator(&mut self) {
        let (x, y) = self.config.indicator();
        if !self.host.is_playing() {
            self.link.send(&OutgoingMessage::Led { x, y, on: false });
            return;
        }

        let tick = self.host.sub_beat_tick();
        if tick == self.last_sub_beat {
            return;
        }
        self.link.send(&OutgoingMessage::Led {
            x,
            y,
            on: tick == BEAT_TICK,
        });
        self.last_sub_beat = tick;
    }

    fn poll_link(&mut self) {
        for _ in 0..MAX_POLLS_PER_TICK {
            match self.link.poll() {
                PollResult::Empty => return,
                PollResult::Delivered(IncomingMessage::Press(press)) => self.handle_press(press),
                PollResult::Error(e) if e.is_transport() => {
                    debug!("Grid link poll failed, skipping this tick: {}", e);
                    return;
                }
                PollResult::Error(e) => warn!("Discarding grid message: {}", e),
            }
        }
    }

    fn handle_press(&mut self, press: GridPress) {
        let outcome = self.buttons.dispatch(press);
        if let Some(led) = outcome.led() {
            self.link.send(&led);
        }
        if let ButtonOutcome::Pressed { action, .. } = outcome {
            self.run_action(action);
            return;
        }

        let (x, y) = (press.x as usize, press.y as usize);
        let in_clip_columns = x < self.config.clip_columns();
        let in_clip_rows = y < self.config.clip_rows();

        if in_clip_columns && in_clip_rows && press.is_press() {
            self.slots
                .press(x, y, &mut self.host, &mut self.playing_clips);
        }

        if x == self.config.scene_column() && in_clip_rows && press.is_release() {
            self.fire_scene_row(y);
        }

        if in_clip_columns && y == self.config.stop_row() && press.is_release() {
            self.stop_column(x);
        }
    }

    fn run_action(&mut self, action: ButtonAction) {
        debug!("Button {:?}", action);
        match action {
            ButtonAction::ScrollUp => {
                self.window.scroll_up(&mut self.host);
            }
            ButtonAction::ScrollDown => {
                self.window.scroll_down(&mut self.host);
            }
            ButtonAction::Play => self.host.start_playing(),
            ButtonAction::Stop => self.host.stop_playing(),
            ButtonAction::StopAll => self.host.stop_all_clips(),
        }
    }

    fn fire_scene_row(&mut self, row: usize) {
        let old_offset = self.window.offset();
        let index = self.window.scene_at(row);
        if index >= self.host.scene_count() {
            return;
        }
        self.host.fire_scene(index);
        // Launching may move the host selection; keep the grid where it was
        self.host.select_scene(old_offset);
    }

    fn stop_column(&mut self, x: usize) {
        let Some(slot) = self.playing_clips.take(x) else {
            return;
        };
        if self.host.slot_state(slot).is_some() {
            self.host.stop_slot(slot);
        } else {
            debug!("Slot {:?} no longer exists, nothing to stop", slot);
        }
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            lifecycle: self.lifecycle,
            width: self.config.width,
            height: self.config.height,
            scene_offset: self.window.offset(),
            scene_count: self.window.total(),
            is_playing: self.host.is_playing(),
            rows: (0..self.slots.rows())
                .map(|y| self.slots.row_mask(y, &self.host))
                .collect(),
            playing_clips: self.playing_clips.as_slice().to_vec(),
            link: self.link.stats(),
            captured_at: Utc::now(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn window(&self) -> &ScrollWindow {
        &self.window
    }

    pub fn slots(&self) -> &SlotMatrix {
        &self.slots
    }

    pub fn playing_clips(&self) -> &PlayingClips {
        &self.playing_clips
    }

    pub fn buttons(&self) -> &ButtonRegistry {
        &self.buttons
    }
}
