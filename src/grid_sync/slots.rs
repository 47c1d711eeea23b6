use crate::host::{Host, SlotRef, SlotState};
use crate::scroll::ScrollWindow;
use tracing::debug;

/// One cell of the clip area, mapped onto whichever host slot currently sits
/// under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotProxy {
    pub x: usize,
    pub y: usize,
    slot: Option<SlotRef>,
    blink_fast: bool,
    blink_slow: bool,
}

impl SlotProxy {
    fn new(x: usize, y: usize) -> Self {
        // blink_fast starts high so blink_slow's first edge lands on the second rebuild
        Self {
            x,
            y,
            slot: None,
            blink_fast: true,
            blink_slow: false,
        }
    }

    pub fn slot(&self) -> Option<SlotRef> {
        self.slot
    }

    pub fn blink_fast(&self) -> bool {
        self.blink_fast
    }

    pub fn blink_slow(&self) -> bool {
        self.blink_slow
    }

    fn advance_blink(&mut self) {
        self.blink_fast = !self.blink_fast;
        if self.blink_fast {
            self.blink_slow = !self.blink_slow;
        }
    }

    fn resolve(&mut self, window: &ScrollWindow, host: &dyn Host) {
        self.slot = None;
        let scene = window.scene_at(self.y);
        if scene >= host.scene_count() {
            return;
        }
        if self.x >= host.track_count(scene) {
            return;
        }
        self.slot = Some(SlotRef::new(scene, self.x));
    }

    /// LED policy: triggered blinks fast, playing blinks slow, a stopped clip
    /// is steady on, an empty or missing slot is off.
    pub fn is_lit(&self, state: Option<SlotState>) -> bool {
        match state {
            Some(state) if state.has_clip => {
                if state.is_triggered {
                    self.blink_fast
                } else if state.is_playing {
                    self.blink_slow
                } else {
                    true
                }
            }
            _ => false,
        }
    }
}

/// The clip area as a flat row-major arena of proxies.
#[derive(Debug, Clone)]
pub struct SlotMatrix {
    columns: usize,
    rows: usize,
    proxies: Vec<SlotProxy>,
}

impl SlotMatrix {
    pub fn new(columns: usize, rows: usize) -> Self {
        let proxies = (0..rows)
            .flat_map(|y| (0..columns).map(move |x| SlotProxy::new(x, y)))
            .collect();
        Self {
            columns,
            rows,
            proxies,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn proxy(&self, x: usize, y: usize) -> Option<&SlotProxy> {
        if x >= self.columns || y >= self.rows {
            return None;
        }
        self.proxies.get(y * self.columns + x)
    }

    /// Advance blink phases and re-resolve every proxy against the host.
    pub fn rebuild(&mut self, window: &ScrollWindow, host: &dyn Host) {
        for proxy in &mut self.proxies {
            proxy.advance_blink();
            proxy.resolve(window, host);
        }
    }

    pub fn is_lit(&self, x: usize, y: usize, host: &dyn Host) -> bool {
        self.proxy(x, y)
            .map(|proxy| proxy.is_lit(proxy.slot().and_then(|slot| host.slot_state(slot))))
            .unwrap_or(false)
    }

    /// Bit x is set iff column x of row y is lit.
    pub fn row_mask(&self, y: usize, host: &dyn Host) -> u32 {
        (0..self.columns)
            .filter(|&x| self.is_lit(x, y, host))
            .fold(0u32, |mask, x| mask | (1 << x))
    }

    /// Fire the slot under (x, y) and remember it as the column's playing clip.
    pub fn press(
        &self,
        x: usize,
        y: usize,
        host: &mut dyn Host,
        playing: &mut PlayingClips,
    ) -> Option<SlotRef> {
        let slot = self.proxy(x, y)?.slot()?;
        host.fire_slot(slot);
        playing.record(x, slot);
        debug!("Fired slot {:?} from column {}", slot, x);
        Some(slot)
    }
}

/// Last slot fired per clip column. Entries are handles, not owners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayingClips {
    columns: Vec<Option<SlotRef>>,
}

impl PlayingClips {
    pub fn new(columns: usize) -> Self {
        Self {
            columns: vec![None; columns],
        }
    }

    pub fn record(&mut self, x: usize, slot: SlotRef) {
        if let Some(entry) = self.columns.get_mut(x) {
            *entry = Some(slot);
        }
    }

    pub fn get(&self, x: usize) -> Option<SlotRef> {
        self.columns.get(x).copied().flatten()
    }

    pub fn take(&mut self, x: usize) -> Option<SlotRef> {
        self.columns.get_mut(x).and_then(Option::take)
    }

    pub fn as_slice(&self) -> &[Option<SlotRef>] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HostCommand, SessionHost};

    fn clip(is_triggered: bool, is_playing: bool) -> Option<SlotState> {
        Some(SlotState {
            has_clip: true,
            is_triggered,
            is_playing,
        })
    }

    #[test]
    fn test_matrix_is_row_major() {
        let matrix = SlotMatrix::new(7, 6);
        assert_eq!(matrix.proxies.len(), 42);

        let proxy = matrix.proxy(3, 2).unwrap();
        assert_eq!((proxy.x, proxy.y), (3, 2));
        assert!(matrix.proxy(7, 0).is_none());
        assert!(matrix.proxy(0, 6).is_none());
    }

    #[test]
    fn test_blink_cadence_over_many_rebuilds() {
        let host = SessionHost::uniform(1, 1);
        let window = ScrollWindow::from_host(&host);
        let mut matrix = SlotMatrix::new(1, 1);

        let mut fast_toggles = 0;
        let mut slow_toggles = 0;
        for n in 1..=9 {
            let before = matrix.proxy(0, 0).unwrap().clone();
            matrix.rebuild(&window, &host);
            let after = matrix.proxy(0, 0).unwrap();

            if before.blink_fast() != after.blink_fast() {
                fast_toggles += 1;
            }
            if before.blink_slow() != after.blink_slow() {
                slow_toggles += 1;
            }
            assert_eq!(fast_toggles, n);
            assert_eq!(slow_toggles, n / 2);
        }
    }

    #[test]
    fn test_visual_state_precedence() {
        let mut proxy = SlotProxy::new(0, 0);
        proxy.blink_fast = false;
        proxy.blink_slow = true;

        // Triggered follows blink_fast even when also playing
        assert!(!proxy.is_lit(clip(true, true)));
        assert!(!proxy.is_lit(clip(true, false)));
        assert!(proxy.is_lit(clip(false, true)));
        assert!(proxy.is_lit(clip(false, false)));

        proxy.blink_fast = true;
        proxy.blink_slow = false;
        assert!(proxy.is_lit(clip(true, true)));
        assert!(!proxy.is_lit(clip(false, true)));
        assert!(proxy.is_lit(clip(false, false)));

        assert!(!proxy.is_lit(None));
        assert!(!proxy.is_lit(Some(SlotState::default())));
    }

    #[test]
    fn test_rebuild_resolves_window_and_guards_bounds() {
        let mut host = SessionHost::uniform(3, 2);
        host.select_scene(1);
        let window = ScrollWindow::from_host(&host);
        let mut matrix = SlotMatrix::new(7, 6);
        matrix.rebuild(&window, &host);

        assert_eq!(matrix.proxy(0, 0).unwrap().slot(), Some(SlotRef::new(1, 0)));
        assert_eq!(matrix.proxy(1, 1).unwrap().slot(), Some(SlotRef::new(2, 1)));
        // Past the last track
        assert_eq!(matrix.proxy(2, 0).unwrap().slot(), None);
        // Past the last scene
        assert_eq!(matrix.proxy(0, 2).unwrap().slot(), None);
    }

    #[test]
    fn test_row_mask_marks_loaded_slots() {
        let mut host = SessionHost::uniform(2, 3);
        host.set_clip(SlotRef::new(0, 1), None);
        let window = ScrollWindow::from_host(&host);
        let mut matrix = SlotMatrix::new(7, 6);
        matrix.rebuild(&window, &host);

        assert_eq!(matrix.row_mask(0, &host), 0b101);
        assert_eq!(matrix.row_mask(1, &host), 0b111);
        assert_eq!(matrix.row_mask(2, &host), 0);
    }

    #[test]
    fn test_press_records_and_overwrites_playing_clip() {
        let mut host = SessionHost::uniform(3, 2);
        let window = ScrollWindow::from_host(&host);
        let mut matrix = SlotMatrix::new(7, 6);
        let mut playing = PlayingClips::new(7);
        matrix.rebuild(&window, &host);

        assert_eq!(
            matrix.press(1, 0, &mut host, &mut playing),
            Some(SlotRef::new(0, 1))
        );
        assert_eq!(playing.get(1), Some(SlotRef::new(0, 1)));

        matrix.press(1, 2, &mut host, &mut playing);
        assert_eq!(playing.get(1), Some(SlotRef::new(2, 1)));
        assert_eq!(
            host.history(),
            &[
                HostCommand::FireSlot(SlotRef::new(0, 1)),
                HostCommand::FireSlot(SlotRef::new(2, 1)),
            ]
        );
    }

    #[test]
    fn test_press_on_unresolved_cell_does_nothing() {
        let mut host = SessionHost::uniform(1, 1);
        let window = ScrollWindow::from_host(&host);
        let mut matrix = SlotMatrix::new(7, 6);
        let mut playing = PlayingClips::new(7);
        matrix.rebuild(&window, &host);

        assert_eq!(matrix.press(4, 4, &mut host, &mut playing), None);
        assert_eq!(playing.get(4), None);
        assert!(host.history().is_empty());
    }

    #[test]
    fn test_playing_clips_take_clears_entry() {
        let mut playing = PlayingClips::new(3);
        playing.record(2, SlotRef::new(5, 2));
        playing.record(9, SlotRef::new(0, 9));

        assert_eq!(playing.take(2), Some(SlotRef::new(5, 2)));
        assert_eq!(playing.take(2), None);
        assert_eq!(playing.take(9), None);
        assert_eq!(playing.as_slice(), &[None, None, None]);
    }
}
