use crate::host::Host;
use serde::Serialize;
use tracing::debug;

/// Vertical position of the grid over the host's scene list.
///
/// `offset` stays within `0..=max(0, total - 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrollWindow {
    offset: usize,
    total: usize,
}

impl ScrollWindow {
    pub fn new(offset: usize, total: usize) -> Self {
        let mut window = Self { offset, total };
        window.clamp();
        window
    }

    pub fn from_host(host: &dyn Host) -> Self {
        Self::new(host.selected_scene().unwrap_or(0), host.scene_count())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn max_offset(&self) -> usize {
        self.total.saturating_sub(1)
    }

    /// Host scene shown on a given clip row.
    pub fn scene_at(&self, row: usize) -> usize {
        self.offset + row
    }

    /// Returns false when already at the top.
    pub fn scroll_up(&mut self, host: &mut dyn Host) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset -= 1;
        host.select_scene(self.offset);
        true
    }

    /// Returns false when already at the last scene.
    pub fn scroll_down(&mut self, host: &mut dyn Host) -> bool {
        if self.offset >= self.max_offset() {
            return false;
        }
        self.offset += 1;
        host.select_scene(self.offset);
        true
    }

    pub fn on_host_selection_changed(&mut self, host: &dyn Host) {
        let Some(selected) = host.selected_scene() else {
            return;
        };
        // Selection can run ahead of a queued ScenesChanged
        self.total = self.total.max(host.scene_count());
        self.offset = selected;
        self.clamp();
        debug!("scene ofs = {}", self.offset);
    }

    pub fn on_scene_count_changed(&mut self, host: &dyn Host) {
        self.total = host.scene_count();
        self.clamp();
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }
}
