use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

// Row bitmasks travel as a single OSC int32
const MAX_GRID_WIDTH: u8 = 32;
const MIN_GRID_SIDE: u8 = 3;

/// Geometry and OSC prefix of the grid device.
///
/// The last column holds the scene launch buttons and the last two rows hold
/// the column stop buttons and the transport controls. Everything else is
/// clip area.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GridConfig {
    pub width: u8,
    pub height: u8,
    pub prefix: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            prefix: "/ableton".to_string(),
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width >= MIN_GRID_SIDE && self.height >= MIN_GRID_SIDE,
            "grid must be at least {}x{}, got {}x{}",
            MIN_GRID_SIDE,
            MIN_GRID_SIDE,
            self.width,
            self.height
        );
        ensure!(
            self.width <= MAX_GRID_WIDTH,
            "grid width {} exceeds the maximum of {}",
            self.width,
            MAX_GRID_WIDTH
        );
        ensure!(
            self.prefix.starts_with('/'),
            "OSC prefix must start with '/', got {:?}",
            self.prefix
        );
        Ok(())
    }

    pub fn clip_columns(&self) -> usize {
        self.width as usize - 1
    }

    pub fn clip_rows(&self) -> usize {
        self.height as usize - 2
    }

    pub fn scene_column(&self) -> usize {
        self.width as usize - 1
    }

    pub fn stop_row(&self) -> usize {
        self.height as usize - 2
    }

    pub fn control_row(&self) -> usize {
        self.height as usize - 1
    }

    /// Position of the once-per-beat transport LED.
    pub fn indicator(&self) -> (u8, u8) {
        (self.width - 1, self.height - 1)
    }
}

/// UDP endpoints of the messaging link.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct LinkConfig {
    /// Local address presses arrive on.
    pub listen: SocketAddr,
    /// Address of the grid device (or serial-to-OSC daemon).
    pub device: SocketAddr,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            device: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

fn default_tempo() -> f64 {
    120.0
}

fn default_launch_quantization() -> f64 {
    4.0
}

fn default_select_next_on_launch() -> bool {
    true
}

/// Description of the simulated host set the bridge runs against.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    /// Launch quantization in beats; 0 launches on the next refresh.
    #[serde(default = "default_launch_quantization")]
    pub launch_quantization: f64,
    #[serde(default = "default_select_next_on_launch")]
    pub select_next_on_launch: bool,
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SceneConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// One entry per track; `null` is an empty slot.
    #[serde(default)]
    pub clips: Vec<Option<String>>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        let config: SessionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.tempo > 0.0, "tempo must be positive, got {}", self.tempo);
        ensure!(
            self.launch_quantization >= 0.0,
            "launch quantization must not be negative, got {}",
            self.launch_quantization
        );
        Ok(())
    }

    /// Built-in 4-track, 6-scene set used when no session file is given.
    pub fn demo() -> Self {
        let clip = |scene: usize, track: usize| Some(format!("clip {}-{}", scene + 1, track + 1));
        let scenes = (0..6)
            .map(|scene| SceneConfig {
                name: Some(format!("Scene {}", scene + 1)),
                clips: (0..4)
                    .map(|track| if (scene + track) % 3 == 2 { None } else { clip(scene, track) })
                    .collect(),
            })
            .collect();

        Self {
            tempo: default_tempo(),
            launch_quantization: default_launch_quantization(),
            select_next_on_launch: default_select_next_on_launch(),
            scenes,
        }
    }
}
