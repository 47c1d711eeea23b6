//! Clip launcher engine for monome-style button grids.
//!
//! Mirrors a window of a host's scene/track clip matrix onto the grid LEDs and
//! turns grid presses into clip, scene and transport commands.

pub mod buttons;
pub mod config;
pub mod controller;
pub mod host;
pub mod link;
pub mod messages;
pub mod scroll;
pub mod session;
pub mod slots;
pub mod web_monitor;

pub use config::{GridConfig, LinkConfig, SessionConfig};
pub use controller::{GridSnapshot, Lifecycle, MonomeMatrix};
pub use host::{Event, EventReceiver, EventSender, Host, SlotRef, SlotState};
pub use link::{GridLink, LinkError, OscLink, PollResult};
pub use session::SessionHost;
pub use web_monitor::WebMonitor;
