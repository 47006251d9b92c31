//! Build lifecycle tracking and live-update delivery.

mod channels;
mod tracker;

pub use channels::UpdateChannels;
pub use tracker::BuildTracker;
