//! Session access for the generation control plane.

mod updater;

pub use updater::SessionUpdater;
