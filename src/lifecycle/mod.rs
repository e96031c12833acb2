// Per-item lifecycle: strategies and the watched item state machine.

pub mod item;
pub mod strategy;

pub use item::{ItemContext, WatchedItem};
