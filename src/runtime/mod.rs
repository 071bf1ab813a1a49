//! Async handle for concurrent sessions and its event stream.

/// Event stream types emitted by the handle.
pub mod events;
/// Cloneable async handle over an [`crate::engine::AllocationEngine`].
pub mod handle;
