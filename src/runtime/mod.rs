//! Single-writer async game runtime and event stream APIs.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle, command loop, and sync worker.
pub mod handle;
