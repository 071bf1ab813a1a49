//! Shared primitive identifiers.

/// Student identifier; always equal to the numeric roll number.
pub type StudentId = u64;
/// Backend-assigned room identifier, sequential from 1.
pub type RoomId = u64;
/// Room capacity and occupancy counter.
pub type Slots = u32;
