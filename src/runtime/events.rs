//! Runtime event stream payloads.

use serde::{Deserialize, Serialize};

use crate::types::{RoomId, StudentId};

/// Events broadcast after a mutation succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEvent {
    /// A student was created.
    StudentAdded {
        /// New student id.
        student_id: StudentId,
    },
    /// A room was created.
    RoomAdded {
        /// New room id.
        room_id: RoomId,
    },
    /// A student was placed in a room.
    Allocated {
        /// Allocated student.
        student_id: StudentId,
        /// Target room.
        room_id: RoomId,
    },
    /// A student's allocation was removed.
    Deallocated {
        /// Released student.
        student_id: StudentId,
    },
    /// A student was removed, along with any allocation.
    StudentDeleted {
        /// Removed student.
        student_id: StudentId,
    },
    /// A room label changed.
    RoomRelabelled {
        /// Relabelled room.
        room_id: RoomId,
    },
}
