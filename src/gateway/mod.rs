//! Storage abstraction shared by the in-memory and SQLite backends.
//!
//! Every query returns owned copies, and list queries are ordered by id
//! (allocations by student id) so that both backends answer identically.

pub mod memory;
pub mod sqlite;

use std::fmt;

use crate::{
    error::AllocResult,
    model::{Allocation, NewRoom, NewStudent, Room, Student},
    types::{RoomId, StudentId},
};

use self::{memory::InMemoryStore, sqlite::RelationalStore};

/// Capability set every backend implements.
///
/// Implementations must be safe to share between threads; each mutating call
/// is atomic with respect to every other call on the same store.
pub trait PersistenceGateway: Send + Sync {
    /// Makes the backend ready. Fails with `Connectivity` if it cannot be reached.
    fn connect(&self) -> AllocResult<()>;

    /// Inserts a student and returns its id (the numeric roll number).
    fn add_student(&self, student: NewStudent) -> AllocResult<StudentId>;

    /// Inserts an empty room and returns its backend-assigned id.
    fn add_room(&self, room: NewRoom) -> AllocResult<RoomId>;

    /// Allocates `student_id` to `room_id`.
    ///
    /// Returns `Ok(false)` without changing anything when the room is full.
    fn allocate(&self, student_id: StudentId, room_id: RoomId) -> AllocResult<bool>;

    /// Removes the student's allocation, if any, and frees one slot.
    fn deallocate(&self, student_id: StudentId) -> AllocResult<bool>;

    /// Deallocates and then removes the student. `false` if unknown.
    fn delete_student(&self, student_id: StudentId) -> AllocResult<bool>;

    /// Replaces a room's label.
    fn change_room_label(&self, room_id: RoomId, new_label: &str) -> AllocResult<()>;

    /// Looks up one student.
    fn get_student(&self, student_id: StudentId) -> AllocResult<Option<Student>>;

    /// All students ordered by id.
    fn get_all_students(&self) -> AllocResult<Vec<Student>>;

    /// All rooms ordered by id.
    fn get_all_rooms(&self) -> AllocResult<Vec<Room>>;

    /// Rooms with `occupied < capacity`, ordered by id.
    fn get_available_rooms(&self) -> AllocResult<Vec<Room>>;

    /// Room currently holding the student.
    fn get_allocated_room_for_student(&self, student_id: StudentId) -> AllocResult<Option<Room>>;

    /// Whole allocation relation ordered by student id.
    fn get_all_allocations(&self) -> AllocResult<Vec<Allocation>>;

    /// Looks up one room.
    fn get_room(&self, room_id: RoomId) -> AllocResult<Option<Room>> {
        Ok(self
            .get_all_rooms()?
            .into_iter()
            .find(|room| room.id == room_id))
    }
}

/// Which backend a [`Backend`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local maps.
    InMemory,
    /// SQLite database.
    Relational,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("in-memory"),
            Self::Relational => f.write_str("relational"),
        }
    }
}

/// Backend chosen once at startup.
#[derive(Debug)]
pub enum Backend {
    /// Map-backed store.
    InMemory(InMemoryStore),
    /// SQLite-backed store.
    Relational(RelationalStore),
}

impl Backend {
    /// Returns which variant is active.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::InMemory(_) => BackendKind::InMemory,
            Self::Relational(_) => BackendKind::Relational,
        }
    }
}

macro_rules! dispatch {
    ($backend:expr, $store:ident => $call:expr) => {
        match $backend {
            Backend::InMemory($store) => $call,
            Backend::Relational($store) => $call,
        }
    };
}

impl From<InMemoryStore> for Backend {
    fn from(value: InMemoryStore) -> Self {
        Self::InMemory(value)
    }
}

impl From<RelationalStore> for Backend {
    fn from(value: RelationalStore) -> Self {
        Self::Relational(value)
    }
}

impl PersistenceGateway for Backend {
    fn connect(&self) -> AllocResult<()> {
        dispatch!(self, store => store.connect())
    }

    fn add_student(&self, student: NewStudent) -> AllocResult<StudentId> {
        dispatch!(self, store => store.add_student(student))
    }

    fn add_room(&self, room: NewRoom) -> AllocResult<RoomId> {
        dispatch!(self, store => store.add_room(room))
    }

    fn allocate(&self, student_id: StudentId, room_id: RoomId) -> AllocResult<bool> {
        dispatch!(self, store => store.allocate(student_id, room_id))
    }

    fn deallocate(&self, student_id: StudentId) -> AllocResult<bool> {
        dispatch!(self, store => store.deallocate(student_id))
    }

    fn delete_student(&self, student_id: StudentId) -> AllocResult<bool> {
        dispatch!(self, store => store.delete_student(student_id))
    }

    fn change_room_label(&self, room_id: RoomId, new_label: &str) -> AllocResult<()> {
        dispatch!(self, store => store.change_room_label(room_id, new_label))
    }

    fn get_student(&self, student_id: StudentId) -> AllocResult<Option<Student>> {
        dispatch!(self, store => store.get_student(student_id))
    }

    fn get_all_students(&self) -> AllocResult<Vec<Student>> {
        dispatch!(self, store => store.get_all_students())
    }

    fn get_all_rooms(&self) -> AllocResult<Vec<Room>> {
        dispatch!(self, store => store.get_all_rooms())
    }

    fn get_available_rooms(&self) -> AllocResult<Vec<Room>> {
        dispatch!(self, store => store.get_available_rooms())
    }

    fn get_allocated_room_for_student(&self, student_id: StudentId) -> AllocResult<Option<Room>> {
        dispatch!(self, store => store.get_allocated_room_for_student(student_id))
    }

    fn get_all_allocations(&self) -> AllocResult<Vec<Allocation>> {
        dispatch!(self, store => store.get_all_allocations())
    }

    fn get_room(&self, room_id: RoomId) -> AllocResult<Option<Room>> {
        dispatch!(self, store => store.get_room(room_id))
    }
}
