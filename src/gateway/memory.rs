//! Process-local backend guarded by a single mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tracing::debug;

use crate::{
    error::{AllocError, AllocResult, Conflict, Missing},
    model::{Allocation, NewRoom, NewStudent, Room, Student, validate_label},
    types::{RoomId, StudentId},
};

use super::PersistenceGateway;

#[derive(Debug)]
struct Tables {
    students: HashMap<StudentId, Student>,
    rooms: HashMap<RoomId, Room>,
    allocations: HashMap<StudentId, RoomId>,
    next_room_id: RoomId,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            students: HashMap::new(),
            rooms: HashMap::new(),
            allocations: HashMap::new(),
            next_room_id: 1,
        }
    }
}

impl Tables {
    fn insert_room(&mut self, room: NewRoom) -> AllocResult<RoomId> {
        room.validate()?;
        let id = self.next_room_id;
        self.next_room_id += 1;
        self.rooms.insert(id, room.into_room(id));
        Ok(id)
    }

    fn release(&mut self, student_id: StudentId) -> bool {
        let Some(room_id) = self.allocations.remove(&student_id) else {
            return false;
        };
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.occupied = room.occupied.saturating_sub(1);
        }
        true
    }

    fn sorted_rooms(&self, filter: impl Fn(&Room) -> bool) -> Vec<Room> {
        let mut out: Vec<Room> = self.rooms.values().filter(|r| filter(r)).cloned().collect();
        out.sort_by_key(|r| r.id);
        out
    }
}

/// Map-backed [`PersistenceGateway`]. Always reachable; state lives only as
/// long as the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `rooms`, assigned ids from 1.
    pub fn with_rooms(rooms: impl IntoIterator<Item = NewRoom>) -> AllocResult<Self> {
        let store = Self::new();
        {
            let mut tables = store.lock();
            for room in rooms {
                tables.insert_room(room)?;
            }
        }
        Ok(store)
    }

    // Every mutation checks before it writes, so a poisoned guard still holds
    // consistent tables.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceGateway for InMemoryStore {
    fn connect(&self) -> AllocResult<()> {
        Ok(())
    }

    fn add_student(&self, student: NewStudent) -> AllocResult<StudentId> {
        let id = student.validate()?;
        let mut tables = self.lock();
        if tables.students.contains_key(&id) {
            return Err(AllocError::Conflict(Conflict::DuplicateRollNo(student.roll_no)));
        }
        tables.students.insert(id, student.into_student(id));
        debug!(student_id = id, "student added");
        Ok(id)
    }

    fn add_room(&self, room: NewRoom) -> AllocResult<RoomId> {
        let id = self.lock().insert_room(room)?;
        debug!(room_id = id, "room added");
        Ok(id)
    }

    fn allocate(&self, student_id: StudentId, room_id: RoomId) -> AllocResult<bool> {
        let mut tables = self.lock();
        if !tables.students.contains_key(&student_id) {
            return Err(AllocError::NotFound(Missing::Student(student_id)));
        }
        if !tables.rooms.contains_key(&room_id) {
            return Err(AllocError::NotFound(Missing::Room(room_id)));
        }
        if let Some(current) = tables.allocations.get(&student_id) {
            return Err(AllocError::Conflict(Conflict::AlreadyAllocated {
                student_id,
                room_id: *current,
            }));
        }

        let Some(room) = tables.rooms.get_mut(&room_id) else {
            return Err(AllocError::NotFound(Missing::Room(room_id)));
        };
        if !room.is_available() {
            debug!(student_id, room_id, "room full");
            return Ok(false);
        }
        room.occupied += 1;
        tables.allocations.insert(student_id, room_id);
        debug!(student_id, room_id, "student allocated");
        Ok(true)
    }

    fn deallocate(&self, student_id: StudentId) -> AllocResult<bool> {
        Ok(self.lock().release(student_id))
    }

    fn delete_student(&self, student_id: StudentId) -> AllocResult<bool> {
        let mut tables = self.lock();
        if !tables.students.contains_key(&student_id) {
            return Ok(false);
        }
        tables.release(student_id);
        tables.students.remove(&student_id);
        debug!(student_id, "student deleted");
        Ok(true)
    }

    fn change_room_label(&self, room_id: RoomId, new_label: &str) -> AllocResult<()> {
        validate_label(new_label)?;
        let mut tables = self.lock();
        let room = tables
            .rooms
            .get_mut(&room_id)
            .ok_or(AllocError::NotFound(Missing::Room(room_id)))?;
        room.label = new_label.to_string();
        Ok(())
    }

    fn get_student(&self, student_id: StudentId) -> AllocResult<Option<Student>> {
        Ok(self.lock().students.get(&student_id).cloned())
    }

    fn get_all_students(&self) -> AllocResult<Vec<Student>> {
        let mut out: Vec<Student> = self.lock().students.values().cloned().collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    fn get_all_rooms(&self) -> AllocResult<Vec<Room>> {
        Ok(self.lock().sorted_rooms(|_| true))
    }

    fn get_available_rooms(&self) -> AllocResult<Vec<Room>> {
        Ok(self.lock().sorted_rooms(Room::is_available))
    }

    fn get_allocated_room_for_student(&self, student_id: StudentId) -> AllocResult<Option<Room>> {
        let tables = self.lock();
        Ok(tables
            .allocations
            .get(&student_id)
            .and_then(|room_id| tables.rooms.get(room_id))
            .cloned())
    }

    fn get_all_allocations(&self) -> AllocResult<Vec<Allocation>> {
        let mut out: Vec<Allocation> = self
            .lock()
            .allocations
            .iter()
            .map(|(student_id, room_id)| Allocation {
                student_id: *student_id,
                room_id: *room_id,
            })
            .collect();
        out.sort_by_key(|a| a.student_id);
        Ok(out)
    }

    fn get_room(&self, room_id: RoomId) -> AllocResult<Option<Room>> {
        Ok(self.lock().rooms.get(&room_id).cloned())
    }
}
