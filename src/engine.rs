//! Business rules layered over a [`PersistenceGateway`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AllocError, AllocResult},
    gateway::{Backend, PersistenceGateway},
    model::NewStudent,
    types::{RoomId, StudentId},
};

/// Aggregate occupancy figures. Formatting is left to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancyReport {
    /// Number of rooms.
    pub total_rooms: usize,
    /// Number of students.
    pub total_students: usize,
    /// Students holding an allocation.
    pub allocated_students: usize,
    /// Sum of free slots over all rooms.
    pub available_slots: u64,
}

/// Thin rule layer: turns low-level signals into explicit failures.
///
/// Every other operation is reached through [`AllocationEngine::gateway`].
#[derive(Debug)]
pub struct AllocationEngine<G = Backend> {
    gateway: G,
}

impl<G: PersistenceGateway> AllocationEngine<G> {
    /// Wraps a connected gateway.
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Underlying gateway for plain CRUD and queries.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Consumes the engine and returns the gateway.
    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Adds a student, rejecting a backend that reports a non-positive id.
    pub fn add_student(&self, student: NewStudent) -> AllocResult<StudentId> {
        let id = self.gateway.add_student(student)?;
        if id == 0 {
            return Err(AllocError::Inconsistent(
                "backend accepted student but returned id 0".into(),
            ));
        }
        Ok(id)
    }

    /// Allocates a student, turning a full room into
    /// [`AllocError::CapacityExceeded`].
    pub fn allocate_room(&self, student_id: StudentId, room_id: RoomId) -> AllocResult<()> {
        if self.gateway.allocate(student_id, room_id)? {
            Ok(())
        } else {
            debug!(student_id, room_id, "allocation rejected: room full");
            Err(AllocError::CapacityExceeded { room_id })
        }
    }

    /// Computes totals from one pass over rooms, students and allocations.
    pub fn report(&self) -> AllocResult<OccupancyReport> {
        let rooms = self.gateway.get_all_rooms()?;
        let students = self.gateway.get_all_students()?;
        let allocations = self.gateway.get_all_allocations()?;
        Ok(OccupancyReport {
            total_rooms: rooms.len(),
            total_students: students.len(),
            allocated_students: allocations.len(),
            available_slots: rooms.iter().map(|r| u64::from(r.free_slots())).sum(),
        })
    }
}
