//! Caller-side automatic room selection.
//!
//! The engine never picks rooms on its own; this module ranks the available
//! rooms and walks the ranking through [`AllocationEngine::allocate_room`].

use tracing::debug;

use crate::{
    engine::AllocationEngine,
    error::{AllocError, AllocResult},
    gateway::PersistenceGateway,
    model::Room,
    types::{RoomId, StudentId},
};

/// Order in which available rooms are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationPolicy {
    /// Lowest room id first.
    #[default]
    FirstFit,
    /// Fewest free slots first, ties broken by lowest room id.
    BestFit,
}

impl AllocationPolicy {
    /// Ranks the rooms that still have a free slot.
    pub fn rank(self, rooms: &[Room]) -> Vec<RoomId> {
        let mut candidates: Vec<&Room> = rooms.iter().filter(|r| r.is_available()).collect();
        match self {
            Self::FirstFit => candidates.sort_by_key(|r| r.id),
            Self::BestFit => candidates.sort_by_key(|r| (r.free_slots(), r.id)),
        }
        candidates.into_iter().map(|r| r.id).collect()
    }
}

/// Allocates `student_id` to the best-ranked room that still accepts it.
///
/// A room that fills between ranking and allocation is skipped. Returns
/// `Ok(None)` when no room has space; every other failure propagates.
pub fn auto_allocate<G: PersistenceGateway>(
    engine: &AllocationEngine<G>,
    student_id: StudentId,
    policy: AllocationPolicy,
) -> AllocResult<Option<RoomId>> {
    let rooms = engine.gateway().get_available_rooms()?;
    for room_id in policy.rank(&rooms) {
        match engine.allocate_room(student_id, room_id) {
            Ok(()) => return Ok(Some(room_id)),
            Err(AllocError::CapacityExceeded { .. }) => {
                debug!(student_id, room_id, "candidate filled concurrently, trying next");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}
