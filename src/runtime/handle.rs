use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::{sync::broadcast, task::JoinError};

use crate::{
    engine::{AllocationEngine, OccupancyReport},
    error::{AllocError, AllocResult},
    gateway::{Backend, PersistenceGateway},
    model::{Allocation, NewRoom, NewStudent, Room, Student},
    policy::{AllocationPolicy, auto_allocate},
    types::{RoomId, StudentId},
};

use super::events::AllocationEvent;

/// Failure of a call made through [`AllocatorHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine or gateway rejected the call.
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The blocking task running the call panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] JoinError),
}

impl RuntimeError {
    /// Returns the inner allocation error, if that is what failed.
    pub fn as_alloc(&self) -> Option<&AllocError> {
        match self {
            Self::Alloc(err) => Some(err),
            Self::Join(_) => None,
        }
    }
}

/// Handle tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Events buffered per subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
        }
    }
}

/// Cloneable async front for one engine; each clone can serve a separate
/// session. Calls run on tokio's blocking pool.
///
/// Mutations made through a handle and its clones hold one publisher lock
/// from the gateway call until their event is sent, so subscribers see events
/// in commit order. Reads do not take that lock.
pub struct AllocatorHandle<G = Backend> {
    engine: Arc<AllocationEngine<G>>,
    publisher: Arc<Mutex<broadcast::Sender<AllocationEvent>>>,
}

impl<G> Clone for AllocatorHandle<G> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<G: PersistenceGateway + 'static> AllocatorHandle<G> {
    /// Wraps `engine`.
    pub fn new(engine: AllocationEngine<G>, config: RuntimeConfig) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            engine: Arc::new(engine),
            publisher: Arc::new(Mutex::new(events_tx)),
        }
    }

    /// Subscribes to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AllocationEvent> {
        lock_publisher(&self.publisher).subscribe()
    }

    /// Shared engine, for synchronous callers. Mutations made through it
    /// publish no events.
    pub fn engine(&self) -> &AllocationEngine<G> {
        &self.engine
    }

    /// Registers a student; publishes [`AllocationEvent::StudentAdded`].
    pub async fn add_student(&self, student: NewStudent) -> Result<StudentId, RuntimeError> {
        self.mutate(
            move |engine| engine.add_student(student),
            |&student_id| Some(AllocationEvent::StudentAdded { student_id }),
        )
        .await
    }

    /// Registers a room; publishes [`AllocationEvent::RoomAdded`].
    pub async fn add_room(&self, room: NewRoom) -> Result<RoomId, RuntimeError> {
        self.mutate(
            move |engine| engine.gateway().add_room(room),
            |&room_id| Some(AllocationEvent::RoomAdded { room_id }),
        )
        .await
    }

    /// Places a student in a specific room.
    pub async fn allocate_room(
        &self,
        student_id: StudentId,
        room_id: RoomId,
    ) -> Result<(), RuntimeError> {
        self.mutate(
            move |engine| engine.allocate_room(student_id, room_id),
            move |_| {
                Some(AllocationEvent::Allocated {
                    student_id,
                    room_id,
                })
            },
        )
        .await
    }

    /// Runs [`auto_allocate`]; `None` means no room had space.
    pub async fn auto_allocate(
        &self,
        student_id: StudentId,
        policy: AllocationPolicy,
    ) -> Result<Option<RoomId>, RuntimeError> {
        self.mutate(
            move |engine| auto_allocate(engine, student_id, policy),
            move |&placed| {
                placed.map(|room_id| AllocationEvent::Allocated {
                    student_id,
                    room_id,
                })
            },
        )
        .await
    }

    /// Releases a student's allocation, if any.
    pub async fn deallocate(&self, student_id: StudentId) -> Result<bool, RuntimeError> {
        self.mutate(
            move |engine| engine.gateway().deallocate(student_id),
            move |&released| released.then_some(AllocationEvent::Deallocated { student_id }),
        )
        .await
    }

    /// Deletes a student and its allocation.
    pub async fn delete_student(&self, student_id: StudentId) -> Result<bool, RuntimeError> {
        self.mutate(
            move |engine| engine.gateway().delete_student(student_id),
            move |&deleted| deleted.then_some(AllocationEvent::StudentDeleted { student_id }),
        )
        .await
    }

    /// Renames a room.
    pub async fn change_room_label(
        &self,
        room_id: RoomId,
        new_label: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        let new_label = new_label.into();
        self.mutate(
            move |engine| engine.gateway().change_room_label(room_id, &new_label),
            move |_| Some(AllocationEvent::RoomRelabelled { room_id }),
        )
        .await
    }

    /// Looks up one student.
    pub async fn student(&self, student_id: StudentId) -> Result<Option<Student>, RuntimeError> {
        self.read(move |engine| engine.gateway().get_student(student_id))
            .await
    }

    /// All students, by id.
    pub async fn students(&self) -> Result<Vec<Student>, RuntimeError> {
        self.read(|engine| engine.gateway().get_all_students()).await
    }

    /// All rooms, by id.
    pub async fn rooms(&self) -> Result<Vec<Room>, RuntimeError> {
        self.read(|engine| engine.gateway().get_all_rooms()).await
    }

    /// Rooms with at least one free slot.
    pub async fn available_rooms(&self) -> Result<Vec<Room>, RuntimeError> {
        self.read(|engine| engine.gateway().get_available_rooms())
            .await
    }

    /// Room currently holding `student_id`.
    pub async fn allocated_room(&self, student_id: StudentId) -> Result<Option<Room>, RuntimeError> {
        self.read(move |engine| engine.gateway().get_allocated_room_for_student(student_id))
            .await
    }

    /// All allocations, by student id.
    pub async fn allocations(&self) -> Result<Vec<Allocation>, RuntimeError> {
        self.read(|engine| engine.gateway().get_all_allocations())
            .await
    }

    /// Occupancy totals.
    pub async fn report(&self) -> Result<OccupancyReport, RuntimeError> {
        self.read(|engine| engine.report()).await
    }

    async fn read<T, F>(&self, f: F) -> Result<T, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce(&AllocationEngine<G>) -> AllocResult<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let out = tokio::task::spawn_blocking(move || f(&engine)).await??;
        Ok(out)
    }

    // The event is sent before the publisher lock drops, so a later mutation
    // cannot publish ahead of this one.
    async fn mutate<T, F, E>(&self, f: F, event: E) -> Result<T, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce(&AllocationEngine<G>) -> AllocResult<T> + Send + 'static,
        E: FnOnce(&T) -> Option<AllocationEvent> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let publisher = Arc::clone(&self.publisher);
        let out = tokio::task::spawn_blocking(move || {
            let events_tx = lock_publisher(&publisher);
            let out = f(&engine)?;
            if let Some(event) = event(&out) {
                // No subscribers is not an error.
                let _ = events_tx.send(event);
            }
            Ok::<_, AllocError>(out)
        })
        .await??;
        Ok(out)
    }
}

fn lock_publisher(
    publisher: &Mutex<broadcast::Sender<AllocationEvent>>,
) -> MutexGuard<'_, broadcast::Sender<AllocationEvent>> {
    publisher.lock().unwrap_or_else(PoisonError::into_inner)
}
