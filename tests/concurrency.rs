use std::{
    sync::{Arc, Barrier},
    thread,
};

use tempfile::TempDir;

use roomalloc::{
    engine::AllocationEngine,
    error::{AllocError, ErrorKind},
    gateway::{
        Backend, PersistenceGateway,
        memory::InMemoryStore,
        sqlite::{RelationalConfig, RelationalStore},
    },
    model::{NewRoom, NewStudent},
};

const CONTENDERS: u64 = 12;
const CAPACITY: u32 = 3;

fn student(roll: u64) -> NewStudent {
    NewStudent::new(format!("Student {roll}"), format!("{roll}@hostel.test"), roll.to_string())
}

/// Every student races for one room; returns (placed, rejected as full).
fn race_for_room<G: PersistenceGateway + 'static>(
    engine: Arc<AllocationEngine<G>>,
    room_id: u64,
) -> (usize, usize) {
    let barrier = Arc::new(Barrier::new(CONTENDERS as usize));
    let workers: Vec<_> = (1..=CONTENDERS)
        .map(|student_id| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.allocate_room(student_id, room_id)
            })
        })
        .collect();

    let mut placed = 0;
    let mut full = 0;
    for worker in workers {
        match worker.join().expect("worker panicked") {
            Ok(()) => placed += 1,
            Err(AllocError::CapacityExceeded { .. }) => full += 1,
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }
    (placed, full)
}

fn seeded(backend: Backend) -> (Arc<AllocationEngine<Backend>>, u64) {
    let room = backend.add_room(NewRoom::new("Contested", CAPACITY)).expect("room");
    for roll in 1..=CONTENDERS {
        backend.add_student(student(roll)).expect("student");
    }
    (Arc::new(AllocationEngine::new(backend)), room)
}

fn assert_exactly_capacity(engine: &AllocationEngine<Backend>, room: u64, placed: usize, full: usize) {
    assert_eq!(placed, CAPACITY as usize);
    assert_eq!(full, (CONTENDERS - u64::from(CAPACITY)) as usize);

    let gw = engine.gateway();
    let stored = gw.get_room(room).expect("query").expect("room");
    assert_eq!(stored.occupied, CAPACITY);
    assert_eq!(gw.get_all_allocations().expect("allocations").len(), CAPACITY as usize);
}

#[test]
fn memory_store_admits_exactly_capacity() {
    let (engine, room) = seeded(InMemoryStore::new().into());
    let (placed, full) = race_for_room(Arc::clone(&engine), room);
    assert_exactly_capacity(&engine, room, placed, full);
}

#[test]
fn sqlite_store_admits_exactly_capacity() {
    let tmp = TempDir::new().expect("tmp");
    let store = RelationalStore::open(RelationalConfig::at(tmp.path().join("race.db"))).expect("open");
    let (engine, room) = seeded(store.into());
    let (placed, full) = race_for_room(Arc::clone(&engine), room);
    assert_exactly_capacity(&engine, room, placed, full);
}

#[test]
fn separate_sqlite_connections_admit_exactly_capacity() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("sessions.db");

    let setup = RelationalStore::open(RelationalConfig::at(&db_path)).expect("setup");
    let room = setup.add_room(NewRoom::new("Contested", CAPACITY)).expect("room");
    for roll in 1..=CONTENDERS {
        setup.add_student(student(roll)).expect("student");
    }

    // One connection per session, all opened before the race starts.
    let sessions: Vec<RelationalStore> = (0..CONTENDERS)
        .map(|_| RelationalStore::open(RelationalConfig::at(&db_path)).expect("session"))
        .collect();

    let barrier = Arc::new(Barrier::new(CONTENDERS as usize));
    let workers: Vec<_> = sessions
        .into_iter()
        .zip(1..=CONTENDERS)
        .map(|(session, student_id)| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let engine = AllocationEngine::new(session);
                barrier.wait();
                engine.allocate_room(student_id, room)
            })
        })
        .collect();

    let outcomes: Vec<_> = workers
        .into_iter()
        .map(|w| w.join().expect("worker panicked"))
        .collect();
    let placed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, CAPACITY as usize);
    assert!(
        outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::CapacityExceeded)
    );

    let stored = setup.get_room(room).expect("query").expect("room");
    assert_eq!(stored.occupied, CAPACITY);
}

#[test]
fn one_student_racing_many_rooms_lands_once() {
    for backend in [
        Backend::from(InMemoryStore::new()),
        Backend::from(RelationalStore::open(RelationalConfig::in_memory()).expect("open")),
    ] {
        backend.add_student(student(500)).expect("student");
        let rooms: Vec<u64> = (0..8)
            .map(|n| backend.add_room(NewRoom::new(format!("R{n}"), 2)).expect("room"))
            .collect();
        let engine = Arc::new(AllocationEngine::new(backend));
        let barrier = Arc::new(Barrier::new(rooms.len()));

        let workers: Vec<_> = rooms
            .iter()
            .copied()
            .map(|room_id| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.allocate_room(500, room_id)
                })
            })
            .collect();

        let outcomes: Vec<_> = workers
            .into_iter()
            .map(|w| w.join().expect("worker panicked"))
            .collect();
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| e.kind() == ErrorKind::Conflict)
        );

        let gw = engine.gateway();
        let total: u32 = gw.get_all_rooms().expect("rooms").iter().map(|r| r.occupied).sum();
        assert_eq!(total, 1);
        assert!(gw.get_allocated_room_for_student(500).expect("query").is_some());
    }
}
