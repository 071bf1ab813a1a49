use std::collections::BTreeSet;
use std::fmt::Debug;

use proptest::prelude::*;

use roomalloc::{
    error::{AllocResult, ErrorKind},
    gateway::{
        PersistenceGateway,
        memory::InMemoryStore,
        sqlite::{RelationalConfig, RelationalStore},
    },
    model::{NewRoom, NewStudent},
};

#[derive(Debug, Clone)]
enum Action {
    AddStudent { roll: u8 },
    AddRoom { capacity: u8 },
    Allocate { student: u8, room: u8 },
    Deallocate { student: u8 },
    Delete { student: u8 },
    Relabel { room: u8, blank: bool },
    BadStudent,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (1u8..16).prop_map(|roll| Action::AddStudent { roll }),
        2 => (0u8..4).prop_map(|capacity| Action::AddRoom { capacity }),
        5 => (1u8..16, 1u8..8).prop_map(|(student, room)| Action::Allocate { student, room }),
        2 => (1u8..16).prop_map(|student| Action::Deallocate { student }),
        1 => (1u8..16).prop_map(|student| Action::Delete { student }),
        1 => (1u8..8, any::<bool>()).prop_map(|(room, blank)| Action::Relabel { room, blank }),
        1 => Just(Action::BadStudent),
    ]
}

// Values rendered through Debug so both backends compare on one type.
fn outcome<T: Debug>(result: AllocResult<T>) -> Result<String, ErrorKind> {
    result.map(|v| format!("{v:?}")).map_err(|e| e.kind())
}

fn apply(gw: &impl PersistenceGateway, action: &Action) -> Result<String, ErrorKind> {
    match *action {
        Action::AddStudent { roll } => outcome(gw.add_student(NewStudent::new(
            format!("S{roll}"),
            format!("s{roll}@hostel.test"),
            roll.to_string(),
        ))),
        Action::AddRoom { capacity } => {
            outcome(gw.add_room(NewRoom::new(format!("C{capacity}"), u32::from(capacity))))
        }
        Action::Allocate { student, room } => {
            outcome(gw.allocate(u64::from(student), u64::from(room)))
        }
        Action::Deallocate { student } => outcome(gw.deallocate(u64::from(student))),
        Action::Delete { student } => outcome(gw.delete_student(u64::from(student))),
        Action::Relabel { room, blank } => {
            let label = if blank { " ".to_string() } else { format!("L{room}") };
            outcome(gw.change_room_label(u64::from(room), &label))
        }
        Action::BadStudent => outcome(gw.add_student(NewStudent::new("X", "x@y", "12a"))),
    }
}

fn check_invariants(gw: &impl PersistenceGateway) {
    let rooms = gw.get_all_rooms().expect("rooms");
    let allocations = gw.get_all_allocations().expect("allocations");
    let students: BTreeSet<u64> = gw
        .get_all_students()
        .expect("students")
        .into_iter()
        .map(|s| s.id)
        .collect();

    for room in &rooms {
        assert!(room.is_consistent(), "room out of bounds: {room:?}");
        let held = allocations.iter().filter(|a| a.room_id == room.id).count();
        assert_eq!(held, room.occupied as usize, "occupancy drift in {room:?}");
    }

    let allocated: BTreeSet<u64> = allocations.iter().map(|a| a.student_id).collect();
    assert_eq!(allocated.len(), allocations.len(), "student allocated twice");
    assert!(allocated.is_subset(&students), "allocation for unknown student");

    let available: Vec<u64> = gw
        .get_available_rooms()
        .expect("available")
        .into_iter()
        .map(|r| r.id)
        .collect();
    let expected: Vec<u64> = rooms.iter().filter(|r| r.is_available()).map(|r| r.id).collect();
    assert_eq!(available, expected);
}

proptest! {
    #[test]
    fn backends_agree_on_every_step(actions in prop::collection::vec(action_strategy(), 1..80)) {
        let memory = InMemoryStore::new();
        let sqlite = RelationalStore::open(RelationalConfig::in_memory()).expect("open sqlite");

        for action in &actions {
            let left = apply(&memory, action);
            let right = apply(&sqlite, action);
            prop_assert_eq!(&left, &right, "diverged on {:?}", action);
            check_invariants(&memory);
            check_invariants(&sqlite);
        }

        prop_assert_eq!(memory.get_all_students().expect("m"), sqlite.get_all_students().expect("s"));
        prop_assert_eq!(memory.get_all_rooms().expect("m"), sqlite.get_all_rooms().expect("s"));
        prop_assert_eq!(memory.get_all_allocations().expect("m"), sqlite.get_all_allocations().expect("s"));
        for student in 1..16u64 {
            prop_assert_eq!(
                memory.get_allocated_room_for_student(student).expect("m"),
                sqlite.get_allocated_room_for_student(student).expect("s")
            );
        }
    }

    #[test]
    fn deallocate_undoes_allocate(capacity in 1u32..6, seated in 0u32..6) {
        let seated = seated.min(capacity - 1);
        let memory = InMemoryStore::new();
        let room = memory.add_room(NewRoom::new("R", capacity)).expect("room");
        for roll in 1..=u64::from(seated) + 1 {
            memory
                .add_student(NewStudent::new("S", "s@y", roll.to_string()))
                .expect("student");
        }
        for roll in 1..=u64::from(seated) {
            prop_assert!(memory.allocate(roll, room).expect("seat"));
        }

        let newcomer = u64::from(seated) + 1;
        let before = memory.get_room(room).expect("q").expect("room");
        prop_assert!(memory.allocate(newcomer, room).expect("allocate"));
        prop_assert!(memory.deallocate(newcomer).expect("deallocate"));
        prop_assert_eq!(memory.get_room(room).expect("q").expect("room"), before);
    }
}
