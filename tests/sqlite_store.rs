use tempfile::TempDir;

use roomalloc::{
    error::{AllocError, ErrorKind},
    gateway::{
        PersistenceGateway,
        sqlite::{RelationalConfig, RelationalStore},
    },
    model::{Allocation, NewRoom, NewStudent},
};

fn student(roll: &str) -> NewStudent {
    NewStudent::new(format!("Student {roll}"), format!("{roll}@hostel.test"), roll)
}

#[test]
fn state_survives_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("hostel.db");

    let (r1, r2) = {
        let store = RelationalStore::open(RelationalConfig::at(&db_path)).expect("open");
        let r1 = store.add_room(NewRoom::new("R1", 2)).expect("r1");
        let r2 = store.add_room(NewRoom::new("R2", 1)).expect("r2");
        store.add_student(student("11")).expect("11");
        store.add_student(student("12")).expect("12");
        assert!(store.allocate(11, r1).expect("allocate"));
        assert!(store.allocate(12, r2).expect("allocate"));
        assert!(store.deallocate(12).expect("deallocate"));
        store.change_room_label(r2, "R2-east").expect("relabel");
        (r1, r2)
    };

    let reopened = RelationalStore::open(RelationalConfig {
        create_if_missing: false,
        ..RelationalConfig::at(&db_path)
    })
    .expect("reopen");

    let rooms = reopened.get_all_rooms().expect("rooms");
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].occupied, 1);
    assert_eq!(rooms[1].label, "R2-east");
    assert_eq!(rooms[1].occupied, 0);
    assert_eq!(
        reopened.get_all_allocations().expect("allocations"),
        vec![Allocation {
            student_id: 11,
            room_id: r1
        }]
    );

    // Ids keep increasing after reopen.
    let r3 = reopened.add_room(NewRoom::new("R3", 2)).expect("r3");
    assert!(r3 > r2);
}

#[test]
fn missing_file_without_create_is_unreachable() {
    let tmp = TempDir::new().expect("tmp");
    let store = RelationalStore::new(RelationalConfig {
        create_if_missing: false,
        ..RelationalConfig::at(tmp.path().join("absent.db"))
    });

    let err = store.connect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(!err.is_recoverable());
    assert!(!store.is_connected());
    assert!(!tmp.path().join("absent.db").exists());
}

#[test]
fn garbage_file_is_unreachable() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("not-a-db.db");
    std::fs::write(&db_path, vec![b'x'; 4096]).expect("write garbage");

    let err = RelationalStore::open(RelationalConfig::at(&db_path)).unwrap_err();
    assert!(matches!(err, AllocError::Connectivity(_)), "{err:?}");
}

#[test]
fn operations_before_connect_fail_with_connectivity() {
    let store = RelationalStore::new(RelationalConfig::in_memory());

    assert_eq!(
        store.add_room(NewRoom::new("R1", 2)).unwrap_err().kind(),
        ErrorKind::Connectivity
    );
    assert_eq!(
        store.get_all_students().unwrap_err().kind(),
        ErrorKind::Connectivity
    );
    assert_eq!(store.deallocate(1).unwrap_err().kind(), ErrorKind::Connectivity);

    store.connect().expect("connect");
    store.connect().expect("connect is idempotent");
    assert!(store.is_connected());
    assert_eq!(store.add_room(NewRoom::new("R1", 2)).expect("room"), 1);
}

#[test]
fn two_connections_share_one_file() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("shared.db");

    let a = RelationalStore::open(RelationalConfig::at(&db_path)).expect("a");
    let b = RelationalStore::open(RelationalConfig::at(&db_path)).expect("b");

    let room = a.add_room(NewRoom::new("Shared", 1)).expect("room");
    a.add_student(student("1")).expect("1");
    b.add_student(student("2")).expect("2");

    let err = b.add_student(student("1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert!(a.allocate(1, room).expect("a allocates"));
    assert!(!b.allocate(2, room).expect("b sees full room"));
    assert_eq!(b.get_room(room).expect("query").expect("room").occupied, 1);
}
