//! SQLite-backed [`PersistenceGateway`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior, params,
};
use tracing::{debug, info};

use crate::{
    error::{AllocError, AllocResult, Conflict, Missing},
    model::{Allocation, NewRoom, NewStudent, Room, Student, validate_label},
    types::{RoomId, Slots, StudentId},
};

use super::PersistenceGateway;

const ROOM_COLUMNS: &str = "id, number, capacity, occupied";
const STUDENT_COLUMNS: &str = "id, name, email, roll_no";

/// Where and how to open the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Create the file when it does not exist yet.
    pub create_if_missing: bool,
    /// How long a writer waits on a lock held by another connection.
    pub busy_timeout_ms: u64,
}

impl RelationalConfig {
    /// Config for a database file at `path`.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Private in-memory database, mainly for tests.
    pub fn in_memory() -> Self {
        Self::at(":memory:")
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("roomalloc.db"),
            create_if_missing: true,
            busy_timeout_ms: 5_000,
        }
    }
}

/// SQLite store. Nothing works until [`PersistenceGateway::connect`] succeeds.
#[derive(Debug)]
pub struct RelationalStore {
    config: RelationalConfig,
    conn: Mutex<Option<Connection>>,
}

impl RelationalStore {
    /// Creates an unconnected store.
    pub fn new(config: RelationalConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Creates and connects a store in one step.
    pub fn open(config: RelationalConfig) -> AllocResult<Self> {
        let store = Self::new(config);
        store.connect()?;
        Ok(store)
    }

    /// Returns the configuration the store was built with.
    pub fn config(&self) -> &RelationalConfig {
        &self.config
    }

    /// True once `connect` has succeeded.
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> AllocResult<T>) -> AllocResult<T> {
        let mut guard = self.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| AllocError::Connectivity("relational store is not connected".into()))?;
        f(conn)
    }
}

impl PersistenceGateway for RelationalStore {
    fn connect(&self) -> AllocResult<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }
        let conn = open_connection(&self.config).map_err(|err| {
            AllocError::Connectivity(format!("{}: {err}", self.config.path.display()))
        })?;
        *guard = Some(conn);
        info!(path = %self.config.path.display(), "relational store connected");
        Ok(())
    }

    fn add_student(&self, student: NewStudent) -> AllocResult<StudentId> {
        let id = student.validate()?;
        self.with_conn(|conn| {
            let tx = immediate(conn)?;
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM students WHERE id = ?1 OR roll_no = ?2)",
                params![id as i64, student.roll_no],
                |row| row.get(0),
            )?;
            if taken {
                return Err(AllocError::Conflict(Conflict::DuplicateRollNo(student.roll_no)));
            }
            tx.execute(
                "INSERT INTO students(id, name, email, roll_no) VALUES (?1, ?2, ?3, ?4)",
                params![id as i64, student.name, student.email, student.roll_no],
            )?;
            tx.commit()?;
            debug!(student_id = id, "student added");
            Ok(id)
        })
    }

    fn add_room(&self, room: NewRoom) -> AllocResult<RoomId> {
        room.validate()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms(number, capacity, occupied) VALUES (?1, ?2, 0)",
                params![room.label, i64::from(room.capacity)],
            )?;
            let id = conn.last_insert_rowid() as RoomId;
            debug!(room_id = id, "room added");
            Ok(id)
        })
    }

    fn allocate(&self, student_id: StudentId, room_id: RoomId) -> AllocResult<bool> {
        self.with_conn(|conn| {
            let tx = immediate(conn)?;
            if !student_exists(&tx, student_id)? {
                return Err(AllocError::NotFound(Missing::Student(student_id)));
            }
            let room = load_room(&tx, room_id)?.ok_or(AllocError::NotFound(Missing::Room(room_id)))?;
            if let Some(current) = allocated_room_id(&tx, student_id)? {
                return Err(AllocError::Conflict(Conflict::AlreadyAllocated {
                    student_id,
                    room_id: current,
                }));
            }
            if !room.is_available() {
                debug!(student_id, room_id, "room full");
                return Ok(false);
            }

            let bumped = tx.execute(
                "UPDATE rooms SET occupied = occupied + 1 WHERE id = ?1 AND occupied < capacity",
                params![room_id as i64],
            )?;
            if bumped != 1 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO allocations(student_id, room_id) VALUES (?1, ?2)",
                params![student_id as i64, room_id as i64],
            )?;
            tx.commit()?;
            debug!(student_id, room_id, "student allocated");
            Ok(true)
        })
    }

    fn deallocate(&self, student_id: StudentId) -> AllocResult<bool> {
        self.with_conn(|conn| {
            let tx = immediate(conn)?;
            let released = release(&tx, student_id)?;
            tx.commit()?;
            Ok(released)
        })
    }

    fn delete_student(&self, student_id: StudentId) -> AllocResult<bool> {
        self.with_conn(|conn| {
            let tx = immediate(conn)?;
            if !student_exists(&tx, student_id)? {
                return Ok(false);
            }
            release(&tx, student_id)?;
            tx.execute("DELETE FROM students WHERE id = ?1", params![student_id as i64])?;
            tx.commit()?;
            debug!(student_id, "student deleted");
            Ok(true)
        })
    }

    fn change_room_label(&self, room_id: RoomId, new_label: &str) -> AllocResult<()> {
        validate_label(new_label)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE rooms SET number = ?1 WHERE id = ?2",
                params![new_label, room_id as i64],
            )?;
            if changed == 0 {
                return Err(AllocError::NotFound(Missing::Room(room_id)));
            }
            Ok(())
        })
    }

    fn get_student(&self, student_id: StudentId) -> AllocResult<Option<Student>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1");
            Ok(conn
                .query_row(&sql, params![student_id as i64], student_from_row)
                .optional()?)
        })
    }

    fn get_all_students(&self) -> AllocResult<Vec<Student>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], student_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn get_all_rooms(&self) -> AllocResult<Vec<Room>> {
        self.with_conn(|conn| query_rooms(conn, ""))
    }

    fn get_available_rooms(&self) -> AllocResult<Vec<Room>> {
        self.with_conn(|conn| query_rooms(conn, "WHERE occupied < capacity"))
    }

    fn get_allocated_room_for_student(&self, student_id: StudentId) -> AllocResult<Option<Room>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT r.id, r.number, r.capacity, r.occupied FROM rooms r \
                     JOIN allocations a ON r.id = a.room_id WHERE a.student_id = ?1",
                    params![student_id as i64],
                    room_from_row,
                )
                .optional()?)
        })
    }

    fn get_all_allocations(&self) -> AllocResult<Vec<Allocation>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT student_id, room_id FROM allocations ORDER BY student_id ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok(Allocation {
                    student_id: row.get::<_, i64>(0)? as StudentId,
                    room_id: row.get::<_, i64>(1)? as RoomId,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn get_room(&self, room_id: RoomId) -> AllocResult<Option<Room>> {
        self.with_conn(|conn| load_room(conn, room_id))
    }
}

fn open_connection(config: &RelationalConfig) -> rusqlite::Result<Connection> {
    let mut flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if config.create_if_missing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(&config.path, flags)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(include_str!("schema.sql"))?;
    Ok(conn)
}

// Takes the write lock up front so the check-then-update in `allocate` cannot
// interleave with another connection's writer.
fn immediate(conn: &mut Connection) -> AllocResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn student_exists(conn: &Connection, student_id: StudentId) -> AllocResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE id = ?1)",
        params![student_id as i64],
        |row| row.get(0),
    )?)
}

fn allocated_room_id(conn: &Connection, student_id: StudentId) -> AllocResult<Option<RoomId>> {
    let room_id: Option<i64> = conn
        .query_row(
            "SELECT room_id FROM allocations WHERE student_id = ?1",
            params![student_id as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(room_id.map(|id| id as RoomId))
}

fn load_room(conn: &Connection, room_id: RoomId) -> AllocResult<Option<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![room_id as i64], room_from_row)
        .optional()?)
}

fn query_rooms(conn: &Connection, filter: &str) -> AllocResult<Vec<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms {filter} ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], room_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn release(conn: &Connection, student_id: StudentId) -> AllocResult<bool> {
    let Some(room_id) = allocated_room_id(conn, student_id)? else {
        return Ok(false);
    };
    conn.execute(
        "UPDATE rooms SET occupied = occupied - 1 WHERE id = ?1 AND occupied > 0",
        params![room_id as i64],
    )?;
    conn.execute(
        "DELETE FROM allocations WHERE student_id = ?1",
        params![student_id as i64],
    )?;
    Ok(true)
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get::<_, i64>(0)? as RoomId,
        label: row.get(1)?,
        capacity: row.get::<_, i64>(2)? as Slots,
        occupied: row.get::<_, i64>(3)? as Slots,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get::<_, i64>(0)? as StudentId,
        name: row.get(1)?,
        email: row.get(2)?,
        roll_no: row.get(3)?,
    })
}
