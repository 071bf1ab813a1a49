//! Typed failures shared by every backend and the engine.

use std::fmt;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::types::{RoomId, StudentId};

/// Result alias used across the gateway and engine.
pub type AllocResult<T> = Result<T, AllocError>;

/// Entity referenced by id that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Unknown student id.
    Student(StudentId),
    /// Unknown room id.
    Room(RoomId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student(id) => write!(f, "student {id}"),
            Self::Room(id) => write!(f, "room {id}"),
        }
    }
}

/// Uniqueness rule that a mutation would break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Roll number (and therefore student id) already taken.
    DuplicateRollNo(String),
    /// Student already holds an allocation.
    AlreadyAllocated {
        /// Student being allocated.
        student_id: StudentId,
        /// Room the student already occupies.
        room_id: RoomId,
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRollNo(roll_no) => {
                write!(f, "student with roll number {roll_no} already exists")
            }
            Self::AlreadyAllocated {
                student_id,
                room_id,
            } => write!(f, "student {student_id} is already allocated to room {room_id}"),
        }
    }
}

/// Failure taxonomy for every gateway and engine operation.
#[derive(Debug, Error)]
pub enum AllocError {
    /// Malformed or missing input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Referenced student or room does not exist.
    #[error("{0} not found")]
    NotFound(Missing),

    /// Duplicate roll number or second allocation for one student.
    #[error("{0}")]
    Conflict(Conflict),

    /// Room is full.
    #[error("room {room_id} is full")]
    CapacityExceeded {
        /// Room that rejected the allocation.
        room_id: RoomId,
    },

    /// Backend cannot be reached or was never connected.
    #[error("backend unreachable: {0}")]
    Connectivity(String),

    /// Any other relational failure.
    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    /// Backend reported success with a result that breaks its own contract.
    #[error("inconsistent backend state: {0}")]
    Inconsistent(String),
}

/// Comparable discriminant of [`AllocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`AllocError::Validation`].
    Validation,
    /// See [`AllocError::NotFound`].
    NotFound,
    /// See [`AllocError::Conflict`].
    Conflict,
    /// See [`AllocError::CapacityExceeded`].
    CapacityExceeded,
    /// See [`AllocError::Connectivity`].
    Connectivity,
    /// See [`AllocError::Storage`].
    Storage,
    /// See [`AllocError::Inconsistent`].
    Inconsistent,
}

impl AllocError {
    /// Shorthand for [`AllocError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns the error discriminant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Inconsistent(_) => ErrorKind::Inconsistent,
        }
    }

    /// True when the caller can correct the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation
                | ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::CapacityExceeded
        )
    }
}

impl From<rusqlite::Error> for AllocError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied,
            ) => Self::Connectivity(value.to_string()),
            _ => Self::Storage(value),
        }
    }
}
