//! Student, room, and allocation records plus their validity predicates.

use serde::{Deserialize, Serialize};

use crate::{
    error::{AllocError, AllocResult},
    types::{RoomId, Slots, StudentId},
};

/// Capacity callers fall back to when none is given.
pub const DEFAULT_ROOM_CAPACITY: Slots = 2;

/// Stored student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Numeric value of `roll_no`.
    pub id: StudentId,
    /// Display name, never blank.
    pub name: String,
    /// Contact email, format unrestricted.
    pub email: String,
    /// Roll number as entered.
    pub roll_no: String,
}

/// Insert payload used to create a new [`Student`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Numeric roll number; becomes the student id.
    pub roll_no: String,
}

impl NewStudent {
    /// Builds a payload from borrowed or owned strings.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        roll_no: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            roll_no: roll_no.into(),
        }
    }

    /// Checks the payload and returns the id derived from the roll number.
    pub fn validate(&self) -> AllocResult<StudentId> {
        if self.name.trim().is_empty() {
            return Err(AllocError::validation("name required"));
        }
        parse_roll_no(&self.roll_no)
    }

    pub(crate) fn into_student(self, id: StudentId) -> Student {
        Student {
            id,
            name: self.name,
            email: self.email,
            roll_no: self.roll_no,
        }
    }
}

/// Stored room record. `occupied` is only ever changed by allocation calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Backend-assigned id.
    pub id: RoomId,
    /// Mutable display label.
    pub label: String,
    /// Maximum occupants, at least 1.
    pub capacity: Slots,
    /// Current occupants, `0..=capacity`.
    pub occupied: Slots,
}

impl Room {
    /// True when at least one slot is free.
    pub fn is_available(&self) -> bool {
        self.occupied < self.capacity
    }

    /// Number of free slots.
    pub fn free_slots(&self) -> Slots {
        self.capacity.saturating_sub(self.occupied)
    }

    /// True when `0 <= occupied <= capacity` and capacity is positive.
    pub fn is_consistent(&self) -> bool {
        self.capacity >= 1 && self.occupied <= self.capacity
    }
}

/// Insert payload used to create a new [`Room`]. Rooms always start empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    /// Display label.
    pub label: String,
    /// Maximum occupants.
    pub capacity: Slots,
}

impl NewRoom {
    /// Builds a payload.
    pub fn new(label: impl Into<String>, capacity: Slots) -> Self {
        Self {
            label: label.into(),
            capacity,
        }
    }

    /// Builds a payload with [`DEFAULT_ROOM_CAPACITY`].
    pub fn with_default_capacity(label: impl Into<String>) -> Self {
        Self::new(label, DEFAULT_ROOM_CAPACITY)
    }

    /// Rejects blank labels and zero capacity.
    pub fn validate(&self) -> AllocResult<()> {
        validate_label(&self.label)?;
        if self.capacity < 1 {
            return Err(AllocError::validation("capacity must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn into_room(self, id: RoomId) -> Room {
        Room {
            id,
            label: self.label,
            capacity: self.capacity,
            occupied: 0,
        }
    }
}

/// One entry of the student → room relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocated student.
    pub student_id: StudentId,
    /// Room holding the student.
    pub room_id: RoomId,
}

/// Rejects blank room labels.
pub fn validate_label(label: &str) -> AllocResult<()> {
    if label.trim().is_empty() {
        return Err(AllocError::validation("room label required"));
    }
    Ok(())
}

// Ids must fit an SQLite INTEGER so both backends accept the same range.
fn parse_roll_no(roll_no: &str) -> AllocResult<StudentId> {
    if roll_no.is_empty() {
        return Err(AllocError::validation("roll number required"));
    }
    // One leading `+` is accepted, as in "+12" == 12.
    let digits = roll_no.strip_prefix('+').unwrap_or(roll_no);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AllocError::validation(
            "roll number must be numeric and is used as the student id",
        ));
    }
    let id: StudentId = digits
        .parse()
        .map_err(|_| AllocError::validation("roll number out of range"))?;
    if id == 0 {
        return Err(AllocError::validation("roll number must be positive"));
    }
    if id > i64::MAX as StudentId {
        return Err(AllocError::validation("roll number out of range"));
    }
    Ok(id)
}
