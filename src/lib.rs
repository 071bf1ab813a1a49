//! Room allocation bookkeeping: students, finite-capacity rooms, and the
//! one-room-per-student relation, behind interchangeable storage backends.
//!
//! # Examples
//!
//! In-memory usage with [`gateway::memory::InMemoryStore`]:
//! ```
//! use roomalloc::{
//!     engine::AllocationEngine,
//!     error::AllocError,
//!     gateway::{PersistenceGateway, memory::InMemoryStore},
//!     model::{NewRoom, NewStudent},
//! };
//!
//! let engine = AllocationEngine::new(InMemoryStore::new());
//! let room = engine.gateway().add_room(NewRoom::new("R1", 1)).expect("room");
//! let asha = engine
//!     .add_student(NewStudent::new("Asha", "asha@example.com", "101"))
//!     .expect("student");
//! let ravi = engine
//!     .add_student(NewStudent::new("Ravi", "ravi@example.com", "102"))
//!     .expect("student");
//!
//! engine.allocate_room(asha, room).expect("allocate");
//! assert!(matches!(
//!     engine.allocate_room(ravi, room),
//!     Err(AllocError::CapacityExceeded { .. })
//! ));
//! ```
//!
//! Startup with relational backend and in-memory fallback:
//! ```no_run
//! use roomalloc::{
//!     bootstrap::{select_backend, StoreConfig},
//!     engine::AllocationEngine,
//!     runtime::handle::{AllocatorHandle, RuntimeConfig},
//!     policy::AllocationPolicy,
//!     model::NewStudent,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = select_backend(&StoreConfig::default()).expect("backend");
//! let handle = AllocatorHandle::new(AllocationEngine::new(backend), RuntimeConfig::default());
//! let id = handle
//!     .add_student(NewStudent::new("Asha", "asha@example.com", "101"))
//!     .await
//!     .expect("add");
//! let _room = handle
//!     .auto_allocate(id, AllocationPolicy::FirstFit)
//!     .await
//!     .expect("auto allocate");
//! # }
//! ```
#![deny(missing_docs)]

/// One-time backend selection with in-memory fallback.
pub mod bootstrap;
/// Environment configuration.
pub mod config;
/// Allocation rules over a gateway.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Storage abstraction and its two backends.
pub mod gateway;
/// Student, room, and allocation records.
pub mod model;
/// Caller-side automatic room selection.
pub mod policy;
/// Async handle and event stream.
pub mod runtime;
/// Shared primitive types.
pub mod types;
