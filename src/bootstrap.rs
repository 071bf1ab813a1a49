//! One-time backend selection at process start.
//!
//! The relational backend is tried first. If it cannot be reached, an
//! in-memory store takes its place for the rest of the process. The two never
//! share state, so the choice is made once, before any entity exists, and is
//! never revisited.

use tracing::{info, warn};

use crate::{
    error::{AllocResult, ErrorKind},
    gateway::{
        Backend, PersistenceGateway,
        memory::InMemoryStore,
        sqlite::{RelationalConfig, RelationalStore},
    },
    model::{DEFAULT_ROOM_CAPACITY, NewRoom},
};

/// Backend selection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Relational backend parameters.
    pub relational: RelationalConfig,
    /// Seed the in-memory fallback with [`default_seed_rooms`].
    pub seed_fallback_rooms: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            relational: RelationalConfig::default(),
            seed_fallback_rooms: true,
        }
    }
}

/// Rooms `R1`..`R4` with the default capacity.
pub fn default_seed_rooms() -> Vec<NewRoom> {
    (1..=4)
        .map(|n| NewRoom::new(format!("R{n}"), DEFAULT_ROOM_CAPACITY))
        .collect()
}

/// Connects the relational backend, or falls back to memory when it is
/// unreachable. Errors other than `Connectivity` are returned unchanged.
pub fn select_backend(config: &StoreConfig) -> AllocResult<Backend> {
    let relational = RelationalStore::new(config.relational.clone());
    match relational.connect() {
        Ok(()) => {
            info!(backend = "relational", "backend selected");
            Ok(Backend::Relational(relational))
        }
        Err(err) if err.kind() == ErrorKind::Connectivity => {
            warn!(error = %err, "relational backend unreachable, falling back to in-memory store");
            let store = if config.seed_fallback_rooms {
                InMemoryStore::with_rooms(default_seed_rooms())?
            } else {
                InMemoryStore::new()
            };
            info!(
                backend = "in-memory",
                seeded = config.seed_fallback_rooms,
                "backend selected"
            );
            Ok(Backend::InMemory(store))
        }
        Err(err) => Err(err),
    }
}
