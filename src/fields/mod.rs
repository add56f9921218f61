//! Password-gated fields.
//!
//! Each field in the fixed [`FieldSet`] carries an Argon2id secret hash and a
//! durable `unlocked` flag. The per-field state machine is:
//!
//! - `NoSecret` --set--> `Locked`
//! - `Locked` --verify(match)--> `Unlocked`
//! - `Unlocked` --reset--> `Locked`
//! - `Locked | Unlocked` --clear--> `NoSecret`
//! - `Locked | Unlocked` --set--> `Locked` (secret replaced)
//!
//! Only a successful verification unlocks; only admin actions lock again.

pub mod admin;
pub mod audit;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod id;
pub mod store;

pub use admin::{AdminController, FieldSummary, ResetTarget};
pub use audit::{AuditEntry, AuditEvent, AuditSink, Caller, FileAuditSink, MemoryAuditSink, ValuePolicy};
pub use engine::{UnlockEngine, VerifyOutcome};
pub use error::FieldError;
pub use hasher::{CredentialHasher, HashParams};
pub use id::{FieldId, FieldSet, DEFAULT_FIELD_COUNT, MAX_FIELD_COUNT};
pub use store::FieldStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted record for one field. An empty `secret_hash` means no secret is
/// configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default, alias = "hash")]
    pub secret_hash: String,
    #[serde(default)]
    pub unlocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    NoSecret,
    Locked,
    Unlocked,
}

impl Field {
    #[must_use]
    pub fn locked_with(secret_hash: String) -> Self {
        Self {
            secret_hash,
            unlocked: false,
        }
    }

    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.secret_hash.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> FieldState {
        match (self.has_secret(), self.unlocked) {
            (false, _) => FieldState::NoSecret,
            (true, false) => FieldState::Locked,
            (true, true) => FieldState::Unlocked,
        }
    }
}

/// The whole durable record: every known field id mapped to its state.
pub type FieldMap = BTreeMap<FieldId, Field>;

/// Fresh mapping for a first start: every field present, no secret, locked.
#[must_use]
pub fn initial_map(fields: FieldSet) -> FieldMap {
    fields.iter().map(|id| (id, Field::default())).collect()
}
