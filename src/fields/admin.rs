//! Privileged mutations of the field record.
//!
//! Callers are expected to have passed the admin credential gate already.

use super::{
    audit::{AuditEntry, AuditEvent, AuditSink, Caller, ValuePolicy},
    error::{FieldError, Result},
    hasher::CredentialHasher,
    id::{FieldId, FieldSet, ALL_FIELDS},
    store::FieldStore,
    Field,
};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    One(FieldId),
    All,
}

impl ResetTarget {
    /// Accepts a field id or `"all"`.
    ///
    /// # Errors
    /// Returns `InvalidInput` for anything else.
    pub fn parse(fields: FieldSet, value: &str) -> Result<Self> {
        if value.trim().eq_ignore_ascii_case(ALL_FIELDS) {
            Ok(Self::All)
        } else {
            fields.parse(value).map(Self::One)
        }
    }
}

impl fmt::Display for ResetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(id) => write!(f, "{id}"),
            Self::All => f.write_str(ALL_FIELDS),
        }
    }
}

/// What the admin console may see about a field. Never the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSummary {
    pub has_secret: bool,
    pub unlocked: bool,
}

pub struct AdminController {
    store: Arc<FieldStore>,
    hasher: CredentialHasher,
    audit: Arc<dyn AuditSink>,
    value_policy: ValuePolicy,
}

impl AdminController {
    #[must_use]
    pub fn new(
        store: Arc<FieldStore>,
        hasher: CredentialHasher,
        audit: Arc<dyn AuditSink>,
        value_policy: ValuePolicy,
    ) -> Self {
        Self {
            store,
            hasher,
            audit,
            value_policy,
        }
    }

    #[must_use]
    pub fn fields(&self) -> FieldSet {
        self.store.fields()
    }

    /// Replace the field's secret. Always re-locks the field.
    ///
    /// # Errors
    /// `InvalidInput` for unknown ids or an empty secret, `Hashing` or
    /// `Persistence` if the new record cannot be produced or saved.
    #[instrument(skip(self, secret, caller))]
    pub async fn set_secret(&self, field: &str, secret: &str, caller: &Caller) -> Result<()> {
        let id = self.fields().parse(field)?;
        if secret.is_empty() {
            return Err(FieldError::invalid("password must not be empty"));
        }

        let result = async {
            let hash = self.hasher.hash_blocking(secret.to_string()).await?;
            self.store
                .update(|map| {
                    map.insert(id, Field::locked_with(hash));
                    ((), true)
                })
                .await
        }
        .await;

        self.record(AuditEvent::AdminSet, id, &result, caller);
        result
    }

    /// Lock one field or all of them. Secrets are kept.
    ///
    /// # Errors
    /// `InvalidInput` for anything but a known id or `"all"`, `Persistence` if
    /// the record cannot be saved.
    #[instrument(skip(self, caller))]
    pub async fn reset(&self, target: &str, caller: &Caller) -> Result<()> {
        let target = ResetTarget::parse(self.fields(), target)?;
        self.reset_target(target, caller).await
    }

    /// [`Self::reset`] with an already parsed target.
    ///
    /// # Errors
    /// Returns `Persistence` if the record cannot be saved.
    pub async fn reset_target(&self, target: ResetTarget, caller: &Caller) -> Result<()> {
        let result = self
            .store
            .update(|map| {
                let mut modified = false;
                for (id, field) in map.iter_mut() {
                    if target == ResetTarget::All || target == ResetTarget::One(*id) {
                        modified |= field.unlocked;
                        field.unlocked = false;
                    }
                }
                ((), modified)
            })
            .await;

        self.record(AuditEvent::AdminReset, target, &result, caller);
        result
    }

    /// Lock every field.
    ///
    /// # Errors
    /// Returns `Persistence` if the record cannot be saved.
    pub async fn reset_all(&self, caller: &Caller) -> Result<()> {
        self.reset_target(ResetTarget::All, caller).await
    }

    /// Remove the field's secret and lock it.
    ///
    /// # Errors
    /// `InvalidInput` for unknown ids, `Persistence` if the record cannot be
    /// saved.
    #[instrument(skip(self, caller))]
    pub async fn clear(&self, field: &str, caller: &Caller) -> Result<()> {
        let id = self.fields().parse(field)?;
        let result = self
            .store
            .update(|map| {
                let previous = map.insert(id, Field::default());
                ((), previous.as_ref() != Some(&Field::default()))
            })
            .await;

        self.record(AuditEvent::AdminClear, id, &result, caller);
        result
    }

    /// [`Self::clear`] for every field.
    ///
    /// # Errors
    /// Returns `Persistence` if the record cannot be saved.
    #[instrument(skip(self, caller))]
    pub async fn clear_all(&self, caller: &Caller) -> Result<()> {
        let result = self
            .store
            .update(|map| {
                let modified = map.values().any(|field| *field != Field::default());
                for field in map.values_mut() {
                    *field = Field::default();
                }
                ((), modified)
            })
            .await;

        self.record(AuditEvent::AdminClearAll, ALL_FIELDS, &result, caller);
        result
    }

    /// Dry-run comparison. Never changes state.
    ///
    /// # Errors
    /// `InvalidInput` for unknown ids, `Persistence` if the record cannot be
    /// read.
    #[instrument(skip(self, candidate, caller))]
    pub async fn test_secret(&self, field: &str, candidate: &str, caller: &Caller) -> Result<bool> {
        let id = self.fields().parse(field)?;
        let map = self.store.load().await?;

        let matched = match map.get(&id).filter(|field| field.has_secret()) {
            Some(field) => {
                self.hasher
                    .verify_blocking(candidate.to_string(), field.secret_hash.clone())
                    .await
            }
            None => {
                self.hasher.verify_decoy_blocking(candidate.to_string()).await;
                false
            }
        };

        self.audit.record(
            AuditEntry::new(
                AuditEvent::AdminTest,
                id,
                if matched { "match" } else { "no_match" },
                caller,
            )
            .with_value(self.value_policy.apply(candidate)),
        );
        Ok(matched)
    }

    /// Per-field summary for the admin console.
    ///
    /// # Errors
    /// Returns `Persistence` if the record cannot be read.
    pub async fn read_state(&self) -> Result<BTreeMap<FieldId, FieldSummary>> {
        let map = self.store.load().await?;
        Ok(map
            .into_iter()
            .map(|(id, field)| {
                (
                    id,
                    FieldSummary {
                        has_secret: field.has_secret(),
                        unlocked: field.unlocked,
                    },
                )
            })
            .collect())
    }

    fn record(&self, event: AuditEvent, field: impl fmt::Display, result: &Result<()>, caller: &Caller) {
        match result {
            Ok(()) => {
                info!(field = %field, ?event, "Admin action applied");
                self.audit
                    .record(AuditEntry::new(event, field, "ok", caller));
            }
            Err(err) => {
                warn!(field = %field, ?event, "Admin action failed: {err}");
                self.audit
                    .record(AuditEntry::new(event, field, "error", caller));
            }
        }
    }
}
