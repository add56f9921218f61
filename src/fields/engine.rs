//! Public verification path.

use super::{
    audit::{AuditEntry, AuditEvent, AuditSink, Caller, ValuePolicy},
    error::Result,
    hasher::CredentialHasher,
    id::FieldId,
    store::FieldStore,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Correct secret; the field was locked and is now unlocked.
    Unlocked,
    /// Correct secret for a field that was already unlocked. Nothing persisted.
    AlreadyUnlocked,
    Mismatch,
    /// Field has no secret configured. Reported to callers exactly like a
    /// mismatch.
    NoSecret,
}

impl VerifyOutcome {
    #[must_use]
    pub fn ok(self) -> bool {
        matches!(self, Self::Unlocked | Self::AlreadyUnlocked)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::AlreadyUnlocked => "already_unlocked",
            Self::Mismatch => "mismatch",
            Self::NoSecret => "no_secret",
        }
    }
}

pub struct UnlockEngine {
    store: Arc<FieldStore>,
    hasher: CredentialHasher,
    audit: Arc<dyn AuditSink>,
    value_policy: ValuePolicy,
}

impl UnlockEngine {
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

    /// Check `candidate` against the field's secret and unlock on a match.
    ///
    /// A mismatch never changes state, including for fields that are already
    /// unlocked. Every attempt with a known field id is audited.
    ///
    /// # Errors
    /// `InvalidInput` for unknown field ids (before any hashing), `Persistence`
    /// if the record cannot be read or the unlock cannot be saved.
    #[instrument(skip(self, candidate, caller))]
    pub async fn verify(&self, field: &str, candidate: &str, caller: &Caller) -> Result<VerifyOutcome> {
        let id = self.store.fields().parse(field)?;

        let result = self.attempt(id, candidate).await;
        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        self.audit.record(
            AuditEntry::new(AuditEvent::Verify, id, outcome, caller)
                .with_value(self.value_policy.apply(candidate)),
        );

        match &result {
            Ok(VerifyOutcome::Unlocked) => info!(field = %id, "Field unlocked"),
            Ok(outcome) => debug!(field = %id, outcome = outcome.as_str(), "Verification attempt"),
            Err(err) => error!(field = %id, "Verification failed: {err}"),
        }
        result
    }

    async fn attempt(&self, id: FieldId, candidate: &str) -> Result<VerifyOutcome> {
        let map = self.store.load().await?;
        let Some(field) = map.get(&id).filter(|field| field.has_secret()) else {
            self.hasher.verify_decoy_blocking(candidate.to_string()).await;
            return Ok(VerifyOutcome::NoSecret);
        };

        let digest = field.secret_hash.clone();
        if !self
            .hasher
            .verify_blocking(candidate.to_string(), digest.clone())
            .await
        {
            return Ok(VerifyOutcome::Mismatch);
        }
        if field.unlocked {
            return Ok(VerifyOutcome::AlreadyUnlocked);
        }

        self.store
            .update(|map| match map.get_mut(&id) {
                // Secret replaced or cleared while we were hashing.
                Some(current) if current.secret_hash != digest => (VerifyOutcome::Mismatch, false),
                Some(current) if current.unlocked => (VerifyOutcome::AlreadyUnlocked, false),
                Some(current) => {
                    current.unlocked = true;
                    (VerifyOutcome::Unlocked, true)
                }
                None => (VerifyOutcome::NoSecret, false),
            })
            .await
    }

    /// Unlocked flag for every known field.
    ///
    /// # Errors
    /// Returns `Persistence` if the record cannot be read.
    pub async fn status(&self) -> Result<BTreeMap<FieldId, bool>> {
        let map = self.store.load().await?;
        Ok(map.into_iter().map(|(id, field)| (id, field.unlocked)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{
        audit::MemoryAuditSink, error::FieldError, hasher::HashParams, Field, FieldSet,
    };
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<FieldStore>,
        hasher: CredentialHasher,
        audit: Arc<MemoryAuditSink>,
        engine: UnlockEngine,
    }

    fn fixture(policy: ValuePolicy) -> anyhow::Result<Fixture> {
        let dir = TempDir::new()?;
        let store = Arc::new(FieldStore::new(dir.path().join("fields.json"), FieldSet::default()));
        let hasher = CredentialHasher::new(HashParams::insecure_fast())?;
        let audit = Arc::new(MemoryAuditSink::default());
        let engine = UnlockEngine::new(store.clone(), hasher.clone(), audit.clone(), policy);
        Ok(Fixture {
            _dir: dir,
            store,
            hasher,
            audit,
            engine,
        })
    }

    impl Fixture {
        async fn set(&self, field: &str, secret: &str) -> anyhow::Result<FieldId> {
            let id = self.store.fields().parse(field)?;
            let hash = self.hasher.hash(secret)?;
            self.store
                .update(|map| {
                    map.insert(id, Field::locked_with(hash));
                    ((), true)
                })
                .await?;
            Ok(id)
        }
    }

    fn caller() -> Caller {
        Caller {
            ip: Some("198.51.100.1".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn fields_without_secret_never_unlock() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        for candidate in ["", "anything", "hunter2"] {
            let outcome = fx.engine.verify("f1", candidate, &caller()).await?;
            assert_eq!(outcome, VerifyOutcome::NoSecret);
            assert!(!outcome.ok());
        }
        assert!(fx.engine.status().await?.values().all(|unlocked| !unlocked));
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_fields_pay_the_same_hashing_cost() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        fx.set("f1", "hunter2").await?;

        let before = fx.hasher.verifications();
        fx.engine.verify("f1", "guess", &caller()).await?;
        let mismatch_cost = fx.hasher.verifications() - before;

        let before = fx.hasher.verifications();
        assert_eq!(
            fx.engine.verify("f2", "guess", &caller()).await?,
            VerifyOutcome::NoSecret
        );
        let no_secret_cost = fx.hasher.verifications() - before;

        assert_eq!(mismatch_cost, 1);
        assert_eq!(no_secret_cost, mismatch_cost);
        Ok(())
    }

    #[tokio::test]
    async fn correct_secret_unlocks_and_persists() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        let id = fx.set("f1", "hunter2").await?;

        let outcome = fx.engine.verify("f1", "hunter2", &caller()).await?;
        assert_eq!(outcome, VerifyOutcome::Unlocked);
        assert_eq!(fx.engine.status().await?.get(&id), Some(&true));
        Ok(())
    }

    #[tokio::test]
    async fn mismatch_leaves_state_alone() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        let id = fx.set("f2", "right").await?;

        assert_eq!(
            fx.engine.verify("f2", "wrong", &caller()).await?,
            VerifyOutcome::Mismatch
        );
        assert_eq!(fx.engine.status().await?.get(&id), Some(&false));

        fx.engine.verify("f2", "right", &caller()).await?;
        assert_eq!(
            fx.engine.verify("f2", "wrong", &caller()).await?,
            VerifyOutcome::Mismatch
        );
        assert_eq!(fx.engine.status().await?.get(&id), Some(&true));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_correct_submissions_are_idempotent() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        let id = fx.set("f3", "open sesame").await?;

        assert_eq!(
            fx.engine.verify("f3", "open sesame", &caller()).await?,
            VerifyOutcome::Unlocked
        );
        let before = std::fs::metadata(fx.store.path())?.modified()?;
        assert_eq!(
            fx.engine.verify("f3", "open sesame", &caller()).await?,
            VerifyOutcome::AlreadyUnlocked
        );
        let after = std::fs::metadata(fx.store.path())?.modified()?;
        assert_eq!(before, after, "already unlocked fields are not re-persisted");
        assert_eq!(fx.engine.status().await?.get(&id), Some(&true));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_field_is_invalid_input_and_not_audited() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Raw)?;
        let result = fx.engine.verify("f13", "hunter2", &caller()).await;
        assert!(matches!(result, Err(FieldError::InvalidInput(_))));
        assert!(fx.audit.entries().is_empty());
        assert!(!fx.store.path().exists(), "rejected before any state access");
        Ok(())
    }

    #[tokio::test]
    async fn every_attempt_is_audited_with_policy() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Raw)?;
        fx.set("f4", "secret").await?;
        fx.engine.verify("f4", "guess", &caller()).await?;
        fx.engine.verify("f4", "secret", &caller()).await?;

        let entries = fx.audit.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, AuditEvent::Verify);
        assert_eq!(entries[0].field, "f4");
        assert_eq!(entries[0].outcome, "mismatch");
        assert_eq!(entries[0].value.as_deref(), Some("guess"));
        assert_eq!(entries[0].ip.as_deref(), Some("198.51.100.1"));
        assert_eq!(entries[1].outcome, "unlocked");

        let redacted = fixture(ValuePolicy::Redacted)?;
        redacted.engine.verify("f1", "guess", &caller()).await?;
        assert_eq!(redacted.audit.entries()[0].value, None);
        Ok(())
    }

    #[tokio::test]
    async fn unlock_that_cannot_be_saved_is_a_persistence_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        // Readable, but the temp file next to it exceeds NAME_MAX.
        let path = dir.path().join(format!("{}.json", "f".repeat(225)));
        let hasher = CredentialHasher::new(HashParams::insecure_fast())?;
        std::fs::write(
            &path,
            serde_json::json!({ "f1": { "secretHash": hasher.hash("hunter2")?, "unlocked": false } })
                .to_string(),
        )?;
        let store = Arc::new(FieldStore::new(path.clone(), FieldSet::default()));
        let audit = Arc::new(MemoryAuditSink::default());
        let engine = UnlockEngine::new(store.clone(), hasher, audit.clone(), ValuePolicy::Redacted);

        let err = engine.verify("f1", "hunter2", &caller()).await;
        assert!(matches!(err, Err(FieldError::Persistence { .. })));
        assert!(!store.load().await?[&"f1".parse::<FieldId>()?].unlocked);
        assert_eq!(audit.entries()[0].outcome, "error");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_stored_hash_is_a_mismatch() -> anyhow::Result<()> {
        let fx = fixture(ValuePolicy::Redacted)?;
        std::fs::write(fx.store.path(), r#"{"f6": "not-a-phc-hash"}"#)?;
        assert_eq!(
            fx.engine.verify("f6", "not-a-phc-hash", &caller()).await?,
            VerifyOutcome::Mismatch
        );
        Ok(())
    }
}
