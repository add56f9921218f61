//! # Fieldgate
//!
//! `fieldgate` guards a fixed set of labelled fields (`f1`..`fN`) behind
//! per-field passwords and remembers which ones have been unlocked.
//!
//! ## Unlocking
//!
//! Anyone may submit a candidate for a field. A correct candidate unlocks the
//! field durably; a wrong one changes nothing. Fields without a password can
//! never be unlocked, and callers cannot tell them apart from a wrong guess.
//!
//! ## Administration
//!
//! A single shared admin credential (HTTP Basic) can set, reset, clear and
//! dry-run test passwords. Setting a password always re-locks the field.
//! Every verification attempt and admin action lands in an append-only audit
//! log.
//!
//! ## Storage
//!
//! State lives in one JSON file. Every read goes back to disk and every write
//! is a temp-file-then-rename, so the record survives restarts and crashes and
//! the admin and public surfaces always see each other's writes.

pub mod cli;
pub mod fieldgate;
pub mod fields;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}
