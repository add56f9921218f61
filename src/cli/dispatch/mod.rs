use crate::{
    cli::{
        actions::{server::Args, Action},
        commands::{admin, hashing, store, ARG_LISTEN, ARG_PORT},
    },
    fields::{HashParams, ValuePolicy, DEFAULT_FIELD_COUNT},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{
    net::{IpAddr, Ipv6Addr},
    path::PathBuf,
};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let listen = matches
        .get_one::<IpAddr>(ARG_LISTEN)
        .copied()
        .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));

    let store_path = matches
        .get_one::<PathBuf>(store::ARG_STORE_PATH)
        .cloned()
        .context("missing required argument: --store-path")?;
    let audit_log_path = matches
        .get_one::<PathBuf>(store::ARG_AUDIT_LOG_PATH)
        .cloned()
        .context("missing required argument: --audit-log-path")?;
    let value_policy = matches
        .get_one::<ValuePolicy>(store::ARG_AUDIT_SUBMITTED_VALUES)
        .copied()
        .unwrap_or_default();
    let field_count = matches
        .get_one::<u8>(store::ARG_FIELD_COUNT)
        .copied()
        .unwrap_or(DEFAULT_FIELD_COUNT);

    let admin_user = matches
        .get_one::<String>(admin::ARG_ADMIN_USER)
        .cloned()
        .unwrap_or_else(|| "admin".to_string());
    let admin_password = matches
        .get_one::<String>(admin::ARG_ADMIN_PASSWORD)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --admin-password")?;

    let defaults = HashParams::default();
    let hash_params = HashParams {
        memory_kib: matches
            .get_one::<u32>(hashing::ARG_HASH_MEMORY_KIB)
            .copied()
            .unwrap_or(defaults.memory_kib),
        iterations: matches
            .get_one::<u32>(hashing::ARG_HASH_ITERATIONS)
            .copied()
            .unwrap_or(defaults.iterations),
        parallelism: matches
            .get_one::<u32>(hashing::ARG_HASH_PARALLELISM)
            .copied()
            .unwrap_or(defaults.parallelism),
    };

    Ok(Action::Server(Args {
        port,
        listen,
        store_path,
        audit_log_path,
        value_policy,
        field_count,
        admin_user,
        admin_password,
        hash_params,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_builds_server_args() {
        temp_env::with_vars(
            [
                ("FIELDGATE_ADMIN_PASSWORD", None::<&str>),
                ("FIELDGATE_STORE_PATH", None),
                ("FIELDGATE_AUDIT_SUBMITTED_VALUES", None),
                ("FIELDGATE_HASH_MEMORY_KIB", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "fieldgate",
                    "--port",
                    "9000",
                    "--listen",
                    "127.0.0.1",
                    "--store-path",
                    "/tmp/fields.json",
                    "--audit-submitted-values",
                    "raw",
                    "--admin-password",
                    "s3cret",
                    "--hash-memory-kib",
                    "4096",
                ]);

                let Action::Server(args) = handler(&matches).unwrap();
                assert_eq!(args.port, 9000);
                assert_eq!(args.listen, "127.0.0.1".parse::<IpAddr>().unwrap());
                assert_eq!(args.store_path, PathBuf::from("/tmp/fields.json"));
                assert_eq!(args.value_policy, ValuePolicy::Raw);
                assert_eq!(args.admin_password.expose_secret(), "s3cret");
                assert_eq!(args.hash_params.memory_kib, 4096);
                assert_eq!(args.hash_params.iterations, HashParams::default().iterations);
            },
        );
    }
}
