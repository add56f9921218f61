pub mod admin;
pub mod hashing;
pub mod logging;
pub mod store;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_LISTEN: &str = "listen";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("fieldgate")
        .about("Password-gated field unlocks")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("FIELDGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LISTEN)
                .short('l')
                .long(ARG_LISTEN)
                .help("Address to bind, IPv4 or IPv6")
                .default_value("::")
                .env("FIELDGATE_LISTEN")
                .value_parser(clap::value_parser!(std::net::IpAddr)),
        );

    let command = store::with_args(command);
    let command = admin::with_args(command);
    let command = hashing::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fields::ValuePolicy;
    use std::{net::IpAddr, path::PathBuf};

    const CLEAR_ENV: [(&str, Option<&str>); 13] = [
        ("FIELDGATE_PORT", None),
        ("FIELDGATE_LISTEN", None),
        ("FIELDGATE_STORE_PATH", None),
        ("FIELDGATE_AUDIT_LOG_PATH", None),
        ("FIELDGATE_AUDIT_SUBMITTED_VALUES", None),
        ("FIELDGATE_FIELD_COUNT", None),
        ("FIELDGATE_ADMIN_USER", None),
        ("FIELDGATE_ADMIN_PASSWORD", None),
        ("FIELDGATE_HASH_MEMORY_KIB", None),
        ("FIELDGATE_HASH_ITERATIONS", None),
        ("FIELDGATE_HASH_PARALLELISM", None),
        ("FIELDGATE_LOG_LEVEL", None),
        ("RUST_LOG", None),
    ];

    // Every variable the command reads, unset unless overridden.
    fn env_with(
        overrides: &[(&'static str, Option<&'static str>)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars = CLEAR_ENV.to_vec();
        for (key, value) in overrides {
            match vars.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = *value,
                None => vars.push((key, *value)),
            }
        }
        vars
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "fieldgate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Password-gated field unlocks".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(CLEAR_ENV, || {
            let matches = new().get_matches_from(vec!["fieldgate", "--admin-password", "s3cret"]);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
            assert_eq!(
                matches.get_one::<IpAddr>(ARG_LISTEN).copied(),
                Some("::".parse().unwrap())
            );
            assert_eq!(
                matches.get_one::<PathBuf>(store::ARG_STORE_PATH).cloned(),
                Some(PathBuf::from("data/fields.json"))
            );
            assert_eq!(
                matches.get_one::<PathBuf>(store::ARG_AUDIT_LOG_PATH).cloned(),
                Some(PathBuf::from("data/audit.log"))
            );
            assert_eq!(
                matches
                    .get_one::<ValuePolicy>(store::ARG_AUDIT_SUBMITTED_VALUES)
                    .copied(),
                Some(ValuePolicy::Redacted)
            );
            assert_eq!(matches.get_one::<u8>(store::ARG_FIELD_COUNT).copied(), Some(12));
            assert_eq!(
                matches.get_one::<String>(admin::ARG_ADMIN_USER).cloned(),
                Some("admin".to_string())
            );
            assert_eq!(
                matches.get_one::<u32>(hashing::ARG_HASH_MEMORY_KIB).copied(),
                Some(19456)
            );
            assert_eq!(matches.get_one::<u32>(hashing::ARG_HASH_ITERATIONS).copied(), Some(2));
            assert_eq!(matches.get_one::<u32>(hashing::ARG_HASH_PARALLELISM).copied(), Some(1));
            assert_eq!(
                matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                Some(0)
            );
        });
    }

    #[test]
    fn test_admin_password_required() {
        temp_env::with_vars(CLEAR_ENV, || {
            let result = new().try_get_matches_from(vec!["fieldgate"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            env_with(&[
                ("FIELDGATE_PORT", Some("9090")),
                ("FIELDGATE_LISTEN", Some("127.0.0.1")),
                ("FIELDGATE_STORE_PATH", Some("/var/lib/fieldgate/fields.json")),
                ("FIELDGATE_AUDIT_SUBMITTED_VALUES", Some("raw")),
                ("FIELDGATE_FIELD_COUNT", Some("20")),
                ("FIELDGATE_ADMIN_USER", Some("root")),
                ("FIELDGATE_ADMIN_PASSWORD", Some("s3cret")),
                ("FIELDGATE_LOG_LEVEL", Some("info")),
            ]),
            || {
                let matches = new().get_matches_from(vec!["fieldgate"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));
                assert_eq!(
                    matches.get_one::<IpAddr>(ARG_LISTEN).copied(),
                    Some("127.0.0.1".parse().unwrap())
                );
                assert_eq!(
                    matches.get_one::<PathBuf>(store::ARG_STORE_PATH).cloned(),
                    Some(PathBuf::from("/var/lib/fieldgate/fields.json"))
                );
                assert_eq!(
                    matches
                        .get_one::<ValuePolicy>(store::ARG_AUDIT_SUBMITTED_VALUES)
                        .copied(),
                    Some(ValuePolicy::Raw)
                );
                assert_eq!(matches.get_one::<u8>(store::ARG_FIELD_COUNT).copied(), Some(20));
                assert_eq!(
                    matches.get_one::<String>(admin::ARG_ADMIN_USER).cloned(),
                    Some("root".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(admin::ARG_ADMIN_PASSWORD).cloned(),
                    Some("s3cret".to_string())
                );
                assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_field_count_out_of_range() {
        temp_env::with_vars(CLEAR_ENV, || {
            for count in ["0", "65"] {
                let result = new().try_get_matches_from(vec![
                    "fieldgate",
                    "--admin-password",
                    "s3cret",
                    "--field-count",
                    count,
                ]);
                assert!(result.is_err(), "field count {count} should be rejected");
            }
        });
    }

    #[test]
    fn test_unknown_value_policy() {
        temp_env::with_vars(CLEAR_ENV, || {
            let result = new().try_get_matches_from(vec![
                "fieldgate",
                "--admin-password",
                "s3cret",
                "--audit-submitted-values",
                "everything",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                env_with(&[
                    ("FIELDGATE_LOG_LEVEL", Some(level)),
                    ("FIELDGATE_ADMIN_PASSWORD", Some("s3cret")),
                ]),
                || {
                    let matches = new().get_matches_from(vec!["fieldgate"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        Some(u8::try_from(index).unwrap())
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5usize {
            temp_env::with_vars(CLEAR_ENV, || {
                let mut args = vec![
                    "fieldgate".to_string(),
                    "--admin-password".to_string(),
                    "s3cret".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(u8::try_from(index).unwrap())
                );
            });
        }
    }
}
