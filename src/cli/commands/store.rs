use crate::fields::{ValuePolicy, MAX_FIELD_COUNT};
use clap::{Arg, Command};

pub const ARG_STORE_PATH: &str = "store-path";
pub const ARG_AUDIT_LOG_PATH: &str = "audit-log-path";
pub const ARG_AUDIT_SUBMITTED_VALUES: &str = "audit-submitted-values";
pub const ARG_FIELD_COUNT: &str = "field-count";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STORE_PATH)
                .long(ARG_STORE_PATH)
                .help("JSON file holding field hashes and unlock flags")
                .env("FIELDGATE_STORE_PATH")
                .default_value("data/fields.json")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new(ARG_AUDIT_LOG_PATH)
                .long(ARG_AUDIT_LOG_PATH)
                .help("Append-only audit log (one JSON object per line)")
                .env("FIELDGATE_AUDIT_LOG_PATH")
                .default_value("data/audit.log")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new(ARG_AUDIT_SUBMITTED_VALUES)
                .long(ARG_AUDIT_SUBMITTED_VALUES)
                .help("Whether submitted candidates are written to the audit log: redacted or raw")
                .env("FIELDGATE_AUDIT_SUBMITTED_VALUES")
                .default_value("redacted")
                .value_parser(clap::value_parser!(ValuePolicy)),
        )
        .arg(
            Arg::new(ARG_FIELD_COUNT)
                .long(ARG_FIELD_COUNT)
                .help("Number of fields, named f1..fN")
                .env("FIELDGATE_FIELD_COUNT")
                .default_value("12")
                .value_parser(clap::value_parser!(u8).range(1..=i64::from(MAX_FIELD_COUNT))),
        )
}
