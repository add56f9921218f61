use clap::{Arg, Command};

pub const ARG_ADMIN_USER: &str = "admin-user";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_USER)
                .long(ARG_ADMIN_USER)
                .help("Username for the admin console (HTTP Basic)")
                .env("FIELDGATE_ADMIN_USER")
                .default_value("admin"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password for the admin console (HTTP Basic)")
                .env("FIELDGATE_ADMIN_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}
