use crate::{
    fieldgate::{self, Config},
    fields::{FieldSet, HashParams, ValuePolicy},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{net::IpAddr, path::PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub listen: IpAddr,
    pub store_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub value_policy: ValuePolicy,
    pub field_count: u8,
    pub admin_user: String,
    pub admin_password: SecretString,
    pub hash_params: HashParams,
}

impl Args {
    /// Turn the parsed arguments into a server configuration.
    ///
    /// # Errors
    /// Returns an error if the field count is out of range.
    pub fn into_config(self) -> Result<Config> {
        let fields = FieldSet::new(self.field_count)?;

        Ok(
            Config::new(self.store_path, self.audit_log_path, self.admin_password)
                .with_listen(self.listen, self.port)
                .with_fields(fields)
                .with_value_policy(self.value_policy)
                .with_hash_params(self.hash_params)
                .with_admin_user(self.admin_user),
        )
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the record cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    fieldgate::new(args.into_config()?).await
}

fn log_startup_args(args: &Args) {
    info!(
        listen = %args.listen,
        port = args.port,
        store = %args.store_path.display(),
        audit_log = %args.audit_log_path.display(),
        fields = args.field_count,
        audit_values = args.value_policy.as_str(),
        admin_user = %args.admin_user,
        "Startup configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn args(field_count: u8) -> Args {
        Args {
            port: 8080,
            listen: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            store_path: PathBuf::from("data/fields.json"),
            audit_log_path: PathBuf::from("data/audit.log"),
            value_policy: ValuePolicy::Redacted,
            field_count,
            admin_user: "admin".to_string(),
            admin_password: SecretString::from("hunter2"),
            hash_params: HashParams::default(),
        }
    }

    #[test]
    fn into_config_keeps_listen_address() {
        let config = args(12).into_config();
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.socket_addr().port(), 8080);
        }
    }

    #[test]
    fn into_config_rejects_zero_fields() {
        assert!(args(0).into_config().is_err());
    }
}
