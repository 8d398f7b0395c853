//! Environment-backed secrets provider.
//!
//! Credentials are referenced by a secret id and resolved at startup from
//! environment variables under a prefix derived from that id
//! (`betpilot-secrets` → `BETPILOT_SECRETS_*`). Passwords and tokens are
//! wrapped in `SecretString` so they never land in logs or debug output.

use anyhow::{Context, Result};
use secrecy::SecretString;

use super::SecretsProvider;

/// The credential bundle the agent consumes once at process start.
pub struct Secrets {
    pub site_username: String,
    pub site_password: SecretString,
    pub proxy: Option<ProxyCredentials>,
    /// Bearer token for the notification webhook, if the gateway requires one.
    pub notify_token: Option<SecretString>,
    /// Bearer token for the scheduler service, if it requires one.
    pub scheduler_token: Option<SecretString>,
}

/// Authenticated forward proxy used for all site traffic.
pub struct ProxyCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl ProxyCredentials {
    /// Proxy URL with embedded credentials, for the HTTP session.
    pub fn url(&self) -> String {
        use secrecy::ExposeSecret;
        format!(
            "http://{}:{}@{}:{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port
        )
    }
}

/// Reads the secret bundle from the process environment.
pub struct EnvSecrets;

impl EnvSecrets {
    fn var(prefix: &str, key: &str) -> Result<String> {
        let name = format!("{prefix}_{key}");
        std::env::var(&name).with_context(|| format!("Environment variable not set: {name}"))
    }

    fn optional_var(prefix: &str, key: &str) -> Option<String> {
        std::env::var(format!("{prefix}_{key}")).ok()
    }
}

impl SecretsProvider for EnvSecrets {
    fn get(&self, secret_id: &str) -> Result<Secrets> {
        let prefix: String = secret_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();

        let proxy = match Self::optional_var(&prefix, "PROXY_HOST") {
            Some(host) => {
                let port = Self::var(&prefix, "PROXY_PORT")?
                    .parse::<u16>()
                    .context("proxy port is not a valid u16")?;
                Some(ProxyCredentials {
                    host,
                    port,
                    username: Self::var(&prefix, "PROXY_USER")?,
                    password: SecretString::new(Self::var(&prefix, "PROXY_PASSWORD")?),
                })
            }
            None => None,
        };

        Ok(Secrets {
            site_username: Self::var(&prefix, "SITE_USERNAME")?,
            site_password: SecretString::new(Self::var(&prefix, "SITE_PASSWORD")?),
            proxy,
            notify_token: Self::optional_var(&prefix, "NOTIFY_TOKEN").map(SecretString::new),
            scheduler_token: Self::optional_var(&prefix, "SCHEDULER_TOKEN").map(SecretString::new),
        })
    }
}
