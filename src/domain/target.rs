use serde::{Deserialize, Serialize};

use super::key::normalize_key;

/// Closed set of monitored environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "staging" | "stage" => Some(Environment::Staging),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one monitored database. Passed by value and never shared as a
/// mutable object across tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub tenant_id: i64,
    pub tenant_code: String,
    pub environment: Environment,
}

impl Target {
    pub fn new(tenant_id: i64, tenant_code: impl Into<String>, environment: Environment) -> Self {
        Self {
            tenant_id,
            tenant_code: tenant_code.into(),
            environment,
        }
    }

    /// Case-insensitive key for the tenant code, used by custom-object
    /// detection.
    pub fn tenant_code_key(&self) -> String {
        normalize_key(&self.tenant_code)
    }
}

/// Everything an `ObjectExtractor` needs to open a transport to one target.
/// The password field is always already decrypted: the orchestrator calls
/// the `CredentialDecryptor` collaborator before building this value.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
}

impl ConnectionDescriptor {
    fn encode(s: &str) -> String {
        let mut encoded = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => encoded.push(c),
                c => {
                    let mut buf = [0u8; 4];
                    let bytes = c.encode_utf8(&mut buf);
                    for byte in bytes.bytes() {
                        encoded.push('%');
                        encoded.push_str(&format!("{:02X}", byte));
                    }
                }
            }
        }
        encoded
    }

    /// Build a `sqlx`-compatible connection URL, same scheme mapping and
    /// percent-encoding as the repository's own connection strings.
    pub fn url(&self) -> String {
        let user = Self::encode(&self.user);
        let password = Self::encode(&self.password);
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                user, password, self.host, self.port, self.database
            ),
            "sqlite" => format!("sqlite://{}", self.database),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                user, password, self.host, self.port, self.database
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trips_through_loose_parser() {
        assert_eq!(Environment::from_str_loose("Production"), Some(Environment::Production));
        assert_eq!(Environment::from_str_loose("dev"), Some(Environment::Development));
        assert_eq!(Environment::from_str_loose("bogus"), None);
    }

    #[test]
    fn tenant_code_key_is_case_insensitive() {
        let t = Target::new(1, "ACME", Environment::Production);
        assert_eq!(t.tenant_code_key(), "acme");
    }

    #[test]
    fn url_encodes_special_characters_in_credentials() {
        let conn = ConnectionDescriptor {
            driver: "postgres".into(),
            host: "localhost".into(),
            port: 5432,
            database: "db".into(),
            user: "user@domain".into(),
            password: "p@ss#1".into(),
            schema: "public".into(),
        };
        let url = conn.url();
        assert!(url.contains("%40"));
        assert!(!url.contains("user@domain"));
    }

    #[test]
    fn url_sqlite_has_no_credentials() {
        let conn = ConnectionDescriptor {
            driver: "sqlite".into(),
            host: String::new(),
            port: 0,
            database: "/data/app.db".into(),
            user: String::new(),
            password: String::new(),
            schema: "main".into(),
        };
        assert_eq!(conn.url(), "sqlite:///data/app.db");
    }
}
