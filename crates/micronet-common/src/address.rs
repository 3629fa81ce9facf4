//! Network endpoint addressing.
//!
//! An [`Address`] is an immutable value naming a remote endpoint. It is used
//! as a registry key, so equality and hashing are structural over all four
//! fields: two independently constructed addresses with the same fields are
//! interchangeable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::protocol::error::{MicronetError, Result};

/// The only protocol the bundled transport dials and listens on.
pub const TCP: &str = "tcp";

/// Identifies a network endpoint by protocol, host and port.
///
/// The `name` is diagnostic only; it shows up in logs and error messages.
/// Protocol, host and port must be non-empty before the address is dialed or
/// listened on (see [`Address::validate`]).
///
/// # Example
///
/// ```
/// use micronet_common::Address;
///
/// let a = Address::new("subscriber", "tcp", "localhost", "4321");
/// let b: Address = "tcp://localhost:4321".parse().unwrap();
///
/// assert_eq!(a.endpoint(), b.endpoint());
/// assert_ne!(a, b); // names differ
/// assert_eq!(a, b.with_name("subscriber"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    name: String,
    protocol: String,
    host: String,
    port: String,
}

impl Address {
    /// Creates an address from its four parts.
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            host: host.into(),
            port: port.into(),
        }
    }

    /// Creates an unnamed TCP address.
    pub fn tcp(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self::new("", TCP, host, port)
    }

    /// Returns a copy of this address carrying `name`.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// `host:port`, suitable for socket address resolution.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks that protocol, host and port are all set.
    ///
    /// # Errors
    ///
    /// Returns [`MicronetError::InvalidAddress`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let missing = if self.protocol.is_empty() {
            Some("protocol")
        } else if self.host.is_empty() {
            Some("host")
        } else if self.port.is_empty() {
            Some("port")
        } else {
            None
        };

        match missing {
            Some(field) => Err(MicronetError::InvalidAddress(format!(
                "{} has an empty {}",
                self, field
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
        } else {
            write!(f, "{}({}://{}:{})", self.name, self.protocol, self.host, self.port)
        }
    }
}

/// Parses `protocol://host:port` into an unnamed address.
///
/// IPv6 hosts must be bracketed (`tcp://[::1]:1234`); the brackets are kept
/// so that [`Address::endpoint`] stays resolvable.
impl FromStr for Address {
    type Err = MicronetError;

    fn from_str(s: &str) -> Result<Self> {
        let (protocol, rest) = s.split_once("://").ok_or_else(|| {
            MicronetError::InvalidAddress(format!("'{}' must look like protocol://host:port", s))
        })?;
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
            MicronetError::InvalidAddress(format!("'{}' is missing a port", s))
        })?;

        let address = Address::new("", protocol, host, port);
        address.validate()?;
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashMap;
    use std::hash::{Hash, Hasher};

    fn hash_of(address: &Address) -> u64 {
        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_identical_fields_are_equal_keys() {
        let a = Address::new("sub", "tcp", "localhost", "4321");
        let b = Address::new("sub".to_string(), "tcp".to_string(), "localhost".to_string(), "4321".to_string());

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let mut map = HashMap::new();
        map.insert(a, 1);
        map.insert(b.clone(), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&b], 2);
    }

    #[test]
    fn test_any_field_difference_breaks_equality() {
        let base = Address::new("sub", "tcp", "localhost", "4321");
        assert_ne!(base, base.with_name("other"));
        assert_ne!(base, Address::new("sub", "udp", "localhost", "4321"));
        assert_ne!(base, Address::new("sub", "tcp", "127.0.0.1", "4321"));
        assert_ne!(base, Address::new("sub", "tcp", "localhost", "4322"));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(Address::tcp("localhost", "1234").validate().is_ok());
        assert!(matches!(
            Address::new("x", "", "localhost", "1234").validate(),
            Err(MicronetError::InvalidAddress(msg)) if msg.contains("protocol")
        ));
        assert!(matches!(
            Address::tcp("", "1234").validate(),
            Err(MicronetError::InvalidAddress(msg)) if msg.contains("host")
        ));
        assert!(matches!(
            Address::tcp("localhost", "").validate(),
            Err(MicronetError::InvalidAddress(msg)) if msg.contains("port")
        ));
    }

    #[test]
    fn test_name_is_not_required() {
        assert!(Address::new("", "tcp", "localhost", "1").validate().is_ok());
    }

    #[test]
    fn test_parse() {
        let address: Address = "tcp://127.0.0.1:1234".parse().unwrap();
        assert_eq!(address, Address::tcp("127.0.0.1", "1234"));

        let v6: Address = "tcp://[::1]:9000".parse().unwrap();
        assert_eq!(v6.host(), "[::1]");
        assert_eq!(v6.endpoint(), "[::1]:9000");

        assert!("127.0.0.1:1234".parse::<Address>().is_err());
        assert!("tcp://localhost".parse::<Address>().is_err());
        assert!("tcp://localhost:".parse::<Address>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::tcp("localhost", "1").to_string(), "tcp://localhost:1");
        assert_eq!(
            Address::tcp("localhost", "1").with_name("pub").to_string(),
            "pub(tcp://localhost:1)"
        );
    }

    #[test]
    fn test_serde_round_trip_preserves_key() {
        let address = Address::new("sub", "tcp", "localhost", "4321");
        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value["host"], "localhost");
        let back: Address = serde_json::from_value(value).unwrap();
        assert_eq!(back, address);
    }
}
