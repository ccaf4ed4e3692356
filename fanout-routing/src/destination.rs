use std::borrow::Cow;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use fanout_hashring::RingNode;
use thiserror::Error;

/// An addressable endpoint that can receive routed datapoints.
///
/// For configuration purposes a destination is identified by its
/// `(server, instance)` pair, see [`DestinationIdentity`]. The port is an
/// attribute of that identity, not part of it: at most one port is
/// registered per identity at any time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Destination {
    /// Hostname or address of the physical server.
    pub server: String,
    /// Port the destination listens on.
    pub port: u16,
    /// Optional replica/instance label, distinguishing multiple daemons on
    /// the same server.
    pub instance: Option<String>,
}

impl Destination {
    /// Creates a destination without an instance label.
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            instance: None,
        }
    }

    /// Creates a destination with an instance label.
    pub fn with_instance(server: impl Into<String>, port: u16, instance: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            instance: Some(instance.into()),
        }
    }

    /// Returns the `(server, instance)` identity of this destination.
    pub fn identity(&self) -> DestinationIdentity {
        DestinationIdentity {
            server: self.server.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.port)?;
        if let Some(instance) = &self.instance {
            write!(f, ":{instance}")?;
        }
        Ok(())
    }
}

impl FromStr for Destination {
    type Err = ParseDestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');

        let (Some(server), Some(port)) = (parts.next(), parts.next()) else {
            return Err(ParseDestinationError::InvalidFormat(s.to_owned()));
        };
        let instance = parts.next();

        if server.is_empty() || parts.next().is_some() {
            return Err(ParseDestinationError::InvalidFormat(s.to_owned()));
        }

        let port = port
            .parse()
            .map_err(|source| ParseDestinationError::InvalidPort {
                input: s.to_owned(),
                source,
            })?;

        Ok(Self {
            server: server.to_owned(),
            port,
            instance: instance.map(str::to_owned),
        })
    }
}

/// The configuration identity of a [`Destination`]: its `(server, instance)`
/// pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationIdentity {
    /// Hostname or address of the physical server.
    pub server: String,
    /// Optional replica/instance label.
    pub instance: Option<String>,
}

impl DestinationIdentity {
    /// Re-attaches the registered port to form a full [`Destination`].
    pub fn with_port(&self, port: u16) -> Destination {
        Destination {
            server: self.server.clone(),
            port,
            instance: self.instance.clone(),
        }
    }
}

impl fmt::Display for DestinationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}:{}", self.server, instance),
            None => write!(f, "{}", self.server),
        }
    }
}

impl RingNode for DestinationIdentity {
    fn ring_key(&self) -> Cow<'_, str> {
        match &self.instance {
            Some(instance) => Cow::Owned(format!("{}:{}", self.server, instance)),
            None => Cow::Borrowed(&self.server),
        }
    }
}

/// Error returned when parsing a destination string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDestinationError {
    /// The string is not of the form `host:port` or `host:port:instance`.
    #[error("expected `host:port` or `host:port:instance`, got `{0}`")]
    InvalidFormat(String),
    /// The port component is not a valid u16.
    #[error("invalid port in destination `{input}`")]
    InvalidPort {
        /// The full destination string.
        input: String,
        /// The underlying integer parse error.
        #[source]
        source: ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn parses_host_and_port() {
        let destination: Destination = "127.0.0.1:2004".parse().unwrap();
        assert_eq!(destination, Destination::new("127.0.0.1", 2004));
    }

    #[test]
    fn parses_instance_label() {
        let destination: Destination = "cache01:2004:a".parse().unwrap();
        assert_eq!(destination, Destination::with_instance("cache01", 2004, "a"));
    }

    #[test]
    fn display_round_trips() {
        for input in ["127.0.0.1:2004", "cache01:2104:b"] {
            let destination: Destination = input.parse().unwrap();
            assert_eq!(destination.to_string(), input);
        }
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(matches!(
            "cache01".parse::<Destination>(),
            Err(ParseDestinationError::InvalidFormat(_))
        ));
        assert!(matches!(
            ":2004".parse::<Destination>(),
            Err(ParseDestinationError::InvalidFormat(_))
        ));
        assert!(matches!(
            "cache01:2004:a:extra".parse::<Destination>(),
            Err(ParseDestinationError::InvalidFormat(_))
        ));
        assert!(matches!(
            "cache01:not-a-port".parse::<Destination>(),
            Err(ParseDestinationError::InvalidPort { .. })
        ));
    }

    #[test]
    fn identity_ignores_the_port() {
        let a = Destination::with_instance("cache01", 2004, "a");
        let b = Destination::with_instance("cache01", 2104, "a");
        assert_eq!(a.identity(), b.identity());
    }
}
