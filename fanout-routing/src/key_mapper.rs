//! Routing-key derivation strategies for the consistent hashing router.
//!
//! By default metrics hash on their raw name. A [`KeyMapper`] lets the
//! embedding service route on a derived key instead, e.g. a metric prefix,
//! so that related metrics land on the same destination.
//!
//! Mappers run on the per-datapoint hot path and must be side-effect-free
//! and non-blocking. Custom strategies are injected as trait objects at
//! configuration time; [`resolve`] turns a configuration specifier into one
//! of the built-in strategies and fails fatally on an unknown specifier
//! rather than silently falling back to the identity mapping.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;

/// Maps a metric name to the key it hashes on.
pub trait KeyMapper: Send + Sync {
    /// Derives the routing key for `metric`.
    fn map<'a>(&self, metric: &'a str) -> Cow<'a, str>;
}

impl<F> KeyMapper for F
where
    F: for<'a> Fn(&'a str) -> Cow<'a, str> + Send + Sync,
{
    fn map<'a>(&self, metric: &'a str) -> Cow<'a, str> {
        self(metric)
    }
}

/// The default mapper: metrics hash on their raw name.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKeyMapper;

impl KeyMapper for IdentityKeyMapper {
    fn map<'a>(&self, metric: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(metric)
    }
}

/// Routes on the first `segments` dot-separated segments of the metric name.
///
/// `PrefixKeyMapper::new(2)` maps `servers.web01.cpu.idle` to
/// `servers.web01`, keeping all metrics of one host on one destination.
#[derive(Debug, Clone, Copy)]
pub struct PrefixKeyMapper {
    segments: usize,
}

impl PrefixKeyMapper {
    /// Creates a mapper keeping the first `segments` segments (at least 1).
    pub fn new(segments: usize) -> Self {
        Self {
            segments: segments.max(1),
        }
    }
}

impl KeyMapper for PrefixKeyMapper {
    fn map<'a>(&self, metric: &'a str) -> Cow<'a, str> {
        let end = metric
            .match_indices('.')
            .nth(self.segments - 1)
            .map_or(metric.len(), |(index, _)| index);

        Cow::Borrowed(&metric[..end])
    }
}

/// Error returned by [`resolve`] for a specifier that does not name a
/// built-in key mapper.
///
/// This is a configuration-time error and fatal to configuration
/// application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMapperError {
    /// The specifier does not name a known strategy.
    #[error("unknown key mapper specifier `{0}`")]
    UnknownSpec(String),
    /// A `prefix:<n>` specifier carries an invalid segment count.
    #[error("invalid segment count in key mapper specifier `{0}`")]
    InvalidSegmentCount(String),
}

/// Resolves a configuration specifier to a built-in [`KeyMapper`].
///
/// Supported specifiers are `identity` and `prefix:<n>` where `<n>` is a
/// positive number of leading metric segments to hash on.
pub fn resolve(spec: &str) -> Result<Arc<dyn KeyMapper>, KeyMapperError> {
    if spec == "identity" {
        return Ok(Arc::new(IdentityKeyMapper));
    }

    if let Some(count) = spec.strip_prefix("prefix:") {
        let segments: usize = count
            .parse()
            .map_err(|_| KeyMapperError::InvalidSegmentCount(spec.to_owned()))?;
        if segments == 0 {
            return Err(KeyMapperError::InvalidSegmentCount(spec.to_owned()));
        }
        return Ok(Arc::new(PrefixKeyMapper::new(segments)));
    }

    Err(KeyMapperError::UnknownSpec(spec.to_owned()))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn identity_returns_the_metric() {
        assert_eq!(IdentityKeyMapper.map("servers.web01.cpu"), "servers.web01.cpu");
    }

    #[test]
    fn prefix_keeps_leading_segments() {
        let mapper = PrefixKeyMapper::new(2);
        assert_eq!(mapper.map("servers.web01.cpu.idle"), "servers.web01");
        assert_eq!(mapper.map("servers"), "servers");
    }

    #[test]
    fn functions_are_mappers() {
        fn lowercase(metric: &str) -> Cow<'_, str> {
            Cow::Owned(metric.to_ascii_lowercase())
        }

        assert_eq!(lowercase.map("Servers.Web01"), "servers.web01");
    }

    #[test]
    fn resolve_known_specifiers() {
        assert_eq!(resolve("identity").unwrap().map("a.b"), "a.b");
        assert_eq!(resolve("prefix:1").unwrap().map("a.b"), "a");
    }

    #[test]
    fn resolve_rejects_unknown_specifiers() {
        assert_eq!(
            resolve("plugins/keyfunc.py:graphite_key").err().unwrap(),
            KeyMapperError::UnknownSpec("plugins/keyfunc.py:graphite_key".to_owned())
        );
        assert_eq!(
            resolve("prefix:0").err().unwrap(),
            KeyMapperError::InvalidSegmentCount("prefix:0".to_owned())
        );
        assert_eq!(
            resolve("prefix:x").err().unwrap(),
            KeyMapperError::InvalidSegmentCount("prefix:x".to_owned())
        );
    }
}
