//! Request-scoped link policy resolution.

use super::{DeleteAction, LinkPolicySource, PolicyError};
use std::collections::HashMap;

/// Resolves link delete actions for one planning pass.
///
/// The first answer for each `(source type, link type)` pair is memoized, so
/// a plan sees one consistent policy view even if the source is reloaded
/// while planning is in progress.
pub struct LinkPolicyResolver<S: LinkPolicySource> {
    source: S,
    resolved: HashMap<(String, String), DeleteAction>,
}

impl<S: LinkPolicySource> LinkPolicyResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            resolved: HashMap::new(),
        }
    }

    /// Returns the action for a link of `link_type_key` leaving an entity of
    /// `source_type_key`. Unconfigured links resolve to [`DeleteAction::Break`].
    pub fn resolve(
        &mut self,
        source_type_key: &str,
        link_type_key: &str,
    ) -> Result<DeleteAction, PolicyError> {
        let cache_key = (source_type_key.to_string(), link_type_key.to_string());
        if let Some(action) = self.resolved.get(&cache_key) {
            return Ok(*action);
        }

        let action = self
            .source
            .get_policy(source_type_key, link_type_key)?
            .unwrap_or_default();
        self.resolved.insert(cache_key, action);
        Ok(action)
    }

    /// Number of distinct pairs resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::LinkPolicyResolver;
    use crate::policy::{DeleteAction, LinkPolicySource, PolicyError};
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl LinkPolicySource for CountingSource {
        fn get_policy(
            &self,
            _source_type_key: &str,
            link_type_key: &str,
        ) -> Result<Option<DeleteAction>, PolicyError> {
            self.calls.set(self.calls.get() + 1);
            match link_type_key {
                "owns" => Ok(Some(DeleteAction::Cascade)),
                "refers" => Ok(Some(DeleteAction::Break)),
                _ => Ok(None),
            }
        }
    }

    struct DownSource;

    impl LinkPolicySource for DownSource {
        fn get_policy(
            &self,
            source_type_key: &str,
            link_type_key: &str,
        ) -> Result<Option<DeleteAction>, PolicyError> {
            Err(PolicyError::Unavailable {
                source_type_key: source_type_key.to_string(),
                link_type_key: link_type_key.to_string(),
                reason: "not loaded".to_string(),
            })
        }
    }

    #[test]
    fn unknown_link_type_resolves_to_break() {
        let source = CountingSource {
            calls: Cell::new(0),
        };
        let mut resolver = LinkPolicyResolver::new(&source);
        assert_eq!(
            resolver.resolve("ANY", "mystery").unwrap(),
            DeleteAction::Break
        );
        assert_eq!(resolver.resolve("ANY", "owns").unwrap(), DeleteAction::Cascade);
    }

    #[test]
    fn repeated_lookups_hit_the_source_once() {
        let source = CountingSource {
            calls: Cell::new(0),
        };
        let mut resolver = LinkPolicyResolver::new(&source);
        for _ in 0..3 {
            resolver.resolve("A", "owns").unwrap();
            resolver.resolve("A", "refers").unwrap();
        }
        resolver.resolve("B", "owns").unwrap();
        assert_eq!(source.calls.get(), 3);
        assert_eq!(resolver.resolved_count(), 3);
    }

    #[test]
    fn unavailable_source_is_reported() {
        let mut resolver = LinkPolicyResolver::new(DownSource);
        let err = resolver.resolve("A", "owns").unwrap_err();
        assert!(matches!(err, PolicyError::Unavailable { .. }));
    }
}
