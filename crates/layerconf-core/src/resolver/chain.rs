//! Ordered list of settings sources

use crate::error::{SettingsError, SettingsResult};
use crate::schema::Field;
use crate::source::SettingsSource;
use crate::value::FieldLookup;

/// Sources in precedence order, highest priority first
///
/// The order is declared by the caller and never recomputed.
///
/// # Example
///
/// ```
/// use layerconf_core::{EnvSource, OverrideSource, PrecedenceChain, SettingsSource};
///
/// let chain = PrecedenceChain::new(vec![
///     Box::new(OverrideSource::new().set("api_key", "X")),
///     Box::new(EnvSource::from_vars([("API_KEY", "Y")])),
/// ])
/// .unwrap();
/// assert_eq!(chain.names(), vec!["overrides", "env"]);
/// ```
pub struct PrecedenceChain {
    sources: Vec<Box<dyn SettingsSource>>,
}

/// A value one source returned for a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub source: &'a str,
    pub lookup: FieldLookup,
}

impl PrecedenceChain {
    /// Create a chain; at least one source is required
    pub fn new(sources: Vec<Box<dyn SettingsSource>>) -> SettingsResult<Self> {
        if sources.is_empty() {
            return Err(SettingsError::EmptyChain);
        }
        Ok(Self { sources })
    }

    /// Put `source` in front of every other source
    pub fn prepend(&mut self, source: Box<dyn SettingsSource>) {
        self.sources.insert(0, source);
    }

    /// Add `source` behind every other source
    pub fn append(&mut self, source: Box<dyn SettingsSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Box<dyn SettingsSource>] {
        &self.sources
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Query every source for `field`, in chain order.
    ///
    /// No query depends on another's result; every source is asked even
    /// after a value has been found.
    pub fn lookup_all(&self, field: &Field) -> SettingsResult<Vec<Candidate<'_>>> {
        let mut candidates = Vec::new();
        for source in &self.sources {
            let found = source.get(field)?;
            tracing::debug!(
                source = %source.name(),
                field = %field.name,
                found = found.is_some(),
                "queried source"
            );
            if let Some(lookup) = found {
                candidates.push(Candidate {
                    source: source.name(),
                    lookup,
                });
            }
        }
        Ok(candidates)
    }
}

impl std::fmt::Debug for PrecedenceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecedenceChain")
            .field("sources", &self.names())
            .finish()
    }
}
