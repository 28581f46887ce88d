//! Precedence merge
//!
//! Every declared top-level field is resolved against the whole chain:
//!
//! - Scalar and list fields take the value of the first source that has one.
//! - Object fields are merged per leaf; for each leaf the first source (in
//!   chain order) that defines it wins.
//! - Fields no source has are left out; required-field checks happen in
//!   the settings builder.

use std::collections::BTreeMap;

use serde::Serialize;

use super::chain::{Candidate, PrecedenceChain};
use crate::decode::parse_complex;
use crate::error::SettingsResult;
use crate::schema::{Field, Schema};
use crate::value::{deep_merge, RawMap, RawValue};

/// Which source supplied a value, and under which key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub source: String,
    pub key: String,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.source, self.key)
    }
}

/// The raw values resolved for a schema, with their provenance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedMapping {
    values: RawMap,
    provenance: BTreeMap<String, Provenance>,
}

impl MergedMapping {
    pub fn values(&self) -> &RawMap {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    /// Leaf path (dotted) to the source that supplied it
    pub fn provenance(&self) -> &BTreeMap<String, Provenance> {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_parts(self) -> (RawMap, BTreeMap<String, Provenance>) {
        (self.values, self.provenance)
    }
}

/// Merges one chain's answers for every field of a schema
#[derive(Debug, Clone, Copy)]
pub struct PrecedenceResolver<'a> {
    chain: &'a PrecedenceChain,
}

struct Decoded<'a> {
    source: &'a str,
    key: String,
    value: RawValue,
}

impl<'a> PrecedenceResolver<'a> {
    pub fn new(chain: &'a PrecedenceChain) -> Self {
        Self { chain }
    }

    /// Resolve every top-level field of `schema`
    pub fn resolve(&self, schema: &Schema) -> SettingsResult<MergedMapping> {
        let mut merged = MergedMapping::default();
        for field in schema.fields() {
            let candidates = decode_candidates(self.chain.lookup_all(field)?)?;
            let Some(value) = merge_field(field, &candidates) else {
                tracing::debug!(field = %field.name, "no source has field");
                continue;
            };

            for path in value.leaf_paths(&field.name) {
                if let Some(origin) = origin_of(&candidates, &field.name, &path, &value) {
                    merged.provenance.insert(
                        path,
                        Provenance {
                            source: origin.source.to_string(),
                            key: origin.key.clone(),
                        },
                    );
                }
            }
            merged.values.insert(field.name.clone(), value);
        }

        tracing::info!(
            sources = self.chain.len(),
            declared = schema.fields().len(),
            resolved = merged.len(),
            "merged settings sources"
        );
        Ok(merged)
    }
}

/// JSON-decode complex strings; a JSON `null` counts as absent
fn decode_candidates(candidates: Vec<Candidate<'_>>) -> SettingsResult<Vec<Decoded<'_>>> {
    let mut decoded = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Candidate { source, lookup, .. } = candidate;
        let value = match (&lookup.value, lookup.complex) {
            (RawValue::Str(raw), true) => match parse_complex(&lookup.key, raw)? {
                Some(value) => value,
                None => continue,
            },
            _ => lookup.value,
        };
        decoded.push(Decoded {
            source,
            key: lookup.key,
            value,
        });
    }
    Ok(decoded)
}

fn merge_field(field: &Field, candidates: &[Decoded<'_>]) -> Option<RawValue> {
    if field.nested().is_none() {
        return candidates.first().map(|c| c.value.clone());
    }
    // Fold lowest priority first so earlier sources overwrite per leaf
    let mut iter = candidates.iter().rev();
    let mut merged = iter.next()?.value.clone();
    for candidate in iter {
        deep_merge(&mut merged, candidate.value.clone());
    }
    Some(merged)
}

/// First candidate holding the merged value at `path`
fn origin_of<'c, 'a>(
    candidates: &'c [Decoded<'a>],
    root: &str,
    path: &str,
    merged: &RawValue,
) -> Option<&'c Decoded<'a>> {
    let relative = path.strip_prefix(root)?.trim_start_matches('.');
    let expected = value_at(merged, relative)?;
    candidates
        .iter()
        .find(|c| value_at(&c.value, relative) == Some(expected))
}

fn value_at<'v>(value: &'v RawValue, path: &str) -> Option<&'v RawValue> {
    if path.is_empty() {
        return Some(value);
    }
    let mut node = value;
    for segment in path.split('.') {
        node = node.as_map()?.get(segment)?;
    }
    Some(node)
}
