//! Lookup over flat key/value spaces
//!
//! Shared by the environment, dotenv and secrets-directory sources so all
//! three apply the same prefix, case and nesting rules.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::decode::{parse_complex, NestedKeyDecoder};
use crate::error::SettingsResult;
use crate::keys::KeyNormalizer;
use crate::schema::Field;
use crate::value::{deep_merge, FieldLookup, RawMap, RawValue};

/// Key handling options for a flat source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FlatOptions {
    pub keys: KeyNormalizer,
    pub delimiter: Option<String>,
    pub ignore_empty: bool,
}

#[derive(Debug, Clone)]
struct FlatEntry {
    /// Key as it appeared in the source
    key: String,
    value: RawValue,
}

/// Normalized index over a flat key space
#[derive(Debug, Clone)]
pub(crate) struct FlatIndex {
    entries: BTreeMap<String, FlatEntry>,
    decoder: Option<NestedKeyDecoder>,
    keys: KeyNormalizer,
}

impl FlatIndex {
    /// Build the index.
    ///
    /// `vars` must already be in a deterministic order; when two raw keys
    /// normalize to the same key, the later one wins.
    pub fn build(options: &FlatOptions, vars: &[(String, RawValue)]) -> Self {
        let mut entries = BTreeMap::new();
        for (raw_key, value) in vars {
            if options.ignore_empty && matches!(value, RawValue::Str(s) if s.is_empty()) {
                continue;
            }
            if let Some(key) = options.keys.normalize(raw_key) {
                entries.insert(
                    key,
                    FlatEntry {
                        key: raw_key.clone(),
                        value: value.clone(),
                    },
                );
            }
        }
        Self {
            entries,
            decoder: options
                .delimiter
                .as_ref()
                .filter(|d| !d.is_empty())
                .map(|d| NestedKeyDecoder::new(d.clone())),
            keys: options.keys.clone(),
        }
    }

    pub fn lookup(&self, field: &Field) -> SettingsResult<Option<FieldLookup>> {
        let name = self.keys.fold(&field.name);
        let top = self.entries.get(&name);
        let nested = self.exploded(&name, field)?;

        let lookup = match (top, nested) {
            (None, None) => None,
            (Some(entry), None) => {
                let complex = field.is_complex() && matches!(entry.value, RawValue::Str(_));
                Some(FieldLookup::new(entry.value.clone(), entry.key.clone()).complex(complex))
            }
            (None, Some((key, map))) => Some(FieldLookup::new(RawValue::Map(map), key)),
            (Some(entry), Some((_, map))) => {
                // JSON on the top-level key; nested keys override it per leaf
                let mut base = match &entry.value {
                    RawValue::Str(raw) => parse_complex(&entry.key, raw)?
                        .unwrap_or_else(|| RawValue::Map(RawMap::new())),
                    other => other.clone(),
                };
                deep_merge(&mut base, RawValue::Map(map));
                Some(FieldLookup::new(base, entry.key.clone()))
            }
        };
        Ok(lookup)
    }

    /// Decode `<name><delim>...` keys for an object field
    fn exploded(&self, name: &str, field: &Field) -> SettingsResult<Option<(String, RawMap)>> {
        let (Some(decoder), Some(schema)) = (&self.decoder, field.nested()) else {
            return Ok(None);
        };
        let head = format!("{}{}", name, decoder.delimiter());
        let tails: Vec<(&str, &FlatEntry)> = self
            .entries
            .range::<str, _>((Bound::Included(head.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&head))
            .map(|(key, entry)| (&key[head.len()..], entry))
            .collect();
        let Some((first_tail, first)) = tails.first() else {
            return Ok(None);
        };

        let shown = first
            .key
            .get(..first.key.len().saturating_sub(first_tail.len()))
            .unwrap_or(head.as_str());
        let key = format!("{}*", shown);

        let decoded = decoder.decode_for(
            schema,
            &self.keys,
            tails.iter().map(|(tail, entry)| (*tail, entry.value.clone())),
        )?;
        Ok(Some((key, decoded)))
    }
}
