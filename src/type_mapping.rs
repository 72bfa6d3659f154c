//! Classification of schema documents by path.

use std::collections::BTreeMap;

use crate::error::{Collector, Result, ValidationError};
use crate::matchers::Matcher;
use crate::reader::Reader;
use crate::types::SchemaKind;

/// Order in which classification rules are tried. The first match wins, so
/// e.g. `/extensions/win/dictionary.json` is a dictionary rather than
/// anything else its path might suggest.
const RULE_ORDER: [SchemaKind; 8] = [
    SchemaKind::Version,
    SchemaKind::Dictionary,
    SchemaKind::Categories,
    SchemaKind::Include,
    SchemaKind::Profile,
    SchemaKind::Object,
    SchemaKind::Event,
    SchemaKind::Extension,
];

/// The kind of every classifiable document in a [`Reader`].
#[derive(Debug, Clone)]
pub struct TypeMapping {
    rules: Vec<(Matcher, SchemaKind)>,
    mappings: BTreeMap<String, SchemaKind>,
}

impl TypeMapping {
    /// Classify every document, reporting `UndetectableType` for paths that
    /// match no rule. Unclassified paths are left out of the mapping.
    pub fn new(reader: &Reader, collector: &mut Collector) -> Result<Self> {
        let mut mapping = Self {
            rules: RULE_ORDER.iter().map(|k| (Matcher::kind(*k), *k)).collect(),
            mappings: BTreeMap::new(),
        };
        mapping.update(reader, collector)?;
        Ok(mapping)
    }

    /// Re-classify every document in `reader`.
    pub fn update(&mut self, reader: &Reader, collector: &mut Collector) -> Result<()> {
        self.mappings.clear();
        for path in reader.paths() {
            match self.classify(path) {
                Some(kind) => {
                    self.mappings.insert(path.to_string(), kind);
                }
                None => collector.handle(ValidationError::UndetectableType {
                    file: path.to_string(),
                })?,
            }
        }
        log::debug!("classified {} of {} documents", self.mappings.len(), reader.len());
        Ok(())
    }

    /// The kind a path would be classified as.
    pub fn classify(&self, path: &str) -> Option<SchemaKind> {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.is_match(path))
            .map(|(_, kind)| *kind)
    }

    pub fn get(&self, path: &str) -> Option<SchemaKind> {
        self.mappings.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.mappings.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Classified paths with their kinds, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SchemaKind)> {
        self.mappings.iter().map(|(p, k)| (p.as_str(), *k))
    }
}

/// Name of the extension owning a path, taken from its `extensions/<name>/`
/// segment. Core schema paths have none.
pub fn extension_of(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == "extensions")?;
    segments.next()
}
