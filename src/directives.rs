//! Extraction and application of composition directives.
//!
//! | Directive | Key | Merges from |
//! |-----------|-----|-------------|
//! | Extends | `extends` | Base record found by ancestor lookup |
//! | Profiles | `profiles` | Each listed profile |
//! | Include | `$include` (any depth) | Each include target, at the same nested position |
//! | Attributes | `attributes` | Extension then root `dictionary.json`, per attribute |
//!
//! Each [`Extractor`] detects its directive in a document, resolves targets
//! (reporting unresolved ones to the collector without stopping), and merges
//! already-resolved targets into the document.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Collector, Result, ValidationError};
use crate::merge::deep_merge;
use crate::reader::Reader;
use crate::resolver::DependencyResolver;
use crate::type_mapping::{TypeMapping, extension_of};
use crate::types::{
    ATTRIBUTES_KEY, EXTENDS_KEY, INCLUDE_KEY, PROFILES_KEY, SchemaKind, excluded_fields,
};

/// The kinds of composition directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Extends,
    Profiles,
    Include,
    Attributes,
}

impl Directive {
    /// The document key that carries the directive.
    pub fn key(self) -> &'static str {
        match self {
            Directive::Extends => EXTENDS_KEY,
            Directive::Profiles => PROFILES_KEY,
            Directive::Include => INCLUDE_KEY,
            Directive::Attributes => ATTRIBUTES_KEY,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Detects, resolves, and applies one kind of directive.
pub trait Extractor {
    fn directive(&self) -> Directive;

    /// Whether documents of `kind` may carry this directive.
    fn applies_to(&self, kind: SchemaKind) -> bool;

    /// Whether `document` carries this directive.
    fn found_in(&self, document: &Value) -> bool;

    /// Resolve every target of the directive in the document at `path`.
    ///
    /// Unresolved targets are reported to `collector` and left out.
    fn extract_targets(
        &self,
        reader: &Reader,
        types: &TypeMapping,
        path: &str,
        collector: &mut Collector,
    ) -> Result<Vec<String>>;

    /// Merge `targets` (already resolved, already processed) into the
    /// document at `path`.
    fn apply(&self, reader: &mut Reader, types: &TypeMapping, path: &str, targets: &[String]) {
        for target in targets {
            merge_document(reader, types, path, target, &[]);
        }
    }
}

/// Every extractor, in the order their merges are applied.
pub fn extractors() -> [&'static dyn Extractor; 4] {
    [
        &ExtendsExtractor,
        &ProfilesExtractor,
        &IncludeExtractor,
        &AttributesExtractor,
    ]
}

/// `extends`: a single base record looked up through ancestor directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendsExtractor;

const EXTENDABLE: [SchemaKind; 2] = [SchemaKind::Object, SchemaKind::Event];

impl Extractor for ExtendsExtractor {
    fn directive(&self) -> Directive {
        Directive::Extends
    }

    fn applies_to(&self, kind: SchemaKind) -> bool {
        kind.declares(EXTENDS_KEY)
    }

    fn found_in(&self, document: &Value) -> bool {
        document.get(EXTENDS_KEY).is_some()
    }

    fn extract_targets(
        &self,
        reader: &Reader,
        types: &TypeMapping,
        path: &str,
        collector: &mut Collector,
    ) -> Result<Vec<String>> {
        let resolver = DependencyResolver::new(reader);
        let mut targets = Vec::new();

        for base in string_list(reader.get(path).and_then(|d| d.get(EXTENDS_KEY))) {
            let Some(target) = resolver.resolve_base(base, path) else {
                let err = match resolver.resolve_imprecise_base(base, path) {
                    Some(_) => ValidationError::ImpreciseBase {
                        file: path.to_string(),
                        base: base.to_string(),
                    },
                    None => ValidationError::MissingBase {
                        file: path.to_string(),
                        base: base.to_string(),
                    },
                };
                collector.handle(err)?;
                continue;
            };

            if !types.get(&target).is_some_and(|k| EXTENDABLE.contains(&k)) {
                collector.handle(ValidationError::IncludeTypeMismatch {
                    file: path.to_string(),
                    include: target.clone(),
                    expected: SchemaKind::describe_any(&EXTENDABLE),
                    directive: Directive::Extends,
                })?;
            }
            targets.push(target);
        }

        Ok(targets)
    }
}

/// `profiles`: a profile name or list of names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfilesExtractor;

impl Extractor for ProfilesExtractor {
    fn directive(&self) -> Directive {
        Directive::Profiles
    }

    fn applies_to(&self, kind: SchemaKind) -> bool {
        kind.declares(PROFILES_KEY)
    }

    fn found_in(&self, document: &Value) -> bool {
        document.get(PROFILES_KEY).is_some()
    }

    fn extract_targets(
        &self,
        reader: &Reader,
        _types: &TypeMapping,
        path: &str,
        collector: &mut Collector,
    ) -> Result<Vec<String>> {
        let resolver = DependencyResolver::new(reader);
        let mut targets = Vec::new();

        for profile in string_list(reader.get(path).and_then(|d| d.get(PROFILES_KEY))) {
            match resolver.resolve_profile(profile, path) {
                Some(target) => targets.push(target),
                None => collector.handle(ValidationError::MissingProfile {
                    file: path.to_string(),
                    profile: profile.to_string(),
                })?,
            }
        }

        Ok(targets)
    }
}

/// `$include`: allowed at any depth of the document tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeExtractor;

/// One `$include` found in a document: where it sits and what it names.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IncludeSite {
    trail: Vec<String>,
    target: String,
}

impl Extractor for IncludeExtractor {
    fn directive(&self) -> Directive {
        Directive::Include
    }

    fn applies_to(&self, kind: SchemaKind) -> bool {
        // Attribute definitions may carry their own `$include`.
        kind.declares(INCLUDE_KEY) || kind.attribute_map().is_some()
    }

    fn found_in(&self, document: &Value) -> bool {
        has_includes(document)
    }

    fn extract_targets(
        &self,
        reader: &Reader,
        _types: &TypeMapping,
        path: &str,
        collector: &mut Collector,
    ) -> Result<Vec<String>> {
        let resolver = DependencyResolver::new(reader);
        let mut targets = Vec::new();

        for site in include_sites(reader.get(path)) {
            match resolver.resolve_include(&site.target, Some(path)) {
                Some(target) => targets.push(target),
                None => collector.handle(ValidationError::MissingInclude {
                    file: path.to_string(),
                    include: site.target,
                })?,
            }
        }

        Ok(targets)
    }

    fn apply(&self, reader: &mut Reader, types: &TypeMapping, path: &str, targets: &[String]) {
        let resolved: Vec<(Vec<String>, String)> = {
            let resolver = DependencyResolver::new(reader);
            include_sites(reader.get(path))
                .into_iter()
                .filter_map(|site| {
                    let target = resolver.resolve_include(&site.target, Some(path))?;
                    targets.contains(&target).then_some((site.trail, target))
                })
                .collect()
        };

        for (trail, target) in resolved {
            merge_document(reader, types, path, &target, &trail);
        }
    }
}

/// `attributes`: fills attribute stubs from the dictionaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesExtractor;

impl Extractor for AttributesExtractor {
    fn directive(&self) -> Directive {
        Directive::Attributes
    }

    fn applies_to(&self, kind: SchemaKind) -> bool {
        matches!(kind, SchemaKind::Object | SchemaKind::Event)
    }

    /// Every record depends on the dictionaries, since `extends`,
    /// `profiles` and `$include` may bring in attributes it does not list.
    fn found_in(&self, document: &Value) -> bool {
        document.is_object()
    }

    /// The extension dictionary (if any) followed by the root dictionary.
    fn extract_targets(
        &self,
        reader: &Reader,
        _types: &TypeMapping,
        path: &str,
        _collector: &mut Collector,
    ) -> Result<Vec<String>> {
        let mut targets = Vec::new();
        if let Some(extn) = extension_of(path) {
            let local = Reader::key(&["extensions", extn, "dictionary.json"]);
            if reader.contains(&local) {
                targets.push(local);
            }
        }
        let root = Reader::key(&["dictionary.json"]);
        if reader.contains(&root) {
            targets.push(root);
        }
        Ok(targets)
    }

    /// Each dictionary only fills fields still missing, so explicit values
    /// win over the extension dictionary, which wins over the root one.
    fn apply(&self, reader: &mut Reader, types: &TypeMapping, path: &str, targets: &[String]) {
        let Some(attrs_key) = types.get(path).and_then(SchemaKind::attribute_map) else {
            return;
        };

        let names: Vec<String> = match reader.get(path).and_then(|d| d.get(attrs_key)) {
            Some(Value::Object(attrs)) => attrs.keys().cloned().collect(),
            _ => return,
        };

        for target in targets {
            let Some(Value::Object(dictionary)) =
                reader.get(target).and_then(|d| d.get(ATTRIBUTES_KEY))
            else {
                continue;
            };
            let definitions: Vec<(String, Value)> = names
                .iter()
                .filter_map(|name| Some((name.clone(), dictionary.get(name)?.clone())))
                .collect();
            let Some(Value::Object(attrs)) =
                reader.get_mut(path).and_then(|d| d.get_mut(attrs_key))
            else {
                return;
            };

            for (name, definition) in &definitions {
                if let Some(attr) = attrs.get_mut(name) {
                    deep_merge(attr, definition, &[]);
                }
            }
        }
    }
}

/// Merge the document at `target` into the document at `path`.
///
/// With a non-empty `trail`, the value found by following `trail` in the
/// target is merged into the value at the same position in the source. A
/// target lacking that position is merged whole. At the top level, fields
/// the target's kind owns but the source's kind does not declare are
/// excluded.
fn merge_document(
    reader: &mut Reader,
    types: &TypeMapping,
    path: &str,
    target: &str,
    trail: &[String],
) {
    let Some(target_doc) = reader.get(target) else {
        return;
    };
    let other = match follow(target_doc, trail) {
        Some(value) if !trail.is_empty() => value.clone(),
        _ => target_doc.clone(),
    };

    let exclude = match (types.get(path), types.get(target)) {
        (Some(source), Some(owner)) if trail.is_empty() => excluded_fields(source, owner),
        _ => Vec::new(),
    };

    let Some(subject) = reader.get_mut(path).and_then(|d| follow_mut(d, trail)) else {
        return;
    };
    log::debug!("merging {target} into {path} at /{}", trail.join("/"));
    deep_merge(subject, &other, &exclude);
}

fn follow<'v>(value: &'v Value, trail: &[String]) -> Option<&'v Value> {
    trail.iter().try_fold(value, |v, key| v.get(key))
}

fn follow_mut<'v>(value: &'v mut Value, trail: &[String]) -> Option<&'v mut Value> {
    trail.iter().try_fold(value, |v, key| v.get_mut(key))
}

/// A string or list of strings, as directive values are written.
fn string_list(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn has_includes(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k == INCLUDE_KEY || has_includes(v)),
        _ => false,
    }
}

fn include_sites(document: Option<&Value>) -> Vec<IncludeSite> {
    fn walk(value: &Value, trail: &mut Vec<String>, found: &mut Vec<IncludeSite>) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, child) in map {
            if key == INCLUDE_KEY {
                for target in string_list(Some(child)) {
                    found.push(IncludeSite {
                        trail: trail.clone(),
                        target: target.to_string(),
                    });
                }
            } else if child.is_object() {
                trail.push(key.clone());
                walk(child, trail, found);
                trail.pop();
            }
        }
    }

    let mut found = Vec::new();
    if let Some(document) = document {
        walk(document, &mut Vec::new(), &mut found);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup(documents: Vec<(&str, Value)>) -> (Reader, TypeMapping) {
        let reader = Reader::from_documents(documents);
        let types = TypeMapping::new(&reader, &mut Collector::accumulate()).unwrap();
        (reader, types)
    }

    #[test]
    fn include_sites_at_any_depth() {
        let doc = json!({
            "$include": ["includes/a.json", "includes/b.json"],
            "attributes": {
                "$include": "includes/c.json",
                "ip": {"$include": "includes/d.json"}
            },
            "list": [{"$include": "ignored"}]
        });
        let sites = include_sites(Some(&doc));
        let flat: Vec<(String, &str)> = sites
            .iter()
            .map(|s| (s.trail.join("."), s.target.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![
                (String::new(), "includes/a.json"),
                (String::new(), "includes/b.json"),
                ("attributes".to_string(), "includes/c.json"),
                ("attributes.ip".to_string(), "includes/d.json"),
            ]
        );
        assert!(has_includes(&doc));
        assert!(!has_includes(&json!({"attributes": {"ip": {}}})));
    }

    #[test]
    fn extends_reports_missing_and_imprecise() {
        let (reader, types) = setup(vec![
            ("/events/network/a.json", json!({"extends": "nowhere"})),
            ("/events/network/b.json", json!({"extends": "other_base"})),
            ("/events/other/other_base.json", json!({})),
        ]);
        let mut collector = Collector::accumulate();

        let a = ExtendsExtractor
            .extract_targets(&reader, &types, "/events/network/a.json", &mut collector)
            .unwrap();
        let b = ExtendsExtractor
            .extract_targets(&reader, &types, "/events/network/b.json", &mut collector)
            .unwrap();
        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(
            collector.errors(),
            &[
                ValidationError::MissingBase {
                    file: "/events/network/a.json".to_string(),
                    base: "nowhere".to_string()
                },
                ValidationError::ImpreciseBase {
                    file: "/events/network/b.json".to_string(),
                    base: "other_base".to_string()
                },
            ]
        );
    }

    #[test]
    fn extends_resolves_sibling_record() {
        let (reader, types) = setup(vec![
            ("/objects/x.json", json!({"extends": "thing"})),
            ("/objects/thing.json", json!({})),
        ]);
        let mut collector = Collector::accumulate();
        let targets = ExtendsExtractor
            .extract_targets(&reader, &types, "/objects/x.json", &mut collector)
            .unwrap();
        assert_eq!(targets, vec!["/objects/thing.json".to_string()]);
        assert!(collector.is_empty());
    }

    #[test]
    fn extends_into_non_record_is_a_mismatch() {
        let (reader, types) = setup(vec![
            ("/events/x.json", json!({"extends": "dictionary"})),
            ("/events/dictionary.json", json!({})),
        ]);
        let mut collector = Collector::accumulate();
        let targets = ExtendsExtractor
            .extract_targets(&reader, &types, "/events/x.json", &mut collector)
            .unwrap();
        assert_eq!(targets, vec!["/events/dictionary.json".to_string()]);
        assert!(matches!(
            collector.errors(),
            [ValidationError::IncludeTypeMismatch {
                directive: Directive::Extends,
                ..
            }]
        ));
    }

    #[test]
    fn profiles_report_each_missing_entry() {
        let (reader, types) = setup(vec![
            (
                "/objects/x.json",
                json!({"profiles": ["cloud", "gone", "host"]}),
            ),
            ("/profiles/cloud.json", json!({})),
            ("/profiles/host.json", json!({})),
        ]);
        let mut collector = Collector::accumulate();
        let targets = ProfilesExtractor
            .extract_targets(&reader, &types, "/objects/x.json", &mut collector)
            .unwrap();
        assert_eq!(
            targets,
            vec![
                "/profiles/cloud.json".to_string(),
                "/profiles/host.json".to_string()
            ]
        );
        assert_eq!(collector.len(), 1);
        assert!(collector.errors()[0].to_string().contains("gone"));
    }

    #[test]
    fn missing_include_fails_fast() {
        let (reader, types) = setup(vec![(
            "/objects/x.json",
            json!({"attributes": {"$include": "includes/network.json"}}),
        )]);
        let err = IncludeExtractor
            .extract_targets(&reader, &types, "/objects/x.json", &mut Collector::fail_fast())
            .unwrap_err();
        assert!(err.to_string().contains("includes/network.json"));
    }

    #[test]
    fn include_merges_at_nested_position() {
        let (mut reader, types) = setup(vec![
            (
                "/events/x.json",
                json!({"name": "x", "attributes": {"$include": "includes/net.json", "own": {}}}),
            ),
            (
                "/includes/net.json",
                json!({"caption": "Net", "attributes": {"proxy": {"requirement": "optional"}}}),
            ),
        ]);
        IncludeExtractor.apply(
            &mut reader,
            &types,
            "/events/x.json",
            &["/includes/net.json".to_string()],
        );
        let doc = reader.get("/events/x.json").unwrap();
        assert_eq!(doc["attributes"]["proxy"]["requirement"], "optional");
        assert!(doc["attributes"].get("own").is_some());
        assert!(doc.get("caption").is_none());
    }

    #[test]
    fn include_falls_back_to_whole_target() {
        let (mut reader, types) = setup(vec![
            (
                "/objects/x.json",
                json!({"attributes": {"ip": {"$include": "includes/ip.json"}}}),
            ),
            ("/includes/ip.json", json!({"caption": "IP", "type": "ip_t"})),
        ]);
        IncludeExtractor.apply(
            &mut reader,
            &types,
            "/objects/x.json",
            &["/includes/ip.json".to_string()],
        );
        let ip = &reader.get("/objects/x.json").unwrap()["attributes"]["ip"];
        assert_eq!(ip["type"], "ip_t");
        assert_eq!(ip["caption"], "IP");
    }

    #[test]
    fn include_skips_targets_not_accepted() {
        let (mut reader, types) = setup(vec![
            ("/objects/x.json", json!({"$include": "includes/a.json"})),
            ("/includes/a.json", json!({"caption": "A"})),
        ]);
        IncludeExtractor.apply(&mut reader, &types, "/objects/x.json", &[]);
        assert!(reader.get("/objects/x.json").unwrap().get("caption").is_none());
    }

    #[test]
    fn whole_document_merge_excludes_foreign_fields() {
        let (mut reader, types) = setup(vec![
            ("/events/x.json", json!({"name": "x", "attributes": {}})),
            (
                "/profiles/p.json",
                json!({"name": "p", "meta": "profile", "attributes": {"a": {}}}),
            ),
        ]);
        ProfilesExtractor.apply(
            &mut reader,
            &types,
            "/events/x.json",
            &["/profiles/p.json".to_string()],
        );
        let doc = reader.get("/events/x.json").unwrap();
        assert_eq!(doc["name"], "x");
        assert!(doc["attributes"].get("a").is_some());
        assert!(doc.get("meta").is_none());
    }

    #[test]
    fn attributes_fill_from_extension_then_root() {
        let (mut reader, types) = setup(vec![
            (
                "/extensions/win/objects/x.json",
                json!({"attributes": {"a": {"name": "mine"}, "b": {}, "$include": "x"}}),
            ),
            (
                "/extensions/win/dictionary.json",
                json!({"attributes": {"a": {"caption": "Win A"}}}),
            ),
            (
                "/dictionary.json",
                json!({"attributes": {
                    "a": {"caption": "A", "type": "string_t", "name": "a"},
                    "b": {"caption": "B"},
                    "unused": {"caption": "U"}
                }}),
            ),
        ]);
        let path = "/extensions/win/objects/x.json";
        let targets = AttributesExtractor
            .extract_targets(&reader, &types, path, &mut Collector::fail_fast())
            .unwrap();
        assert_eq!(
            targets,
            vec![
                "/extensions/win/dictionary.json".to_string(),
                "/dictionary.json".to_string()
            ]
        );

        AttributesExtractor.apply(&mut reader, &types, path, &targets);
        let attrs = &reader.get(path).unwrap()["attributes"];
        assert_eq!(attrs["a"]["name"], "mine");
        assert_eq!(attrs["a"]["caption"], "Win A");
        assert_eq!(attrs["a"]["type"], "string_t");
        assert_eq!(attrs["b"]["caption"], "B");
        assert!(attrs.get("unused").is_none());
        assert_eq!(attrs["$include"], "x");
    }

    #[test]
    fn attributes_fill_entries_brought_in_by_include() {
        let (mut reader, types) = setup(vec![
            ("/objects/x.json", json!({"$include": "includes/net.json"})),
            ("/includes/net.json", json!({"attributes": {"ip": {}}})),
            ("/dictionary.json", json!({"attributes": {"ip": {"caption": "IP"}}})),
        ]);
        let path = "/objects/x.json";
        let document = reader.get(path).unwrap();
        assert!(AttributesExtractor.found_in(document));
        let targets = AttributesExtractor
            .extract_targets(&reader, &types, path, &mut Collector::fail_fast())
            .unwrap();

        let include = ["/includes/net.json".to_string()];
        IncludeExtractor.apply(&mut reader, &types, path, &include);
        AttributesExtractor.apply(&mut reader, &types, path, &targets);
        assert_eq!(reader.get(path).unwrap()["attributes"]["ip"]["caption"], "IP");
    }

    #[test]
    fn attributes_without_map_are_left_alone() {
        let (mut reader, types) = setup(vec![
            ("/objects/x.json", json!({"name": "x"})),
            ("/dictionary.json", json!({"attributes": {"ip": {"caption": "IP"}}})),
        ]);
        AttributesExtractor.apply(
            &mut reader,
            &types,
            "/objects/x.json",
            &["/dictionary.json".to_string()],
        );
        assert_eq!(reader.get("/objects/x.json").unwrap(), &json!({"name": "x"}));
    }

    #[test]
    fn applicability_follows_field_table() {
        assert!(ExtendsExtractor.applies_to(SchemaKind::Object));
        assert!(!ExtendsExtractor.applies_to(SchemaKind::Profile));
        assert!(ProfilesExtractor.applies_to(SchemaKind::Event));
        assert!(!ProfilesExtractor.applies_to(SchemaKind::Include));
        assert!(IncludeExtractor.applies_to(SchemaKind::Profile));
        assert!(!IncludeExtractor.applies_to(SchemaKind::Version));
        assert!(AttributesExtractor.applies_to(SchemaKind::Object));
        assert!(!AttributesExtractor.applies_to(SchemaKind::Dictionary));
    }
}
