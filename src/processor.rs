//! Dependency graph construction and dependency-first merging.
//!
//! Every directive found in a classified document becomes an edge
//! `(document, target, directive)`. Documents are then processed post-order:
//! each target is fully resolved before it is merged into its dependents,
//! and every document is processed at most once.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::directives::{Directive, extractors};
use crate::error::{Collector, Result, ValidationError};
use crate::reader::Reader;
use crate::type_mapping::TypeMapping;

/// Statistics collected during resolution for reporting.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub documents: usize,
    pub edges: usize,
    pub documents_merged: usize,
    pub edges_skipped: usize,
}

/// Outgoing directive edges, keyed by source path.
#[derive(Debug, Default, Clone)]
pub struct Dependencies {
    edges: BTreeMap<String, Vec<(String, Directive)>>,
}

impl Dependencies {
    /// Scan every classified document for every directive and resolve its
    /// targets. Unresolved targets are reported here, once.
    pub fn build(reader: &Reader, types: &TypeMapping, collector: &mut Collector) -> Result<Self> {
        let mut deps = Self::default();

        for (path, kind) in types.iter() {
            let Some(document) = reader.get(path) else {
                continue;
            };
            for extractor in extractors() {
                if !extractor.applies_to(kind) || !extractor.found_in(document) {
                    continue;
                }
                for target in extractor.extract_targets(reader, types, path, collector)? {
                    deps.add(path, target, extractor.directive());
                }
            }
        }

        log::debug!(
            "built {} edges from {} documents",
            deps.len(),
            deps.edges.len()
        );
        Ok(deps)
    }

    pub fn add(&mut self, path: &str, target: impl Into<String>, directive: Directive) {
        self.edges
            .entry(path.to_string())
            .or_default()
            .push((target.into(), directive));
    }

    /// Edges leaving `path`, in the order they were added.
    pub fn get(&self, path: &str) -> &[(String, Directive)] {
        self.edges.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether `path` has an edge to `target`, optionally under a specific
    /// directive.
    pub fn exists(&self, path: &str, target: &str, directive: Option<Directive>) -> bool {
        self.get(path)
            .iter()
            .any(|(t, d)| t == target && directive.is_none_or(|want| want == *d))
    }

    /// Paths with at least one outgoing edge, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Resolve every directive in the store and, when `mutate` is set, merge
/// each document's targets into it.
///
/// With `mutate == false` the graph is still built and traversed, so
/// unresolved, self-referencing, redundant, and cyclic edges are all
/// reported, but no document changes.
pub fn process_includes(
    reader: &mut Reader,
    types: &TypeMapping,
    collector: &mut Collector,
    mutate: bool,
) -> Result<ResolutionStats> {
    let dependencies = Dependencies::build(reader, types, collector)?;
    let roots: Vec<String> = dependencies.keys().map(str::to_owned).collect();

    let mut processor = Processor {
        reader,
        types,
        collector,
        dependencies: &dependencies,
        mutate,
        fulfilled: BTreeSet::new(),
        in_progress: BTreeSet::new(),
        stats: ResolutionStats::default(),
    };
    for path in &roots {
        processor.process(path)?;
    }

    let mut stats = processor.stats;
    stats.documents = processor.reader.len();
    stats.edges = dependencies.len();
    log::info!(
        "resolved {} edges across {} documents ({} merged, {} skipped)",
        stats.edges,
        stats.documents,
        stats.documents_merged,
        stats.edges_skipped
    );
    Ok(stats)
}

struct Processor<'a> {
    reader: &'a mut Reader,
    types: &'a TypeMapping,
    collector: &'a mut Collector,
    dependencies: &'a Dependencies,
    mutate: bool,
    fulfilled: BTreeSet<String>,
    in_progress: BTreeSet<String>,
    stats: ResolutionStats,
}

impl Processor<'_> {
    fn process(&mut self, path: &str) -> Result<()> {
        if self.fulfilled.contains(path) {
            return Ok(());
        }
        self.in_progress.insert(path.to_string());

        let dependencies = self.dependencies;
        let mut accepted: Vec<(&str, Directive)> = Vec::new();

        for (target, directive) in dependencies.get(path) {
            let skip = if target == path {
                Some(ValidationError::SelfInheritance {
                    file: path.to_string(),
                    target: target.clone(),
                })
            } else if *directive == Directive::Include
                && dependencies.exists(path, target, Some(Directive::Profiles))
            {
                Some(ValidationError::RedundantProfileInclude {
                    file: path.to_string(),
                    target: target.clone(),
                })
            } else if self.in_progress.contains(target) {
                Some(ValidationError::CyclicDependency {
                    file: path.to_string(),
                    target: target.clone(),
                })
            } else {
                None
            };

            if let Some(err) = skip {
                log::debug!("skipping {directive} edge {path} -> {target}");
                self.stats.edges_skipped += 1;
                self.collector.handle(err)?;
                continue;
            }

            self.process(target)?;
            accepted.push((target.as_str(), *directive));
        }

        if self.mutate {
            self.apply(path, &accepted);
        }

        self.in_progress.remove(path);
        self.fulfilled.insert(path.to_string());
        Ok(())
    }

    /// Run the merge of every extractor present in `path`, restricted to
    /// the edges that survived processing.
    fn apply(&mut self, path: &str, accepted: &[(&str, Directive)]) {
        let Some(kind) = self.types.get(path) else {
            return;
        };
        let mut merged = false;

        for extractor in extractors() {
            let present = self
                .reader
                .get(path)
                .is_some_and(|doc| extractor.found_in(doc));
            if !extractor.applies_to(kind) || !present {
                continue;
            }
            let targets: Vec<String> = accepted
                .iter()
                .filter(|(_, d)| *d == extractor.directive())
                .map(|(t, _)| t.to_string())
                .collect();
            if targets.is_empty() {
                continue;
            }
            extractor.apply(self.reader, self.types, path, &targets);
            merged = true;
        }

        if merged {
            self.stats.documents_merged += 1;
        }
    }
}
