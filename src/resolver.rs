//! Resolution of directive targets to document paths.
//!
//! Extension-local documents shadow core documents of the same conventional
//! name: a reference made from inside `extensions/<name>/` is looked up under
//! that extension first, then in the core schema.

use crate::reader::Reader;
use crate::type_mapping::extension_of;

/// Turns the textual target of a directive into a path in a [`Reader`].
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'a> {
    reader: &'a Reader,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(reader: &'a Reader) -> Self {
        Self { reader }
    }

    /// Find the target of a `$include` directive.
    ///
    /// For a target `f` referenced from inside extension `extn`, searches:
    ///   extensions/extn/f
    ///   f
    ///   extensions/extn/f.json
    ///   f.json
    pub fn resolve_include(&self, target: &str, relative_to: Option<&str>) -> Option<String> {
        let extension = relative_to.and_then(extension_of);

        candidates(target).into_iter().find_map(|file| {
            if let Some(extn) = extension {
                let key = Reader::key(&["extensions", extn, &file]);
                if self.reader.contains(&key) {
                    return Some(key);
                }
            }
            let key = Reader::key(&[&file]);
            self.reader.contains(&key).then_some(key)
        })
    }

    /// Find the target of a `profiles` entry.
    ///
    /// Tries the entry as an include, then under `profiles/`, then (inside an
    /// extension) as `extensions/extn/profiles/<file name>`.
    pub fn resolve_profile(&self, profile: &str, relative_to: &str) -> Option<String> {
        self.resolve_include(profile, Some(relative_to))
            .or_else(|| self.resolve_include(&format!("profiles/{profile}"), Some(relative_to)))
            .or_else(|| {
                let extn = extension_of(relative_to)?;
                let name = profile.rsplit('/').next().unwrap_or(profile);
                let key = Reader::key(&["extensions", extn, "profiles", &with_json(name)]);
                self.reader.contains(&key).then_some(key)
            })
    }

    /// Find the base record of an `extends` directive.
    ///
    /// For a base `b` extended by `events/activity/thing.json`, searches:
    ///   events/activity/b.json
    ///   events/b.json
    ///
    /// From inside an extension (`extensions/extn/events/activity/thing.json`)
    /// each directory is also tried with the extension prefix removed:
    ///   extensions/extn/events/activity/b.json
    ///   events/activity/b.json
    ///   extensions/extn/events/b.json
    ///   events/b.json
    ///   ...
    ///
    /// The extending document itself is skipped so that an extension record
    /// can patch the core record of the same name. If it is the only match,
    /// it is returned so the caller can report the self-reference.
    pub fn resolve_base(&self, base: &str, relative_to: &str) -> Option<String> {
        let file = with_json(base);
        let extension = extension_of(relative_to);
        let mut found_self = false;

        for dir in ancestors(relative_to) {
            let candidate = Reader::key(&[&dir, &file]);
            if self.reader.contains(&candidate) {
                if candidate != relative_to {
                    return Some(candidate);
                }
                found_self = true;
            }

            if let Some(core_dir) = extension.and_then(|extn| strip_extension(&dir, extn)) {
                let candidate = Reader::key(&[core_dir, &file]);
                if self.reader.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        found_self.then(|| relative_to.to_string())
    }

    /// Look for a base record anywhere near the extending document.
    ///
    /// Walks the same ancestors as [`resolve_base`](Self::resolve_base), and
    /// at each level also checks every subdirectory. The root is never
    /// searched, so a base of another record kind stays missing. A
    /// hit means the base exists but is not where `extends` lookup expects
    /// it. The result is only used for diagnostics, never for merging.
    pub fn resolve_imprecise_base(&self, base: &str, relative_to: &str) -> Option<String> {
        let file = with_json(base);
        for dir in &ancestors(relative_to) {
            let candidate = Reader::key(&[dir, &file]);
            if candidate != relative_to && self.reader.contains(&candidate) {
                return Some(candidate);
            }
            for sibling in self.reader.ls(Some(dir), true, false) {
                let candidate = Reader::key(&[dir, &sibling, &file]);
                if candidate != relative_to && self.reader.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        None
    }
}

fn with_json(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    }
}

fn candidates(target: &str) -> Vec<String> {
    let mut files = vec![target.to_string()];
    if !target.ends_with(".json") {
        files.push(format!("{target}.json"));
    }
    files
}

/// Directories containing `path`, nearest first, excluding the root.
fn ancestors(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let dirs = segments.len().saturating_sub(1);
    (1..=dirs)
        .rev()
        .map(|n| format!("/{}", segments[..n].join("/")))
        .collect()
}

/// `/extensions/extn/events` → `/events`. `None` outside the extension or at
/// its root.
fn strip_extension<'p>(dir: &'p str, extn: &str) -> Option<&'p str> {
    let rest = dir
        .strip_prefix("/extensions/")?
        .strip_prefix(extn)?;
    rest.starts_with('/').then_some(rest)
}
