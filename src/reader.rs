//! In-memory store of raw OCSF schema definition documents.
//!
//! A [`Reader`] maps canonical, root-relative paths (`/objects/file.json`) to
//! the decoded JSON of each definition file. It is loaded once from a clone
//! of the `ocsf-schema` repository (or built directly from values in tests)
//! and then mutated in place by the merge processor.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::matchers::Matcher;

/// Directory names that are descended into while loading. Subdirectories of
/// these (e.g. `events/network`, `extensions/win`) are descended into too.
pub const TRAVERSABLE_PATHS: &[&str] = &[
    "enums",
    "includes",
    "objects",
    "events",
    "profiles",
    "extensions",
];

/// Options controlling how a schema tree is loaded.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Root of the schema tree.
    pub base_path: PathBuf,

    /// Load documents under `extensions/`.
    pub read_extensions: bool,
}

impl ReaderOptions {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            read_extensions: true,
        }
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Schema documents keyed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct Reader {
    data: BTreeMap<String, Value>,
    base_path: Option<PathBuf>,
}

impl Reader {
    /// Load every `*.json` document from a schema tree.
    ///
    /// Fails with [`Error::InvalidBasePath`] when the root is missing or not
    /// a directory. A file that is not valid JSON aborts the load.
    pub fn load(options: &ReaderOptions) -> Result<Self> {
        let base = options.base_path.as_path();
        if !base.exists() {
            return Err(Error::InvalidBasePath {
                path: base.to_path_buf(),
                reason: "does not exist".to_string(),
            });
        }
        if !base.is_dir() {
            return Err(Error::InvalidBasePath {
                path: base.to_path_buf(),
                reason: "is not a directory".to_string(),
            });
        }

        let read_extensions = options.read_extensions;
        let mut data = BTreeMap::new();

        let walker = WalkDir::new(base)
            .min_depth(1)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| is_traversable(entry, read_extensions));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(base) else {
                continue;
            };

            let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            let value: Value = serde_json::from_str(&content).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

            data.insert(relative_key(relative), value);
        }

        log::info!(
            "loaded {} schema documents from {}",
            data.len(),
            base.display()
        );

        Ok(Self {
            data,
            base_path: Some(base.to_path_buf()),
        })
    }

    /// Build a reader from documents already in memory.
    pub fn from_documents<I, K>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let data = documents
            .into_iter()
            .map(|(k, v)| (Self::key(&[k.as_ref()]), v))
            .collect();
        Self {
            data,
            base_path: None,
        }
    }

    /// Directory the documents were loaded from, if any.
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Join path parts into a canonical key.
    ///
    /// `key(&["extensions", "win", "/profiles/host.json"])` is
    /// `"/extensions/win/profiles/host.json"`.
    pub fn key(parts: &[&str]) -> String {
        let segments: Vec<&str> = parts
            .iter()
            .flat_map(|p| p.split('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        format!("/{}", segments.join("/"))
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.data.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        self.data.get_mut(path)
    }

    /// Look up a document by path parts, e.g. `find(&["objects", "os.json"])`.
    pub fn find(&self, parts: &[&str]) -> Option<&Value> {
        self.data.get(&Self::key(parts))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.data.contains_key(path)
    }

    /// Insert or replace a document.
    pub fn set(&mut self, path: &str, value: Value) {
        self.data.insert(Self::key(&[path]), value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Every path, in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Paths matching `pattern` (all paths when `None`), in sorted order.
    pub fn matching<'a>(&'a self, pattern: Option<&'a Matcher>) -> impl Iterator<Item = &'a str> {
        self.data
            .keys()
            .filter(move |k| pattern.is_none_or(|m| m.is_match(k)))
            .map(String::as_str)
    }

    /// Run `op` on every matching path. `op` may modify the reader.
    pub fn apply<F>(&mut self, mut op: F, pattern: Option<&Matcher>)
    where
        F: FnMut(&mut Reader, &str),
    {
        let keys: Vec<String> = self.matching(pattern).map(str::to_owned).collect();
        for key in &keys {
            op(self, key);
        }
    }

    /// Fold `op` over every matching path.
    pub fn map<A, F>(&self, mut op: F, pattern: Option<&Matcher>, seed: A) -> A
    where
        F: FnMut(&Reader, &str, A) -> A,
    {
        let mut acc = seed;
        for key in self.matching(pattern) {
            acc = op(self, key, acc);
        }
        acc
    }

    /// Names of the immediate children of a virtual directory.
    ///
    /// `ls(None, ..)` lists the root. `dirs` and `files` select which kinds
    /// of children are returned. Names are sorted.
    pub fn ls(&self, path: Option<&str>, dirs: bool, files: bool) -> Vec<String> {
        let base: Vec<&str> = path
            .unwrap_or("/")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let depth = base.len() + 1;

        let mut matched = BTreeSet::new();
        for key in self.data.keys() {
            let parts: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
            if !parts.starts_with(&base) {
                continue;
            }
            if (parts.len() == depth && files) || (parts.len() > depth && dirs) {
                matched.insert(parts[base.len()].to_string());
            }
        }
        matched.into_iter().collect()
    }
}

fn is_traversable(entry: &DirEntry, read_extensions: bool) -> bool {
    if !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name == "extensions" && !read_extensions {
        return false;
    }
    if TRAVERSABLE_PATHS.contains(&&*name) {
        return true;
    }
    entry.depth() > 1
        && entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|parent| TRAVERSABLE_PATHS.iter().any(|t| parent == *t))
}

fn relative_key(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Reader::key(&[&joined])
}
