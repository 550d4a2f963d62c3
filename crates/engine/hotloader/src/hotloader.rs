//! File registry and reload reconciliation
//!
//! The [`Hotloader`] owns the global class and every known [`File`]. Loading
//! a file parses it against the shared graph and then diffs the pass result
//! against what the file produced last time:
//!
//! - variables the file no longer declares are removed from their classes
//! - files no longer reachable from a root through include lists are removed
//!   together with the variables they declared
//!
//! Unchanged declarations keep their identity, so handles held by the host
//! stay valid across reloads.

use crate::class::{Class, ClassRef};
use crate::config::HotloaderConfig;
use crate::file::{File, FileRef};
use crate::parser::Parser;
use crate::variable::VariableRef;
use crate::{Error, Result, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// What reconciliation pruned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    /// Paths of files dropped from the registry, sorted
    pub files: Vec<PathBuf>,
    /// Dotted paths of variables detached from their classes
    pub variables: Vec<String>,
}

impl Removed {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.variables.is_empty()
    }
}

/// Outcome of a successful [`Hotloader::load`]
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Files first seen in an `include` during this pass. They still need
    /// to be loaded by the host.
    pub included: Vec<FileRef>,
    /// Number of variables the file declared
    pub declared: usize,
    pub removed: Removed,
}

/// Runtime for one configuration graph
pub struct Hotloader {
    global: ClassRef,
    files: HashMap<PathBuf, FileRef>,
    config: HotloaderConfig,
}

impl Default for Hotloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Hotloader {
    pub fn new() -> Self {
        Self::with_config(HotloaderConfig::default())
    }

    pub fn with_config(config: HotloaderConfig) -> Self {
        Self {
            global: Class::global(),
            files: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &HotloaderConfig {
        &self.config
    }

    /// The root class every file declares into
    pub fn global(&self) -> ClassRef {
        self.global.clone()
    }

    pub fn get_file(&self, path: impl AsRef<Path>) -> Option<FileRef> {
        self.files.get(path.as_ref()).cloned()
    }

    /// Register a root file. An already known file is promoted to root.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> FileRef {
        let path = path.into();
        match self.files.get(&path) {
            Some(existing) => {
                existing.set_root(true);
                existing.clone()
            }
            None => self.insert_file(path, true),
        }
    }

    pub(crate) fn insert_file(&mut self, path: PathBuf, root: bool) -> FileRef {
        let file = File::new(path.clone(), root);
        self.files.insert(path, file.clone());
        file
    }

    /// Remove a file, its variables, and every file only reachable
    /// through it
    pub fn remove_file(&mut self, file: &FileRef) -> Removed {
        file.set_root(false);
        for other in self.files.values() {
            if !Rc::ptr_eq(other, file) {
                other.forget_include(file);
            }
        }
        self.sweep()
    }

    /// All registered files, sorted by path
    pub fn files(&self) -> Vec<FileRef> {
        let mut files: Vec<FileRef> = self.files.values().cloned().collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));
        files
    }

    /// Included files that have never been loaded
    pub fn pending_files(&self) -> Vec<FileRef> {
        self.files()
            .into_iter()
            .filter(|file| !file.is_root() && !file.is_loaded())
            .collect()
    }

    /// Where an `include` in `including` points
    pub(crate) fn resolve_include_path(&self, including: &Path, requested: &str) -> PathBuf {
        let requested = Path::new(requested);
        if requested.is_absolute() || !self.config.resolve_includes_relative {
            return requested.to_path_buf();
        }
        match including.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(requested),
            _ => requested.to_path_buf(),
        }
    }

    /// Parse `bytes` as the new content of `file` and reconcile.
    ///
    /// On error nothing is reconciled and the file keeps the lists from its
    /// last good pass. Classes, variables and values created before the
    /// error stay in the graph.
    pub fn load(&mut self, file: &FileRef, bytes: &[u8]) -> Result<LoadReport> {
        let path = file.path().to_path_buf();
        let registered = self
            .files
            .get(&path)
            .is_some_and(|known| Rc::ptr_eq(known, file));
        if !registered {
            file.set_root(true);
            self.files.insert(path.clone(), file.clone());
        }

        tracing::debug!("Parsing {} ({} bytes)", path.display(), bytes.len());
        let known: HashSet<PathBuf> = self.files.keys().cloned().collect();
        let pass = match Parser::new(self, file.clone()).parse(bytes) {
            Ok(pass) => pass,
            Err(err) => {
                // files first seen by the failed pass are not referenced by anything
                self.files.retain(|path, _| known.contains(path));
                tracing::warn!("Failed to load {}: {}", path.display(), err);
                return Err(Error::Parse(err));
            }
        };

        let mut removed = Removed::default();
        for variable in file.variables() {
            if pass
                .variables
                .iter()
                .any(|declared| Rc::ptr_eq(declared, &variable))
            {
                continue;
            }
            if self.claimed_elsewhere(file, &variable) {
                continue;
            }
            let variable_path = variable.path();
            if variable.remove() {
                tracing::info!("Removed variable {}", variable_path);
                removed.variables.push(variable_path);
            }
        }

        let declared = pass.variables.len();
        file.commit(pass.variables, pass.includes);

        let swept = self.sweep();
        removed.files = swept.files;
        removed.variables.extend(swept.variables);

        tracing::debug!(
            "Loaded {}: {} variables, {} new includes",
            path.display(),
            declared,
            pass.created.len()
        );
        Ok(LoadReport {
            included: pass.created,
            declared,
            removed,
        })
    }

    /// Variable at a dotted path from the global class
    pub fn lookup(&self, path: &str) -> Option<VariableRef> {
        self.global.find(path)
    }

    /// Look up and evaluate in one step
    pub fn evaluate(&self, path: &str) -> Result<Value> {
        let variable = self
            .lookup(path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        Ok(variable.evaluate_with_depth(self.config.max_eval_depth)?)
    }

    fn claimed_elsewhere(&self, file: &FileRef, variable: &VariableRef) -> bool {
        self.files
            .values()
            .any(|other| !Rc::ptr_eq(other, file) && other.declares(variable))
    }

    /// Drop every file that no root reaches through include lists
    fn sweep(&mut self) -> Removed {
        let mut reachable: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<FileRef> = self
            .files
            .values()
            .filter(|file| file.is_root())
            .cloned()
            .collect();
        while let Some(file) = stack.pop() {
            if reachable.insert(file.path().to_path_buf()) {
                stack.extend(file.includes());
            }
        }

        let mut dead: Vec<FileRef> = self
            .files
            .values()
            .filter(|file| !reachable.contains(file.path()))
            .cloned()
            .collect();
        dead.sort_by(|a, b| a.path().cmp(b.path()));
        for file in &dead {
            self.files.remove(file.path());
        }

        let mut removed = Removed::default();
        for file in dead {
            tracing::info!("Removed file {}", file.path().display());
            for variable in file.detach() {
                if self.files.values().any(|live| live.declares(&variable)) {
                    continue;
                }
                let variable_path = variable.path();
                if variable.remove() {
                    tracing::info!("Removed variable {}", variable_path);
                    removed.variables.push(variable_path);
                }
            }
            removed.files.push(file.path().to_path_buf());
        }
        removed
    }
}

// include lists hold strong references, so cycles need breaking by hand
impl Drop for Hotloader {
    fn drop(&mut self) {
        for file in self.files.values() {
            file.detach();
        }
    }
}

impl std::fmt::Debug for Hotloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hotloader")
            .field("files", &self.files())
            .field("config", &self.config)
            .finish()
    }
}
