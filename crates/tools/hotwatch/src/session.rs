//! Disk-backed host for a [`Hotloader`]
//!
//! The library never touches the filesystem itself; this module reads source
//! files, loads the files their includes pull in, and decides what to reload
//! when the watcher reports changes.

use anyhow::{Context, Result};
use hotloader::{FileRef, Hotloader, HotloaderConfig, LoadReport};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Session {
    loader: Hotloader,
}

impl Session {
    pub fn new(config: HotloaderConfig) -> Self {
        Self {
            loader: Hotloader::with_config(config),
        }
    }

    pub fn loader(&self) -> &Hotloader {
        &self.loader
    }

    /// Register `root` and load it together with everything it includes
    pub fn open(&mut self, root: &Path) -> Result<FileRef> {
        let file = self.loader.add_file(root);
        self.load_file(&file)?;
        self.load_pending()?;
        Ok(file)
    }

    pub fn load_file(&mut self, file: &FileRef) -> Result<LoadReport> {
        let path = file.path().display().to_string();
        let bytes = fs::read(file.path()).with_context(|| format!("Failed to read {path}"))?;
        let report = self
            .loader
            .load(file, &bytes)
            .with_context(|| format!("Failed to load {path}"))?;

        for removed in &report.removed.files {
            tracing::info!("{} no longer included", removed.display());
        }
        tracing::debug!("{}: {} variables", path, report.declared);
        Ok(report)
    }

    /// Load included files until none are left. Stops at the first failure;
    /// the failed file stays pending for the next attempt.
    pub fn load_pending(&mut self) -> Result<usize> {
        let mut loaded = 0;
        while let Some(file) = self.loader.pending_files().into_iter().next() {
            self.load_file(&file)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Reload every registered file among `changed`. Failures are logged and
    /// leave the last good graph in place. Returns whether anything reloaded.
    pub fn reload_changed(&mut self, changed: &[PathBuf]) -> bool {
        let changed: HashSet<PathBuf> = changed.iter().map(|path| canonical(path)).collect();
        let mut reloaded = false;

        for file in self.loader.files() {
            if !changed.contains(&canonical(file.path())) {
                continue;
            }
            // an earlier reload in this batch may have dropped it
            if self.loader.get_file(file.path()).is_none() {
                continue;
            }
            tracing::info!("Reloading {}", file.path().display());
            match self.load_file(&file) {
                Ok(_) => reloaded = true,
                Err(err) => tracing::error!("{err:#}"),
            }
        }

        match self.load_pending() {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!("Loaded {count} newly included files");
                reloaded = true;
            }
            Err(err) => tracing::error!("{err:#}"),
        }
        reloaded
    }

    /// Directories holding registered files
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.loader
            .files()
            .iter()
            .filter_map(|file| canonical(file.path()).parent().map(Path::to_path_buf))
            .collect()
    }

    /// The whole graph, or `name = value` lines for the requested paths
    pub fn render(&self, paths: &[String]) -> String {
        if paths.is_empty() {
            return self.loader.global().dump();
        }
        let mut out = String::new();
        for path in paths {
            let _ = match self.loader.evaluate(path) {
                Ok(value) => writeln!(out, "{path} = {value}"),
                Err(err) => writeln!(out, "{path}: {err}"),
            };
        }
        out
    }
}

/// Watcher events carry absolute paths; registered files may be relative
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_open_loads_includes_transitively() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "leaf.hl", "leaf = 1;\n");
        write(dir.path(), "middle.hl", "include \"leaf.hl\"\n");
        let root = write(dir.path(), "main.hl", "include \"middle.hl\"\ntop = leaf + 1;\n");

        let mut session = Session::new(HotloaderConfig::default());
        session.open(&root).unwrap();
        assert!(session.loader().pending_files().is_empty());
        assert_eq!(session.render(&["top".to_string()]), "top = 2\n");
    }

    #[test]
    fn test_render_reports_errors_per_path() {
        let dir = TempDir::new().unwrap();
        let root = write(dir.path(), "main.hl", "a = 1;\nb = a / 0;\n");
        let mut session = Session::new(HotloaderConfig::default());
        session.open(&root).unwrap();

        let out = session.render(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(out, "a = 1\nb: Division by zero\nc: Path not found: c\n");
    }

    #[test]
    fn test_reload_changed_keeps_last_good_graph() {
        let dir = TempDir::new().unwrap();
        let root = write(dir.path(), "main.hl", "speed = 1;\n");
        let mut session = Session::new(HotloaderConfig::default());
        session.open(&root).unwrap();

        write(dir.path(), "main.hl", "speed = 2;\n");
        assert!(session.reload_changed(&[root.clone()]));
        assert_eq!(session.render(&["speed".to_string()]), "speed = 2\n");

        write(dir.path(), "main.hl", "speed = (2;\n");
        assert!(!session.reload_changed(&[root.clone()]));
        assert_eq!(session.render(&["speed".to_string()]), "speed = 2\n");

        let unrelated = dir.path().join("notes.txt");
        assert!(!session.reload_changed(&[unrelated]));
    }

    #[test]
    fn test_reload_picks_up_new_includes() {
        let dir = TempDir::new().unwrap();
        let root = write(dir.path(), "main.hl", "x = 1;\n");
        let mut session = Session::new(HotloaderConfig::default());
        session.open(&root).unwrap();

        write(dir.path(), "extra.hl", "y = 2;\n");
        write(dir.path(), "main.hl", "include \"extra.hl\"\nx = y;\n");
        assert!(session.reload_changed(&[root]));
        assert_eq!(session.render(&["x".to_string()]), "x = 2\n");
        assert_eq!(session.loader().files().len(), 2);
        assert_eq!(session.directories().len(), 1);
    }
}
