//! Source files and their include edges

use crate::variable::VariableRef;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Shared handle to a file
pub type FileRef = Rc<File>;

/// A parseable source unit.
///
/// Remembers the variables it declared and the files it included on its last
/// successful pass; the next pass is diffed against these lists.
pub struct File {
    path: PathBuf,
    root: Cell<bool>,
    loaded: Cell<bool>,
    variables: RefCell<Vec<VariableRef>>,
    includes: RefCell<Vec<FileRef>>,
}

impl File {
    pub(crate) fn new(path: PathBuf, root: bool) -> FileRef {
        Rc::new(Self {
            path,
            root: Cell::new(root),
            loaded: Cell::new(false),
            variables: RefCell::new(Vec::new()),
            includes: RefCell::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Added by the host rather than discovered through an include
    pub fn is_root(&self) -> bool {
        self.root.get()
    }

    pub(crate) fn set_root(&self, root: bool) {
        self.root.set(root);
    }

    /// Whether a pass over this file has ever succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Variables declared by the last successful pass
    pub fn variables(&self) -> Vec<VariableRef> {
        self.variables.borrow().clone()
    }

    /// Files included by the last successful pass
    pub fn includes(&self) -> Vec<FileRef> {
        self.includes.borrow().clone()
    }

    pub fn declares(&self, variable: &VariableRef) -> bool {
        self.variables
            .borrow()
            .iter()
            .any(|declared| Rc::ptr_eq(declared, variable))
    }

    pub fn includes_file(&self, file: &FileRef) -> bool {
        self.includes
            .borrow()
            .iter()
            .any(|included| Rc::ptr_eq(included, file))
    }

    /// Store the lists produced by a successful pass
    pub(crate) fn commit(&self, variables: Vec<VariableRef>, includes: Vec<FileRef>) {
        *self.variables.borrow_mut() = variables;
        *self.includes.borrow_mut() = includes;
        self.loaded.set(true);
    }

    pub(crate) fn forget_include(&self, file: &FileRef) {
        self.includes
            .borrow_mut()
            .retain(|included| !Rc::ptr_eq(included, file));
    }

    /// Drop both lists. Breaks include cycles once the file is removed.
    pub(crate) fn detach(&self) -> Vec<VariableRef> {
        self.includes.borrow_mut().clear();
        self.loaded.set(false);
        std::mem::take(&mut *self.variables.borrow_mut())
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let includes: Vec<PathBuf> = self
            .includes
            .borrow()
            .iter()
            .map(|file| file.path.clone())
            .collect();
        let variables: Vec<String> = self
            .variables
            .borrow()
            .iter()
            .map(|variable| variable.path())
            .collect();
        f.debug_struct("File")
            .field("path", &self.path)
            .field("root", &self.is_root())
            .field("loaded", &self.is_loaded())
            .field("variables", &variables)
            .field("includes", &includes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;

    #[test]
    fn test_commit_and_detach() {
        let global = Class::global();
        let variable = global.add_variable("x").unwrap();
        let main = File::new(PathBuf::from("main.hl"), true);
        let other = File::new(PathBuf::from("other.hl"), false);
        assert!(!main.is_loaded());

        main.commit(vec![variable.clone()], vec![other.clone()]);
        assert!(main.is_loaded());
        assert!(main.declares(&variable));
        assert!(main.includes_file(&other));

        main.forget_include(&other);
        assert!(!main.includes_file(&other));

        let dropped = main.detach();
        assert_eq!(dropped.len(), 1);
        assert!(main.variables().is_empty());
        assert!(!main.is_loaded());
    }

    #[test]
    fn test_include_cycle_is_breakable() {
        let a = File::new(PathBuf::from("a.hl"), true);
        let b = File::new(PathBuf::from("b.hl"), false);
        a.commit(Vec::new(), vec![b.clone()]);
        b.commit(Vec::new(), vec![a.clone()]);
        assert_eq!(Rc::strong_count(&a), 2);

        b.detach();
        assert_eq!(Rc::strong_count(&a), 1);
    }
}
