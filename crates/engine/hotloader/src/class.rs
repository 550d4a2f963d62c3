//! Class hierarchy
//!
//! Classes are named namespaces. Each class owns its children through a
//! single name map shared by nested classes and variables, so a class and a
//! variable can never be siblings with the same name. Children point back to
//! their parent with a `Weak` reference.
//!
//! Lookups by [`Class::get_class`] and [`Class::get_variable`] only look at
//! immediate children. Dotted paths (`World.Terrain.seed`) are walked by
//! [`Class::find`], and [`Class::resolve`] additionally falls back to the
//! enclosing scopes, which is how variable references inside expressions are
//! resolved.

use crate::variable::{Variable, VariableRef};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::{Rc, Weak};

/// Shared handle to a class
pub type ClassRef = Rc<Class>;

/// Name of the root class
pub const GLOBAL_CLASS_NAME: &str = "Global";

/// An entry in a class scope
#[derive(Debug, Clone)]
pub enum Member {
    Class(ClassRef),
    Variable(VariableRef),
}

/// A named namespace node
pub struct Class {
    name: String,
    parent: Weak<Class>,
    members: RefCell<HashMap<String, Member>>,
}

impl Class {
    /// Create a detached root class
    pub(crate) fn global() -> ClassRef {
        Rc::new(Self {
            name: GLOBAL_CLASS_NAME.to_string(),
            parent: Weak::new(),
            members: RefCell::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The enclosing class; `None` for the global class
    pub fn parent(&self) -> Option<ClassRef> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Dotted path from the global class. Empty for the global class itself.
    pub fn path(&self) -> String {
        match self.parent() {
            None => String::new(),
            Some(parent) if parent.is_root() => self.name.clone(),
            Some(parent) => format!("{}.{}", parent.path(), self.name),
        }
    }

    /// Get an immediate child class by name
    pub fn get_class(&self, name: &str) -> Option<ClassRef> {
        match self.members.borrow().get(name) {
            Some(Member::Class(class)) => Some(class.clone()),
            _ => None,
        }
    }

    /// Get an immediate child variable by name
    pub fn get_variable(&self, name: &str) -> Option<VariableRef> {
        match self.members.borrow().get(name) {
            Some(Member::Variable(variable)) => Some(variable.clone()),
            _ => None,
        }
    }

    /// Whether any child, class or variable, uses `name`
    pub fn contains(&self, name: &str) -> bool {
        self.members.borrow().contains_key(name)
    }

    /// Create a child class. Returns `None` if the name is already taken.
    pub fn add_class(self: &Rc<Self>, name: &str) -> Option<ClassRef> {
        if self.contains(name) {
            return None;
        }
        let class = Rc::new(Class {
            name: name.to_string(),
            parent: Rc::downgrade(self),
            members: RefCell::new(HashMap::new()),
        });
        self.members
            .borrow_mut()
            .insert(name.to_string(), Member::Class(class.clone()));
        Some(class)
    }

    /// Create a child variable. Returns `None` if the name is already taken.
    pub fn add_variable(self: &Rc<Self>, name: &str) -> Option<VariableRef> {
        if self.contains(name) {
            return None;
        }
        let variable = Variable::new(name, self);
        self.members
            .borrow_mut()
            .insert(name.to_string(), Member::Variable(variable.clone()));
        Some(variable)
    }

    /// Remove `variable` if it is the one stored under its name
    pub fn remove_variable(&self, variable: &VariableRef) -> bool {
        let mut members = self.members.borrow_mut();
        let stored = matches!(
            members.get(variable.name()),
            Some(Member::Variable(existing)) if Rc::ptr_eq(existing, variable)
        );
        if stored {
            members.remove(variable.name());
        }
        stored
    }

    /// Child classes sorted by name
    pub fn classes(&self) -> Vec<ClassRef> {
        let mut classes: Vec<ClassRef> = self
            .members
            .borrow()
            .values()
            .filter_map(|member| match member {
                Member::Class(class) => Some(class.clone()),
                Member::Variable(_) => None,
            })
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes
    }

    /// Child variables sorted by name
    pub fn variables(&self) -> Vec<VariableRef> {
        let mut variables: Vec<VariableRef> = self
            .members
            .borrow()
            .values()
            .filter_map(|member| match member {
                Member::Variable(variable) => Some(variable.clone()),
                Member::Class(_) => None,
            })
            .collect();
        variables.sort_by(|a, b| a.name().cmp(b.name()));
        variables
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Walk a dotted path downwards to a variable.
    ///
    /// A name that itself contains dots is matched before splitting.
    pub fn find(&self, path: &str) -> Option<VariableRef> {
        if let Some(variable) = self.get_variable(path) {
            return Some(variable);
        }
        let (head, rest) = path.split_once('.')?;
        self.get_class(head)?.find(rest)
    }

    /// Walk a dotted path downwards to a class
    pub fn find_class(&self, path: &str) -> Option<ClassRef> {
        if let Some(class) = self.get_class(path) {
            return Some(class);
        }
        let (head, rest) = path.split_once('.')?;
        self.get_class(head)?.find_class(rest)
    }

    /// Find a variable from this scope, then from each enclosing scope
    pub fn resolve(self: &Rc<Self>, path: &str) -> Option<VariableRef> {
        let mut scope = Some(self.clone());
        while let Some(class) = scope {
            if let Some(variable) = class.find(path) {
                return Some(variable);
            }
            scope = class.parent();
        }
        None
    }

    /// Render the subtree as source text, annotating each variable with its
    /// evaluated value
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        for variable in self.variables() {
            let accessors = variable.accessors();
            let prefix = if accessors.is_empty() {
                String::new()
            } else {
                format!("{accessors} ")
            };
            let source = variable
                .value()
                .map(|expression| expression.to_string())
                .unwrap_or_default();
            let evaluated = match variable.evaluate() {
                Ok(value) => value.to_string(),
                Err(err) => format!("error: {err}"),
            };
            let _ = writeln!(
                out,
                "{indent}{prefix}{} = {source};  # {evaluated}",
                variable.name()
            );
        }
        for class in self.classes() {
            let _ = writeln!(out, "{indent}:{}", class.name);
            class.dump_into(out, depth + 1);
            let _ = writeln!(out, "{indent}end");
        }
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.members.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("members", &names)
            .finish()
    }
}
