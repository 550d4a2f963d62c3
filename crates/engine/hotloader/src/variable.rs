//! Variables and their accessor flags

use crate::class::{Class, ClassRef};
use crate::config::DEFAULT_MAX_EVAL_DEPTH;
use crate::error::EvalError;
use crate::expression::Expression;
use crate::{Error, Result, Value};
use std::cell::{Cell, RefCell};
use std::ops::{BitOr, BitOrAssign};
use std::rc::{Rc, Weak};

/// Shared handle to a variable. Stays valid across reloads that keep the
/// declaration.
pub type VariableRef = Rc<Variable>;

/// Callback invoked after a new value is committed
pub type ChangeListener = Rc<dyn Fn(&Variable)>;

/// Declaration modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Accessor(u8);

impl Accessor {
    pub const NONE: Accessor = Accessor(0x00);
    /// Only the first successful load assigns the value
    pub const STATIC: Accessor = Accessor(0x01);
    /// Cannot be changed at runtime by the host
    pub const CONST: Accessor = Accessor(0x02);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Accessor) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Accessor {
    type Output = Accessor;

    fn bitor(self, rhs: Accessor) -> Accessor {
        Accessor(self.0 | rhs.0)
    }
}

impl BitOrAssign for Accessor {
    fn bitor_assign(&mut self, rhs: Accessor) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut words = Vec::new();
        if self.contains(Accessor::STATIC) {
            words.push("static");
        }
        if self.contains(Accessor::CONST) {
            words.push("const");
        }
        write!(f, "{}", words.join(" "))
    }
}

/// A named storage cell owned by one class
pub struct Variable {
    name: String,
    class: Weak<Class>,
    accessors: Cell<Accessor>,
    value: RefCell<Option<Rc<Expression>>>,
    listeners: RefCell<Vec<ChangeListener>>,
    placeholder: bool,
}

impl Variable {
    fn build(name: &str, class: &ClassRef, placeholder: bool) -> VariableRef {
        Rc::new(Self {
            name: name.to_string(),
            class: Rc::downgrade(class),
            accessors: Cell::new(Accessor::NONE),
            value: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            placeholder,
        })
    }

    pub(crate) fn new(name: &str, class: &ClassRef) -> VariableRef {
        Self::build(name, class, false)
    }

    /// Throwaway target for redeclarations of a locked STATIC variable.
    /// Linked to `class` for scoping but never stored in it.
    pub(crate) fn placeholder(name: &str, class: &ClassRef) -> VariableRef {
        Self::build(name, class, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning class, if it is still alive
    pub fn class(&self) -> Option<ClassRef> {
        self.class.upgrade()
    }

    /// Dotted path from the global class, e.g. `World.Terrain.seed`
    pub fn path(&self) -> String {
        match self.class().map(|c| c.path()) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn accessors(&self) -> Accessor {
        self.accessors.get()
    }

    pub(crate) fn set_accessors(&self, accessors: Accessor) {
        self.accessors.set(accessors);
    }

    pub fn is_static(&self) -> bool {
        self.accessors().contains(Accessor::STATIC)
    }

    pub fn is_const(&self) -> bool {
        self.accessors().contains(Accessor::CONST)
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn is_assigned(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// The committed expression
    pub fn value(&self) -> Option<Rc<Expression>> {
        self.value.borrow().clone()
    }

    /// Install a finished expression and notify listeners
    pub(crate) fn commit(&self, expression: Expression) {
        *self.value.borrow_mut() = Some(Rc::new(expression));
        if self.placeholder {
            return;
        }
        tracing::trace!("Committed {} = {}", self.path(), self.display_value());

        // cloned so listeners may register further listeners
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(self);
        }
    }

    /// Replace the value from the host side
    pub fn assign(&self, value: impl Into<Value>) -> Result<()> {
        if self.is_const() {
            return Err(Error::ConstAssignment(self.path()));
        }
        self.commit(Expression::literal(value.into()));
        Ok(())
    }

    /// Register a callback for committed values
    pub fn on_change(&self, listener: impl Fn(&Variable) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Evaluate the committed expression, resolving references from the
    /// owning class outwards
    pub fn evaluate(self: &Rc<Self>) -> std::result::Result<Value, EvalError> {
        self.evaluate_with_depth(DEFAULT_MAX_EVAL_DEPTH)
    }

    pub fn evaluate_with_depth(
        self: &Rc<Self>,
        max_depth: usize,
    ) -> std::result::Result<Value, EvalError> {
        evaluate_variable(self, &mut Vec::new(), max_depth)
    }

    /// Detach from the owning class. Returns false if it was not attached.
    pub fn remove(self: &Rc<Self>) -> bool {
        self.class().is_some_and(|class| class.remove_variable(self))
    }

    /// Whether the owning class still stores this exact variable
    pub fn is_attached(self: &Rc<Self>) -> bool {
        self.class()
            .and_then(|class| class.get_variable(&self.name))
            .is_some_and(|stored| Rc::ptr_eq(&stored, self))
    }

    fn display_value(&self) -> String {
        self.value()
            .map(|expression| expression.to_string())
            .unwrap_or_default()
    }
}

fn evaluate_variable(
    variable: &VariableRef,
    stack: &mut Vec<VariableRef>,
    max_depth: usize,
) -> std::result::Result<Value, EvalError> {
    if stack.iter().any(|visited| Rc::ptr_eq(visited, variable)) {
        return Err(EvalError::Cycle(variable.path()));
    }
    if stack.len() >= max_depth {
        return Err(EvalError::DepthExceeded(max_depth));
    }
    let expression = variable
        .value()
        .ok_or_else(|| EvalError::Unassigned(variable.path()))?;
    let scope = variable.class();

    stack.push(variable.clone());
    let result = expression.evaluate_with(&mut |name: &str| {
        let target = scope
            .as_ref()
            .and_then(|class| class.resolve(name))
            .ok_or_else(|| EvalError::Unresolved(name.to_string()))?;
        evaluate_variable(&target, stack, max_depth)
    });
    stack.pop();
    result
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("path", &self.path())
            .field("accessors", &self.accessors())
            .field("value", &self.display_value())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_flags() {
        let mut accessors = Accessor::NONE;
        assert!(accessors.is_empty());
        accessors |= Accessor::STATIC;
        assert!(accessors.contains(Accessor::STATIC));
        assert!(!accessors.contains(Accessor::CONST));
        let both = accessors | Accessor::CONST;
        assert_eq!(both.bits(), 0x03);
        assert_eq!(both.to_string(), "static const");
    }

    #[test]
    fn test_assign_and_listener() {
        let global = Class::global();
        let variable = global.add_variable("speed").unwrap();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        variable.on_change(move |v| {
            assert_eq!(v.name(), "speed");
            seen.set(seen.get() + 1);
        });

        variable.assign(3).unwrap();
        assert_eq!(variable.evaluate(), Ok(Value::Numerical(3)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_const_rejects_host_assignment() {
        let global = Class::global();
        let variable = global.add_variable("limit").unwrap();
        variable.set_accessors(Accessor::CONST);
        assert!(matches!(variable.assign(1), Err(Error::ConstAssignment(_))));
        assert!(!variable.is_assigned());
    }

    #[test]
    fn test_placeholder_is_detached_and_silent() {
        let global = Class::global();
        let placeholder = Variable::placeholder("x", &global);
        placeholder.on_change(|_| panic!("placeholders never notify"));
        placeholder.commit(Expression::literal(Value::from(1)));
        assert!(placeholder.is_placeholder());
        assert!(!placeholder.is_attached());
        assert!(global.get_variable("x").is_none());
    }

    #[test]
    fn test_reference_cycle() {
        let global = Class::global();
        let a = global.add_variable("a").unwrap();
        let b = global.add_variable("b").unwrap();
        let mut expression = Expression::new();
        expression
            .push_operand(
                crate::expression::OperandKind::VariableReference("b".to_string()),
                Default::default(),
            )
            .unwrap();
        a.commit(expression);
        let mut expression = Expression::new();
        expression
            .push_operand(
                crate::expression::OperandKind::VariableReference("a".to_string()),
                Default::default(),
            )
            .unwrap();
        b.commit(expression);

        assert_eq!(a.evaluate(), Err(EvalError::Cycle("a".to_string())));
    }

    #[test]
    fn test_unassigned() {
        let global = Class::global();
        let variable = global.add_variable("empty").unwrap();
        assert_eq!(
            variable.evaluate(),
            Err(EvalError::Unassigned("empty".to_string()))
        );
    }
}
