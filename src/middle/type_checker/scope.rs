use hashbrown::HashMap;

use crate::{frontend::intern::InternedSymbol, middle::ty::{OutputType, Type}};

#[derive(Debug, Clone)]
pub enum Binding {
    Variable(Type),
    /// `type T = ...;`
    TypeName(Type),
    /// A view and the outputs declared directly in its body
    View(Vec<(String, OutputType)>),
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<InternedSymbol, Binding>,
    /// Variables bound outside a barrier are invisible inside it. Types and
    /// views still resolve through it.
    barrier: bool,
}

#[derive(Debug)]
pub struct ScopeStack {
    global_scope: HashMap<InternedSymbol, Binding>,
    stack: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            global_scope: HashMap::new(),
            stack: vec![Scope::default()],
        }
    }

    /// Creates a new block or function scope
    pub fn push_shallow_scope(&mut self) {
        self.stack.push(Scope::default());
    }

    /// Creates a scope that hides the variables of its enclosing scopes
    pub fn push_barrier_scope(&mut self) {
        self.stack.push(Scope {
            bindings: HashMap::new(),
            barrier: true,
        });
    }

    /// Destroys the current scope. The outermost program scope is never popped.
    pub fn pop_shallow_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Looks for a binding only within the current (most nested) scope
    pub fn get_shallow_binding(&self, symbol: InternedSymbol) -> Option<&Binding> {
        self.stack.last().and_then(|scope| scope.bindings.get(&symbol))
    }

    /// Adds a binding only within the current (most nested) scope
    pub fn add_shallow_binding(&mut self, symbol: InternedSymbol, binding: Binding) {
        if let Some(scope) = self.stack.last_mut() {
            scope.bindings.insert(symbol, binding);
        }
    }

    /// Adds a binding into the global scope which is accessible from all
    /// shallow scopes
    pub fn add_global_binding(&mut self, symbol: InternedSymbol, binding: Binding) {
        self.global_scope.insert(symbol, binding);
    }

    /// Traverses the scope stack from innermost to outermost before checking
    /// the global scope. Past a barrier only type and view bindings are found.
    pub fn get_binding(&self, symbol: InternedSymbol) -> Option<&Binding> {
        let mut crossed_barrier = false;

        for scope in self.stack.iter().rev() {
            match scope.bindings.get(&symbol) {
                Some(Binding::Variable(_)) if crossed_barrier => {}
                Some(binding) => return Some(binding),
                None => {}
            }

            crossed_barrier |= scope.barrier;
        }

        self.global_scope.get(&symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::intern::InterningTable;

    #[test]
    fn shadowing_and_barriers() {
        let mut symbols = InterningTable::default();
        let x = symbols.insert_if_absent("x");
        let t = symbols.insert_if_absent("T");
        let input = symbols.insert_if_absent("input");

        let mut scopes = ScopeStack::new();
        scopes.add_global_binding(input, Binding::Variable(Type::Proto("Project")));
        scopes.add_shallow_binding(x, Binding::Variable(Type::INT));
        scopes.add_shallow_binding(t, Binding::TypeName(Type::STRING));

        scopes.push_shallow_scope();
        scopes.add_shallow_binding(x, Binding::Variable(Type::FLOAT));
        assert!(matches!(
            scopes.get_binding(x),
            Some(Binding::Variable(ty)) if *ty == Type::FLOAT
        ));
        scopes.pop_shallow_scope();

        scopes.push_barrier_scope();
        assert!(scopes.get_binding(x).is_none());
        assert!(matches!(scopes.get_binding(t), Some(Binding::TypeName(_))));
        assert!(scopes.get_binding(input).is_some());
        assert!(scopes.get_shallow_binding(t).is_none());
        scopes.pop_shallow_scope();

        assert!(matches!(
            scopes.get_binding(x),
            Some(Binding::Variable(ty)) if *ty == Type::INT
        ));
    }
}
