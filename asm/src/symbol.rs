use indexmap::IndexMap;

use crate::token::TokenId;

/// What a symbol name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// Defining token (label, constant, variable or string).
    Token(TokenId),
    /// Value supplied from outside before assembly.
    Option(i32),
}

/// Symbol table in definition order.
#[derive(Debug, Default)]
pub struct Symbols(IndexMap<String, Symbol>);

impl Symbols {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.0.get(name)
    }

    /// Bind `name` unless it is already bound. Returns the existing binding
    /// on conflict and leaves it untouched.
    pub fn define(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        match self.0.get(name) {
            Some(prev) => Err(*prev),
            None => {
                self.0.insert(name.to_string(), symbol);
                Ok(())
            }
        }
    }

    /// Replace the binding of `name`.
    pub fn rebind(&mut self, name: &str, symbol: Symbol) {
        self.0.insert(name.to_string(), symbol);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.0.iter()
    }
}
