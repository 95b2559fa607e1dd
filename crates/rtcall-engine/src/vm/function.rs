//! Synthetic function identities and the isolate's function table
//!
//! A `Function` gives finalized stub code an identity the uniform call path
//! can dispatch through. Its code slot is set exactly once.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::jit::backend::CodegenError;
use crate::jit::code::Code;
use crate::vm::symbols::Symbol;

/// Name of the placeholder class owning synthetic functions
pub const OWNER_CLASS_NAME: &str = "ownerClass";

/// Placeholder namespace owning a synthetic function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    name: Symbol,
}

impl Class {
    pub fn new(name: Symbol) -> Self {
        Self { name }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }
}

/// Kind of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Plain function with an explicit body
    Regular,
}

/// Static function whose body is generated stub code
#[derive(Debug)]
pub struct Function {
    name: String,
    symbol: Symbol,
    owner: Class,
    kind: FunctionKind,
    is_static: bool,
    param_count: usize,
    code: OnceCell<Arc<Code>>,
}

impl Function {
    pub fn new(name: impl Into<String>, symbol: Symbol, owner: Class, param_count: usize) -> Self {
        Self {
            name: name.into(),
            symbol,
            owner,
            kind: FunctionKind::Regular,
            is_static: true,
            param_count,
            code: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn owner(&self) -> &Class {
        &self.owner
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Number of positional parameters
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Attach finalized code; a function's code never changes afterwards
    pub fn attach_code(&self, code: Arc<Code>) -> Result<(), CodegenError> {
        self.code
            .set(code)
            .map_err(|_| CodegenError::CodeAlreadyAttached(self.name.clone()))
    }

    pub fn code(&self) -> Option<&Arc<Code>> {
        self.code.get()
    }

    pub fn has_code(&self) -> bool {
        self.code.get().is_some()
    }
}

/// Functions registered with an isolate, keyed by name symbol
#[derive(Default)]
pub struct FunctionTable {
    entries: FxHashMap<Symbol, Arc<Function>>,
    /// Total native size of the attached code
    total_code_size: usize,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function
    ///
    /// # Panics
    ///
    /// Panics if a function with the same name is registered.
    pub fn insert(&mut self, function: Arc<Function>) {
        assert!(
            !self.entries.contains_key(&function.symbol()),
            "function {} registered twice",
            function.name()
        );
        self.total_code_size += function.code().map_or(0, |c| c.code_size());
        self.entries.insert(function.symbol(), function);
    }

    pub fn get(&self, symbol: Symbol) -> Option<&Arc<Function>> {
        self.entries.get(&symbol)
    }

    pub fn remove(&mut self, symbol: Symbol) -> Option<Arc<Function>> {
        let removed = self.entries.remove(&symbol)?;
        self.total_code_size -= removed.code().map_or(0, |c| c.code_size());
        Some(removed)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.entries.contains_key(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.entries.values()
    }

    pub fn total_code_size(&self) -> usize {
        self.total_code_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
