//! Scoped symbol table.
//!
//! A stack of lexical scopes for the ordinary namespace, plus the single
//! process-wide tag namespace ([`TagTable`]). Every scope ever created is
//! retained in an owning vector indexed by a stable id, because the IR
//! generator re-enters the scopes the analyzer populated: symbol identity
//! (and with it every stack offset) must survive between the two passes.

use crate::diagnostics::SourceLocation;
use crate::types::{CType, TagTable, round_up};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
    Typedef,
    EnumConstant,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    #[default]
    None,
    Static,
    Extern,
    Register,
    Auto,
}

/// One entry in the ordinary namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: CType,
    pub storage: StorageClass,
    pub location: SourceLocation,
    /// Negative frame offset for locals and parameters; 0 otherwise.
    pub stack_offset: i64,
    /// Data-section label for globals and statics.
    pub global_label: Option<String>,
    pub defined: bool,
    /// The value of an enumeration constant.
    pub constant_value: Option<i64>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: CType, location: SourceLocation) -> Self {
        Symbol {
            name: name.into(),
            kind,
            ty,
            storage: StorageClass::None,
            location,
            stack_offset: 0,
            global_label: None,
            defined: false,
            constant_value: None,
        }
    }

    pub fn with_constant(mut self, value: i64) -> Self {
        self.constant_value = Some(value);
        self
    }

    pub fn with_storage(mut self, storage: StorageClass) -> Self {
        self.storage = storage;
        self
    }

    pub fn defined(mut self) -> Self {
        self.defined = true;
        self
    }

    /// True when the symbol lives in a stack frame rather than the data
    /// section.
    pub fn is_frame_local(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
            && !matches!(self.storage, StorageClass::Static | StorageClass::Extern)
            && self.global_label.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

/// Return-type context carried by function scopes, consulted by `return`
/// checking and by the IR generator's frame snapshot.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    pub name: String,
    pub return_type: CType,
    /// Bytes of frame consumed so far; grows monotonically, so the final
    /// value is the function's `stack_size`.
    pub frame_used: u64,
}

#[derive(Debug)]
pub struct Scope {
    pub id: usize,
    pub kind: ScopeKind,
    pub parent: Option<usize>,
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
    pub function: Option<FunctionContext>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|n| self.symbols.get(n))
    }
}

pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: usize,
    tags: TagTable,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                id: 0,
                kind: ScopeKind::Global,
                parent: None,
                symbols: HashMap::new(),
                order: Vec::new(),
                function: None,
            }],
            current: 0,
            tags: TagTable::new(),
        }
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagTable {
        &mut self.tags
    }

    pub fn current_scope_id(&self) -> usize {
        self.current
    }

    pub fn scope(&self, id: usize) -> Option<&Scope> {
        self.scopes.get(id)
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Push a new scope and return its stable id.
    pub fn enter_scope(&mut self, kind: ScopeKind) -> usize {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            id,
            kind,
            parent: Some(self.current),
            symbols: HashMap::new(),
            order: Vec::new(),
            function: None,
        });
        self.current = id;
        id
    }

    /// Push a function scope carrying the return-type context.
    pub fn enter_function_scope(&mut self, name: impl Into<String>, return_type: CType) -> usize {
        let id = self.enter_scope(ScopeKind::Function);
        self.scopes[id].function = Some(FunctionContext {
            name: name.into(),
            return_type,
            frame_used: 0,
        });
        id
    }

    /// Pop to the parent scope. The popped scope stays alive and can be
    /// re-entered by id.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Re-enter a scope created earlier (the IR generator replaying the
    /// analyzer's scope structure).
    pub fn reenter_scope(&mut self, id: usize) -> bool {
        if id < self.scopes.len() {
            self.current = id;
            true
        } else {
            false
        }
    }

    /// Insert into the current scope. Fails on a duplicate ordinary name.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), String> {
        let current = self.current;
        self.insert_into(current, symbol)
    }

    /// Insert into a specific scope (goto labels land in the function
    /// scope no matter how deeply the labeled statement nests).
    pub fn insert_into(&mut self, scope_id: usize, symbol: Symbol) -> Result<(), String> {
        let Some(scope) = self.scopes.get_mut(scope_id) else {
            return Err(format!("no such scope: {}", scope_id));
        };
        if scope.symbols.contains_key(&symbol.name) {
            return Err(format!("redefinition of '{}'", symbol.name));
        }
        scope.order.push(symbol.name.clone());
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Ordinary-namespace lookup: walk parent links from the current
    /// scope.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_with_scope(name).map(|(_, symbol)| symbol)
    }

    pub fn lookup_with_scope(&self, name: &str) -> Option<(usize, &Symbol)> {
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = &self.scopes[scope_id];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some((scope_id, symbol));
            }
            id = scope.parent;
        }
        None
    }

    /// Lookup restricted to the current scope, for redefinition checks.
    pub fn lookup_current(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current].symbols.get(name)
    }

    /// Mutable access to a symbol visible from the current scope.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let scope_id = self.lookup_with_scope(name)?.0;
        self.scopes[scope_id].symbols.get_mut(name)
    }

    /// The function context enclosing the current scope, if any.
    pub fn function_context(&self) -> Option<&FunctionContext> {
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = &self.scopes[scope_id];
            if let Some(context) = &scope.function {
                return Some(context);
            }
            id = scope.parent;
        }
        None
    }

    /// Allocate a frame slot in the enclosing function: round the frame
    /// up to `align`, extend it by `size`, and return the new (negative)
    /// offset. Returns `None` outside a function.
    pub fn allocate_local(&mut self, size: u64, align: u64) -> Option<i64> {
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            if let Some(context) = self.scopes[scope_id].function.as_mut() {
                context.frame_used = round_up(context.frame_used, align.max(1)) + size;
                return Some(-(context.frame_used as i64));
            }
            id = self.scopes[scope_id].parent;
        }
        None
    }

    /// Final frame size of the function scope with the given id.
    pub fn stack_size_of(&self, scope_id: usize) -> u64 {
        self.scopes
            .get(scope_id)
            .and_then(|s| s.function.as_ref())
            .map(|f| f.frame_used)
            .unwrap_or(0)
    }

    /// Textual summary of file-scope symbols and the tag table, used by
    /// the driver's semantic dump.
    pub fn summary(&self) -> String {
        use crate::types::TagEntry;
        use std::fmt::Write;

        let mut out = String::new();
        for (tag, entry) in self.tags.iter() {
            match entry {
                TagEntry::Record(layout) => {
                    let flavor = if layout.is_union { "union" } else { "struct" };
                    if !layout.complete {
                        let _ = writeln!(out, "{} {} <incomplete>", flavor, tag);
                        continue;
                    }
                    let _ = writeln!(
                        out,
                        "{} {} (size {}, align {})",
                        flavor, tag, layout.size, layout.align
                    );
                    for member in &layout.members {
                        let _ = writeln!(
                            out,
                            "  +{:<4} {}: {}",
                            member.offset, member.name, member.ty
                        );
                    }
                }
                TagEntry::Enum(def) => {
                    let _ = writeln!(out, "enum {}", tag);
                    for (name, value) in &def.enumerators {
                        let _ = writeln!(out, "  {} = {}", name, value);
                    }
                }
            }
        }
        for symbol in self.global_scope().iter() {
            let what = match symbol.kind {
                SymbolKind::Variable => "var",
                SymbolKind::Function => "fn",
                SymbolKind::Typedef => "typedef",
                SymbolKind::EnumConstant => "enum-const",
                SymbolKind::Parameter => "param",
                SymbolKind::Label => "label",
            };
            let _ = writeln!(
                out,
                "{} {}: {}{}",
                what,
                symbol.name,
                symbol.ty,
                if symbol.defined { "" } else { " <declared>" }
            );
        }
        out
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::builtin()
    }

    fn var(name: &str, ty: CType) -> Symbol {
        Symbol::new(name, SymbolKind::Variable, ty, loc())
    }

    #[test]
    fn test_shadowing_resolves_innermost() {
        let mut table = SymbolTable::new();
        table.insert(var("x", CType::int())).unwrap();
        table.enter_function_scope("f", CType::void());
        table.insert(var("x", CType::long())).unwrap();
        assert_eq!(table.lookup("x").unwrap().ty, CType::long());
        table.exit_scope();
        assert_eq!(table.lookup("x").unwrap().ty, CType::int());
    }

    #[test]
    fn test_duplicate_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.insert(var("x", CType::int())).unwrap();
        assert!(table.insert(var("x", CType::int())).is_err());
    }

    #[test]
    fn test_local_offsets_respect_alignment() {
        let mut table = SymbolTable::new();
        let func = table.enter_function_scope("f", CType::int());
        assert_eq!(table.allocate_local(4, 4), Some(-4));
        assert_eq!(table.allocate_local(1, 1), Some(-5));
        // Next int must realign to 8 used bytes.
        assert_eq!(table.allocate_local(4, 4), Some(-12));
        assert_eq!(table.allocate_local(8, 8), Some(-24));
        assert_eq!(table.stack_size_of(func), 24);
    }

    #[test]
    fn test_block_scope_allocates_into_enclosing_function() {
        let mut table = SymbolTable::new();
        let func = table.enter_function_scope("f", CType::void());
        table.allocate_local(4, 4);
        table.enter_scope(ScopeKind::Block);
        assert_eq!(table.allocate_local(4, 4), Some(-8));
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.stack_size_of(func), 8);
    }

    #[test]
    fn test_allocate_outside_function_fails() {
        let mut table = SymbolTable::new();
        assert_eq!(table.allocate_local(4, 4), None);
    }

    #[test]
    fn test_reenter_preserves_symbols_and_offsets() {
        let mut table = SymbolTable::new();
        let func = table.enter_function_scope("f", CType::int());
        let mut symbol = var("n", CType::int());
        symbol.stack_offset = table.allocate_local(4, 4).unwrap();
        table.insert(symbol).unwrap();
        let block = table.enter_scope(ScopeKind::Block);
        table.insert(var("m", CType::int())).unwrap();
        table.exit_scope();
        table.exit_scope();

        // Second pass replays the same scopes by id.
        assert!(table.reenter_scope(func));
        assert_eq!(table.lookup("n").unwrap().stack_offset, -4);
        assert!(table.reenter_scope(block));
        assert!(table.lookup("m").is_some());
        assert!(table.lookup("n").is_some());
        assert!(!table.reenter_scope(999));
    }

    #[test]
    fn test_function_context_visible_from_blocks() {
        let mut table = SymbolTable::new();
        table.enter_function_scope("f", CType::long());
        table.enter_scope(ScopeKind::Block);
        let context = table.function_context().unwrap();
        assert_eq!(context.name, "f");
        assert_eq!(context.return_type, CType::long());
    }

    #[test]
    fn test_scope_iteration_is_declaration_ordered() {
        let mut table = SymbolTable::new();
        table.insert(var("b", CType::int())).unwrap();
        table.insert(var("a", CType::int())).unwrap();
        let names: Vec<_> = table.global_scope().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
