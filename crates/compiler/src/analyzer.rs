//! Semantic analysis.
//!
//! One recursive pass over the translation unit: resolves names and
//! syntactic types, completes tags with C layout, types every expression
//! (filling the AST's inferred-type and lvalue slots), checks statement
//! constraints, folds constant expressions where the language requires
//! them, and allocates frame slots for locals and parameters.
//!
//! Analysis never aborts: problems land in the error/warning vectors and
//! the walk continues where it can, skipping checks whose operands failed
//! to type. The symbol table it populates is handed to the IR generator,
//! which re-enters the same scopes by the ids stamped on the AST.

use crate::ast::{
    BaseTypeSyntax, BinaryOp, BlockItem, DeclSpec, Declaration, Expr, ExprKind, ExternalDecl,
    ForInit, FunctionDef, InitDeclarator, Initializer, Stmt, StmtKind, TranslationUnit,
    TypeSyntax, UnaryOp,
};
use crate::const_eval::evaluate_const;
use crate::diagnostics::{DiagnosticBag, SourceLocation};
use crate::symbols::{ScopeKind, StorageClass, Symbol, SymbolKind, SymbolTable};
use crate::types::{
    Assignability, CType, FloatRank, IntRank, TypeKind, assignable, compatible,
    integral_promotion, usual_arithmetic_conversion,
};
use std::collections::HashSet;

struct SwitchFrame {
    seen_values: HashSet<i64>,
    has_default: bool,
}

pub struct Analyzer {
    symbols: SymbolTable,
    diagnostics: DiagnosticBag,
    loop_depth: u32,
    switch_depth: u32,
    switches: Vec<SwitchFrame>,
    /// Pending `goto`s of the function being analyzed.
    pending_gotos: Vec<(String, SourceLocation)>,
    /// Scope id of the function being analyzed.
    function_scope: Option<usize>,
    /// Counter suffix for block-scope statics' data labels.
    next_static: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            symbols: SymbolTable::new(),
            diagnostics: DiagnosticBag::new(),
            loop_depth: 0,
            switch_depth: 0,
            switches: Vec::new(),
            pending_gotos: Vec::new(),
            function_scope: None,
            next_static: 0,
        }
    }

    /// Pre-register an extern function (the runtime library surface) so
    /// programs can call it without a declaration in the source.
    pub fn register_extern_function(&mut self, name: &str, ty: CType) {
        let mut symbol = Symbol::new(name, SymbolKind::Function, ty, SourceLocation::builtin())
            .with_storage(StorageClass::Extern);
        symbol.global_label = Some(name.to_string());
        // A manifest duplicate is ignored; user declarations merge with
        // this entry through the usual redeclaration rules.
        let _ = self.symbols.insert(symbol);
    }

    pub fn analyze(&mut self, unit: &mut TranslationUnit) {
        for decl in &mut unit.decls {
            match decl {
                ExternalDecl::Declaration(d) => self.analyze_declaration(d, true),
                ExternalDecl::Function(f) => self.analyze_function(f),
            }
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_parts(self) -> (SymbolTable, DiagnosticBag) {
        (self.symbols, self.diagnostics)
    }

    fn error(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.diagnostics.error(location.clone(), message);
    }

    fn warning(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.diagnostics.warning(location.clone(), message);
    }

    /// Report an assignment-compatibility outcome in some context.
    fn check_assignable(
        &mut self,
        target: &CType,
        source: &CType,
        is_null: bool,
        location: &SourceLocation,
        forbidden_message: impl FnOnce() -> String,
    ) -> bool {
        match assignable(target, &source.decayed(), is_null) {
            Assignability::Allowed => true,
            Assignability::AllowedWithWarning(note) => {
                self.warning(location, note);
                true
            }
            Assignability::Forbidden => {
                self.error(location, forbidden_message());
                false
            }
        }
    }

    // -- type resolution --------------------------------------------------

    /// Resolve a syntactic type. Returns `None` (after reporting) when a
    /// name or tag cannot be resolved; callers skip dependent checks.
    fn resolve_type(&mut self, syntax: &TypeSyntax, location: &SourceLocation) -> Option<CType> {
        match syntax {
            TypeSyntax::Base { base, qualifiers } => self
                .resolve_base(base, location)
                .map(|t| t.with_qualifiers(*qualifiers)),
            TypeSyntax::Pointer { inner, qualifiers } => {
                let inner = self.resolve_type(inner, location)?;
                Some(CType::pointer_to(inner).with_qualifiers(*qualifiers))
            }
            TypeSyntax::Array { element, length } => {
                let element = self.resolve_type(element, location)?;
                let length = match length {
                    Some(expr) => match evaluate_const(expr, &self.symbols) {
                        Some(n) if n > 0 => Some(n as u64),
                        Some(_) => {
                            self.error(location, "array bound must be positive");
                            return None;
                        }
                        None => {
                            self.error(location, "array bound is not a constant expression");
                            return None;
                        }
                    },
                    None => None,
                };
                Some(CType::array_of(element, length))
            }
            TypeSyntax::Function {
                return_type,
                params,
                variadic,
            } => {
                let return_type = self.resolve_type(return_type, location)?;
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    let ty = self.resolve_type(&param.ty, &param.location)?;
                    // Parameters adjust: arrays and functions decay.
                    resolved.push(ty.decayed());
                }
                Some(CType::function(return_type, resolved, *variadic))
            }
        }
    }

    fn resolve_base(&mut self, base: &BaseTypeSyntax, location: &SourceLocation) -> Option<CType> {
        match base {
            BaseTypeSyntax::Void => Some(CType::void()),
            BaseTypeSyntax::Integer { rank, unsigned } => Some(CType::integer(*rank, *unsigned)),
            BaseTypeSyntax::Float { rank } => Some(CType::float(*rank)),
            BaseTypeSyntax::Named(name) => {
                let resolved = self
                    .symbols
                    .lookup(name)
                    .filter(|s| s.kind == SymbolKind::Typedef)
                    .map(|s| s.ty.clone());
                if resolved.is_none() {
                    self.error(location, format!("unknown type name '{}'", name));
                }
                resolved
            }
            BaseTypeSyntax::Record {
                tag,
                is_union,
                members,
            } => {
                let tag = tag.clone().unwrap_or_default();
                match members {
                    Some(member_decls) => {
                        // Declare first so self-referential members
                        // (`struct node *next`) resolve the tag.
                        if let Err(message) =
                            self.symbols.tags_mut().declare_record(&tag, *is_union)
                        {
                            self.error(location, message);
                            return Some(CType::record(tag, *is_union));
                        }
                        let mut members = Vec::with_capacity(member_decls.len());
                        for member in member_decls {
                            let Some(ty) = self.resolve_type(&member.ty, &member.location) else {
                                continue;
                            };
                            if !ty.is_complete(self.symbols.tags()) {
                                self.error(
                                    &member.location,
                                    format!("member '{}' has incomplete type", member.name),
                                );
                                continue;
                            }
                            if members.iter().any(|(n, _)| n == &member.name) {
                                self.error(
                                    &member.location,
                                    format!("duplicate member '{}'", member.name),
                                );
                                continue;
                            }
                            members.push((member.name.clone(), ty));
                        }
                        if let Err(message) =
                            self.symbols.tags_mut().complete_record(&tag, *is_union, members)
                        {
                            self.error(location, message);
                        }
                        Some(CType::record(tag, *is_union))
                    }
                    None => {
                        if self.symbols.tags().lookup(&tag).is_none() {
                            if let Err(message) =
                                self.symbols.tags_mut().declare_record(&tag, *is_union)
                            {
                                self.error(location, message);
                            }
                        }
                        Some(CType::record(tag, *is_union))
                    }
                }
            }
            BaseTypeSyntax::Enum { tag, enumerators } => {
                let tag = tag.clone().unwrap_or_default();
                if let Some(enumerators) = enumerators {
                    let mut table = Vec::with_capacity(enumerators.len());
                    let mut next_value: i64 = 0;
                    for enumerator in enumerators {
                        let value = match &enumerator.value {
                            Some(expr) => match evaluate_const(expr, &self.symbols) {
                                Some(v) => v,
                                None => {
                                    self.error(
                                        &enumerator.location,
                                        format!(
                                            "enumerator '{}' is not a constant expression",
                                            enumerator.name
                                        ),
                                    );
                                    next_value
                                }
                            },
                            None => next_value,
                        };
                        next_value = value.wrapping_add(1);
                        let symbol = Symbol::new(
                            &enumerator.name,
                            SymbolKind::EnumConstant,
                            CType::enumeration(tag.as_str()),
                            enumerator.location.clone(),
                        )
                        .with_constant(value)
                        .defined();
                        if let Err(message) = self.symbols.insert(symbol) {
                            self.error(&enumerator.location, message);
                        }
                        table.push((enumerator.name.clone(), value));
                    }
                    if let Err(message) = self.symbols.tags_mut().define_enum(&tag, table) {
                        self.error(location, message);
                    }
                } else if self.symbols.tags().enumeration(&tag).is_none() {
                    self.error(location, format!("unknown enum tag '{}'", tag));
                }
                Some(CType::enumeration(tag.as_str()))
            }
        }
    }

    // -- declarations -----------------------------------------------------

    fn analyze_declaration(&mut self, decl: &mut Declaration, top_level: bool) {
        if decl.declarators.is_empty() {
            // Bare tag declaration; resolving the base performs the tag
            // side effects.
            let base = decl.specifiers.base.clone();
            self.resolve_base(&base, &decl.location);
            return;
        }

        // The base syntax is embedded in each declarator's folded type.
        // Tag-definition side effects must run once, so every declarator
        // after the first sees a bodiless specifier.
        if decl.declarators.len() > 1 {
            strip_definition_bodies(&mut decl.declarators[1..]);
        }
        let specifiers = decl.specifiers.clone();
        for declarator in &mut decl.declarators {
            self.analyze_init_declarator(declarator, &specifiers, top_level);
        }
    }

    fn analyze_init_declarator(
        &mut self,
        declarator: &mut InitDeclarator,
        specifiers: &DeclSpec,
        top_level: bool,
    ) {
        let location = declarator.location.clone();
        let Some(mut ty) = self.resolve_type(&declarator.ty, &location) else {
            return;
        };

        if specifiers.is_typedef {
            if declarator.init.is_some() {
                self.error(&location, "typedef cannot have an initializer");
            }
            let symbol =
                Symbol::new(&declarator.name, SymbolKind::Typedef, ty, location.clone()).defined();
            if let Err(message) = self.symbols.insert(symbol) {
                self.error(&location, message);
            }
            return;
        }

        if ty.is_function() {
            self.declare_function(&declarator.name, ty, specifiers.storage, &location, false);
            return;
        }

        // Array-size inference from the initializer.
        if let (TypeKind::Array { element, length: None }, Some(init)) =
            (&ty.kind, &declarator.init)
        {
            let element = element.as_ref().clone();
            let inferred = match init {
                Initializer::Expr(Expr {
                    kind: ExprKind::StringLiteral(bytes),
                    ..
                }) if element.is_integer() => Some(bytes.len() as u64 + 1),
                Initializer::List { items, .. } => Some(items.len() as u64),
                _ => None,
            };
            if let Some(n) = inferred {
                ty = CType::array_of(element, Some(n));
            }
        }

        let is_extern = specifiers.storage == StorageClass::Extern && declarator.init.is_none();
        if !is_extern && !ty.is_complete(self.symbols.tags()) {
            self.error(
                &location,
                format!("variable '{}' has incomplete type", declarator.name),
            );
            return;
        }

        // File-scope redeclaration: tentative definitions merge.
        if top_level {
            let existing = self
                .symbols
                .lookup_current(&declarator.name)
                .map(|s| (s.kind, s.ty.clone(), s.defined));
            if let Some((kind, existing_ty, was_defined)) = existing {
                if kind == SymbolKind::Variable && compatible(&existing_ty, &ty) {
                    if declarator.init.is_some() {
                        if was_defined {
                            self.error(
                                &location,
                                format!("redefinition of '{}'", declarator.name),
                            );
                            return;
                        }
                        if let Some(symbol) = self.symbols.lookup_mut(&declarator.name) {
                            symbol.defined = true;
                            symbol.ty = ty.clone();
                        }
                        if let Some(init) = &mut declarator.init {
                            self.analyze_initializer_against(init, &ty);
                        }
                    }
                    return;
                }
                self.error(
                    &location,
                    format!("conflicting declaration of '{}'", declarator.name),
                );
                return;
            }
        }

        let mut symbol = Symbol::new(
            &declarator.name,
            SymbolKind::Variable,
            ty.clone(),
            location.clone(),
        )
        .with_storage(specifiers.storage);
        symbol.defined = specifiers.storage != StorageClass::Extern || declarator.init.is_some();

        if top_level || specifiers.storage == StorageClass::Extern {
            symbol.global_label = Some(declarator.name.clone());
        } else if specifiers.storage == StorageClass::Static {
            symbol.global_label = Some(format!("{}.{}", declarator.name, self.next_static));
            self.next_static += 1;
        } else {
            let size = ty.size(self.symbols.tags());
            let align = ty.align(self.symbols.tags());
            match self.symbols.allocate_local(size, align) {
                Some(offset) => symbol.stack_offset = offset,
                None => self.error(&location, "declaration outside any function frame"),
            }
        }

        if let Err(message) = self.symbols.insert(symbol) {
            self.error(&location, message);
            return;
        }

        if let Some(init) = &mut declarator.init {
            self.analyze_initializer_against(init, &ty);
        }
    }

    fn declare_function(
        &mut self,
        name: &str,
        ty: CType,
        storage: StorageClass,
        location: &SourceLocation,
        defining: bool,
    ) -> bool {
        let existing = self
            .symbols
            .lookup_current(name)
            .map(|s| (s.kind, s.ty.clone(), s.defined));
        if let Some((kind, existing_ty, defined)) = existing {
            if kind != SymbolKind::Function {
                self.error(location, format!("'{}' redeclared as different kind", name));
                return false;
            }
            if !compatible(&existing_ty, &ty) {
                self.error(location, format!("conflicting types for '{}'", name));
                return false;
            }
            if defining {
                if defined {
                    self.error(location, format!("redefinition of '{}'", name));
                    return false;
                }
                if let Some(symbol) = self.symbols.lookup_mut(name) {
                    symbol.defined = true;
                    symbol.ty = ty;
                }
            }
            return true;
        }
        let mut symbol =
            Symbol::new(name, SymbolKind::Function, ty, location.clone()).with_storage(storage);
        symbol.defined = defining;
        symbol.global_label = Some(name.to_string());
        if let Err(message) = self.symbols.insert(symbol) {
            self.error(location, message);
            return false;
        }
        true
    }

    fn analyze_function(&mut self, function: &mut FunctionDef) {
        let location = function.location.clone();
        let Some(ty) = self.resolve_type(&function.ty, &location) else {
            return;
        };
        let TypeKind::Function {
            return_type,
            params: param_types,
            ..
        } = ty.kind.clone()
        else {
            self.error(&location, "function definition does not have function type");
            return;
        };

        if !self.declare_function(&function.name, ty, function.storage, &location, true) {
            return;
        }

        let scope_id = self
            .symbols
            .enter_function_scope(&function.name, return_type.as_ref().clone());
        function.scope_id = Some(scope_id);
        let previous_scope = self.function_scope.replace(scope_id);

        // Parameters live in the function scope with frame slots.
        if let TypeSyntax::Function { params, .. } = &function.ty {
            for (param, ty) in params.iter().zip(param_types.iter()) {
                let Some(name) = &param.name else {
                    self.error(&param.location, "parameter name omitted in definition");
                    continue;
                };
                let size = ty.size(self.symbols.tags());
                let align = ty.align(self.symbols.tags());
                let mut symbol = Symbol::new(
                    name,
                    SymbolKind::Parameter,
                    ty.clone(),
                    param.location.clone(),
                )
                .defined();
                symbol.stack_offset =
                    self.symbols.allocate_local(size.max(1), align.max(1)).unwrap_or(0);
                if let Err(message) = self.symbols.insert(symbol) {
                    self.error(&param.location, message);
                }
            }
        }

        // The body's braces are the function scope itself.
        if let StmtKind::Compound(body) = &mut function.body.kind {
            body.scope_id = Some(scope_id);
            for item in &mut body.items {
                self.analyze_block_item(item);
            }
        } else {
            self.error(&location, "function body must be a compound statement");
        }

        // Every goto must name a label defined somewhere in the function.
        let gotos = std::mem::take(&mut self.pending_gotos);
        for (label, goto_location) in gotos {
            let defined = self
                .symbols
                .scope(scope_id)
                .and_then(|s| s.get(&label))
                .map(|s| s.kind == SymbolKind::Label)
                .unwrap_or(false);
            if !defined {
                self.error(&goto_location, format!("use of undeclared label '{}'", label));
            }
        }

        self.symbols.exit_scope();
        self.function_scope = previous_scope;
    }

    fn analyze_block_item(&mut self, item: &mut BlockItem) {
        match item {
            BlockItem::Declaration(decl) => self.analyze_declaration(decl, false),
            BlockItem::Statement(stmt) => self.analyze_stmt(stmt),
        }
    }

    // -- initializers -----------------------------------------------------

    fn analyze_initializer_against(&mut self, init: &mut Initializer, target: &CType) {
        match init {
            Initializer::Expr(expr) => {
                self.analyze_expr(expr);
                let Some(source) = expr.ty.clone() else {
                    return;
                };
                // String literal into a char array.
                if let (TypeKind::Array { element, length }, ExprKind::StringLiteral(bytes)) =
                    (&target.kind, &expr.kind)
                {
                    if element.is_integer() {
                        let too_long = length.map(|n| bytes.len() as u64 > n).unwrap_or(false);
                        if too_long {
                            let location = expr.location.clone();
                            self.error(&location, "initializer string is too long for array");
                        }
                        return;
                    }
                }
                let is_null = expr.is_null_constant();
                let location = expr.location.clone();
                self.check_assignable(target, &source, is_null, &location, || {
                    format!("cannot initialize '{}' with '{}'", target, source)
                });
            }
            Initializer::List { items, location } => {
                let location = location.clone();
                match &target.kind {
                    TypeKind::Array { element, length } => {
                        let length = *length;
                        if let Some(n) = length {
                            if items.len() as u64 > n {
                                self.error(&location, "excess elements in array initializer");
                            }
                        }
                        let element = element.as_ref().clone();
                        let limit = length.map(|n| n as usize).unwrap_or(usize::MAX);
                        for item in items.iter_mut().take(limit) {
                            self.analyze_initializer_against(item, &element);
                        }
                    }
                    TypeKind::Record { tag, is_union } => {
                        let members: Option<Vec<CType>> = self
                            .symbols
                            .tags()
                            .record(tag)
                            .filter(|layout| layout.complete)
                            .map(|layout| layout.members.iter().map(|m| m.ty.clone()).collect());
                        let Some(members) = members else {
                            self.error(&location, "initializer for incomplete type");
                            return;
                        };
                        let limit = if *is_union { 1 } else { members.len() };
                        if items.len() > limit {
                            self.error(&location, "excess elements in initializer");
                        }
                        for (item, member_ty) in items.iter_mut().zip(members.iter()) {
                            self.analyze_initializer_against(item, member_ty);
                        }
                    }
                    _ => {
                        // Scalar in braces: `int x = {1};`
                        if items.len() != 1 {
                            self.error(&location, "excess elements in scalar initializer");
                        }
                        if let Some(item) = items.first_mut() {
                            self.analyze_initializer_against(item, target);
                        }
                    }
                }
            }
        }
    }

    // -- statements -------------------------------------------------------

    fn analyze_stmt(&mut self, stmt: &mut Stmt) {
        let location = stmt.location.clone();
        match &mut stmt.kind {
            StmtKind::Expr(None) => {}
            StmtKind::Expr(Some(expr)) => self.analyze_expr(expr),
            StmtKind::Compound(compound) => {
                let scope_id = self.symbols.enter_scope(ScopeKind::Block);
                compound.scope_id = Some(scope_id);
                for item in &mut compound.items {
                    self.analyze_block_item(item);
                }
                self.symbols.exit_scope();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_scalar_condition(cond, "if");
                self.analyze_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_scalar_condition(cond, "while");
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::DoWhile { body, cond } => {
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
                self.check_scalar_condition(cond, "do-while");
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
                scope_id,
            } => {
                let id = self.symbols.enter_scope(ScopeKind::Block);
                *scope_id = Some(id);
                if let Some(init) = init {
                    match init.as_mut() {
                        ForInit::Declaration(decl) => self.analyze_declaration(decl, false),
                        ForInit::Expr(expr) => self.analyze_expr(expr),
                    }
                }
                if let Some(cond) = cond {
                    self.check_scalar_condition(cond, "for");
                }
                if let Some(step) = step {
                    self.analyze_expr(step);
                }
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
                self.symbols.exit_scope();
            }
            StmtKind::Switch { cond, body } => {
                self.analyze_expr(cond);
                if let Some(ty) = cond.ty.clone() {
                    if !ty.is_integer() {
                        let cond_location = cond.location.clone();
                        self.error(&cond_location, "switch condition must be an integer");
                    }
                }
                self.switch_depth += 1;
                self.switches.push(SwitchFrame {
                    seen_values: HashSet::new(),
                    has_default: false,
                });
                self.analyze_stmt(body);
                self.switches.pop();
                self.switch_depth -= 1;
            }
            StmtKind::Case {
                value,
                resolved,
                body,
            } => {
                if self.switch_depth == 0 {
                    self.error(&location, "'case' label not within a switch statement");
                } else {
                    match evaluate_const(value, &self.symbols) {
                        Some(v) => {
                            let duplicate = match self.switches.last_mut() {
                                Some(frame) => !frame.seen_values.insert(v),
                                None => false,
                            };
                            if duplicate {
                                self.error(&location, format!("duplicate case value {}", v));
                            } else {
                                *resolved = Some(v);
                            }
                        }
                        None => {
                            self.error(&location, "case label is not a constant expression");
                        }
                    }
                }
                self.analyze_stmt(body);
            }
            StmtKind::Default { body } => {
                if self.switch_depth == 0 {
                    self.error(&location, "'default' label not within a switch statement");
                } else {
                    let repeated = match self.switches.last_mut() {
                        Some(frame) => {
                            let seen = frame.has_default;
                            frame.has_default = true;
                            seen
                        }
                        None => false,
                    };
                    if repeated {
                        self.error(&location, "multiple default labels in one switch");
                    }
                }
                self.analyze_stmt(body);
            }
            StmtKind::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.error(&location, "'break' outside of loop or switch");
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(&location, "'continue' outside of loop");
                }
            }
            StmtKind::Return(value) => {
                let return_type = self
                    .symbols
                    .function_context()
                    .map(|c| c.return_type.clone());
                let Some(return_type) = return_type else {
                    self.error(&location, "'return' outside of function");
                    return;
                };
                match value {
                    None => {
                        if !return_type.is_void() {
                            self.warning(
                                &location,
                                "'return' without a value in a non-void function",
                            );
                        }
                    }
                    Some(expr) => {
                        self.analyze_expr(expr);
                        if return_type.is_void() {
                            self.error(&location, "'return' with a value in a void function");
                            return;
                        }
                        let Some(ty) = expr.ty.clone() else {
                            return;
                        };
                        let is_null = expr.is_null_constant();
                        let expr_location = expr.location.clone();
                        self.check_assignable(&return_type, &ty, is_null, &expr_location, || {
                            format!(
                                "cannot return '{}' from a function returning '{}'",
                                ty, return_type
                            )
                        });
                    }
                }
            }
            StmtKind::Goto(label) => {
                self.pending_gotos.push((label.clone(), location));
            }
            StmtKind::Label { name, body } => {
                if let Some(scope_id) = self.function_scope {
                    let symbol = Symbol::new(
                        name.as_str(),
                        SymbolKind::Label,
                        CType::void(),
                        location.clone(),
                    )
                    .defined();
                    if self.symbols.insert_into(scope_id, symbol).is_err() {
                        let name = name.clone();
                        self.error(&location, format!("duplicate label '{}'", name));
                    }
                } else {
                    self.error(&location, "label outside of function");
                }
                self.analyze_stmt(body);
            }
        }
    }

    fn check_scalar_condition(&mut self, cond: &mut Expr, construct: &str) {
        self.analyze_expr(cond);
        if let Some(ty) = cond.ty.clone() {
            if !ty.decayed().is_scalar() {
                let location = cond.location.clone();
                self.error(
                    &location,
                    format!("{} condition must have scalar type", construct),
                );
            }
        }
    }

    // -- expressions ------------------------------------------------------

    fn analyze_expr(&mut self, expr: &mut Expr) {
        let location = expr.location.clone();
        match &mut expr.kind {
            ExprKind::IntLiteral {
                value,
                unsigned,
                long,
                long_long,
            } => {
                let rank = if *long_long {
                    IntRank::LongLong
                } else if *long || *value > i32::MAX as i64 || *value < i32::MIN as i64 {
                    IntRank::Long
                } else {
                    IntRank::Int
                };
                expr.ty = Some(CType::integer(rank, *unsigned));
            }
            ExprKind::FloatLiteral { single, .. } => {
                expr.ty = Some(if *single {
                    CType::float(FloatRank::Float)
                } else {
                    CType::double()
                });
            }
            ExprKind::CharLiteral(_) => {
                expr.ty = Some(CType::int());
            }
            ExprKind::StringLiteral(bytes) => {
                expr.ty = Some(CType::array_of(
                    CType::char_type(),
                    Some(bytes.len() as u64 + 1),
                ));
            }
            ExprKind::Identifier(name) => {
                let resolved = self
                    .symbols
                    .lookup(name)
                    .map(|s| (s.kind, s.ty.clone()));
                match resolved {
                    Some((SymbolKind::Typedef, _)) => {
                        let name = name.clone();
                        self.error(&location, format!("unexpected type name '{}'", name));
                    }
                    Some((kind, ty)) => {
                        expr.is_lvalue =
                            matches!(kind, SymbolKind::Variable | SymbolKind::Parameter);
                        expr.ty = Some(ty);
                    }
                    None => {
                        let name = name.clone();
                        self.error(
                            &location,
                            format!("use of undeclared identifier '{}'", name),
                        );
                        // Recover with an int stub so dependent checks
                        // go on.
                        expr.ty = Some(CType::int());
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                self.analyze_expr(operand);
                let Some(operand_ty) = operand.ty.clone() else {
                    return;
                };
                match op {
                    UnaryOp::Plus | UnaryOp::Neg => {
                        if !operand_ty.is_arithmetic() {
                            self.error(&location, "unary operand must be arithmetic");
                            return;
                        }
                        expr.ty = Some(if operand_ty.is_float() {
                            operand_ty
                        } else {
                            integral_promotion(&operand_ty)
                        });
                    }
                    UnaryOp::BitNot => {
                        if !operand_ty.is_integer() {
                            self.error(&location, "'~' operand must be an integer");
                            return;
                        }
                        expr.ty = Some(integral_promotion(&operand_ty));
                    }
                    UnaryOp::LogicalNot => {
                        if !operand_ty.decayed().is_scalar() {
                            self.error(&location, "'!' operand must be scalar");
                            return;
                        }
                        expr.ty = Some(CType::int());
                    }
                    UnaryOp::Deref => {
                        let decayed = operand_ty.decayed();
                        let Some(pointee) = decayed.pointee().cloned() else {
                            self.error(&location, "cannot dereference a non-pointer");
                            return;
                        };
                        if pointee.is_void() {
                            self.error(&location, "cannot dereference 'void *'");
                            return;
                        }
                        expr.is_lvalue = !pointee.is_function();
                        expr.ty = Some(pointee);
                    }
                    UnaryOp::AddrOf => {
                        if !operand.is_lvalue && !operand_ty.is_function() {
                            self.error(&location, "cannot take the address of an rvalue");
                            return;
                        }
                        expr.ty = Some(CType::pointer_to(operand_ty));
                    }
                    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                        if !operand.is_lvalue
                            || operand_ty.qualifiers.is_const
                            || !operand_ty.is_scalar()
                        {
                            self.error(
                                &location,
                                "operand of '++'/'--' must be a modifiable scalar lvalue",
                            );
                            return;
                        }
                        expr.ty = Some(operand_ty);
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.analyze_expr(lhs);
                self.analyze_expr(rhs);
                let (Some(lt), Some(rt)) = (lhs.ty.clone(), rhs.ty.clone()) else {
                    return;
                };
                expr.ty = self.binary_result(op, &lt, &rt, lhs, rhs, &location);
            }
            ExprKind::Assign { op, lhs, rhs } => {
                let op = *op;
                self.analyze_expr(lhs);
                self.analyze_expr(rhs);
                let (Some(lt), Some(rt)) = (lhs.ty.clone(), rhs.ty.clone()) else {
                    return;
                };
                if !lhs.is_lvalue || lt.is_array() {
                    self.error(&location, "expression is not assignable");
                    return;
                }
                if lt.qualifiers.is_const {
                    self.error(&location, "cannot assign to a const-qualified lvalue");
                    return;
                }
                match op.binary_op() {
                    None => {
                        let is_null = rhs.is_null_constant();
                        if !self.check_assignable(&lt, &rt, is_null, &location, || {
                            format!("cannot assign '{}' to '{}'", rt, lt)
                        }) {
                            return;
                        }
                    }
                    Some(binary) => {
                        if self
                            .binary_result(binary, &lt, &rt, lhs, rhs, &location)
                            .is_none()
                        {
                            return;
                        }
                    }
                }
                expr.ty = Some(lt);
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.analyze_expr(cond);
                if let Some(ty) = cond.ty.clone() {
                    if !ty.decayed().is_scalar() {
                        let cond_location = cond.location.clone();
                        self.error(&cond_location, "'?:' condition must be scalar");
                    }
                }
                self.analyze_expr(then_expr);
                self.analyze_expr(else_expr);
                let (Some(tt), Some(et)) = (then_expr.ty.clone(), else_expr.ty.clone()) else {
                    return;
                };
                let tt = tt.decayed();
                let et = et.decayed();
                expr.ty = if tt.is_arithmetic() && et.is_arithmetic() {
                    Some(usual_arithmetic_conversion(&tt, &et))
                } else if tt.is_pointer() && et.is_pointer() {
                    // Composite pointer: void* or a null constant gives
                    // way to the other side.
                    if tt.is_void_pointer() {
                        Some(et)
                    } else if et.is_void_pointer() {
                        Some(tt)
                    } else if compatible(&tt, &et) {
                        Some(tt)
                    } else {
                        self.error(&location, "incompatible pointer arms in '?:'");
                        None
                    }
                } else if tt.is_pointer() && else_expr.is_null_constant() {
                    Some(tt)
                } else if et.is_pointer() && then_expr.is_null_constant() {
                    Some(et)
                } else if tt.is_void() && et.is_void() {
                    Some(CType::void())
                } else if compatible(&tt, &et) {
                    Some(tt)
                } else {
                    self.error(&location, "incompatible arms in '?:'");
                    None
                };
            }
            ExprKind::Cast { target, operand } => {
                let target = target.clone();
                self.analyze_expr(operand);
                let Some(resolved) = self.resolve_type(&target, &location) else {
                    return;
                };
                if let Some(source) = operand.ty.clone() {
                    let source = source.decayed();
                    let scalar_ok = resolved.is_scalar() && source.is_scalar();
                    let void_ok = resolved.is_void();
                    if !scalar_ok && !void_ok {
                        self.error(
                            &location,
                            format!("invalid cast from '{}' to '{}'", source, resolved),
                        );
                        return;
                    }
                }
                expr.ty = Some(resolved);
            }
            ExprKind::Subscript { base, index } => {
                self.analyze_expr(base);
                self.analyze_expr(index);
                let (Some(bt), Some(it)) = (base.ty.clone(), index.ty.clone()) else {
                    return;
                };
                let bt = bt.decayed();
                let it = it.decayed();
                // One side must be a pointer, the other an integer.
                let element = if bt.is_pointer() && it.is_integer() {
                    bt.pointee().cloned()
                } else if it.is_pointer() && bt.is_integer() {
                    it.pointee().cloned()
                } else {
                    self.error(&location, "subscripted value is not an array or pointer");
                    return;
                };
                expr.ty = element;
                expr.is_lvalue = true;
            }
            ExprKind::Call { callee, args } => {
                self.analyze_expr(callee);
                for arg in args.iter_mut() {
                    self.analyze_expr(arg);
                }
                let Some(callee_ty) = callee.ty.clone() else {
                    return;
                };
                let function_ty = match &callee_ty.kind {
                    TypeKind::Function { .. } => callee_ty.clone(),
                    TypeKind::Pointer { pointee } if pointee.is_function() => {
                        pointee.as_ref().clone()
                    }
                    _ => {
                        self.error(&location, "called object is not a function");
                        return;
                    }
                };
                let TypeKind::Function {
                    return_type,
                    params,
                    variadic,
                } = function_ty.kind
                else {
                    return;
                };
                if args.len() < params.len() || (!variadic && args.len() > params.len()) {
                    self.error(
                        &location,
                        format!(
                            "wrong number of arguments: expected {}{}, got {}",
                            params.len(),
                            if variadic { "+" } else { "" },
                            args.len()
                        ),
                    );
                }
                for (i, param_ty) in params.iter().enumerate() {
                    let Some(arg) = args.get_mut(i) else { break };
                    let Some(arg_ty) = arg.ty.clone() else {
                        continue;
                    };
                    let is_null = arg.is_null_constant();
                    let arg_location = arg.location.clone();
                    self.check_assignable(param_ty, &arg_ty, is_null, &arg_location, || {
                        format!(
                            "argument {}: cannot convert '{}' to '{}'",
                            i + 1,
                            arg_ty,
                            param_ty
                        )
                    });
                }
                expr.ty = Some(return_type.as_ref().clone());
            }
            ExprKind::Member {
                base,
                member,
                arrow,
            } => {
                let arrow = *arrow;
                let member = member.clone();
                self.analyze_expr(base);
                let Some(base_ty) = base.ty.clone() else {
                    return;
                };
                let record_ty = if arrow {
                    match base_ty.decayed().pointee().cloned() {
                        Some(p) => p,
                        None => {
                            self.error(&location, "'->' requires a pointer to a record");
                            return;
                        }
                    }
                } else {
                    base_ty
                };
                let TypeKind::Record { tag, .. } = &record_ty.kind else {
                    self.error(
                        &location,
                        format!("member access on non-record type '{}'", record_ty),
                    );
                    return;
                };
                let tag = tag.clone();
                let lookup: Option<Option<CType>> = self
                    .symbols
                    .tags()
                    .record(&tag)
                    .filter(|layout| layout.complete)
                    .map(|layout| layout.member(&member).map(|m| m.ty.clone()));
                match lookup {
                    None => {
                        self.error(
                            &location,
                            format!("member access on incomplete type '{}'", record_ty),
                        );
                    }
                    Some(None) => {
                        self.error(
                            &location,
                            format!("no member named '{}' in '{}'", member, record_ty),
                        );
                    }
                    Some(Some(member_ty)) => {
                        expr.is_lvalue = arrow || base.is_lvalue;
                        expr.ty = Some(member_ty);
                    }
                }
            }
            ExprKind::SizeofExpr(operand) => {
                // The operand is typed but never evaluated.
                self.analyze_expr(operand);
                expr.ty = Some(CType::unsigned_long());
            }
            ExprKind::SizeofType { target, resolved } => {
                let target = target.clone();
                *resolved = self.resolve_type(&target, &location);
                expr.ty = Some(CType::unsigned_long());
            }
        }
    }

    /// Type a binary operator application; reports and returns `None` on
    /// constraint violations.
    fn binary_result(
        &mut self,
        op: BinaryOp,
        lt: &CType,
        rt: &CType,
        lhs: &Expr,
        rhs: &Expr,
        location: &SourceLocation,
    ) -> Option<CType> {
        let ld = lt.decayed();
        let rd = rt.decayed();
        match op {
            BinaryOp::Add => {
                if ld.is_arithmetic() && rd.is_arithmetic() {
                    Some(usual_arithmetic_conversion(&ld, &rd))
                } else if ld.is_pointer() && rd.is_integer() {
                    Some(ld)
                } else if ld.is_integer() && rd.is_pointer() {
                    Some(rd)
                } else {
                    self.error(location, "invalid operands to '+'");
                    None
                }
            }
            BinaryOp::Sub => {
                if ld.is_arithmetic() && rd.is_arithmetic() {
                    Some(usual_arithmetic_conversion(&ld, &rd))
                } else if ld.is_pointer() && rd.is_integer() {
                    Some(ld)
                } else if ld.is_pointer() && rd.is_pointer() {
                    if !compatible(&ld, &rd) {
                        self.error(location, "subtracting incompatible pointers");
                        return None;
                    }
                    Some(CType::long())
                } else {
                    self.error(location, "invalid operands to '-'");
                    None
                }
            }
            BinaryOp::Mul | BinaryOp::Div => {
                if ld.is_arithmetic() && rd.is_arithmetic() {
                    Some(usual_arithmetic_conversion(&ld, &rd))
                } else {
                    self.error(location, "operands must be arithmetic");
                    None
                }
            }
            BinaryOp::Mod => {
                if ld.is_integer() && rd.is_integer() {
                    Some(usual_arithmetic_conversion(&ld, &rd))
                } else {
                    self.error(location, "'%' operands must be integers");
                    None
                }
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if ld.is_integer() && rd.is_integer() {
                    // Shifts promote each side independently; the result
                    // takes the left type.
                    Some(integral_promotion(&ld))
                } else {
                    self.error(location, "shift operands must be integers");
                    None
                }
            }
            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => {
                let ok = (ld.is_arithmetic() && rd.is_arithmetic())
                    || (ld.is_pointer() && rd.is_pointer())
                    || (ld.is_pointer() && rhs.is_null_constant())
                    || (rd.is_pointer() && lhs.is_null_constant());
                if !ok {
                    self.error(location, "invalid comparison operands");
                    return None;
                }
                Some(CType::int())
            }
            BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr => {
                if ld.is_integer() && rd.is_integer() {
                    Some(usual_arithmetic_conversion(&ld, &rd))
                } else {
                    self.error(location, "bitwise operands must be integers");
                    None
                }
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                if ld.is_scalar() && rd.is_scalar() {
                    Some(CType::int())
                } else {
                    self.error(location, "logical operands must be scalar");
                    None
                }
            }
            BinaryOp::Comma => Some(rt.clone()),
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new()
    }
}

/// Replace record/enum definition bodies with bare tag references so a
/// second resolution of the same specifier does not redefine the tag
/// (`struct s { int x; } a, b;`).
fn strip_definition_bodies(declarators: &mut [InitDeclarator]) {
    for declarator in declarators {
        strip_type(&mut declarator.ty);
    }
}

fn strip_type(ty: &mut TypeSyntax) {
    match ty {
        TypeSyntax::Base { base, .. } => strip_base(base),
        TypeSyntax::Pointer { inner, .. } => strip_type(inner),
        TypeSyntax::Array { element, .. } => strip_type(element),
        TypeSyntax::Function {
            return_type,
            params,
            ..
        } => {
            strip_type(return_type);
            for param in params {
                strip_type(&mut param.ty);
            }
        }
    }
}

fn strip_base(base: &mut BaseTypeSyntax) {
    match base {
        BaseTypeSyntax::Record { members, .. } => *members = None,
        BaseTypeSyntax::Enum { enumerators, .. } => *enumerators = None,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn analyze(source: &str) -> (TranslationUnit, Analyzer, DiagnosticBag) {
        let (mut unit, mut diags) = parse_source(source, "test.c");
        assert!(!diags.has_errors(), "parse failed: {:?}", diags.errors());
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&mut unit);
        diags.absorb(analyzer.diagnostics.clone());
        (unit, analyzer, diags)
    }

    fn analyze_ok(source: &str) -> (TranslationUnit, Analyzer) {
        let (unit, analyzer, diags) = analyze(source);
        assert!(!diags.has_errors(), "unexpected errors: {:?}", diags.errors());
        (unit, analyzer)
    }

    fn errors(source: &str) -> Vec<String> {
        let (_, _, diags) = analyze(source);
        diags.errors().iter().map(|d| d.message.clone()).collect()
    }

    fn return_expr_type(unit: &TranslationUnit, function_index: usize) -> Option<CType> {
        let ExternalDecl::Function(f) = &unit.decls[function_index] else {
            panic!("not a function at index {}", function_index);
        };
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!();
        };
        for item in body.items.iter().rev() {
            if let BlockItem::Statement(Stmt {
                kind: StmtKind::Return(Some(value)),
                ..
            }) = item
            {
                return value.ty.clone();
            }
        }
        None
    }

    #[test]
    fn test_simple_function_types() {
        let (unit, analyzer) = analyze_ok("int f(int n) { return n * n; }");
        let symbol = analyzer.symbols().lookup("f").unwrap();
        assert!(symbol.defined);
        assert_eq!(
            symbol.ty,
            CType::function(CType::int(), vec![CType::int()], false)
        );
        let ExternalDecl::Function(f) = &unit.decls[0] else {
            panic!()
        };
        assert!(f.scope_id.is_some());
    }

    #[test]
    fn test_undeclared_identifier_reports_and_recovers() {
        let messages = errors("int f(void) { return missing + 1; }");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("undeclared identifier 'missing'"));
    }

    #[test]
    fn test_redefinition_in_scope() {
        let messages = errors("int f(void) { int x; int x; return 0; }");
        assert!(messages.iter().any(|m| m.contains("redefinition of 'x'")));
    }

    #[test]
    fn test_shadowing_is_legal() {
        analyze_ok("int f(int x) { { int x; x = 1; } return x; }");
    }

    #[test]
    fn test_break_outside_loop() {
        let messages = errors("int f(void) { break; return 0; }");
        assert!(messages.iter().any(|m| m.contains("'break' outside")));
    }

    #[test]
    fn test_continue_inside_switch_is_rejected() {
        let messages =
            errors("int f(int x) { switch (x) { default: continue; } return 0; }");
        assert!(messages.iter().any(|m| m.contains("'continue' outside")));
    }

    #[test]
    fn test_case_requires_switch_and_constants() {
        let messages = errors("int f(int x) { case 1: return x; }");
        assert!(messages.iter().any(|m| m.contains("not within a switch")));

        let messages = errors("int f(int x) { switch (x) { case x: return 1; } return 0; }");
        assert!(messages.iter().any(|m| m.contains("not a constant")));
    }

    #[test]
    fn test_duplicate_case_values() {
        let messages =
            errors("int f(int x) { switch (x) { case 1: return 1; case 1: return 2; } return 0; }");
        assert!(messages.iter().any(|m| m.contains("duplicate case value 1")));
    }

    #[test]
    fn test_case_div_by_zero_rejected() {
        let messages = errors("int f(int x) { switch (x) { case 1/0: return 1; } return 0; }");
        assert!(messages.iter().any(|m| m.contains("not a constant")));
    }

    #[test]
    fn test_enum_values_autoincrement() {
        let (_, analyzer) = analyze_ok("enum e { A, B = 5, C };");
        let def = analyzer.symbols().tags().enumeration("e").unwrap();
        assert_eq!(
            def.enumerators,
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 5),
                ("C".to_string(), 6)
            ]
        );
        assert_eq!(
            analyzer.symbols().lookup("C").unwrap().constant_value,
            Some(6)
        );
    }

    #[test]
    fn test_array_size_inference() {
        let (_, analyzer) = analyze_ok("char s[] = \"hi\"; int a[] = {1, 2, 3};");
        assert_eq!(
            analyzer.symbols().lookup("s").unwrap().ty,
            CType::array_of(CType::char_type(), Some(3))
        );
        assert_eq!(
            analyzer.symbols().lookup("a").unwrap().ty,
            CType::array_of(CType::int(), Some(3))
        );
    }

    #[test]
    fn test_excess_initializers_diagnosed() {
        let messages = errors("int a[2] = {1, 2, 3};");
        assert!(messages.iter().any(|m| m.contains("excess elements")));
    }

    #[test]
    fn test_struct_member_access() {
        let (unit, _) = analyze_ok(
            "struct point { int x; int y; };\n\
             int f(struct point *p) { return p->x; }",
        );
        assert_eq!(return_expr_type(&unit, 1), Some(CType::int()));
    }

    #[test]
    fn test_unknown_member_diagnosed() {
        let messages = errors("struct point { int x; }; int f(struct point p) { return p.z; }");
        assert!(messages.iter().any(|m| m.contains("no member named 'z'")));
    }

    #[test]
    fn test_member_access_on_incomplete_type() {
        let messages = errors("struct s; int f(struct s *p) { return p->x; }");
        assert!(messages.iter().any(|m| m.contains("incomplete type")));
    }

    #[test]
    fn test_pointer_arithmetic_types() {
        let (unit, _) = analyze_ok("long f(int *p, int *q, int i) { p = p + i; return q - p; }");
        assert_eq!(return_expr_type(&unit, 0), Some(CType::long()));
    }

    #[test]
    fn test_assignment_requires_lvalue() {
        let messages = errors("int f(int a, int b) { a + b = 3; return a; }");
        assert!(messages.iter().any(|m| m.contains("not assignable")));
    }

    #[test]
    fn test_const_assignment_rejected() {
        let messages = errors("int f(void) { const int x = 1; x = 2; return x; }");
        assert!(messages.iter().any(|m| m.contains("const-qualified")));
    }

    #[test]
    fn test_return_type_mismatch() {
        let messages = errors("struct s { int x; }; int f(struct s v) { return v; }");
        assert!(messages.iter().any(|m| m.contains("cannot return")));
    }

    #[test]
    fn test_void_function_returning_value() {
        let messages = errors("void f(void) { return 1; }");
        assert!(messages.iter().any(|m| m.contains("void function")));
    }

    #[test]
    fn test_call_arity_checked() {
        let messages = errors("int f(int a, int b); int g(void) { return f(1); }");
        assert!(messages.iter().any(|m| m.contains("wrong number of arguments")));
    }

    #[test]
    fn test_variadic_tail_accepts_extras() {
        analyze_ok("int printf(char *fmt, ...); int f(void) { return printf(\"%d\", 1, 2); }");
    }

    #[test]
    fn test_calling_non_function() {
        let messages = errors("int x; int f(void) { return x(); }");
        assert!(messages.iter().any(|m| m.contains("not a function")));
    }

    #[test]
    fn test_function_pointer_call() {
        analyze_ok(
            "int add(int a, int b); int f(void) { int (*op)(int, int) = add; return op(1, 2); }",
        );
    }

    #[test]
    fn test_typedef_resolution() {
        let (_, analyzer) = analyze_ok("typedef unsigned long size; size n = 10;");
        assert_eq!(
            analyzer.symbols().lookup("n").unwrap().ty,
            CType::unsigned_long()
        );
    }

    #[test]
    fn test_goto_undefined_label() {
        let messages = errors("int f(void) { goto nowhere; return 0; }");
        assert!(messages.iter().any(|m| m.contains("undeclared label")));
    }

    #[test]
    fn test_goto_defined_label_ok() {
        analyze_ok("int f(int n) { again: n--; if (n) goto again; return 0; }");
    }

    #[test]
    fn test_sizeof_types() {
        let (unit, _) = analyze_ok("unsigned long f(int *p) { return sizeof *p + sizeof(long); }");
        assert_eq!(return_expr_type(&unit, 0), Some(CType::unsigned_long()));
    }

    #[test]
    fn test_incomplete_variable_rejected() {
        let messages = errors("struct s; struct s v;");
        assert!(messages.iter().any(|m| m.contains("incomplete type")));
    }

    #[test]
    fn test_extern_incomplete_array_allowed() {
        analyze_ok("extern int table[];");
    }

    #[test]
    fn test_tentative_then_real_definition() {
        let (_, analyzer) = analyze_ok("int x; int x = 3;");
        assert!(analyzer.symbols().lookup("x").unwrap().defined);
    }

    #[test]
    fn test_conflicting_redeclaration() {
        let messages = errors("int x; long x;");
        assert!(messages.iter().any(|m| m.contains("conflicting declaration")));
    }

    #[test]
    fn test_function_redefinition() {
        let messages = errors("int f(void) { return 0; } int f(void) { return 1; }");
        assert!(messages.iter().any(|m| m.contains("redefinition of 'f'")));
    }

    #[test]
    fn test_prototype_mismatch() {
        let messages = errors("int f(int); long f(int);");
        assert!(messages.iter().any(|m| m.contains("conflicting types for 'f'")));
    }

    #[test]
    fn test_pointer_int_mixing_warns() {
        let (_, _, diags) = analyze("int f(int *p) { int x = p; return x; }");
        assert!(!diags.has_errors());
        assert!(!diags.warnings().is_empty());
    }

    #[test]
    fn test_null_constant_to_pointer_silent() {
        let (_, _, diags) = analyze("int f(void) { int *p = 0; return p == 0; }");
        assert!(!diags.has_errors());
        assert!(diags.warnings().is_empty());
    }

    #[test]
    fn test_struct_declared_once_for_two_declarators() {
        analyze_ok("struct s { int x; } a, b;");
    }

    #[test]
    fn test_registered_runtime_function_resolves() {
        let (mut unit, diags) = parse_source(
            "int f(void) { return put_char(65); }",
            "test.c",
        );
        assert!(!diags.has_errors());
        let mut analyzer = Analyzer::new();
        analyzer.register_extern_function(
            "put_char",
            CType::function(CType::int(), vec![CType::int()], false),
        );
        analyzer.analyze(&mut unit);
        assert!(!analyzer.diagnostics().has_errors());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let source = "enum e { A, B = 5 };\n\
                      struct s { int x; char c; };\n\
                      int f(struct s *p, int n) { return p->x + n + B; }";
        let run = |src: &str| {
            let (mut unit, _) = parse_source(src, "test.c");
            let mut analyzer = Analyzer::new();
            analyzer.analyze(&mut unit);
            let diags: Vec<String> = analyzer
                .diagnostics()
                .iter()
                .map(|d| d.to_string())
                .collect();
            let f_ty = analyzer.symbols().lookup("f").unwrap().ty.clone();
            let layout = analyzer.symbols().tags().record("s").unwrap().clone();
            (diags, f_ty, layout)
        };
        assert_eq!(run(source), run(source));
    }
}
