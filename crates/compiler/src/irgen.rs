//! IR generation: typed AST to quadruples.
//!
//! Walks the analyzed translation unit, re-entering the scopes the
//! analyzer created (by the ids stamped on compound/for/function nodes)
//! so every symbol resolves to the same storage the analyzer decided on.
//! Functions lower to quadruple sequences with per-function temp/label
//! counters; globals lower to flattened [`InitValue`] runs; string
//! literals intern into the `.LCn` pool.
//!
//! Everything here assumes analysis succeeded: a missing expression type
//! or unknown symbol is an internal invariant failure, reported as
//! [`IrGenError`] and fatal for the translation unit.

use crate::ast::{
    AssignOp, BinaryOp, BlockItem, Declaration, Expr, ExprKind, ExternalDecl, ForInit,
    FunctionDef, Initializer, Stmt, StmtKind, TranslationUnit, UnaryOp,
};
use crate::const_eval::evaluate_const;
use crate::ir::{FunctionIr, GlobalVar, InitValue, IrProgram, Opcode, Operand, Quad};
use crate::symbols::{StorageClass, SymbolKind, SymbolTable};
use crate::types::{CType, TypeKind, compatible, integral_promotion};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Error type for IR generation.
///
/// Lowering only fails when an analyzer invariant does not hold (a
/// missing expression type, an unresolvable symbol); such failures abort
/// the translation unit.
#[derive(Debug)]
pub enum IrGenError {
    Internal(String),
}

impl fmt::Display for IrGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrGenError::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for IrGenError {}

impl From<String> for IrGenError {
    fn from(message: String) -> Self {
        IrGenError::Internal(message)
    }
}

type IrResult<T> = Result<T, IrGenError>;

fn internal<T>(message: impl Into<String>) -> IrResult<T> {
    Err(IrGenError::Internal(message.into()))
}

/// Bookkeeping for the switch statement currently being lowered.
struct SwitchLowering {
    cond: Operand,
    cases: Vec<(i64, String)>,
    default: Option<String>,
    end: String,
}

pub struct IrGen {
    symbols: SymbolTable,
    program: IrProgram,
    quads: Vec<Quad>,
    temp_counter: usize,
    label_counter: usize,
    /// Monotonic suffix for shadowed local names within a function.
    shadow_counter: usize,
    /// `(scope id, source name)` to unique IR name.
    ir_names: HashMap<(usize, String), String>,
    /// IR names already used in the current function.
    used_names: HashSet<String>,
    string_labels: HashMap<Vec<u8>, String>,
    break_targets: Vec<String>,
    continue_targets: Vec<String>,
    switch_stack: Vec<SwitchLowering>,
    current_return: Option<CType>,
}

impl IrGen {
    pub fn new(symbols: SymbolTable) -> Self {
        IrGen {
            symbols,
            program: IrProgram::default(),
            quads: Vec::new(),
            temp_counter: 0,
            label_counter: 0,
            shadow_counter: 0,
            ir_names: HashMap::new(),
            used_names: HashSet::new(),
            string_labels: HashMap::new(),
            break_targets: Vec::new(),
            continue_targets: Vec::new(),
            switch_stack: Vec::new(),
            current_return: None,
        }
    }

    pub fn generate(mut self, unit: &TranslationUnit) -> IrResult<IrProgram> {
        for decl in &unit.decls {
            match decl {
                ExternalDecl::Declaration(d) => self.lower_global_declaration(d)?,
                ExternalDecl::Function(f) => self.lower_function(f)?,
            }
        }
        Ok(self.program)
    }

    // -- plumbing ---------------------------------------------------------

    fn emit(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    fn new_temp(&mut self, ty: CType) -> Operand {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        Operand::Temp(name, ty)
    }

    fn new_label(&mut self) -> String {
        let name = format!("L{}", self.label_counter);
        self.label_counter += 1;
        name
    }

    fn tags_size(&self, ty: &CType) -> u64 {
        ty.size(self.symbols.tags())
    }

    fn intern_string(&mut self, bytes: &[u8]) -> String {
        if let Some(label) = self.string_labels.get(bytes) {
            return label.clone();
        }
        let label = format!(".LC{}", self.program.string_pool.len());
        self.program
            .string_pool
            .push((label.clone(), bytes.to_vec()));
        self.string_labels.insert(bytes.to_vec(), label.clone());
        label
    }

    fn ty_of(expr: &Expr) -> IrResult<CType> {
        match &expr.ty {
            Some(ty) => Ok(ty.clone()),
            None => internal(format!(
                "{}: expression reached lowering without a type",
                expr.location
            )),
        }
    }

    /// Retype a temp operand (used when an address of an array doubles
    /// as a pointer to its first element).
    fn retype(operand: Operand, ty: CType) -> Operand {
        match operand {
            Operand::Temp(name, _) => Operand::Temp(name, ty),
            Operand::Variable(name, _) => Operand::Variable(name, ty),
            Operand::Global(name, _) => Operand::Global(name, ty),
            other => other,
        }
    }

    // -- globals ----------------------------------------------------------

    fn lower_global_declaration(&mut self, decl: &Declaration) -> IrResult<()> {
        for declarator in &decl.declarators {
            let symbol = self
                .symbols
                .global_scope()
                .get(&declarator.name)
                .cloned();
            let Some(symbol) = symbol else {
                // Analysis rejected this declarator; nothing to lower.
                continue;
            };
            match symbol.kind {
                // Typedefs and enum constants are symbol-table side
                // effects only; function prototypes surface as call
                // labels.
                SymbolKind::Typedef | SymbolKind::EnumConstant | SymbolKind::Function => {}
                SymbolKind::Variable => {
                    let is_extern = symbol.storage == StorageClass::Extern && !symbol.defined;
                    let initializers = if is_extern {
                        Vec::new()
                    } else {
                        self.flatten_initializer(declarator.init.as_ref(), &symbol.ty)?
                    };
                    let entry = GlobalVar {
                        name: symbol
                            .global_label
                            .clone()
                            .unwrap_or_else(|| symbol.name.clone()),
                        ty: symbol.ty.clone(),
                        is_extern,
                        initializers,
                    };
                    // Tentative definitions and extern declarations of
                    // the same object collapse into one entry; the
                    // initialized declaration wins.
                    match self.program.globals.iter_mut().find(|g| g.name == entry.name) {
                        Some(existing) => {
                            if declarator.init.is_some() || existing.is_extern {
                                *existing = entry;
                            }
                        }
                        None => self.program.globals.push(entry),
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Flatten an initializer into the little-endian `InitValue` run the
    /// backend emits verbatim. The run's sizes always sum to the size of
    /// the target type.
    fn flatten_initializer(
        &mut self,
        init: Option<&Initializer>,
        ty: &CType,
    ) -> IrResult<Vec<InitValue>> {
        let size = self.tags_size(ty);
        let Some(init) = init else {
            return Ok(vec![InitValue::Zero(size)]);
        };
        let mut out = Vec::new();
        self.flatten_into(&mut out, init, ty)?;
        Ok(out)
    }

    fn flatten_into(
        &mut self,
        out: &mut Vec<InitValue>,
        init: &Initializer,
        ty: &CType,
    ) -> IrResult<()> {
        let size = self.tags_size(ty);
        match init {
            Initializer::Expr(expr) => self.flatten_scalar(out, expr, ty, size),
            Initializer::List { items, .. } => match &ty.kind {
                TypeKind::Array { element, length } => {
                    let element = element.as_ref().clone();
                    let element_size = self.tags_size(&element);
                    let length = length.unwrap_or(items.len() as u64);
                    let used = (items.len() as u64).min(length);
                    for item in items.iter().take(used as usize) {
                        self.flatten_into(out, item, &element)?;
                    }
                    let remaining = (length - used) * element_size;
                    if remaining > 0 {
                        out.push(InitValue::Zero(remaining));
                    }
                    Ok(())
                }
                TypeKind::Record { tag, is_union } => {
                    let layout = match self.symbols.tags().record(tag) {
                        Some(layout) if layout.complete => layout.clone(),
                        _ => {
                            return internal(format!(
                                "initializer for unresolved record '{}'",
                                tag
                            ));
                        }
                    };
                    if *is_union {
                        // Only the first member initializes a union.
                        let Some(member) = layout.members.first() else {
                            out.push(InitValue::Zero(size));
                            return Ok(());
                        };
                        let member_size = self.tags_size(&member.ty);
                        match items.first() {
                            Some(item) => self.flatten_into(out, item, &member.ty)?,
                            None => out.push(InitValue::Zero(member_size)),
                        }
                        if size > member_size {
                            out.push(InitValue::Zero(size - member_size));
                        }
                        return Ok(());
                    }
                    let mut position: u64 = 0;
                    for (index, member) in layout.members.iter().enumerate() {
                        // Inter-member alignment padding.
                        if member.offset > position {
                            out.push(InitValue::Zero(member.offset - position));
                            position = member.offset;
                        }
                        let member_size = self.tags_size(&member.ty);
                        match items.get(index) {
                            Some(item) => self.flatten_into(out, item, &member.ty)?,
                            None => out.push(InitValue::Zero(member_size)),
                        }
                        position += member_size;
                    }
                    if size > position {
                        out.push(InitValue::Zero(size - position));
                    }
                    Ok(())
                }
                // Scalar in braces.
                _ => match items.first() {
                    Some(item) => self.flatten_into(out, item, ty),
                    None => {
                        out.push(InitValue::Zero(size));
                        Ok(())
                    }
                },
            },
        }
    }

    fn flatten_scalar(
        &mut self,
        out: &mut Vec<InitValue>,
        expr: &Expr,
        ty: &CType,
        size: u64,
    ) -> IrResult<()> {
        // String literal into a char array: one byte per character, a
        // terminator when there is room, zero padding to the length.
        if let (TypeKind::Array { length, .. }, ExprKind::StringLiteral(bytes)) =
            (&ty.kind, &expr.kind)
        {
            let length = length.unwrap_or(bytes.len() as u64 + 1);
            let used = (bytes.len() as u64).min(length);
            for &b in bytes.iter().take(used as usize) {
                out.push(InitValue::Integer(b as i64, 1));
            }
            let mut written = used;
            if written < length {
                out.push(InitValue::Integer(0, 1));
                written += 1;
            }
            if written < length {
                out.push(InitValue::Zero(length - written));
            }
            return Ok(());
        }

        // String literal into a pointer.
        if let ExprKind::StringLiteral(bytes) = &expr.kind {
            let label = self.intern_string(bytes);
            out.push(InitValue::String(label));
            return Ok(());
        }

        // Address-of a named object, or a bare function/global name.
        if let Some(name) = address_initializer(expr) {
            let label = self
                .symbols
                .lookup(&name)
                .and_then(|s| s.global_label.clone())
                .unwrap_or(name);
            out.push(InitValue::Address(label));
            return Ok(());
        }

        if ty.is_float() {
            if let Some(value) = eval_float(expr, &self.symbols) {
                out.push(InitValue::Float(value, size));
                return Ok(());
            }
        } else if let Some(value) = evaluate_const(expr, &self.symbols) {
            out.push(InitValue::Integer(value, size));
            return Ok(());
        }

        // Conservative fallback for anything else.
        out.push(InitValue::Zero(size));
        Ok(())
    }

    // -- functions --------------------------------------------------------

    fn lower_function(&mut self, function: &FunctionDef) -> IrResult<()> {
        let Some(scope_id) = function.scope_id else {
            return internal(format!(
                "function '{}' reached lowering without a scope id",
                function.name
            ));
        };
        let Some(symbol) = self.symbols.global_scope().get(&function.name).cloned() else {
            return internal(format!("function '{}' has no symbol", function.name));
        };
        let TypeKind::Function {
            return_type,
            variadic,
            ..
        } = &symbol.ty.kind
        else {
            return internal(format!("'{}' is not a function symbol", function.name));
        };
        let return_type = return_type.as_ref().clone();
        let variadic = *variadic;

        // Per-function counters reset; IR names are unique per function.
        self.quads = Vec::new();
        self.temp_counter = 0;
        self.label_counter = 0;
        self.shadow_counter = 0;
        self.used_names.clear();
        self.current_return = Some(return_type.clone());

        self.symbols.reenter_scope(scope_id);

        // Parameters keep their source names (one scope, no shadowing).
        let mut params = Vec::new();
        let param_info: Vec<(String, CType)> = self
            .symbols
            .scope(scope_id)
            .map(|scope| {
                scope
                    .iter()
                    .filter(|s| s.kind == SymbolKind::Parameter)
                    .map(|s| (s.name.clone(), s.ty.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for (name, ty) in param_info {
            self.ir_names
                .insert((scope_id, name.clone()), name.clone());
            self.used_names.insert(name.clone());
            params.push((name, ty));
        }

        if let StmtKind::Compound(body) = &function.body.kind {
            for item in &body.items {
                self.lower_block_item(item)?;
            }
        }

        // Implicit return for functions that fall off the end.
        let needs_return = !matches!(
            self.quads.last(),
            Some(Quad {
                opcode: Opcode::Return,
                ..
            })
        );
        if needs_return {
            self.emit(Quad::new(
                Opcode::Return,
                Operand::None,
                Operand::None,
                Operand::None,
            ));
        }

        let stack_size = self.symbols.stack_size_of(scope_id);
        self.symbols.exit_scope();
        self.current_return = None;

        let quads = std::mem::take(&mut self.quads);
        self.program.functions.push(FunctionIr {
            name: function.name.clone(),
            return_type,
            params,
            quads,
            stack_size,
            variadic,
        });
        Ok(())
    }

    fn lower_block_item(&mut self, item: &BlockItem) -> IrResult<()> {
        match item {
            BlockItem::Declaration(decl) => self.lower_local_declaration(decl),
            BlockItem::Statement(stmt) => self.lower_stmt(stmt),
        }
    }

    fn lower_local_declaration(&mut self, decl: &Declaration) -> IrResult<()> {
        for declarator in &decl.declarators {
            let found = self
                .symbols
                .lookup_with_scope(&declarator.name)
                .map(|(scope_id, symbol)| (scope_id, symbol.clone()));
            let Some((scope_id, symbol)) = found else {
                continue;
            };
            match symbol.kind {
                SymbolKind::Typedef | SymbolKind::EnumConstant | SymbolKind::Function => continue,
                SymbolKind::Variable => {}
                _ => continue,
            }

            // Block-scope statics and externs live in the data section.
            if let Some(label) = &symbol.global_label {
                let already_emitted = self.program.globals.iter().any(|g| g.name == *label);
                if symbol.storage == StorageClass::Static && !already_emitted {
                    let initializers =
                        self.flatten_initializer(declarator.init.as_ref(), &symbol.ty)?;
                    self.program.globals.push(GlobalVar {
                        name: label.clone(),
                        ty: symbol.ty.clone(),
                        is_extern: false,
                        initializers,
                    });
                } else if symbol.storage == StorageClass::Extern && !already_emitted {
                    self.program.globals.push(GlobalVar {
                        name: label.clone(),
                        ty: symbol.ty.clone(),
                        is_extern: true,
                        initializers: Vec::new(),
                    });
                }
                continue;
            }

            // Frame local: pick the unique IR name (shadowing gets a
            // monotonic suffix).
            let ir_name = if self.used_names.contains(&declarator.name) {
                self.shadow_counter += 1;
                format!("{}.{}", declarator.name, self.shadow_counter)
            } else {
                declarator.name.clone()
            };
            self.used_names.insert(ir_name.clone());
            self.ir_names
                .insert((scope_id, declarator.name.clone()), ir_name.clone());

            if let Some(init) = &declarator.init {
                let variable = Operand::Variable(ir_name, symbol.ty.clone());
                let addr = self.new_temp(CType::pointer_to(symbol.ty.clone()));
                self.emit(Quad::new(
                    Opcode::LoadAddr,
                    addr.clone(),
                    variable,
                    Operand::None,
                ));
                self.lower_local_initializer(&addr, &symbol.ty, init)?;
            }
        }
        Ok(())
    }

    /// Store an initializer through `addr` (a pointer to `ty`),
    /// descending into brace lists and zero-filling missing elements.
    fn lower_local_initializer(
        &mut self,
        addr: &Operand,
        ty: &CType,
        init: &Initializer,
    ) -> IrResult<()> {
        match init {
            Initializer::Expr(expr) => {
                let (value, value_ty) = self.lower_decayed(expr)?;
                let value = self.convert_operand(value, &value_ty, ty);
                self.emit(Quad::new(Opcode::Store, addr.clone(), value, Operand::None));
                Ok(())
            }
            Initializer::List { items, .. } => match &ty.kind {
                TypeKind::Array { element, length } => {
                    let element = element.as_ref().clone();
                    let length = length.unwrap_or(items.len() as u64);
                    for index in 0..length {
                        let slot = self.new_temp(CType::pointer_to(element.clone()));
                        self.emit(Quad::new(
                            Opcode::IndexAddr,
                            slot.clone(),
                            addr.clone(),
                            Operand::IntConst(index as i64, CType::long()),
                        ));
                        match items.get(index as usize) {
                            Some(item) => self.lower_local_initializer(&slot, &element, item)?,
                            None => self.zero_fill(&slot, &element)?,
                        }
                    }
                    Ok(())
                }
                TypeKind::Record { tag, is_union } => {
                    let layout = match self.symbols.tags().record(tag) {
                        Some(layout) if layout.complete => layout.clone(),
                        _ => {
                            return internal(format!(
                                "initializer for unresolved record '{}'",
                                tag
                            ));
                        }
                    };
                    let member_count = if *is_union { 1 } else { layout.members.len() };
                    for (index, member) in layout.members.iter().take(member_count).enumerate() {
                        let slot = self.new_temp(CType::pointer_to(member.ty.clone()));
                        self.emit(Quad::new(
                            Opcode::MemberAddr,
                            slot.clone(),
                            addr.clone(),
                            Operand::IntConst(member.offset as i64, CType::long()),
                        ));
                        match items.get(index) {
                            Some(item) => self.lower_local_initializer(&slot, &member.ty, item)?,
                            None => self.zero_fill(&slot, &member.ty)?,
                        }
                    }
                    Ok(())
                }
                _ => match items.first() {
                    Some(item) => self.lower_local_initializer(addr, ty, item),
                    None => self.zero_fill(addr, ty),
                },
            },
        }
    }

    fn zero_fill(&mut self, addr: &Operand, ty: &CType) -> IrResult<()> {
        match &ty.kind {
            TypeKind::Array { element, length } => {
                let element = element.as_ref().clone();
                for index in 0..length.unwrap_or(0) {
                    let slot = self.new_temp(CType::pointer_to(element.clone()));
                    self.emit(Quad::new(
                        Opcode::IndexAddr,
                        slot.clone(),
                        addr.clone(),
                        Operand::IntConst(index as i64, CType::long()),
                    ));
                    self.zero_fill(&slot, &element)?;
                }
                Ok(())
            }
            TypeKind::Record { tag, .. } => {
                let layout = match self.symbols.tags().record(tag) {
                    Some(layout) => layout.clone(),
                    None => return internal(format!("unknown record '{}'", tag)),
                };
                for member in &layout.members {
                    let slot = self.new_temp(CType::pointer_to(member.ty.clone()));
                    self.emit(Quad::new(
                        Opcode::MemberAddr,
                        slot.clone(),
                        addr.clone(),
                        Operand::IntConst(member.offset as i64, CType::long()),
                    ));
                    self.zero_fill(&slot, &member.ty)?;
                }
                Ok(())
            }
            _ => {
                let zero = if ty.is_float() {
                    Operand::FloatConst(0.0, ty.clone())
                } else {
                    Operand::IntConst(0, ty.clone())
                };
                self.emit(Quad::new(Opcode::Store, addr.clone(), zero, Operand::None));
                Ok(())
            }
        }
    }

    // -- statements -------------------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) -> IrResult<()> {
        match &stmt.kind {
            StmtKind::Expr(None) => Ok(()),
            StmtKind::Expr(Some(expr)) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            StmtKind::Compound(compound) => {
                let Some(scope_id) = compound.scope_id else {
                    return internal("compound statement has no scope id");
                };
                self.symbols.reenter_scope(scope_id);
                for item in &compound.items {
                    self.lower_block_item(item)?;
                }
                self.symbols.exit_scope();
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower_expr(cond)?;
                match else_branch {
                    Some(else_branch) => {
                        let else_label = self.new_label();
                        let end = self.new_label();
                        self.emit(Quad::new(
                            Opcode::JumpFalse,
                            cond,
                            Operand::Label(else_label.clone()),
                            Operand::None,
                        ));
                        self.lower_stmt(then_branch)?;
                        self.emit(Quad::jump(end.clone()));
                        self.emit(Quad::label(else_label));
                        self.lower_stmt(else_branch)?;
                        self.emit(Quad::label(end));
                    }
                    None => {
                        let end = self.new_label();
                        self.emit(Quad::new(
                            Opcode::JumpFalse,
                            cond,
                            Operand::Label(end.clone()),
                            Operand::None,
                        ));
                        self.lower_stmt(then_branch)?;
                        self.emit(Quad::label(end));
                    }
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                let start = self.new_label();
                let end = self.new_label();
                self.emit(Quad::label(start.clone()));
                let cond = self.lower_expr(cond)?;
                self.emit(Quad::new(
                    Opcode::JumpFalse,
                    cond,
                    Operand::Label(end.clone()),
                    Operand::None,
                ));
                self.break_targets.push(end.clone());
                self.continue_targets.push(start.clone());
                self.lower_stmt(body)?;
                self.break_targets.pop();
                self.continue_targets.pop();
                self.emit(Quad::jump(start));
                self.emit(Quad::label(end));
                Ok(())
            }
            StmtKind::DoWhile { body, cond } => {
                let start = self.new_label();
                let cond_label = self.new_label();
                let end = self.new_label();
                self.emit(Quad::label(start.clone()));
                self.break_targets.push(end.clone());
                self.continue_targets.push(cond_label.clone());
                self.lower_stmt(body)?;
                self.break_targets.pop();
                self.continue_targets.pop();
                self.emit(Quad::label(cond_label));
                let cond = self.lower_expr(cond)?;
                self.emit(Quad::new(
                    Opcode::JumpTrue,
                    cond,
                    Operand::Label(start),
                    Operand::None,
                ));
                self.emit(Quad::label(end));
                Ok(())
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
                scope_id,
            } => {
                let Some(scope_id) = scope_id else {
                    return internal("for statement has no scope id");
                };
                self.symbols.reenter_scope(*scope_id);
                if let Some(init) = init {
                    match init.as_ref() {
                        ForInit::Declaration(decl) => self.lower_local_declaration(decl)?,
                        ForInit::Expr(expr) => {
                            self.lower_expr(expr)?;
                        }
                    }
                }
                let cond_label = self.new_label();
                let inc_label = self.new_label();
                let end = self.new_label();
                self.emit(Quad::label(cond_label.clone()));
                if let Some(cond) = cond {
                    let cond = self.lower_expr(cond)?;
                    self.emit(Quad::new(
                        Opcode::JumpFalse,
                        cond,
                        Operand::Label(end.clone()),
                        Operand::None,
                    ));
                }
                self.break_targets.push(end.clone());
                self.continue_targets.push(inc_label.clone());
                self.lower_stmt(body)?;
                self.break_targets.pop();
                self.continue_targets.pop();
                self.emit(Quad::label(inc_label));
                if let Some(step) = step {
                    self.lower_expr(step)?;
                }
                self.emit(Quad::jump(cond_label));
                self.emit(Quad::label(end));
                self.symbols.exit_scope();
                Ok(())
            }
            StmtKind::Switch { cond, body } => {
                let cond = self.lower_expr(cond)?;
                let table = self.new_label();
                let body_label = self.new_label();
                let end = self.new_label();
                self.switch_stack.push(SwitchLowering {
                    cond,
                    cases: Vec::new(),
                    default: None,
                    end: end.clone(),
                });
                self.break_targets.push(end.clone());
                self.emit(Quad::jump(table.clone()));
                self.emit(Quad::label(body_label));
                self.lower_stmt(body)?;
                self.emit(Quad::jump(end.clone()));
                self.break_targets.pop();
                let Some(lowering) = self.switch_stack.pop() else {
                    return internal("switch stack underflow");
                };
                self.emit(Quad::label(table));
                for (value, label) in &lowering.cases {
                    let flag = self.new_temp(CType::int());
                    self.emit(Quad::new(
                        Opcode::Eq,
                        flag.clone(),
                        lowering.cond.clone(),
                        Operand::IntConst(*value, CType::long()),
                    ));
                    self.emit(Quad::new(
                        Opcode::JumpTrue,
                        flag,
                        Operand::Label(label.clone()),
                        Operand::None,
                    ));
                }
                let fallback = lowering.default.clone().unwrap_or_else(|| lowering.end.clone());
                self.emit(Quad::jump(fallback));
                self.emit(Quad::label(end));
                Ok(())
            }
            StmtKind::Case {
                resolved, body, ..
            } => {
                let label = self.new_label();
                self.emit(Quad::label(label.clone()));
                if let Some(value) = resolved {
                    match self.switch_stack.last_mut() {
                        Some(frame) => frame.cases.push((*value, label)),
                        None => return internal("case label outside switch lowering"),
                    }
                }
                self.lower_stmt(body)
            }
            StmtKind::Default { body } => {
                let label = self.new_label();
                self.emit(Quad::label(label.clone()));
                match self.switch_stack.last_mut() {
                    Some(frame) => frame.default = Some(label),
                    None => return internal("default label outside switch lowering"),
                }
                self.lower_stmt(body)
            }
            StmtKind::Break => match self.break_targets.last().cloned() {
                Some(target) => {
                    self.emit(Quad::jump(target));
                    Ok(())
                }
                None => internal("break with no enclosing loop or switch"),
            },
            StmtKind::Continue => match self.continue_targets.last().cloned() {
                Some(target) => {
                    self.emit(Quad::jump(target));
                    Ok(())
                }
                None => internal("continue with no enclosing loop"),
            },
            StmtKind::Return(value) => {
                let operand = match value {
                    Some(expr) => {
                        let (value, value_ty) = self.lower_decayed(expr)?;
                        let target = self.current_return.clone();
                        match target {
                            Some(target) if !target.is_void() => {
                                self.convert_operand(value, &value_ty, &target)
                            }
                            _ => value,
                        }
                    }
                    None => Operand::None,
                };
                self.emit(Quad::new(
                    Opcode::Return,
                    Operand::None,
                    operand,
                    Operand::None,
                ));
                Ok(())
            }
            StmtKind::Goto(label) => {
                self.emit(Quad::jump(label.clone()));
                Ok(())
            }
            StmtKind::Label { name, body } => {
                self.emit(Quad::label(name.clone()));
                self.lower_stmt(body)
            }
        }
    }

    // -- expressions ------------------------------------------------------

    /// Lower an expression to its value operand.
    fn lower_expr(&mut self, expr: &Expr) -> IrResult<Operand> {
        match &expr.kind {
            ExprKind::IntLiteral { value, .. } => {
                Ok(Operand::IntConst(*value, Self::ty_of(expr)?))
            }
            ExprKind::FloatLiteral { value, .. } => {
                Ok(Operand::FloatConst(*value, Self::ty_of(expr)?))
            }
            ExprKind::CharLiteral(c) => Ok(Operand::IntConst(*c as i64, CType::int())),
            ExprKind::StringLiteral(bytes) => {
                let label = self.intern_string(bytes);
                Ok(Operand::Global(
                    label,
                    CType::pointer_to(CType::char_type()),
                ))
            }
            ExprKind::Identifier(name) => self.lower_identifier(name, expr),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, expr),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, expr),
            ExprKind::Assign { op, lhs, rhs } => self.lower_assign(*op, lhs, rhs),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let result_ty = Self::ty_of(expr)?;
                let result = self.new_temp(result_ty.clone());
                let false_label = self.new_label();
                let end = self.new_label();
                let cond = self.lower_expr(cond)?;
                self.emit(Quad::new(
                    Opcode::JumpFalse,
                    cond,
                    Operand::Label(false_label.clone()),
                    Operand::None,
                ));
                let (then_value, then_ty) = self.lower_decayed(then_expr)?;
                let then_value = self.convert_operand(then_value, &then_ty, &result_ty);
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    then_value,
                    Operand::None,
                ));
                self.emit(Quad::jump(end.clone()));
                self.emit(Quad::label(false_label));
                let (else_value, else_ty) = self.lower_decayed(else_expr)?;
                let else_value = self.convert_operand(else_value, &else_ty, &result_ty);
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    else_value,
                    Operand::None,
                ));
                self.emit(Quad::label(end));
                Ok(result)
            }
            ExprKind::Cast { operand, .. } => {
                let target = Self::ty_of(expr)?;
                let (value, value_ty) = self.lower_decayed(operand)?;
                Ok(self.convert_operand(value, &value_ty, &target))
            }
            ExprKind::Subscript { base, index } => {
                let element = Self::ty_of(expr)?;
                let (addr, _) = self.lower_subscript_address(base, index, &element)?;
                let result = self.new_temp(element);
                self.emit(Quad::new(Opcode::Load, result.clone(), addr, Operand::None));
                Ok(result)
            }
            ExprKind::Call { callee, args } => self.lower_call(callee, args, expr),
            ExprKind::Member { .. } => {
                let member_ty = Self::ty_of(expr)?;
                let (addr, _) = self.lower_lvalue_address(expr)?;
                let result = self.new_temp(member_ty);
                self.emit(Quad::new(Opcode::Load, result.clone(), addr, Operand::None));
                Ok(result)
            }
            ExprKind::SizeofExpr(operand) => {
                // Compile-time only; the operand is never evaluated.
                let ty = Self::ty_of(operand)?;
                let size = self.tags_size(&ty);
                Ok(Operand::IntConst(size as i64, CType::unsigned_long()))
            }
            ExprKind::SizeofType { resolved, .. } => {
                let Some(ty) = resolved else {
                    return internal("sizeof type was not resolved");
                };
                let size = self.tags_size(ty);
                Ok(Operand::IntConst(size as i64, CType::unsigned_long()))
            }
        }
    }

    /// Lower an expression and decay arrays/functions to pointer values.
    fn lower_decayed(&mut self, expr: &Expr) -> IrResult<(Operand, CType)> {
        let ty = Self::ty_of(expr)?;
        if let ExprKind::StringLiteral(_) = &expr.kind {
            let operand = self.lower_expr(expr)?;
            return Ok((operand, CType::pointer_to(CType::char_type())));
        }
        if ty.is_array() {
            let Some(element) = ty.element().cloned() else {
                return internal("array type without element");
            };
            let pointer = CType::pointer_to(element);
            let (addr, _) = self.lower_lvalue_address(expr)?;
            return Ok((Self::retype(addr, pointer.clone()), pointer));
        }
        if ty.is_function() {
            let operand = self.lower_expr(expr)?;
            return Ok((operand, ty.decayed()));
        }
        let operand = self.lower_expr(expr)?;
        Ok((operand, ty))
    }

    fn lower_identifier(&mut self, name: &str, expr: &Expr) -> IrResult<Operand> {
        let found = self
            .symbols
            .lookup_with_scope(name)
            .map(|(scope_id, symbol)| (scope_id, symbol.clone()));
        let Some((scope_id, symbol)) = found else {
            return internal(format!(
                "{}: unresolved identifier '{}' reached lowering",
                expr.location, name
            ));
        };
        match symbol.kind {
            SymbolKind::EnumConstant => {
                let Some(value) = symbol.constant_value else {
                    return internal(format!("enum constant '{}' has no value", name));
                };
                Ok(Operand::IntConst(value, CType::int()))
            }
            SymbolKind::Function => Ok(Operand::Label(
                symbol.global_label.unwrap_or_else(|| name.to_string()),
            )),
            _ => {
                if let Some(label) = symbol.global_label {
                    return Ok(Operand::Global(label, symbol.ty));
                }
                let ir_name = self
                    .ir_names
                    .get(&(scope_id, name.to_string()))
                    .cloned()
                    .unwrap_or_else(|| name.to_string());
                Ok(Operand::Variable(ir_name, symbol.ty))
            }
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, expr: &Expr) -> IrResult<Operand> {
        match op {
            UnaryOp::Plus => self.lower_expr(operand),
            UnaryOp::Neg => {
                let result_ty = Self::ty_of(expr)?;
                let (value, value_ty) = self.lower_decayed(operand)?;
                let value = self.convert_operand(value, &value_ty, &result_ty);
                let result = self.new_temp(result_ty.clone());
                let opcode = if result_ty.is_float() {
                    Opcode::FNeg
                } else {
                    Opcode::Neg
                };
                self.emit(Quad::new(opcode, result.clone(), value, Operand::None));
                Ok(result)
            }
            UnaryOp::BitNot => {
                let result_ty = Self::ty_of(expr)?;
                let (value, value_ty) = self.lower_decayed(operand)?;
                let value = self.convert_operand(value, &value_ty, &result_ty);
                let result = self.new_temp(result_ty);
                self.emit(Quad::new(Opcode::BitNot, result.clone(), value, Operand::None));
                Ok(result)
            }
            UnaryOp::LogicalNot => {
                let (value, _) = self.lower_decayed(operand)?;
                let result = self.new_temp(CType::int());
                self.emit(Quad::new(Opcode::Not, result.clone(), value, Operand::None));
                Ok(result)
            }
            UnaryOp::Deref => {
                let result_ty = Self::ty_of(expr)?;
                let (pointer, _) = self.lower_decayed(operand)?;
                if result_ty.is_function() {
                    // `*fp` on a function pointer is still the function
                    // designator; there is nothing to load.
                    return Ok(pointer);
                }
                let result = self.new_temp(result_ty);
                self.emit(Quad::new(Opcode::Load, result.clone(), pointer, Operand::None));
                Ok(result)
            }
            UnaryOp::AddrOf => {
                let operand_ty = Self::ty_of(operand)?;
                if operand_ty.is_function() {
                    // A function designator is already an address.
                    return self.lower_expr(operand);
                }
                let (addr, _) = self.lower_lvalue_address(operand)?;
                Ok(addr)
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let ty = Self::ty_of(operand)?;
                let (addr, _) = self.lower_lvalue_address(operand)?;
                let old = self.new_temp(ty.clone());
                self.emit(Quad::new(
                    Opcode::Load,
                    old.clone(),
                    addr.clone(),
                    Operand::None,
                ));
                let increasing = matches!(op, UnaryOp::PreInc | UnaryOp::PostInc);
                let new = self.new_temp(ty.clone());
                if ty.is_float() {
                    let opcode = if increasing { Opcode::FAdd } else { Opcode::FSub };
                    self.emit(Quad::new(
                        opcode,
                        new.clone(),
                        old.clone(),
                        Operand::FloatConst(1.0, ty.clone()),
                    ));
                } else {
                    // Pointers step by the pointee size.
                    let step = match ty.pointee() {
                        Some(pointee) => self.tags_size(pointee).max(1) as i64,
                        None => 1,
                    };
                    let opcode = if increasing { Opcode::Add } else { Opcode::Sub };
                    self.emit(Quad::new(
                        opcode,
                        new.clone(),
                        old.clone(),
                        Operand::IntConst(step, ty.clone()),
                    ));
                }
                self.emit(Quad::new(
                    Opcode::Store,
                    addr,
                    new.clone(),
                    Operand::None,
                ));
                let pre = matches!(op, UnaryOp::PreInc | UnaryOp::PreDec);
                Ok(if pre { new } else { old })
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        expr: &Expr,
    ) -> IrResult<Operand> {
        match op {
            BinaryOp::Comma => {
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)
            }
            BinaryOp::LogicalAnd => {
                let result = self.new_temp(CType::int());
                let false_label = self.new_label();
                let end = self.new_label();
                let (left, _) = self.lower_decayed(lhs)?;
                self.emit(Quad::new(
                    Opcode::JumpFalse,
                    left,
                    Operand::Label(false_label.clone()),
                    Operand::None,
                ));
                let (right, _) = self.lower_decayed(rhs)?;
                self.emit(Quad::new(
                    Opcode::JumpFalse,
                    right,
                    Operand::Label(false_label.clone()),
                    Operand::None,
                ));
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    Operand::IntConst(1, CType::int()),
                    Operand::None,
                ));
                self.emit(Quad::jump(end.clone()));
                self.emit(Quad::label(false_label));
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    Operand::IntConst(0, CType::int()),
                    Operand::None,
                ));
                self.emit(Quad::label(end));
                Ok(result)
            }
            BinaryOp::LogicalOr => {
                let result = self.new_temp(CType::int());
                let true_label = self.new_label();
                let end = self.new_label();
                let (left, _) = self.lower_decayed(lhs)?;
                self.emit(Quad::new(
                    Opcode::JumpTrue,
                    left,
                    Operand::Label(true_label.clone()),
                    Operand::None,
                ));
                let (right, _) = self.lower_decayed(rhs)?;
                self.emit(Quad::new(
                    Opcode::JumpTrue,
                    right,
                    Operand::Label(true_label.clone()),
                    Operand::None,
                ));
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    Operand::IntConst(0, CType::int()),
                    Operand::None,
                ));
                self.emit(Quad::jump(end.clone()));
                self.emit(Quad::label(true_label));
                self.emit(Quad::new(
                    Opcode::Assign,
                    result.clone(),
                    Operand::IntConst(1, CType::int()),
                    Operand::None,
                ));
                self.emit(Quad::label(end));
                Ok(result)
            }
            _ => {
                let (left, left_ty) = self.lower_decayed(lhs)?;
                let (right, right_ty) = self.lower_decayed(rhs)?;
                self.lower_binary_values(op, left, left_ty, right, right_ty, expr)
            }
        }
    }

    fn lower_binary_values(
        &mut self,
        op: BinaryOp,
        left: Operand,
        left_ty: CType,
        right: Operand,
        right_ty: CType,
        expr: &Expr,
    ) -> IrResult<Operand> {
        let result_ty = Self::ty_of(expr)?;

        // Pointer arithmetic scales the integer operand by the pointee
        // size; pointer difference divides back down to element units.
        if op == BinaryOp::Add || op == BinaryOp::Sub {
            match (left_ty.is_pointer(), right_ty.is_pointer()) {
                (true, false) => {
                    let scaled = self.scale_index(right, &right_ty, &left_ty)?;
                    let result = self.new_temp(result_ty);
                    let opcode = if op == BinaryOp::Add {
                        Opcode::Add
                    } else {
                        Opcode::Sub
                    };
                    self.emit(Quad::new(opcode, result.clone(), left, scaled));
                    return Ok(result);
                }
                (false, true) => {
                    let scaled = self.scale_index(left, &left_ty, &right_ty)?;
                    let result = self.new_temp(result_ty);
                    self.emit(Quad::new(Opcode::Add, result.clone(), right, scaled));
                    return Ok(result);
                }
                (true, true) if op == BinaryOp::Sub => {
                    let Some(pointee) = left_ty.pointee() else {
                        return internal("pointer difference on non-pointer");
                    };
                    let size = self.tags_size(pointee).max(1);
                    let raw = self.new_temp(CType::long());
                    self.emit(Quad::new(Opcode::Sub, raw.clone(), left, right));
                    let result = self.new_temp(CType::long());
                    self.emit(Quad::new(
                        Opcode::Div,
                        result.clone(),
                        raw,
                        Operand::IntConst(size as i64, CType::long()),
                    ));
                    return Ok(result);
                }
                _ => {}
            }
        }

        // Comparisons pick the float variant when either side is float.
        if matches!(
            op,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        ) {
            let float_compare = left_ty.is_float() || right_ty.is_float();
            let (left, right) = if float_compare {
                let common = CType::double();
                (
                    self.convert_operand(left, &left_ty, &common),
                    self.convert_operand(right, &right_ty, &common),
                )
            } else {
                (left, right)
            };
            let opcode = comparison_opcode(op, float_compare);
            let result = self.new_temp(CType::int());
            self.emit(Quad::new(opcode, result.clone(), left, right));
            return Ok(result);
        }

        // Plain arithmetic/bitwise: bring both operands to the result
        // type, mixed int/float converts the integer side first.
        let left = self.convert_operand(left, &left_ty, &result_ty);
        let right = self.convert_operand(right, &right_ty, &result_ty);
        let opcode = match arithmetic_opcode(op, result_ty.is_float()) {
            Some(opcode) => opcode,
            None => return internal(format!("no opcode for operator {:?}", op)),
        };
        let result = self.new_temp(result_ty);
        self.emit(Quad::new(opcode, result.clone(), left, right));
        Ok(result)
    }

    /// Multiply an integer index by the pointee size of `pointer_ty`.
    fn scale_index(
        &mut self,
        index: Operand,
        index_ty: &CType,
        pointer_ty: &CType,
    ) -> IrResult<Operand> {
        let Some(pointee) = pointer_ty.pointee() else {
            return internal("scaling an index against a non-pointer");
        };
        let size = self.tags_size(pointee).max(1);
        let index = self.convert_operand(index, index_ty, &CType::long());
        let scaled = self.new_temp(CType::long());
        self.emit(Quad::new(
            Opcode::Mul,
            scaled.clone(),
            index,
            Operand::IntConst(size as i64, CType::long()),
        ));
        Ok(scaled)
    }

    fn lower_assign(&mut self, op: AssignOp, lhs: &Expr, rhs: &Expr) -> IrResult<Operand> {
        let Some(target_ty) = lhs.ty.clone() else {
            return internal("assignment target has no type");
        };
        match op.binary_op() {
            None => {
                let (value, value_ty) = self.lower_decayed(rhs)?;
                let value = self.convert_operand(value, &value_ty, &target_ty);
                let (addr, _) = self.lower_lvalue_address(lhs)?;
                self.emit(Quad::new(Opcode::Store, addr, value.clone(), Operand::None));
                Ok(value)
            }
            Some(binary) => {
                let (addr, _) = self.lower_lvalue_address(lhs)?;
                let old = self.new_temp(target_ty.clone());
                self.emit(Quad::new(
                    Opcode::Load,
                    old.clone(),
                    addr.clone(),
                    Operand::None,
                ));
                let (value, value_ty) = self.lower_decayed(rhs)?;

                let new = if target_ty.is_pointer() {
                    // p += n steps by the pointee size.
                    let scaled = self.scale_index(value, &value_ty, &target_ty)?;
                    let new = self.new_temp(target_ty.clone());
                    let opcode = match binary {
                        BinaryOp::Add => Opcode::Add,
                        BinaryOp::Sub => Opcode::Sub,
                        _ => return internal("invalid compound pointer operator"),
                    };
                    self.emit(Quad::new(opcode, new.clone(), old, scaled));
                    new
                } else {
                    let value = self.convert_operand(value, &value_ty, &target_ty);
                    let opcode = match arithmetic_opcode(binary, target_ty.is_float()) {
                        Some(opcode) => opcode,
                        None => return internal("invalid compound operator"),
                    };
                    let new = self.new_temp(target_ty.clone());
                    self.emit(Quad::new(opcode, new.clone(), old, value));
                    new
                };
                self.emit(Quad::new(
                    Opcode::Store,
                    addr,
                    new.clone(),
                    Operand::None,
                ));
                Ok(new)
            }
        }
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], expr: &Expr) -> IrResult<Operand> {
        // Parameter types drive argument conversion; the variadic tail
        // receives the default argument promotions.
        let callee_ty = Self::ty_of(callee)?;
        let function_ty = match &callee_ty.kind {
            TypeKind::Function { .. } => callee_ty.clone(),
            TypeKind::Pointer { pointee } => pointee.as_ref().clone(),
            _ => return internal("call on a non-function value"),
        };
        let TypeKind::Function {
            params, variadic, ..
        } = &function_ty.kind
        else {
            return internal("call on a non-function type");
        };

        let mut values = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let (value, value_ty) = self.lower_decayed(arg)?;
            let converted = match params.get(index) {
                Some(param_ty) => self.convert_operand(value, &value_ty, param_ty),
                None if *variadic => self.promote_variadic(value, &value_ty),
                None => value,
            };
            values.push(converted);
        }

        // An indirect callee may itself emit code, so its operand is
        // determined before the Param run: the N Params must immediately
        // precede the Call.
        let callee_operand = match &callee.kind {
            ExprKind::Identifier(name) => {
                let is_direct = self
                    .symbols
                    .lookup(name)
                    .map(|s| s.kind == SymbolKind::Function)
                    .unwrap_or(false);
                if is_direct {
                    Operand::Label(name.to_string())
                } else {
                    self.lower_expr(callee)?
                }
            }
            _ => {
                let (value, _) = self.lower_decayed(callee)?;
                value
            }
        };

        // Params immediately precede the call, in reverse source order.
        for value in values.iter().rev() {
            self.emit(Quad::new(
                Opcode::Param,
                Operand::None,
                value.clone(),
                Operand::None,
            ));
        }

        let return_ty = Self::ty_of(expr)?;
        let result = if return_ty.is_void() {
            Operand::None
        } else {
            self.new_temp(return_ty)
        };
        self.emit(Quad::new(
            Opcode::Call,
            result.clone(),
            callee_operand,
            Operand::IntConst(args.len() as i64, CType::int()),
        ));
        Ok(result)
    }

    /// Default argument promotions for a variadic tail: integers narrower
    /// than `int` widen, `float` becomes `double`.
    fn promote_variadic(&mut self, value: Operand, ty: &CType) -> Operand {
        if ty.is_float() {
            return self.convert_operand(value, ty, &CType::double());
        }
        if ty.is_integer() {
            let promoted = integral_promotion(ty);
            return self.convert_operand(value, ty, &promoted);
        }
        value
    }

    /// Lower an lvalue expression to `(address operand, object type)`.
    fn lower_lvalue_address(&mut self, expr: &Expr) -> IrResult<(Operand, CType)> {
        let object_ty = Self::ty_of(expr)?;
        match &expr.kind {
            ExprKind::Identifier(name) => {
                let operand = self.lower_identifier(name, expr)?;
                match operand {
                    Operand::Variable(..) | Operand::Global(..) => {
                        let addr = self.new_temp(CType::pointer_to(object_ty.clone()));
                        self.emit(Quad::new(
                            Opcode::LoadAddr,
                            addr.clone(),
                            operand,
                            Operand::None,
                        ));
                        Ok((addr, object_ty))
                    }
                    _ => internal(format!("'{}' is not an addressable object", name)),
                }
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                // The pointer value *is* the address.
                let (pointer, _) = self.lower_decayed(operand)?;
                Ok((pointer, object_ty))
            }
            ExprKind::Subscript { base, index } => {
                self.lower_subscript_address(base, index, &object_ty)
            }
            ExprKind::Member {
                base,
                member,
                arrow,
            } => {
                let base_addr = if *arrow {
                    let (pointer, _) = self.lower_decayed(base)?;
                    pointer
                } else {
                    let (addr, _) = self.lower_lvalue_address(base)?;
                    addr
                };
                let record_ty = if *arrow {
                    match Self::ty_of(base)?.decayed().pointee() {
                        Some(p) => p.clone(),
                        None => return internal("'->' base is not a pointer"),
                    }
                } else {
                    Self::ty_of(base)?
                };
                let TypeKind::Record { tag, .. } = &record_ty.kind else {
                    return internal("member access base is not a record");
                };
                let offset = match self
                    .symbols
                    .tags()
                    .record(tag)
                    .and_then(|layout| layout.member(member))
                {
                    Some(member) => member.offset,
                    None => {
                        return internal(format!("unknown member '{}' in '{}'", member, tag));
                    }
                };
                let addr = self.new_temp(CType::pointer_to(object_ty.clone()));
                self.emit(Quad::new(
                    Opcode::MemberAddr,
                    addr.clone(),
                    base_addr,
                    Operand::IntConst(offset as i64, CType::long()),
                ));
                Ok((addr, object_ty))
            }
            _ => internal(format!(
                "{}: expression is not an lvalue in lowering",
                expr.location
            )),
        }
    }

    fn lower_subscript_address(
        &mut self,
        base: &Expr,
        index: &Expr,
        element: &CType,
    ) -> IrResult<(Operand, CType)> {
        // Either side may be the pointer (`a[i]` and `i[a]` agree).
        let base_ty = Self::ty_of(base)?.decayed();
        let (pointer, index_value) = if base_ty.is_pointer() {
            let (pointer, _) = self.lower_decayed(base)?;
            let (index_value, _) = self.lower_decayed(index)?;
            (pointer, index_value)
        } else {
            let (pointer, _) = self.lower_decayed(index)?;
            let (index_value, _) = self.lower_decayed(base)?;
            (pointer, index_value)
        };
        let addr = self.new_temp(CType::pointer_to(element.clone()));
        self.emit(Quad::new(
            Opcode::IndexAddr,
            addr.clone(),
            pointer,
            index_value,
        ));
        Ok((addr, element.clone()))
    }

    /// Emit whatever conversion moves `value` from `from` to `to`.
    /// Compatible types need no conversion and pass through untouched.
    fn convert_operand(&mut self, value: Operand, from: &CType, to: &CType) -> Operand {
        if compatible(from, to) {
            return value;
        }
        if from.is_integer() && to.is_float() {
            let result = self.new_temp(to.clone());
            self.emit(Quad::new(Opcode::IntToFloat, result.clone(), value, Operand::None));
            return result;
        }
        if from.is_float() && to.is_integer() {
            let result = self.new_temp(to.clone());
            self.emit(Quad::new(Opcode::FloatToInt, result.clone(), value, Operand::None));
            return result;
        }
        if from.is_float() && to.is_float() {
            // No float-width opcode; the backend reads operand types.
            let result = self.new_temp(to.clone());
            self.emit(Quad::new(Opcode::Assign, result.clone(), value, Operand::None));
            return result;
        }
        if from.is_integer() && to.is_integer() {
            let from_size = self.tags_size(from);
            let to_size = self.tags_size(to);
            if to_size > from_size {
                let result = self.new_temp(to.clone());
                self.emit(Quad::new(Opcode::IntExtend, result.clone(), value, Operand::None));
                return result;
            }
            if to_size < from_size {
                let result = self.new_temp(to.clone());
                self.emit(Quad::new(Opcode::IntTrunc, result.clone(), value, Operand::None));
                return result;
            }
            // Same width, signedness differs: a machine no-op.
            return value;
        }
        if from.is_pointer() && to.is_integer() {
            let result = self.new_temp(to.clone());
            self.emit(Quad::new(Opcode::PtrToInt, result.clone(), value, Operand::None));
            return result;
        }
        if from.is_integer() && to.is_pointer() {
            let result = self.new_temp(to.clone());
            self.emit(Quad::new(Opcode::IntToPtr, result.clone(), value, Operand::None));
            return result;
        }
        // Pointer-to-pointer and anything structural: value passes
        // through unchanged.
        value
    }
}

fn comparison_opcode(op: BinaryOp, float: bool) -> Opcode {
    match (op, float) {
        (BinaryOp::Eq, false) => Opcode::Eq,
        (BinaryOp::Ne, false) => Opcode::Ne,
        (BinaryOp::Lt, false) => Opcode::Lt,
        (BinaryOp::Le, false) => Opcode::Le,
        (BinaryOp::Gt, false) => Opcode::Gt,
        (BinaryOp::Ge, false) => Opcode::Ge,
        (BinaryOp::Eq, true) => Opcode::FEq,
        (BinaryOp::Ne, true) => Opcode::FNe,
        (BinaryOp::Lt, true) => Opcode::FLt,
        (BinaryOp::Le, true) => Opcode::FLe,
        (BinaryOp::Gt, true) => Opcode::FGt,
        (BinaryOp::Ge, true) => Opcode::FGe,
        _ => Opcode::Nop,
    }
}

fn arithmetic_opcode(op: BinaryOp, float: bool) -> Option<Opcode> {
    let opcode = match (op, float) {
        (BinaryOp::Add, false) => Opcode::Add,
        (BinaryOp::Sub, false) => Opcode::Sub,
        (BinaryOp::Mul, false) => Opcode::Mul,
        (BinaryOp::Div, false) => Opcode::Div,
        (BinaryOp::Mod, false) => Opcode::Mod,
        (BinaryOp::Add, true) => Opcode::FAdd,
        (BinaryOp::Sub, true) => Opcode::FSub,
        (BinaryOp::Mul, true) => Opcode::FMul,
        (BinaryOp::Div, true) => Opcode::FDiv,
        (BinaryOp::Shl, _) => Opcode::Shl,
        (BinaryOp::Shr, _) => Opcode::Shr,
        (BinaryOp::BitAnd, _) => Opcode::BitAnd,
        (BinaryOp::BitOr, _) => Opcode::BitOr,
        (BinaryOp::BitXor, _) => Opcode::BitXor,
        _ => return None,
    };
    Some(opcode)
}

/// Constant-fold a floating-typed initializer expression.
fn eval_float(expr: &Expr, symbols: &SymbolTable) -> Option<f64> {
    match &expr.kind {
        ExprKind::FloatLiteral { value, .. } => Some(*value),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => eval_float(operand, symbols).map(|v| -v),
        ExprKind::Unary {
            op: UnaryOp::Plus,
            operand,
        } => eval_float(operand, symbols),
        ExprKind::Cast { operand, .. } => eval_float(operand, symbols),
        _ => evaluate_const(expr, symbols).map(|v| v as f64),
    }
}

/// Recognize initializers of the form `&name` or a bare `name` that
/// denotes a function or static-storage object.
fn address_initializer(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Unary {
            op: UnaryOp::AddrOf,
            operand,
        } => match &operand.kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            _ => None,
        },
        ExprKind::Identifier(name) => {
            let ty = expr.ty.as_ref()?;
            if ty.is_function() || ty.is_array() {
                Some(name.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::parser::parse_source;

    fn lower(source: &str) -> IrProgram {
        let (mut unit, diags) = parse_source(source, "test.c");
        assert!(!diags.has_errors(), "parse failed: {:?}", diags.errors());
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&mut unit);
        assert!(
            !analyzer.diagnostics().has_errors(),
            "analysis failed: {:?}",
            analyzer.diagnostics().errors()
        );
        let (symbols, _) = analyzer.into_parts();
        IrGen::new(symbols).generate(&unit).expect("lowering failed")
    }

    fn function<'a>(program: &'a IrProgram, name: &str) -> &'a FunctionIr {
        program
            .functions
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no function '{}'", name))
    }

    #[test]
    fn test_constant_folded_global() {
        let program = lower("int x = 3 + 4 * 2;");
        assert!(program.functions.is_empty());
        assert_eq!(program.globals.len(), 1);
        assert_eq!(program.globals[0].name, "x");
        assert_eq!(program.globals[0].initializers, vec![InitValue::Integer(11, 4)]);
    }

    #[test]
    fn test_call_sequence_and_return() {
        let program = lower("int f(int n){ return n*n; } int main(){ return f(5); }");
        let main = function(&program, "main");
        let n = main.quads.len();
        assert!(n >= 3);
        let param = &main.quads[n - 3];
        assert_eq!(param.opcode, Opcode::Param);
        assert_eq!(param.arg1, Operand::IntConst(5, CType::int()));
        let call = &main.quads[n - 2];
        assert_eq!(call.opcode, Opcode::Call);
        assert_eq!(call.arg1, Operand::Label("f".to_string()));
        assert_eq!(call.arg2, Operand::IntConst(1, CType::int()));
        let ret = &main.quads[n - 1];
        assert_eq!(ret.opcode, Opcode::Return);
        assert_eq!(ret.arg1, call.result);
    }

    #[test]
    fn test_char_array_global_from_string() {
        let program = lower("char s[] = \"hi\";");
        assert_eq!(
            program.globals[0].ty,
            CType::array_of(CType::char_type(), Some(3))
        );
        assert_eq!(
            program.globals[0].initializers,
            vec![
                InitValue::Integer(b'h' as i64, 1),
                InitValue::Integer(b'i' as i64, 1),
                InitValue::Integer(0, 1),
            ]
        );
    }

    #[test]
    fn test_partial_array_initializer_zero_pads() {
        let program = lower("int a[3] = {1, 2};");
        assert_eq!(
            program.globals[0].initializers,
            vec![
                InitValue::Integer(1, 4),
                InitValue::Integer(2, 4),
                InitValue::Zero(4),
            ]
        );
    }

    #[test]
    fn test_enum_constant_in_global_initializer() {
        let program = lower("enum e { A, B = 5, C }; int z = C;");
        assert_eq!(program.globals[0].initializers, vec![InitValue::Integer(6, 4)]);
    }

    #[test]
    fn test_pointer_plus_int_scales() {
        let program = lower("int *f(int *p, int i) { return p + i; }");
        let f = function(&program, "f");
        let mul = f
            .quads
            .iter()
            .find(|q| q.opcode == Opcode::Mul)
            .expect("no scaling Mul emitted");
        assert_eq!(mul.arg2, Operand::IntConst(4, CType::long()));
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::Add));
    }

    #[test]
    fn test_pointer_difference_divides() {
        let program = lower("long f(int *p, int *q) { return p - q; }");
        let f = function(&program, "f");
        let div = f
            .quads
            .iter()
            .find(|q| q.opcode == Opcode::Div)
            .expect("no Div emitted");
        assert_eq!(div.arg2, Operand::IntConst(4, CType::long()));
    }

    #[test]
    fn test_switch_lowering_shape() {
        let program = lower(
            "int f(void); int g(void);\n\
             int main(int x) { switch (x) { case 1: f(); break; default: g(); } return 0; }",
        );
        let main = function(&program, "main");
        // Comparison ladder: an Eq against the condition, a JumpTrue to
        // the case label, then a Jump to the default label.
        let eq_index = main
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::Eq)
            .expect("no Eq in ladder");
        assert_eq!(main.quads[eq_index].arg2, Operand::IntConst(1, CType::long()));
        assert_eq!(main.quads[eq_index + 1].opcode, Opcode::JumpTrue);
        assert_eq!(main.quads[eq_index + 2].opcode, Opcode::Jump);
        // Both branches call; the break jumps to the end label.
        assert_eq!(
            main.quads.iter().filter(|q| q.opcode == Opcode::Call).count(),
            2
        );
        let jump_true_target = main.quads[eq_index + 1].arg1.label_name().unwrap();
        assert!(
            main.quads
                .iter()
                .any(|q| q.opcode == Opcode::Label
                    && q.result.label_name() == Some(jump_true_target))
        );
    }

    #[test]
    fn test_short_circuit_and_skips_call() {
        let program = lower("int c(void); int f(int a, int b) { if (a && b) c(); return 0; }");
        let f = function(&program, "f");
        // Two JumpFalse exits guard the call; exactly one call total.
        let call_index = f
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::Call)
            .expect("no call");
        let jump_false_before = f.quads[..call_index]
            .iter()
            .filter(|q| q.opcode == Opcode::JumpFalse)
            .count();
        assert!(jump_false_before >= 3); // two from &&, one from if
        assert_eq!(
            f.quads.iter().filter(|q| q.opcode == Opcode::Call).count(),
            1
        );
    }

    #[test]
    fn test_param_call_adjacency_reverse_order() {
        let program = lower(
            "int h(int a, int b, int c);\n\
             int main(void) { return h(1, 2, 3); }",
        );
        let main = function(&program, "main");
        let call_index = main
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::Call)
            .expect("no call");
        // The three preceding quads are Params in reverse source order.
        for offset in 1..=3 {
            assert_eq!(main.quads[call_index - offset].opcode, Opcode::Param);
        }
        assert_eq!(
            main.quads[call_index - 1].arg1,
            Operand::IntConst(1, CType::int())
        );
        assert_eq!(
            main.quads[call_index - 2].arg1,
            Operand::IntConst(2, CType::int())
        );
        assert_eq!(
            main.quads[call_index - 3].arg1,
            Operand::IntConst(3, CType::int())
        );
    }

    #[test]
    fn test_indirect_call_keeps_param_adjacency() {
        let program = lower("int apply(int (*op)(int, int)) { return op(1, 2); }");
        let apply = function(&program, "apply");
        let call_index = apply
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::Call)
            .expect("no call");
        assert_eq!(apply.quads[call_index - 1].opcode, Opcode::Param);
        assert_eq!(apply.quads[call_index - 2].opcode, Opcode::Param);
        // The callee is the function-pointer value, not a label.
        assert!(matches!(
            apply.quads[call_index].arg1,
            Operand::Variable(..)
        ));
    }

    #[test]
    fn test_typedef_extern_only_produces_no_code() {
        let program = lower("typedef int word; extern word limit; extern int table[];");
        assert!(program.functions.is_empty());
        let init_bytes: u64 = program
            .globals
            .iter()
            .flat_map(|g| g.initializers.iter())
            .map(|i| i.size())
            .sum();
        assert_eq!(init_bytes, 0);
        assert!(program.globals.iter().all(|g| g.is_extern));
    }

    #[test]
    fn test_sizeof_never_reaches_ir_as_operation() {
        let program = lower("unsigned long f(int *p) { return sizeof *p + sizeof(long); }");
        let f = function(&program, "f");
        // No Load of *p; the whole expression folds to constants.
        assert!(f.quads.iter().all(|q| q.opcode != Opcode::Load));
        let add = f
            .quads
            .iter()
            .find(|q| q.opcode == Opcode::Add)
            .expect("no add");
        assert_eq!(add.arg1, Operand::IntConst(4, CType::unsigned_long()));
        assert_eq!(add.arg2, Operand::IntConst(8, CType::unsigned_long()));
    }

    #[test]
    fn test_struct_global_initializer_sizes_sum_to_type_size() {
        let program = lower(
            "struct s { char c; int x; long l; };\n\
             struct s g = {1, 2};",
        );
        let global = &program.globals[0];
        let total: u64 = global.initializers.iter().map(|i| i.size()).sum();
        assert_eq!(total, 16);
        // Padding after 'c' and the missing 'l' both appear as zeros.
        assert_eq!(
            global.initializers,
            vec![
                InitValue::Integer(1, 1),
                InitValue::Zero(3),
                InitValue::Integer(2, 4),
                InitValue::Zero(8),
            ]
        );
    }

    #[test]
    fn test_string_pool_interns_duplicates() {
        let program = lower(
            "char *a = \"shared\"; char *b = \"shared\"; char *c = \"other\";",
        );
        assert_eq!(program.string_pool.len(), 2);
        assert_eq!(program.globals[0].initializers, program.globals[1].initializers);
    }

    #[test]
    fn test_shadowed_local_gets_unique_name() {
        let program = lower(
            "int f(void) { int x = 1; { int x = 2; x = x + 1; } return x; }",
        );
        let f = function(&program, "f");
        let mut names: Vec<&str> = f
            .quads
            .iter()
            .filter(|q| q.opcode == Opcode::LoadAddr)
            .filter_map(|q| match &q.arg1 {
                Operand::Variable(name, _) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        names.sort();
        names.dedup();
        assert!(names.contains(&"x"));
        assert!(names.iter().any(|n| n.starts_with("x.")));
    }

    #[test]
    fn test_while_loop_shape() {
        let program = lower("int f(int n) { while (n) { n = n - 1; } return n; }");
        let f = function(&program, "f");
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::JumpFalse));
        // Backward jump to the loop head.
        let labels: Vec<&str> = f
            .quads
            .iter()
            .filter(|q| q.opcode == Opcode::Label)
            .filter_map(|q| q.result.label_name())
            .collect();
        let jumps: Vec<&str> = f
            .quads
            .iter()
            .filter(|q| q.opcode == Opcode::Jump)
            .filter_map(|q| q.result.label_name())
            .collect();
        assert!(jumps.iter().all(|target| labels.contains(target)));
    }

    #[test]
    fn test_jump_targets_exist_in_function() {
        let program = lower(
            "int f(int n) {\n\
             int total = 0;\n\
             for (; n > 0; n--) { if (n == 2) continue; total += n; }\n\
             do { total++; } while (total < 10);\n\
             switch (n) { case 0: total = 1; break; default: total = 2; }\n\
             return total;\n\
             }",
        );
        let f = function(&program, "f");
        let labels: HashSet<&str> = f
            .quads
            .iter()
            .filter(|q| q.opcode == Opcode::Label)
            .filter_map(|q| q.result.label_name())
            .collect();
        for quad in &f.quads {
            match quad.opcode {
                Opcode::Jump => {
                    assert!(labels.contains(quad.result.label_name().unwrap()));
                }
                Opcode::JumpTrue | Opcode::JumpFalse => {
                    assert!(labels.contains(quad.arg1.label_name().unwrap()));
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_float_arithmetic_converts_ints() {
        let program = lower("double f(int i, double d) { return i + d; }");
        let f = function(&program, "f");
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::IntToFloat));
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::FAdd));
    }

    #[test]
    fn test_member_store_uses_member_addr() {
        let program = lower(
            "struct point { int x; int y; };\n\
             void f(struct point *p) { p->y = 3; }",
        );
        let f = function(&program, "f");
        let member = f
            .quads
            .iter()
            .find(|q| q.opcode == Opcode::MemberAddr)
            .expect("no MemberAddr");
        assert_eq!(member.arg2, Operand::IntConst(4, CType::long()));
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::Store));
    }

    #[test]
    fn test_subscript_load_via_index_addr() {
        let program = lower("int f(int *a, int i) { return a[i]; }");
        let f = function(&program, "f");
        let index = f
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::IndexAddr)
            .expect("no IndexAddr");
        assert!(f.quads[index + 1..].iter().any(|q| q.opcode == Opcode::Load));
    }

    #[test]
    fn test_array_argument_decays() {
        let program = lower(
            "int sum(int *p, int n);\n\
             int go(void) { int a[4]; return sum(a, 4); }",
        );
        let go = function(&program, "go");
        assert!(go.quads.iter().any(|q| q.opcode == Opcode::LoadAddr));
    }

    #[test]
    fn test_post_increment_returns_old_value() {
        let program = lower("int f(int n) { return n++; }");
        let f = function(&program, "f");
        // Load old, add 1, store new, return the old temp.
        let load_index = f
            .quads
            .iter()
            .position(|q| q.opcode == Opcode::Load)
            .expect("no load");
        let old = f.quads[load_index].result.clone();
        let ret = f.quads.last().unwrap();
        assert_eq!(ret.opcode, Opcode::Return);
        assert_eq!(ret.arg1, old);
        assert!(f.quads.iter().any(|q| q.opcode == Opcode::Store));
    }

    #[test]
    fn test_static_local_becomes_global() {
        let program = lower("int counter(void) { static int n = 5; n++; return n; }");
        assert_eq!(program.globals.len(), 1);
        assert!(program.globals[0].name.starts_with("n."));
        assert_eq!(program.globals[0].initializers, vec![InitValue::Integer(5, 4)]);
    }

    #[test]
    fn test_void_call_has_no_result() {
        let program = lower("void g(void); int main(void) { g(); return 0; }");
        let main = function(&program, "main");
        let call = main
            .quads
            .iter()
            .find(|q| q.opcode == Opcode::Call)
            .expect("no call");
        assert_eq!(call.result, Operand::None);
    }

    #[test]
    fn test_implicit_return_appended() {
        let program = lower("void f(int n) { n = n + 1; }");
        let f = function(&program, "f");
        assert_eq!(f.quads.last().unwrap().opcode, Opcode::Return);
    }

    #[test]
    fn test_stack_size_recorded() {
        let program = lower("int f(void) { int a; long b; char c; a = 0; return a; }");
        let f = function(&program, "f");
        // int at -4, long realigns to -16, char at -17.
        assert_eq!(f.stack_size, 17);
    }

    #[test]
    fn test_global_pointer_to_string() {
        let program = lower("char *greeting = \"hello\";");
        assert_eq!(program.string_pool.len(), 1);
        assert_eq!(
            program.globals[0].initializers,
            vec![InitValue::String(".LC0".to_string())]
        );
    }

    #[test]
    fn test_address_of_global_in_initializer() {
        let program = lower("int x; int *p = &x;");
        let p = program.globals.iter().find(|g| g.name == "p").unwrap();
        assert_eq!(p.initializers, vec![InitValue::Address("x".to_string())]);
    }

    #[test]
    fn test_tentative_definition_collapses_to_one_global() {
        let program = lower("int x; int x = 3;");
        assert_eq!(program.globals.len(), 1);
        assert_eq!(program.globals[0].initializers, vec![InitValue::Integer(3, 4)]);

        let program = lower("extern int y; int y = 7;");
        let y = program.globals.iter().find(|g| g.name == "y").unwrap();
        assert!(!y.is_extern);
        assert_eq!(y.initializers, vec![InitValue::Integer(7, 4)]);
    }

    #[test]
    fn test_function_pointer_global_initializer() {
        let program = lower("int f(void); int (*fp)(void) = f;");
        let fp = program.globals.iter().find(|g| g.name == "fp").unwrap();
        assert_eq!(fp.initializers, vec![InitValue::Address("f".to_string())]);
    }
}
