//! Abstract syntax trees.
//!
//! The parser produces *syntactic* types ([`TypeSyntax`]) alongside the
//! declaration/statement/expression trees; the analyzer resolves them to
//! [`CType`]s, fills every expression's inferred-type slot, and stamps
//! compound/for/function nodes with the id of the scope it created so the
//! IR generator can re-enter the same scopes.
//!
//! Ownership is tree-shaped: each node exclusively owns its children and
//! the translation unit owns every top-level declaration.

use crate::diagnostics::SourceLocation;
use crate::symbols::StorageClass;
use crate::types::{CType, FloatRank, IntRank, Qualifiers};
use std::fmt::Write;

/// A type as written in the source, before name resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSyntax {
    Base {
        base: BaseTypeSyntax,
        qualifiers: Qualifiers,
    },
    Pointer {
        inner: Box<TypeSyntax>,
        qualifiers: Qualifiers,
    },
    Array {
        element: Box<TypeSyntax>,
        /// Bound expression; `None` for `[]` (length inferred or
        /// incomplete).
        length: Option<Box<Expr>>,
    },
    Function {
        return_type: Box<TypeSyntax>,
        params: Vec<ParamDecl>,
        variadic: bool,
    },
}

/// The specifier part of a syntactic type.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseTypeSyntax {
    Void,
    Integer { rank: IntRank, unsigned: bool },
    Float { rank: FloatRank },
    /// A typedef name.
    Named(String),
    /// `struct`/`union` specifier, with members when a body is present.
    Record {
        tag: Option<String>,
        is_union: bool,
        members: Option<Vec<MemberDecl>>,
    },
    /// `enum` specifier, with enumerators when a body is present.
    Enum {
        tag: Option<String>,
        enumerators: Option<Vec<EnumeratorDecl>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub ty: TypeSyntax,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratorDecl {
    pub name: String,
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    /// `None` for unnamed prototype parameters.
    pub name: Option<String>,
    pub ty: TypeSyntax,
    pub location: SourceLocation,
}

/// Declaration specifiers shared by every declarator in one declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclSpec {
    pub storage: StorageClass,
    pub is_typedef: bool,
    pub base: BaseTypeSyntax,
    pub qualifiers: Qualifiers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    List {
        items: Vec<Initializer>,
        location: SourceLocation,
    },
}

impl Initializer {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Initializer::Expr(e) => &e.location,
            Initializer::List { location, .. } => location,
        }
    }
}

/// One declarator with its complete syntactic type (base already folded
/// in) and optional initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclarator {
    pub name: String,
    pub ty: TypeSyntax,
    pub init: Option<Initializer>,
    pub location: SourceLocation,
}

/// A declaration statement: specifiers plus zero or more declarators
/// (zero for bare tag declarations like `struct s;`).
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub specifiers: DeclSpec,
    pub declarators: Vec<InitDeclarator>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    /// The function's syntactic type (always `TypeSyntax::Function`).
    pub ty: TypeSyntax,
    pub storage: StorageClass,
    pub body: Stmt,
    pub location: SourceLocation,
    /// Function scope id, assigned by the analyzer.
    pub scope_id: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDecl {
    Declaration(Declaration),
    Function(FunctionDef),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationUnit {
    pub decls: Vec<ExternalDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundStmt {
    pub items: Vec<BlockItem>,
    /// Block scope id, assigned by the analyzer.
    pub scope_id: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Declaration(Declaration),
    Statement(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Declaration(Declaration),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Stmt { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement; `None` for the empty statement `;`.
    Expr(Option<Expr>),
    Compound(CompoundStmt),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<ForInit>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        /// The for-statement's own block scope, assigned by the analyzer.
        scope_id: Option<usize>,
    },
    Switch {
        cond: Expr,
        body: Box<Stmt>,
    },
    Case {
        value: Expr,
        /// Constant-folded label value, filled by the analyzer.
        resolved: Option<i64>,
        body: Box<Stmt>,
    },
    Default {
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Goto(String),
    Label {
        name: String,
        body: Box<Stmt>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    BitNot,
    LogicalNot,
    Deref,
    AddrOf,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Xor,
    Or,
}

impl AssignOp {
    /// The underlying binary operator of a compound assignment.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::And => Some(BinaryOp::BitAnd),
            AssignOp::Xor => Some(BinaryOp::BitXor),
            AssignOp::Or => Some(BinaryOp::BitOr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
    /// Inferred type, filled by the analyzer.
    pub ty: Option<CType>,
    pub is_lvalue: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Expr {
            kind,
            location,
            ty: None,
            is_lvalue: false,
        }
    }

    /// A literal integer `0`, the null pointer constant.
    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind, ExprKind::IntLiteral { value: 0, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral {
        value: i64,
        unsigned: bool,
        long: bool,
        long_long: bool,
    },
    FloatLiteral {
        value: f64,
        single: bool,
    },
    CharLiteral(u8),
    StringLiteral(Vec<u8>),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        target: TypeSyntax,
        operand: Box<Expr>,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        base: Box<Expr>,
        member: String,
        arrow: bool,
    },
    SizeofExpr(Box<Expr>),
    SizeofType {
        target: TypeSyntax,
        /// Resolved operand type, filled by the analyzer.
        resolved: Option<CType>,
    },
}

// ---------------------------------------------------------------------------
// AST dump (`-a`)

impl TranslationUnit {
    /// Indented textual rendering for the driver's AST dump.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for decl in &self.decls {
            match decl {
                ExternalDecl::Declaration(d) => dump_declaration(&mut out, d, 0),
                ExternalDecl::Function(f) => {
                    let _ = writeln!(out, "FunctionDef {}", f.name);
                    dump_stmt(&mut out, &f.body, 1);
                }
            }
        }
        out
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_declaration(out: &mut String, decl: &Declaration, depth: usize) {
    for d in &decl.declarators {
        indent(out, depth);
        let what = if decl.specifiers.is_typedef {
            "Typedef"
        } else {
            "Declaration"
        };
        let _ = writeln!(out, "{} {}", what, d.name);
        if let Some(init) = &d.init {
            dump_initializer(out, init, depth + 1);
        }
    }
    if decl.declarators.is_empty() {
        indent(out, depth);
        let _ = writeln!(out, "TagDeclaration");
    }
}

fn dump_initializer(out: &mut String, init: &Initializer, depth: usize) {
    match init {
        Initializer::Expr(e) => dump_expr(out, e, depth),
        Initializer::List { items, .. } => {
            indent(out, depth);
            let _ = writeln!(out, "InitializerList");
            for item in items {
                dump_initializer(out, item, depth + 1);
            }
        }
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    indent(out, depth);
    match &stmt.kind {
        StmtKind::Expr(None) => {
            let _ = writeln!(out, "EmptyStmt");
        }
        StmtKind::Expr(Some(e)) => {
            let _ = writeln!(out, "ExprStmt");
            dump_expr(out, e, depth + 1);
        }
        StmtKind::Compound(c) => {
            let _ = writeln!(out, "CompoundStmt");
            for item in &c.items {
                match item {
                    BlockItem::Declaration(d) => dump_declaration(out, d, depth + 1),
                    BlockItem::Statement(s) => dump_stmt(out, s, depth + 1),
                }
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let _ = writeln!(out, "IfStmt");
            dump_expr(out, cond, depth + 1);
            dump_stmt(out, then_branch, depth + 1);
            if let Some(e) = else_branch {
                dump_stmt(out, e, depth + 1);
            }
        }
        StmtKind::While { cond, body } => {
            let _ = writeln!(out, "WhileStmt");
            dump_expr(out, cond, depth + 1);
            dump_stmt(out, body, depth + 1);
        }
        StmtKind::DoWhile { body, cond } => {
            let _ = writeln!(out, "DoWhileStmt");
            dump_stmt(out, body, depth + 1);
            dump_expr(out, cond, depth + 1);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
            ..
        } => {
            let _ = writeln!(out, "ForStmt");
            if let Some(init) = init {
                match init.as_ref() {
                    ForInit::Declaration(d) => dump_declaration(out, d, depth + 1),
                    ForInit::Expr(e) => dump_expr(out, e, depth + 1),
                }
            }
            if let Some(c) = cond {
                dump_expr(out, c, depth + 1);
            }
            if let Some(s) = step {
                dump_expr(out, s, depth + 1);
            }
            dump_stmt(out, body, depth + 1);
        }
        StmtKind::Switch { cond, body } => {
            let _ = writeln!(out, "SwitchStmt");
            dump_expr(out, cond, depth + 1);
            dump_stmt(out, body, depth + 1);
        }
        StmtKind::Case { value, body, .. } => {
            let _ = writeln!(out, "CaseStmt");
            dump_expr(out, value, depth + 1);
            dump_stmt(out, body, depth + 1);
        }
        StmtKind::Default { body } => {
            let _ = writeln!(out, "DefaultStmt");
            dump_stmt(out, body, depth + 1);
        }
        StmtKind::Break => {
            let _ = writeln!(out, "BreakStmt");
        }
        StmtKind::Continue => {
            let _ = writeln!(out, "ContinueStmt");
        }
        StmtKind::Return(value) => {
            let _ = writeln!(out, "ReturnStmt");
            if let Some(v) = value {
                dump_expr(out, v, depth + 1);
            }
        }
        StmtKind::Goto(name) => {
            let _ = writeln!(out, "GotoStmt {}", name);
        }
        StmtKind::Label { name, body } => {
            let _ = writeln!(out, "LabelStmt {}", name);
            dump_stmt(out, body, depth + 1);
        }
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    indent(out, depth);
    let annotate = |out: &mut String| {
        if let Some(ty) = &expr.ty {
            let _ = write!(out, " : {}", ty);
        }
    };
    match &expr.kind {
        ExprKind::IntLiteral { value, .. } => {
            let _ = write!(out, "IntLiteral {}", value);
            annotate(out);
            out.push('\n');
        }
        ExprKind::FloatLiteral { value, .. } => {
            let _ = write!(out, "FloatLiteral {}", value);
            annotate(out);
            out.push('\n');
        }
        ExprKind::CharLiteral(c) => {
            let _ = write!(out, "CharLiteral {}", c);
            annotate(out);
            out.push('\n');
        }
        ExprKind::StringLiteral(bytes) => {
            let _ = write!(out, "StringLiteral {:?}", String::from_utf8_lossy(bytes));
            annotate(out);
            out.push('\n');
        }
        ExprKind::Identifier(name) => {
            let _ = write!(out, "Identifier {}", name);
            annotate(out);
            out.push('\n');
        }
        ExprKind::Unary { op, operand } => {
            let _ = write!(out, "Unary {:?}", op);
            annotate(out);
            out.push('\n');
            dump_expr(out, operand, depth + 1);
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let _ = write!(out, "Binary {:?}", op);
            annotate(out);
            out.push('\n');
            dump_expr(out, lhs, depth + 1);
            dump_expr(out, rhs, depth + 1);
        }
        ExprKind::Assign { op, lhs, rhs } => {
            let _ = write!(out, "Assign {:?}", op);
            annotate(out);
            out.push('\n');
            dump_expr(out, lhs, depth + 1);
            dump_expr(out, rhs, depth + 1);
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            let _ = write!(out, "Conditional");
            annotate(out);
            out.push('\n');
            dump_expr(out, cond, depth + 1);
            dump_expr(out, then_expr, depth + 1);
            dump_expr(out, else_expr, depth + 1);
        }
        ExprKind::Cast { operand, .. } => {
            let _ = write!(out, "Cast");
            annotate(out);
            out.push('\n');
            dump_expr(out, operand, depth + 1);
        }
        ExprKind::Subscript { base, index } => {
            let _ = write!(out, "Subscript");
            annotate(out);
            out.push('\n');
            dump_expr(out, base, depth + 1);
            dump_expr(out, index, depth + 1);
        }
        ExprKind::Call { callee, args } => {
            let _ = write!(out, "Call");
            annotate(out);
            out.push('\n');
            dump_expr(out, callee, depth + 1);
            for arg in args {
                dump_expr(out, arg, depth + 1);
            }
        }
        ExprKind::Member { base, member, arrow } => {
            let _ = write!(out, "Member {}{}", if *arrow { "->" } else { "." }, member);
            annotate(out);
            out.push('\n');
            dump_expr(out, base, depth + 1);
        }
        ExprKind::SizeofExpr(operand) => {
            let _ = write!(out, "SizeofExpr");
            annotate(out);
            out.push('\n');
            dump_expr(out, operand, depth + 1);
        }
        ExprKind::SizeofType { .. } => {
            let _ = write!(out, "SizeofType");
            annotate(out);
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn loc() -> SourceLocation {
        SourceLocation::new(Rc::from("t.c"), 1, 1, 0)
    }

    #[test]
    fn test_null_constant_detection() {
        let zero = Expr::new(
            ExprKind::IntLiteral {
                value: 0,
                unsigned: false,
                long: false,
                long_long: false,
            },
            loc(),
        );
        assert!(zero.is_null_constant());
        let one = Expr::new(
            ExprKind::IntLiteral {
                value: 1,
                unsigned: false,
                long: false,
                long_long: false,
            },
            loc(),
        );
        assert!(!one.is_null_constant());
    }

    #[test]
    fn test_compound_assign_maps_to_binary_op() {
        assert_eq!(AssignOp::Add.binary_op(), Some(BinaryOp::Add));
        assert_eq!(AssignOp::Shl.binary_op(), Some(BinaryOp::Shl));
        assert_eq!(AssignOp::Assign.binary_op(), None);
    }

    #[test]
    fn test_dump_annotates_types() {
        let mut expr = Expr::new(
            ExprKind::IntLiteral {
                value: 7,
                unsigned: false,
                long: false,
                long_long: false,
            },
            loc(),
        );
        expr.ty = Some(CType::int());
        let mut out = String::new();
        dump_expr(&mut out, &expr, 0);
        assert_eq!(out, "IntLiteral 7 : int\n");
    }
}
