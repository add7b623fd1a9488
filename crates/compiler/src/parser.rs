//! Recursive-descent parser.
//!
//! Token stream in, translation unit out. Declarations go through the
//! classic declarator fold (pointers, arrays, functions, parenthesized
//! declarators all compose around the base type), expressions go through
//! precedence climbing driven by the token model's precedence table.
//!
//! Typedef names are the one place C's grammar needs feedback from
//! declarations: the parser keeps a scoped set of typedef names so that
//! `(foo)(x)` parses as a cast when `foo` was typedef'ed and as a call
//! otherwise.
//!
//! On a syntax error the parser reports, skips to the next `;` or `}`,
//! and keeps going, so a single run surfaces as many errors as it can.

use crate::ast::{
    BaseTypeSyntax, BinaryOp, BlockItem, CompoundStmt, DeclSpec, Declaration, EnumeratorDecl,
    Expr, ExprKind, ExternalDecl, ForInit, FunctionDef, InitDeclarator, Initializer, MemberDecl,
    ParamDecl, Stmt, StmtKind, TranslationUnit, TypeSyntax, UnaryOp,
};
use crate::ast::AssignOp;
use crate::diagnostics::{DiagnosticBag, SourceLocation};
use crate::symbols::StorageClass;
use crate::token::{Token, TokenKind, TokenValue, binary_precedence};
use crate::types::{FloatRank, IntRank, Qualifiers};
use std::collections::HashSet;

/// Marker for an already-reported syntax error; the message lives in the
/// diagnostic bag.
#[derive(Debug)]
pub struct ParseError;

type PResult<T> = Result<T, ParseError>;

/// Intermediate declarator shape. Folding it around a base type yields
/// the declared name and its full syntactic type.
enum DeclaratorSyntax {
    Abstract,
    Name(String),
    Pointer {
        inner: Box<DeclaratorSyntax>,
        qualifiers: Qualifiers,
    },
    Array {
        inner: Box<DeclaratorSyntax>,
        length: Option<Expr>,
    },
    Function {
        inner: Box<DeclaratorSyntax>,
        params: Vec<ParamDecl>,
        variadic: bool,
    },
}

fn apply_declarator(decl: DeclaratorSyntax, base: TypeSyntax) -> (Option<String>, TypeSyntax) {
    match decl {
        DeclaratorSyntax::Abstract => (None, base),
        DeclaratorSyntax::Name(name) => (Some(name), base),
        DeclaratorSyntax::Pointer { inner, qualifiers } => apply_declarator(
            *inner,
            TypeSyntax::Pointer {
                inner: Box::new(base),
                qualifiers,
            },
        ),
        DeclaratorSyntax::Array { inner, length } => apply_declarator(
            *inner,
            TypeSyntax::Array {
                element: Box::new(base),
                length: length.map(Box::new),
            },
        ),
        DeclaratorSyntax::Function {
            inner,
            params,
            variadic,
        } => apply_declarator(
            *inner,
            TypeSyntax::Function {
                return_type: Box::new(base),
                params,
                variadic,
            },
        ),
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: DiagnosticBag,
    /// Scoped typedef names, pushed/popped with braces.
    typedefs: Vec<HashSet<String>>,
    /// Counter for naming anonymous struct/union/enum tags.
    next_anon_tag: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        // Invalid tokens already carry a lexer diagnostic; the grammar
        // never has to see them.
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Invalid)
            .collect();
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EndOfFile) {
            let location = tokens
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_else(SourceLocation::builtin);
            tokens.push(Token::new(TokenKind::EndOfFile, location, ""));
        }
        Parser {
            tokens,
            pos: 0,
            diagnostics: DiagnosticBag::new(),
            typedefs: vec![HashSet::new()],
            next_anon_tag: 0,
        }
    }

    pub fn parse(mut self) -> (TranslationUnit, DiagnosticBag) {
        let mut unit = TranslationUnit::default();
        while !self.check(TokenKind::EndOfFile) {
            match self.parse_external_decl() {
                Ok(Some(decl)) => unit.decls.push(decl),
                Ok(None) => {}
                Err(ParseError) => {
                    self.synchronize();
                    // A stray '}' at file scope would otherwise stall the
                    // loop; swallow it and keep going.
                    if self.check(TokenKind::RBrace) {
                        self.advance();
                    }
                }
            }
        }
        (unit, self.diagnostics)
    }

    // -- token helpers ----------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn location(&self) -> SourceLocation {
        self.peek().location.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            self.diagnostics.error(
                found.location.clone(),
                format!("expected '{}' {}, got '{}'", kind, context, found.kind),
            );
            Err(ParseError)
        }
    }

    fn error_here(&mut self, message: impl Into<String>) -> ParseError {
        let location = self.location();
        self.diagnostics.error(location, message);
        ParseError
    }

    /// Skip to just past the next `;`, or stop before `}`/EOF.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace | TokenKind::EndOfFile => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // -- typedef tracking -------------------------------------------------

    fn is_typedef_name(&self, name: &str) -> bool {
        self.typedefs.iter().rev().any(|scope| scope.contains(name))
    }

    fn register_typedefs(&mut self, decl: &Declaration) {
        if decl.specifiers.is_typedef {
            for d in &decl.declarators {
                if let Some(scope) = self.typedefs.last_mut() {
                    scope.insert(d.name.clone());
                }
            }
        }
    }

    fn fresh_anon_tag(&mut self) -> String {
        let tag = format!("$anon{}", self.next_anon_tag);
        self.next_anon_tag += 1;
        tag
    }

    /// Does the current token start a declaration?
    fn starts_declaration(&self) -> bool {
        match self.peek_kind() {
            TokenKind::KwVoid
            | TokenKind::KwChar
            | TokenKind::KwShort
            | TokenKind::KwInt
            | TokenKind::KwLong
            | TokenKind::KwFloat
            | TokenKind::KwDouble
            | TokenKind::KwSigned
            | TokenKind::KwUnsigned
            | TokenKind::KwStruct
            | TokenKind::KwUnion
            | TokenKind::KwEnum
            | TokenKind::KwConst
            | TokenKind::KwVolatile
            | TokenKind::KwTypedef
            | TokenKind::KwExtern
            | TokenKind::KwStatic
            | TokenKind::KwAuto
            | TokenKind::KwRegister => true,
            TokenKind::Identifier => self.is_typedef_name(&self.peek().lexeme),
            _ => false,
        }
    }

    // -- external declarations --------------------------------------------

    fn parse_external_decl(&mut self) -> PResult<Option<ExternalDecl>> {
        if self.accept(TokenKind::Semicolon).is_some() {
            // Stray semicolon at file scope; tolerated.
            return Ok(None);
        }
        let location = self.location();
        let specifiers = self.parse_decl_specifiers()?;

        if self.accept(TokenKind::Semicolon).is_some() {
            // Bare tag declaration: `struct s;` or `enum e { ... };`
            return Ok(Some(ExternalDecl::Declaration(Declaration {
                specifiers,
                declarators: Vec::new(),
                location,
            })));
        }

        let declarator = self.parse_declarator()?;
        let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
        let Some(name) = name else {
            return Err(self.error_here("expected declarator name"));
        };

        if matches!(ty, TypeSyntax::Function { .. }) && self.check(TokenKind::LBrace) {
            let body = self.parse_compound_stmt()?;
            return Ok(Some(ExternalDecl::Function(FunctionDef {
                name,
                ty,
                storage: specifiers.storage,
                body,
                location,
                scope_id: None,
            })));
        }

        let decl = self.parse_init_declarator_tail(specifiers, name, ty, location)?;
        Ok(Some(ExternalDecl::Declaration(decl)))
    }

    fn base_syntax(&self, specifiers: &DeclSpec) -> TypeSyntax {
        TypeSyntax::Base {
            base: specifiers.base.clone(),
            qualifiers: specifiers.qualifiers,
        }
    }

    /// Finish an init-declarator list whose first declarator is already
    /// parsed.
    fn parse_init_declarator_tail(
        &mut self,
        specifiers: DeclSpec,
        first_name: String,
        first_ty: TypeSyntax,
        location: SourceLocation,
    ) -> PResult<Declaration> {
        let mut declarators = Vec::new();
        let first_location = location.clone();
        let init = if self.accept(TokenKind::Assign).is_some() {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        declarators.push(InitDeclarator {
            name: first_name,
            ty: first_ty,
            init,
            location: first_location,
        });

        while self.accept(TokenKind::Comma).is_some() {
            let declarator_location = self.location();
            let declarator = self.parse_declarator()?;
            let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
            let Some(name) = name else {
                return Err(self.error_here("expected declarator name"));
            };
            let init = if self.accept(TokenKind::Assign).is_some() {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            declarators.push(InitDeclarator {
                name,
                ty,
                init,
                location: declarator_location,
            });
        }
        self.expect(TokenKind::Semicolon, "after declaration")?;

        let decl = Declaration {
            specifiers,
            declarators,
            location,
        };
        self.register_typedefs(&decl);
        Ok(decl)
    }

    /// A declaration in statement position (block item or for-init).
    fn parse_declaration(&mut self) -> PResult<Declaration> {
        let location = self.location();
        let specifiers = self.parse_decl_specifiers()?;
        if self.accept(TokenKind::Semicolon).is_some() {
            return Ok(Declaration {
                specifiers,
                declarators: Vec::new(),
                location,
            });
        }
        let declarator = self.parse_declarator()?;
        let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
        let Some(name) = name else {
            return Err(self.error_here("expected declarator name"));
        };
        self.parse_init_declarator_tail(specifiers, name, ty, location)
    }

    // -- declaration specifiers -------------------------------------------

    fn parse_decl_specifiers(&mut self) -> PResult<DeclSpec> {
        let mut storage = StorageClass::None;
        let mut is_typedef = false;
        let mut qualifiers = Qualifiers::default();

        let mut saw_void = false;
        let mut saw_char = false;
        let mut saw_int = false;
        let mut saw_float = false;
        let mut saw_double = false;
        let mut saw_short = false;
        let mut long_count = 0u8;
        let mut unsigned: Option<bool> = None;
        let mut tagged: Option<BaseTypeSyntax> = None;
        let mut named: Option<String> = None;

        loop {
            let any_type_seen = saw_void
                || saw_char
                || saw_int
                || saw_float
                || saw_double
                || saw_short
                || long_count > 0
                || unsigned.is_some()
                || tagged.is_some()
                || named.is_some();
            match self.peek_kind() {
                TokenKind::KwTypedef => {
                    self.advance();
                    is_typedef = true;
                }
                TokenKind::KwExtern => {
                    self.advance();
                    storage = StorageClass::Extern;
                }
                TokenKind::KwStatic => {
                    self.advance();
                    storage = StorageClass::Static;
                }
                TokenKind::KwAuto => {
                    self.advance();
                    storage = StorageClass::Auto;
                }
                TokenKind::KwRegister => {
                    self.advance();
                    storage = StorageClass::Register;
                }
                TokenKind::KwConst => {
                    self.advance();
                    qualifiers.is_const = true;
                }
                TokenKind::KwVolatile => {
                    self.advance();
                    qualifiers.is_volatile = true;
                }
                TokenKind::KwVoid => {
                    self.advance();
                    saw_void = true;
                }
                TokenKind::KwChar => {
                    self.advance();
                    saw_char = true;
                }
                TokenKind::KwShort => {
                    self.advance();
                    saw_short = true;
                }
                TokenKind::KwInt => {
                    self.advance();
                    saw_int = true;
                }
                TokenKind::KwLong => {
                    self.advance();
                    long_count += 1;
                }
                TokenKind::KwFloat => {
                    self.advance();
                    saw_float = true;
                }
                TokenKind::KwDouble => {
                    self.advance();
                    saw_double = true;
                }
                TokenKind::KwSigned => {
                    self.advance();
                    unsigned = Some(false);
                }
                TokenKind::KwUnsigned => {
                    self.advance();
                    unsigned = Some(true);
                }
                TokenKind::KwStruct | TokenKind::KwUnion => {
                    tagged = Some(self.parse_record_specifier()?);
                }
                TokenKind::KwEnum => {
                    tagged = Some(self.parse_enum_specifier()?);
                }
                TokenKind::Identifier
                    if !any_type_seen && self.is_typedef_name(&self.peek().lexeme) =>
                {
                    named = Some(self.advance().lexeme);
                }
                _ => break,
            }
        }

        let base = if let Some(tagged) = tagged {
            tagged
        } else if let Some(name) = named {
            BaseTypeSyntax::Named(name)
        } else if saw_void {
            BaseTypeSyntax::Void
        } else if saw_char {
            BaseTypeSyntax::Integer {
                rank: IntRank::Char,
                unsigned: unsigned.unwrap_or(false),
            }
        } else if saw_float {
            BaseTypeSyntax::Float {
                rank: FloatRank::Float,
            }
        } else if saw_double {
            BaseTypeSyntax::Float {
                rank: if long_count > 0 {
                    FloatRank::LongDouble
                } else {
                    FloatRank::Double
                },
            }
        } else if saw_short {
            BaseTypeSyntax::Integer {
                rank: IntRank::Short,
                unsigned: unsigned.unwrap_or(false),
            }
        } else if long_count >= 2 {
            BaseTypeSyntax::Integer {
                rank: IntRank::LongLong,
                unsigned: unsigned.unwrap_or(false),
            }
        } else if long_count == 1 {
            BaseTypeSyntax::Integer {
                rank: IntRank::Long,
                unsigned: unsigned.unwrap_or(false),
            }
        } else if saw_int || unsigned.is_some() {
            BaseTypeSyntax::Integer {
                rank: IntRank::Int,
                unsigned: unsigned.unwrap_or(false),
            }
        } else {
            let location = self.location();
            self.diagnostics
                .error(location, "expected type specifier".to_string());
            BaseTypeSyntax::Integer {
                rank: IntRank::Int,
                unsigned: false,
            }
        };

        Ok(DeclSpec {
            storage,
            is_typedef,
            base,
            qualifiers,
        })
    }

    fn parse_record_specifier(&mut self) -> PResult<BaseTypeSyntax> {
        let keyword = self.advance();
        let is_union = keyword.kind == TokenKind::KwUnion;
        let tag = self.accept(TokenKind::Identifier).map(|t| t.lexeme);

        if !self.check(TokenKind::LBrace) {
            if tag.is_none() {
                return Err(self.error_here(format!(
                    "expected tag or '{{' after '{}'",
                    if is_union { "union" } else { "struct" }
                )));
            }
            return Ok(BaseTypeSyntax::Record {
                tag,
                is_union,
                members: None,
            });
        }

        self.advance(); // {
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::EndOfFile) {
            let specifiers = self.parse_decl_specifiers()?;
            loop {
                let member_location = self.location();
                let declarator = self.parse_declarator()?;
                let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
                let Some(name) = name else {
                    return Err(self.error_here("expected member name"));
                };
                if self.check(TokenKind::Colon) {
                    return Err(self.error_here("bit-fields are not supported"));
                }
                members.push(MemberDecl {
                    name,
                    ty,
                    location: member_location,
                });
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::Semicolon, "after member declaration")?;
        }
        self.expect(TokenKind::RBrace, "to close member list")?;

        let tag = tag.unwrap_or_else(|| self.fresh_anon_tag());
        Ok(BaseTypeSyntax::Record {
            tag: Some(tag),
            is_union,
            members: Some(members),
        })
    }

    fn parse_enum_specifier(&mut self) -> PResult<BaseTypeSyntax> {
        self.advance(); // enum
        let tag = self.accept(TokenKind::Identifier).map(|t| t.lexeme);

        if !self.check(TokenKind::LBrace) {
            if tag.is_none() {
                return Err(self.error_here("expected tag or '{' after 'enum'"));
            }
            return Ok(BaseTypeSyntax::Enum {
                tag,
                enumerators: None,
            });
        }

        self.advance(); // {
        let mut enumerators = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::EndOfFile) {
            let location = self.location();
            let name = self.expect(TokenKind::Identifier, "as enumerator name")?.lexeme;
            let value = if self.accept(TokenKind::Assign).is_some() {
                Some(self.parse_conditional_expr()?)
            } else {
                None
            };
            enumerators.push(EnumeratorDecl {
                name,
                value,
                location,
            });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "to close enumerator list")?;

        if enumerators.is_empty() {
            return Err(self.error_here("enum must have at least one enumerator"));
        }
        let tag = tag.unwrap_or_else(|| self.fresh_anon_tag());
        Ok(BaseTypeSyntax::Enum {
            tag: Some(tag),
            enumerators: Some(enumerators),
        })
    }

    // -- declarators ------------------------------------------------------

    fn parse_declarator(&mut self) -> PResult<DeclaratorSyntax> {
        if self.accept(TokenKind::Star).is_some() {
            let mut qualifiers = Qualifiers::default();
            loop {
                if self.accept(TokenKind::KwConst).is_some() {
                    qualifiers.is_const = true;
                } else if self.accept(TokenKind::KwVolatile).is_some() {
                    qualifiers.is_volatile = true;
                } else {
                    break;
                }
            }
            let inner = self.parse_declarator()?;
            return Ok(DeclaratorSyntax::Pointer {
                inner: Box::new(inner),
                qualifiers,
            });
        }
        self.parse_direct_declarator()
    }

    fn parse_direct_declarator(&mut self) -> PResult<DeclaratorSyntax> {
        let mut current = if self.check(TokenKind::LParen) && self.paren_is_declarator() {
            self.advance(); // (
            let inner = self.parse_declarator()?;
            self.expect(TokenKind::RParen, "to close declarator")?;
            inner
        } else if self.check(TokenKind::Identifier) {
            DeclaratorSyntax::Name(self.advance().lexeme)
        } else {
            DeclaratorSyntax::Abstract
        };

        loop {
            if self.accept(TokenKind::LBracket).is_some() {
                let length = if self.check(TokenKind::RBracket) {
                    None
                } else {
                    Some(self.parse_conditional_expr()?)
                };
                self.expect(TokenKind::RBracket, "to close array bound")?;
                current = DeclaratorSyntax::Array {
                    inner: Box::new(current),
                    length,
                };
            } else if self.check(TokenKind::LParen) && !self.paren_is_declarator() {
                self.advance(); // (
                let (params, variadic) = self.parse_parameter_list()?;
                current = DeclaratorSyntax::Function {
                    inner: Box::new(current),
                    params,
                    variadic,
                };
            } else {
                break;
            }
        }
        Ok(current)
    }

    /// Disambiguate `(` in declarator position: a parenthesized
    /// declarator starts with `*`, an identifier that is not a typedef
    /// name, or another `(`; a parameter list starts with a type or `)`.
    fn paren_is_declarator(&self) -> bool {
        match self.peek_ahead(1).kind {
            TokenKind::Star | TokenKind::LParen => true,
            TokenKind::Identifier => !self.is_typedef_name(&self.peek_ahead(1).lexeme),
            _ => false,
        }
    }

    fn parse_parameter_list(&mut self) -> PResult<(Vec<ParamDecl>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;

        if self.accept(TokenKind::RParen).is_some() {
            return Ok((params, variadic));
        }
        // `(void)` declares zero parameters.
        if self.check(TokenKind::KwVoid) && self.peek_ahead(1).kind == TokenKind::RParen {
            self.advance();
            self.advance();
            return Ok((params, variadic));
        }

        loop {
            if self.accept(TokenKind::Ellipsis).is_some() {
                variadic = true;
                break;
            }
            let location = self.location();
            let specifiers = self.parse_decl_specifiers()?;
            if specifiers.storage != StorageClass::None || specifiers.is_typedef {
                self.diagnostics.error(
                    location.clone(),
                    "storage class not allowed on parameter".to_string(),
                );
            }
            let declarator = self.parse_declarator()?;
            let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
            params.push(ParamDecl { name, ty, location });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;
        Ok((params, variadic))
    }

    /// A type-name: specifiers plus an abstract declarator (casts,
    /// `sizeof`).
    fn parse_type_name(&mut self) -> PResult<TypeSyntax> {
        let location = self.location();
        let specifiers = self.parse_decl_specifiers()?;
        if specifiers.storage != StorageClass::None || specifiers.is_typedef {
            self.diagnostics
                .error(location, "storage class not allowed here".to_string());
        }
        let declarator = self.parse_declarator()?;
        let (name, ty) = apply_declarator(declarator, self.base_syntax(&specifiers));
        if name.is_some() {
            return Err(self.error_here("type name must not declare an identifier"));
        }
        Ok(ty)
    }

    // -- initializers -----------------------------------------------------

    fn parse_initializer(&mut self) -> PResult<Initializer> {
        if self.check(TokenKind::LBrace) {
            let location = self.location();
            self.advance();
            let mut items = Vec::new();
            while !self.check(TokenKind::RBrace) && !self.check(TokenKind::EndOfFile) {
                items.push(self.parse_initializer()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "to close initializer list")?;
            return Ok(Initializer::List { items, location });
        }
        Ok(Initializer::Expr(self.parse_assignment_expr()?))
    }

    // -- statements -------------------------------------------------------

    fn parse_compound_stmt(&mut self) -> PResult<Stmt> {
        let location = self.location();
        self.expect(TokenKind::LBrace, "to open block")?;
        self.typedefs.push(HashSet::new());

        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::EndOfFile) {
            if self.starts_declaration() {
                match self.parse_declaration() {
                    Ok(decl) => items.push(BlockItem::Declaration(decl)),
                    Err(ParseError) => self.synchronize(),
                }
            } else {
                match self.parse_statement() {
                    Ok(stmt) => items.push(BlockItem::Statement(stmt)),
                    Err(ParseError) => self.synchronize(),
                }
            }
        }

        self.typedefs.pop();
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(Stmt::new(
            StmtKind::Compound(CompoundStmt {
                items,
                scope_id: None,
            }),
            location,
        ))
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let location = self.location();
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_compound_stmt(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::new(StmtKind::Expr(None), location))
            }
            TokenKind::KwIf => {
                self.advance();
                self.expect(TokenKind::LParen, "after 'if'")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "after if condition")?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.accept(TokenKind::KwElse).is_some() {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::new(
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    location,
                ))
            }
            TokenKind::KwWhile => {
                self.advance();
                self.expect(TokenKind::LParen, "after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "after while condition")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::While { cond, body }, location))
            }
            TokenKind::KwDo => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::KwWhile, "after do-statement body")?;
                self.expect(TokenKind::LParen, "after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "after do-while condition")?;
                self.expect(TokenKind::Semicolon, "after do-while")?;
                Ok(Stmt::new(StmtKind::DoWhile { body, cond }, location))
            }
            TokenKind::KwFor => {
                self.advance();
                self.expect(TokenKind::LParen, "after 'for'")?;
                let init = if self.accept(TokenKind::Semicolon).is_some() {
                    None
                } else if self.starts_declaration() {
                    // The declaration consumes its own ';'.
                    Some(Box::new(ForInit::Declaration(self.parse_declaration()?)))
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(TokenKind::Semicolon, "after for initializer")?;
                    Some(Box::new(ForInit::Expr(expr)))
                };
                let cond = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon, "after for condition")?;
                let step = if self.check(TokenKind::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::RParen, "after for clauses")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(
                    StmtKind::For {
                        init,
                        cond,
                        step,
                        body,
                        scope_id: None,
                    },
                    location,
                ))
            }
            TokenKind::KwSwitch => {
                self.advance();
                self.expect(TokenKind::LParen, "after 'switch'")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "after switch condition")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::Switch { cond, body }, location))
            }
            TokenKind::KwCase => {
                self.advance();
                let value = self.parse_conditional_expr()?;
                self.expect(TokenKind::Colon, "after case value")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(
                    StmtKind::Case {
                        value,
                        resolved: None,
                        body,
                    },
                    location,
                ))
            }
            TokenKind::KwDefault => {
                self.advance();
                self.expect(TokenKind::Colon, "after 'default'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::Default { body }, location))
            }
            TokenKind::KwBreak => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after 'break'")?;
                Ok(Stmt::new(StmtKind::Break, location))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after 'continue'")?;
                Ok(Stmt::new(StmtKind::Continue, location))
            }
            TokenKind::KwReturn => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon, "after return statement")?;
                Ok(Stmt::new(StmtKind::Return(value), location))
            }
            TokenKind::KwGoto => {
                self.advance();
                let label = self.expect(TokenKind::Identifier, "after 'goto'")?.lexeme;
                self.expect(TokenKind::Semicolon, "after goto")?;
                Ok(Stmt::new(StmtKind::Goto(label), location))
            }
            TokenKind::Identifier if self.peek_ahead(1).kind == TokenKind::Colon => {
                let name = self.advance().lexeme;
                self.advance(); // :
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::Label { name, body }, location))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "after expression")?;
                Ok(Stmt::new(StmtKind::Expr(Some(expr)), location))
            }
        }
    }

    // -- expressions ------------------------------------------------------

    /// Full expression including the comma operator.
    fn parse_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_assignment_expr()?;
        while self.check(TokenKind::Comma) {
            let location = self.advance().location;
            let rhs = self.parse_assignment_expr()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Comma,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                location,
            );
        }
        Ok(expr)
    }

    fn parse_assignment_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_conditional_expr()?;
        let kind = self.peek_kind();
        if !kind.is_assignment() {
            return Ok(lhs);
        }
        let location = self.advance().location;
        let op = match kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            TokenKind::PercentAssign => AssignOp::Mod,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            TokenKind::AmpAssign => AssignOp::And,
            TokenKind::CaretAssign => AssignOp::Xor,
            TokenKind::PipeAssign => AssignOp::Or,
            _ => return Err(self.error_here("expected assignment operator")),
        };
        let rhs = self.parse_assignment_expr()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            location,
        ))
    }

    fn parse_conditional_expr(&mut self) -> PResult<Expr> {
        let cond = self.parse_binary_expr(1)?;
        if !self.check(TokenKind::Question) {
            return Ok(cond);
        }
        let location = self.advance().location;
        let then_expr = self.parse_expr()?;
        self.expect(TokenKind::Colon, "in conditional expression")?;
        let else_expr = self.parse_conditional_expr()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            location,
        ))
    }

    /// Precedence climbing over the token model's table.
    fn parse_binary_expr(&mut self, min_precedence: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let kind = self.peek_kind();
            let Some(precedence) = binary_precedence(kind) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let location = self.advance().location;
            let rhs = self.parse_binary_expr(precedence + 1)?;
            let op = binary_op_for(kind);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                location,
            );
        }
        Ok(lhs)
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let location = self.location();
        let op = match self.peek_kind() {
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Bang => Some(UnaryOp::LogicalNot),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Amp => Some(UnaryOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        if self.check(TokenKind::KwSizeof) {
            self.advance();
            if self.check(TokenKind::LParen) && self.paren_starts_type_name() {
                self.advance(); // (
                let target = self.parse_type_name()?;
                self.expect(TokenKind::RParen, "after sizeof type")?;
                return Ok(Expr::new(
                    ExprKind::SizeofType {
                        target,
                        resolved: None,
                    },
                    location,
                ));
            }
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::new(ExprKind::SizeofExpr(Box::new(operand)), location));
        }

        // Cast: '(' type-name ')' unary-expression
        if self.check(TokenKind::LParen) && self.paren_starts_type_name() {
            self.advance(); // (
            let target = self.parse_type_name()?;
            self.expect(TokenKind::RParen, "after cast type")?;
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::new(
                ExprKind::Cast {
                    target,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        self.parse_postfix_expr()
    }

    fn paren_starts_type_name(&self) -> bool {
        let next = self.peek_ahead(1);
        match next.kind {
            TokenKind::KwVoid
            | TokenKind::KwChar
            | TokenKind::KwShort
            | TokenKind::KwInt
            | TokenKind::KwLong
            | TokenKind::KwFloat
            | TokenKind::KwDouble
            | TokenKind::KwSigned
            | TokenKind::KwUnsigned
            | TokenKind::KwStruct
            | TokenKind::KwUnion
            | TokenKind::KwEnum
            | TokenKind::KwConst
            | TokenKind::KwVolatile => true,
            TokenKind::Identifier => self.is_typedef_name(&next.lexeme),
            _ => false,
        }
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let location = self.location();
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "to close subscript")?;
                    expr = Expr::new(
                        ExprKind::Subscript {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        location,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if self.accept(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "to close argument list")?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        location,
                    );
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.advance().kind == TokenKind::Arrow;
                    let member = self.expect(TokenKind::Identifier, "as member name")?.lexeme;
                    expr = Expr::new(
                        ExprKind::Member {
                            base: Box::new(expr),
                            member,
                            arrow,
                        },
                        location,
                    );
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::PostInc,
                            operand: Box::new(expr),
                        },
                        location,
                    );
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::PostDec,
                            operand: Box::new(expr),
                        },
                        location,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let TokenValue::Int {
                    value,
                    unsigned,
                    long,
                    long_long,
                } = token.value
                else {
                    return Err(self.error_here("malformed integer literal"));
                };
                Ok(Expr::new(
                    ExprKind::IntLiteral {
                        value,
                        unsigned,
                        long,
                        long_long,
                    },
                    token.location,
                ))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let TokenValue::Float { value, single } = token.value else {
                    return Err(self.error_here("malformed floating literal"));
                };
                Ok(Expr::new(
                    ExprKind::FloatLiteral { value, single },
                    token.location,
                ))
            }
            TokenKind::CharLiteral => {
                self.advance();
                let TokenValue::Char(c) = token.value else {
                    return Err(self.error_here("malformed character literal"));
                };
                Ok(Expr::new(ExprKind::CharLiteral(c), token.location))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let TokenValue::Str(bytes) = token.value else {
                    return Err(self.error_here("malformed string literal"));
                };
                Ok(Expr::new(ExprKind::StringLiteral(bytes), token.location))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Identifier(token.lexeme),
                    token.location,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(expr)
            }
            _ => Err(self.error_here(format!("unexpected token '{}'", token.kind))),
        }
    }
}

fn binary_op_for(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Ge => BinaryOp::Ge,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::Ne => BinaryOp::Ne,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::AmpAmp => BinaryOp::LogicalAnd,
        TokenKind::PipePipe => BinaryOp::LogicalOr,
        // binary_precedence() gates the callers.
        _ => unreachable!("not a binary operator: {:?}", kind),
    }
}

/// Parse a source string, combining lexical and syntactic diagnostics.
pub fn parse_source(source: &str, file: &str) -> (TranslationUnit, DiagnosticBag) {
    let (tokens, mut diagnostics) = crate::lexer::tokenize(source, file);
    let parser = Parser::new(tokens);
    let (unit, parse_diagnostics) = parser.parse();
    diagnostics.absorb(parse_diagnostics);
    (unit, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> TranslationUnit {
        let (unit, diags) = parse_source(source, "test.c");
        assert!(!diags.has_errors(), "unexpected errors: {:?}", diags.errors());
        unit
    }

    fn first_function(unit: &TranslationUnit) -> &FunctionDef {
        unit.decls
            .iter()
            .find_map(|d| match d {
                ExternalDecl::Function(f) => Some(f),
                _ => None,
            })
            .expect("no function in unit")
    }

    #[test]
    fn test_simple_global() {
        let unit = parse_ok("int x = 42;");
        assert_eq!(unit.decls.len(), 1);
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decl.declarators.len(), 1);
        assert_eq!(decl.declarators[0].name, "x");
        assert!(decl.declarators[0].init.is_some());
    }

    #[test]
    fn test_multi_declarator_list() {
        let unit = parse_ok("int a, *b, c[3];");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decl.declarators.len(), 3);
        assert!(matches!(decl.declarators[0].ty, TypeSyntax::Base { .. }));
        assert!(matches!(decl.declarators[1].ty, TypeSyntax::Pointer { .. }));
        assert!(matches!(decl.declarators[2].ty, TypeSyntax::Array { .. }));
    }

    #[test]
    fn test_array_of_pointers_vs_pointer_to_array() {
        let unit = parse_ok("int *a[3]; int (*b)[3];");
        let ExternalDecl::Declaration(first) = &unit.decls[0] else {
            panic!()
        };
        // a: array of pointer
        match &first.declarators[0].ty {
            TypeSyntax::Array { element, .. } => {
                assert!(matches!(element.as_ref(), TypeSyntax::Pointer { .. }));
            }
            other => panic!("expected array, got {:?}", other),
        }
        let ExternalDecl::Declaration(second) = &unit.decls[1] else {
            panic!()
        };
        // b: pointer to array
        match &second.declarators[0].ty {
            TypeSyntax::Pointer { inner, .. } => {
                assert!(matches!(inner.as_ref(), TypeSyntax::Array { .. }));
            }
            other => panic!("expected pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_function_pointer_declarator() {
        let unit = parse_ok("int (*handler)(int, char *);");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        match &decl.declarators[0].ty {
            TypeSyntax::Pointer { inner, .. } => match inner.as_ref() {
                TypeSyntax::Function { params, .. } => assert_eq!(params.len(), 2),
                other => panic!("expected function, got {:?}", other),
            },
            other => panic!("expected pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_function_definition_and_prototype() {
        let unit = parse_ok("int f(int n);\nint f(int n) { return n; }");
        assert!(matches!(unit.decls[0], ExternalDecl::Declaration(_)));
        let f = first_function(&unit);
        assert_eq!(f.name, "f");
        let TypeSyntax::Function { params, variadic, .. } = &f.ty else {
            panic!("expected function type");
        };
        assert_eq!(params.len(), 1);
        assert!(!variadic);
    }

    #[test]
    fn test_variadic_prototype() {
        let unit = parse_ok("int printf(char *fmt, ...);");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        let TypeSyntax::Function { variadic, params, .. } = &decl.declarators[0].ty else {
            panic!("expected function type");
        };
        assert!(*variadic);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_void_parameter_list_is_empty() {
        let unit = parse_ok("int main(void) { return 0; }");
        let f = first_function(&unit);
        let TypeSyntax::Function { params, .. } = &f.ty else {
            panic!()
        };
        assert!(params.is_empty());
    }

    #[test]
    fn test_struct_definition_with_members() {
        let unit = parse_ok("struct point { int x; int y; };");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        assert!(decl.declarators.is_empty());
        let BaseTypeSyntax::Record { tag, members, .. } = &decl.specifiers.base else {
            panic!("expected record specifier");
        };
        assert_eq!(tag.as_deref(), Some("point"));
        assert_eq!(members.as_ref().map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_enum_with_explicit_values() {
        let unit = parse_ok("enum color { RED, GREEN = 5, BLUE };");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        let BaseTypeSyntax::Enum { enumerators, .. } = &decl.specifiers.base else {
            panic!("expected enum specifier");
        };
        let enumerators = enumerators.as_ref().unwrap();
        assert_eq!(enumerators.len(), 3);
        assert!(enumerators[0].value.is_none());
        assert!(enumerators[1].value.is_some());
    }

    #[test]
    fn test_typedef_disambiguates_cast() {
        let unit = parse_ok("typedef int word; int f(int x) { return (word)(x); }");
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        let BlockItem::Statement(ret) = &body.items[0] else {
            panic!()
        };
        let StmtKind::Return(Some(value)) = &ret.kind else {
            panic!()
        };
        assert!(matches!(value.kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn test_non_typedef_paren_is_call() {
        let unit = parse_ok("int g(int); int f(int word) { return (word) + 1; }");
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        let BlockItem::Statement(ret) = &body.items[0] else {
            panic!()
        };
        let StmtKind::Return(Some(value)) = &ret.kind else {
            panic!()
        };
        assert!(matches!(
            value.kind,
            ExprKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_precedence_shapes() {
        let unit = parse_ok("int x = 1 + 2 * 3;");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        let Some(Initializer::Expr(init)) = &decl.declarators[0].init else {
            panic!()
        };
        // (1 + (2 * 3))
        let ExprKind::Binary { op: BinaryOp::Add, rhs, .. } = &init.kind else {
            panic!("expected +, got {:?}", init.kind);
        };
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let unit = parse_ok("int f(int a, int b, int c) { a = b = c; return a; }");
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        let BlockItem::Statement(stmt) = &body.items[0] else {
            panic!()
        };
        let StmtKind::Expr(Some(expr)) = &stmt.kind else {
            panic!()
        };
        let ExprKind::Assign { rhs, .. } = &expr.kind else {
            panic!()
        };
        assert!(matches!(rhs.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn test_statement_forms() {
        let unit = parse_ok(
            "int f(int n) {\n\
             int total;\n\
             total = 0;\n\
             while (n > 0) { total += n; n--; }\n\
             for (n = 0; n < 10; n++) total++;\n\
             do { total--; } while (total > 100);\n\
             switch (n) { case 1: break; default: total = 1; }\n\
             if (total) return total; else return 0;\n\
             }",
        );
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        assert_eq!(body.items.len(), 7);
    }

    #[test]
    fn test_goto_and_labels() {
        let unit = parse_ok("int f(void) { goto out; out: return 1; }");
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        assert!(matches!(
            body.items[0],
            BlockItem::Statement(Stmt {
                kind: StmtKind::Goto(_),
                ..
            })
        ));
        assert!(matches!(
            body.items[1],
            BlockItem::Statement(Stmt {
                kind: StmtKind::Label { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_sizeof_forms() {
        let unit = parse_ok("int a = sizeof(int); int f(int x) { return sizeof x; }");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        let Some(Initializer::Expr(init)) = &decl.declarators[0].init else {
            panic!()
        };
        assert!(matches!(init.kind, ExprKind::SizeofType { .. }));
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        let BlockItem::Statement(ret) = &body.items[0] else {
            panic!()
        };
        let StmtKind::Return(Some(value)) = &ret.kind else {
            panic!()
        };
        assert!(matches!(value.kind, ExprKind::SizeofExpr(_)));
    }

    #[test]
    fn test_nested_initializer_lists() {
        let unit = parse_ok("int m[2][2] = {{1, 2}, {3, 4}};");
        let ExternalDecl::Declaration(decl) = &unit.decls[0] else {
            panic!()
        };
        let Some(Initializer::List { items, .. }) = &decl.declarators[0].init else {
            panic!()
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Initializer::List { .. }));
    }

    #[test]
    fn test_member_access_chain() {
        let unit = parse_ok(
            "struct s { int x; }; int f(struct s *p, struct s v) { return p->x + v.x; }",
        );
        let f = first_function(&unit);
        let StmtKind::Compound(body) = &f.body.kind else {
            panic!()
        };
        let BlockItem::Statement(ret) = &body.items[0] else {
            panic!()
        };
        let StmtKind::Return(Some(value)) = &ret.kind else {
            panic!()
        };
        let ExprKind::Binary { lhs, rhs, .. } = &value.kind else {
            panic!()
        };
        assert!(matches!(
            lhs.kind,
            ExprKind::Member { arrow: true, .. }
        ));
        assert!(matches!(
            rhs.kind,
            ExprKind::Member { arrow: false, .. }
        ));
    }

    #[test]
    fn test_error_recovery_reports_both_errors() {
        let (_, diags) = parse_source("int f() { return 1 + ; }\nint g() { @@; }", "test.c");
        assert!(diags.errors().len() >= 2);
    }

    #[test]
    fn test_recovery_continues_to_next_declaration() {
        let (unit, diags) = parse_source("int x = ;\nint y = 2;", "test.c");
        assert!(diags.has_errors());
        // The second declaration still parses.
        assert!(unit.decls.iter().any(|d| match d {
            ExternalDecl::Declaration(decl) =>
                decl.declarators.iter().any(|i| i.name == "y"),
            _ => false,
        }));
    }

    #[test]
    fn test_bitfields_rejected() {
        let (_, diags) = parse_source("struct s { int x : 3; };", "test.c");
        assert!(diags.has_errors());
    }
}
