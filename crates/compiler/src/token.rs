//! Lexical token model.
//!
//! A closed enumeration of every token category the lexer can produce,
//! plus the two lookup tables the rest of the front end leans on: the
//! length-bucketed keyword table (identifiers are reclassified after the
//! DFA accepts them) and the binary-operator precedence table that drives
//! the parser's precedence climbing.

use crate::diagnostics::SourceLocation;
use std::fmt;

/// Every lexical category. `Invalid` marks bytes the lexer diagnosed and
/// recovered from; `EndOfFile` terminates every token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals and names
    Identifier,
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,

    // Keywords
    KwAuto,
    KwBreak,
    KwCase,
    KwChar,
    KwConst,
    KwContinue,
    KwDefault,
    KwDo,
    KwDouble,
    KwElse,
    KwEnum,
    KwExtern,
    KwFloat,
    KwFor,
    KwGoto,
    KwIf,
    KwInt,
    KwLong,
    KwRegister,
    KwReturn,
    KwShort,
    KwSigned,
    KwSizeof,
    KwStatic,
    KwStruct,
    KwSwitch,
    KwTypedef,
    KwUnion,
    KwUnsigned,
    KwVoid,
    KwVolatile,
    KwWhile,

    // Punctuators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Arrow,
    Ellipsis,
    Question,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    Bang,
    AmpAmp,
    PipePipe,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,

    EndOfFile,
    Invalid,
}

impl TokenKind {
    /// Canonical spelling, used in parser diagnostics and the token dump.
    pub fn spelling(self) -> &'static str {
        use TokenKind::*;
        match self {
            Identifier => "identifier",
            IntLiteral => "integer literal",
            FloatLiteral => "floating literal",
            CharLiteral => "character literal",
            StringLiteral => "string literal",
            KwAuto => "auto",
            KwBreak => "break",
            KwCase => "case",
            KwChar => "char",
            KwConst => "const",
            KwContinue => "continue",
            KwDefault => "default",
            KwDo => "do",
            KwDouble => "double",
            KwElse => "else",
            KwEnum => "enum",
            KwExtern => "extern",
            KwFloat => "float",
            KwFor => "for",
            KwGoto => "goto",
            KwIf => "if",
            KwInt => "int",
            KwLong => "long",
            KwRegister => "register",
            KwReturn => "return",
            KwShort => "short",
            KwSigned => "signed",
            KwSizeof => "sizeof",
            KwStatic => "static",
            KwStruct => "struct",
            KwSwitch => "switch",
            KwTypedef => "typedef",
            KwUnion => "union",
            KwUnsigned => "unsigned",
            KwVoid => "void",
            KwVolatile => "volatile",
            KwWhile => "while",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Semicolon => ";",
            Comma => ",",
            Dot => ".",
            Arrow => "->",
            Ellipsis => "...",
            Question => "?",
            Colon => ":",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            PlusPlus => "++",
            MinusMinus => "--",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            Shl => "<<",
            Shr => ">>",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            EqEq => "==",
            Ne => "!=",
            Bang => "!",
            AmpAmp => "&&",
            PipePipe => "||",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            AmpAssign => "&=",
            PipeAssign => "|=",
            CaretAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            EndOfFile => "end of file",
            Invalid => "invalid token",
        }
    }

    /// True for the ten compound-assignment operators.
    pub fn is_compound_assign(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            PlusAssign
                | MinusAssign
                | StarAssign
                | SlashAssign
                | PercentAssign
                | AmpAssign
                | PipeAssign
                | CaretAssign
                | ShlAssign
                | ShrAssign
        )
    }

    /// True for `=` and the compound assignments.
    pub fn is_assignment(self) -> bool {
        self == TokenKind::Assign || self.is_compound_assign()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Binary-operator precedence for precedence climbing. Higher binds
/// tighter. Assignment, `?:`, and the comma operator are handled
/// structurally by the parser and are absent here.
pub fn binary_precedence(kind: TokenKind) -> Option<u8> {
    use TokenKind::*;
    let level = match kind {
        Star | Slash | Percent => 10,
        Plus | Minus => 9,
        Shl | Shr => 8,
        Lt | Gt | Le | Ge => 7,
        EqEq | Ne => 6,
        Amp => 5,
        Caret => 4,
        Pipe => 3,
        AmpAmp => 2,
        PipePipe => 1,
        _ => return None,
    };
    Some(level)
}

/// Keyword lookup, bucketed by length so each bucket is a handful of
/// string compares.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match ident.len() {
        2 => match ident {
            "do" => KwDo,
            "if" => KwIf,
            _ => return None,
        },
        3 => match ident {
            "for" => KwFor,
            "int" => KwInt,
            _ => return None,
        },
        4 => match ident {
            "auto" => KwAuto,
            "case" => KwCase,
            "char" => KwChar,
            "else" => KwElse,
            "enum" => KwEnum,
            "goto" => KwGoto,
            "long" => KwLong,
            "void" => KwVoid,
            _ => return None,
        },
        5 => match ident {
            "break" => KwBreak,
            "const" => KwConst,
            "float" => KwFloat,
            "short" => KwShort,
            "union" => KwUnion,
            "while" => KwWhile,
            _ => return None,
        },
        6 => match ident {
            "double" => KwDouble,
            "extern" => KwExtern,
            "return" => KwReturn,
            "signed" => KwSigned,
            "sizeof" => KwSizeof,
            "static" => KwStatic,
            "struct" => KwStruct,
            "switch" => KwSwitch,
            _ => return None,
        },
        7 => match ident {
            "default" => KwDefault,
            "typedef" => KwTypedef,
            _ => return None,
        },
        8 => match ident {
            "continue" => KwContinue,
            "register" => KwRegister,
            "unsigned" => KwUnsigned,
            "volatile" => KwVolatile,
            _ => return None,
        },
        _ => return None,
    };
    Some(kind)
}

/// Decoded payload of a token. The variant must agree with the token kind:
/// `Int` for `IntLiteral`, `Float` for `FloatLiteral`, `Char` for
/// `CharLiteral`, `Str` for `StringLiteral`, `None` for everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Int {
        /// Numeric magnitude, two's-complement wrapped into i64.
        value: i64,
        unsigned: bool,
        long: bool,
        long_long: bool,
    },
    Float {
        value: f64,
        /// Set by an `f`/`F` suffix.
        single: bool,
    },
    Char(u8),
    Str(Vec<u8>),
}

/// A lexed token: kind, position, the raw source slice, and the decoded
/// payload where the kind carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
    pub lexeme: String,
    pub value: TokenValue,
}

impl Token {
    pub fn new(kind: TokenKind, location: SourceLocation, lexeme: impl Into<String>) -> Self {
        Token {
            kind,
            location,
            lexeme: lexeme.into(),
            value: TokenValue::None,
        }
    }

    pub fn with_value(
        kind: TokenKind,
        location: SourceLocation,
        lexeme: impl Into<String>,
        value: TokenValue,
    ) -> Self {
        let token = Token {
            kind,
            location,
            lexeme: lexeme.into(),
            value,
        };
        debug_assert!(
            token.payload_matches_kind(),
            "token payload does not match kind {:?}",
            token.kind
        );
        token
    }

    /// Payload/kind agreement invariant.
    pub fn payload_matches_kind(&self) -> bool {
        match self.kind {
            TokenKind::IntLiteral => matches!(self.value, TokenValue::Int { .. }),
            TokenKind::FloatLiteral => matches!(self.value, TokenValue::Float { .. }),
            TokenKind::CharLiteral => matches!(self.value, TokenValue::Char(_)),
            TokenKind::StringLiteral => matches!(self.value, TokenValue::Str(_)),
            _ => matches!(self.value, TokenValue::None),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
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
    fn test_keyword_lookup_hits() {
        assert_eq!(keyword_kind("if"), Some(TokenKind::KwIf));
        assert_eq!(keyword_kind("unsigned"), Some(TokenKind::KwUnsigned));
        assert_eq!(keyword_kind("sizeof"), Some(TokenKind::KwSizeof));
        assert_eq!(keyword_kind("typedef"), Some(TokenKind::KwTypedef));
    }

    #[test]
    fn test_keyword_lookup_misses() {
        assert_eq!(keyword_kind("iff"), None);
        assert_eq!(keyword_kind("Int"), None);
        assert_eq!(keyword_kind(""), None);
        assert_eq!(keyword_kind("sizeof_"), None);
    }

    #[test]
    fn test_precedence_ordering() {
        let mul = binary_precedence(TokenKind::Star).unwrap();
        let add = binary_precedence(TokenKind::Plus).unwrap();
        let shift = binary_precedence(TokenKind::Shl).unwrap();
        let rel = binary_precedence(TokenKind::Lt).unwrap();
        let eq = binary_precedence(TokenKind::EqEq).unwrap();
        let band = binary_precedence(TokenKind::Amp).unwrap();
        let bxor = binary_precedence(TokenKind::Caret).unwrap();
        let bor = binary_precedence(TokenKind::Pipe).unwrap();
        let land = binary_precedence(TokenKind::AmpAmp).unwrap();
        let lor = binary_precedence(TokenKind::PipePipe).unwrap();
        assert!(mul > add && add > shift && shift > rel && rel > eq);
        assert!(eq > band && band > bxor && bxor > bor && bor > land && land > lor);
        assert_eq!(binary_precedence(TokenKind::Assign), None);
        assert_eq!(binary_precedence(TokenKind::Question), None);
    }

    #[test]
    fn test_payload_invariant() {
        let t = Token::with_value(
            TokenKind::IntLiteral,
            loc(),
            "42",
            TokenValue::Int {
                value: 42,
                unsigned: false,
                long: false,
                long_long: false,
            },
        );
        assert!(t.payload_matches_kind());

        let t = Token::new(TokenKind::Plus, loc(), "+");
        assert!(t.payload_matches_kind());

        let mismatched = Token {
            kind: TokenKind::StringLiteral,
            location: loc(),
            lexeme: "\"x\"".to_string(),
            value: TokenValue::None,
        };
        assert!(!mismatched.payload_matches_kind());
    }

    #[test]
    fn test_assignment_classification() {
        assert!(TokenKind::Assign.is_assignment());
        assert!(TokenKind::ShlAssign.is_compound_assign());
        assert!(!TokenKind::EqEq.is_assignment());
    }
}
