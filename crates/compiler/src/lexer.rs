//! DFA-driven lexer.
//!
//! One state machine covers identifiers, every numeric form (decimal,
//! octal, hex, binary, floats with exponents, integer/float suffixes),
//! char and string literals with escapes, comments, and the prefix states
//! of each multi-character operator. Transitions are byte-indexed; when no
//! transition exists the scanner rewinds the last byte and classifies the
//! token from the state it stopped in.
//!
//! Keyword recognition and numeric/escape decoding are post-passes over
//! the accepted lexeme. Lexical errors are recorded in a [`DiagnosticBag`]
//! and the scanner resynchronizes at the next whitespace, so one bad byte
//! never hides the rest of the file.

use crate::diagnostics::{DiagnosticBag, SourceLocation};
use crate::token::{Token, TokenKind, TokenValue, keyword_kind};
use std::rc::Rc;

/// States of the scanner DFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ident,

    // Integer literals
    Zero,
    Dec,
    Oct,
    HexPrefix,
    Hex,
    BinPrefix,
    Bin,
    SufU,
    SufUl,
    SufUll,
    SufL,
    SufLl,
    SufLu,
    SufLlu,

    // Floating literals
    Dot,
    DotDot,
    EllipsisSt,
    FloatFrac,
    FloatExpStart,
    FloatExpSign,
    FloatExp,
    FloatSuf,

    // Character literals
    CharStart,
    CharBody,
    CharMulti,
    CharEscape,
    CharOct1,
    CharOct2,
    CharHexStart,
    CharHex,
    CharEmpty,
    CharEnd,
    CharMultiEnd,

    // String literals
    Str,
    StrEscape,
    StrOct1,
    StrOct2,
    StrHexStart,
    StrHex,
    StrEnd,

    // Comments
    LineComment,
    BlockComment,
    BlockCommentStar,
    BlockCommentEnd,

    // Operator prefixes and accept states
    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    ArrowSt,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Bang,
    BangEq,
    EqSt,
    EqEqSt,
    LtSt,
    LeSt,
    ShlSt,
    ShlEqSt,
    GtSt,
    GeSt,
    ShrSt,
    ShrEqSt,
}

/// Classification of the state the DFA stopped in.
enum Accept {
    Kind(TokenKind),
    Skip,
    Error(&'static str),
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Initial state for the first byte of a token, if the byte can start a
/// multi-byte token. Single-byte punctuators are emitted directly.
fn initial_state(b: u8) -> Option<State> {
    match b {
        b'0' => Some(State::Zero),
        b'1'..=b'9' => Some(State::Dec),
        b'.' => Some(State::Dot),
        b'\'' => Some(State::CharStart),
        b'"' => Some(State::Str),
        b'+' => Some(State::Plus),
        b'-' => Some(State::Minus),
        b'*' => Some(State::Star),
        b'/' => Some(State::Slash),
        b'%' => Some(State::Percent),
        b'&' => Some(State::Amp),
        b'|' => Some(State::Pipe),
        b'^' => Some(State::Caret),
        b'!' => Some(State::Bang),
        b'=' => Some(State::EqSt),
        b'<' => Some(State::LtSt),
        b'>' => Some(State::GtSt),
        _ if is_ident_start(b) => Some(State::Ident),
        _ => None,
    }
}

/// Punctuators that are complete after one byte.
fn single_punct(b: u8) -> Option<TokenKind> {
    match b {
        b'(' => Some(TokenKind::LParen),
        b')' => Some(TokenKind::RParen),
        b'{' => Some(TokenKind::LBrace),
        b'}' => Some(TokenKind::RBrace),
        b'[' => Some(TokenKind::LBracket),
        b']' => Some(TokenKind::RBracket),
        b';' => Some(TokenKind::Semicolon),
        b',' => Some(TokenKind::Comma),
        b'~' => Some(TokenKind::Tilde),
        b'?' => Some(TokenKind::Question),
        b':' => Some(TokenKind::Colon),
        _ => None,
    }
}

/// The transition function. `None` means the DFA stops and the current
/// byte is rewound.
fn step(state: State, b: u8) -> Option<State> {
    use State::*;
    match state {
        Ident if is_ident_continue(b) => Some(Ident),

        Zero => match b {
            b'x' | b'X' => Some(HexPrefix),
            b'b' | b'B' => Some(BinPrefix),
            b'0'..=b'9' => Some(Oct),
            b'.' => Some(FloatFrac),
            b'e' | b'E' => Some(FloatExpStart),
            b'u' | b'U' => Some(SufU),
            b'l' | b'L' => Some(SufL),
            _ => None,
        },
        Dec | Oct => match b {
            b'0'..=b'9' => Some(state),
            b'.' => Some(FloatFrac),
            b'e' | b'E' => Some(FloatExpStart),
            b'u' | b'U' => Some(SufU),
            b'l' | b'L' => Some(SufL),
            _ => None,
        },
        HexPrefix if b.is_ascii_hexdigit() => Some(Hex),
        Hex => match b {
            _ if b.is_ascii_hexdigit() => Some(Hex),
            b'u' | b'U' => Some(SufU),
            b'l' | b'L' => Some(SufL),
            _ => None,
        },
        // Digit validity for the base is checked during decoding so that
        // `0b102` diagnoses once instead of splitting into two tokens.
        BinPrefix if b.is_ascii_digit() => Some(Bin),
        Bin => match b {
            _ if b.is_ascii_digit() => Some(Bin),
            b'u' | b'U' => Some(SufU),
            b'l' | b'L' => Some(SufL),
            _ => None,
        },
        SufU => match b {
            b'l' | b'L' => Some(SufUl),
            _ => None,
        },
        SufUl => match b {
            b'l' | b'L' => Some(SufUll),
            _ => None,
        },
        SufL => match b {
            b'l' | b'L' => Some(SufLl),
            b'u' | b'U' => Some(SufLu),
            _ => None,
        },
        SufLl => match b {
            b'u' | b'U' => Some(SufLlu),
            _ => None,
        },

        Dot => match b {
            b'0'..=b'9' => Some(FloatFrac),
            b'.' => Some(DotDot),
            _ => None,
        },
        DotDot => match b {
            b'.' => Some(EllipsisSt),
            _ => None,
        },
        FloatFrac => match b {
            b'0'..=b'9' => Some(FloatFrac),
            b'e' | b'E' => Some(FloatExpStart),
            b'f' | b'F' | b'l' | b'L' => Some(FloatSuf),
            _ => None,
        },
        FloatExpStart => match b {
            b'+' | b'-' => Some(FloatExpSign),
            b'0'..=b'9' => Some(FloatExp),
            _ => None,
        },
        FloatExpSign => match b {
            b'0'..=b'9' => Some(FloatExp),
            _ => None,
        },
        FloatExp => match b {
            b'0'..=b'9' => Some(FloatExp),
            b'f' | b'F' | b'l' | b'L' => Some(FloatSuf),
            _ => None,
        },

        CharStart => match b {
            b'\'' => Some(CharEmpty),
            b'\\' => Some(CharEscape),
            b'\n' => None,
            _ => Some(CharBody),
        },
        CharBody => match b {
            b'\'' => Some(CharEnd),
            b'\n' => None,
            _ => Some(CharMulti),
        },
        CharMulti => match b {
            b'\'' => Some(CharMultiEnd),
            b'\n' => None,
            _ => Some(CharMulti),
        },
        CharEscape => match b {
            b'0'..=b'7' => Some(CharOct1),
            b'x' => Some(CharHexStart),
            b'\n' => None,
            _ => Some(CharBody),
        },
        CharOct1 => match b {
            b'0'..=b'7' => Some(CharOct2),
            b'\'' => Some(CharEnd),
            b'\n' => None,
            _ => Some(CharMulti),
        },
        CharOct2 => match b {
            b'0'..=b'7' => Some(CharBody),
            b'\'' => Some(CharEnd),
            b'\n' => None,
            _ => Some(CharMulti),
        },
        CharHexStart | CharHex => match b {
            _ if b.is_ascii_hexdigit() => Some(CharHex),
            b'\'' => Some(CharEnd),
            b'\n' => None,
            _ => Some(CharMulti),
        },

        Str => match b {
            b'"' => Some(StrEnd),
            b'\\' => Some(StrEscape),
            b'\n' => None,
            _ => Some(Str),
        },
        StrEscape => match b {
            b'0'..=b'7' => Some(StrOct1),
            b'x' => Some(StrHexStart),
            b'\n' => None,
            _ => Some(Str),
        },
        StrOct1 => match b {
            b'0'..=b'7' => Some(StrOct2),
            b'"' => Some(StrEnd),
            b'\\' => Some(StrEscape),
            b'\n' => None,
            _ => Some(Str),
        },
        StrOct2 => match b {
            b'0'..=b'7' => Some(Str),
            b'"' => Some(StrEnd),
            b'\\' => Some(StrEscape),
            b'\n' => None,
            _ => Some(Str),
        },
        StrHexStart | StrHex => match b {
            _ if b.is_ascii_hexdigit() => Some(StrHex),
            b'"' => Some(StrEnd),
            b'\\' => Some(StrEscape),
            b'\n' => None,
            _ => Some(Str),
        },

        LineComment => match b {
            b'\n' => None,
            _ => Some(LineComment),
        },
        BlockComment => match b {
            b'*' => Some(BlockCommentStar),
            _ => Some(BlockComment),
        },
        BlockCommentStar => match b {
            b'/' => Some(BlockCommentEnd),
            b'*' => Some(BlockCommentStar),
            _ => Some(BlockComment),
        },

        Plus => match b {
            b'+' => Some(PlusPlus),
            b'=' => Some(PlusEq),
            _ => None,
        },
        Minus => match b {
            b'-' => Some(MinusMinus),
            b'=' => Some(MinusEq),
            b'>' => Some(ArrowSt),
            _ => None,
        },
        Star => match b {
            b'=' => Some(StarEq),
            _ => None,
        },
        Slash => match b {
            b'=' => Some(SlashEq),
            b'/' => Some(LineComment),
            b'*' => Some(BlockComment),
            _ => None,
        },
        Percent => match b {
            b'=' => Some(PercentEq),
            _ => None,
        },
        Amp => match b {
            b'&' => Some(AmpAmp),
            b'=' => Some(AmpEq),
            _ => None,
        },
        Pipe => match b {
            b'|' => Some(PipePipe),
            b'=' => Some(PipeEq),
            _ => None,
        },
        Caret => match b {
            b'=' => Some(CaretEq),
            _ => None,
        },
        Bang => match b {
            b'=' => Some(BangEq),
            _ => None,
        },
        EqSt => match b {
            b'=' => Some(EqEqSt),
            _ => None,
        },
        LtSt => match b {
            b'=' => Some(LeSt),
            b'<' => Some(ShlSt),
            _ => None,
        },
        ShlSt => match b {
            b'=' => Some(ShlEqSt),
            _ => None,
        },
        GtSt => match b {
            b'=' => Some(GeSt),
            b'>' => Some(ShrSt),
            _ => None,
        },
        ShrSt => match b {
            b'=' => Some(ShrEqSt),
            _ => None,
        },

        _ => None,
    }
}

/// Fallback classification for the state the DFA stopped in.
fn classify(state: State) -> Accept {
    use State::*;
    match state {
        Ident => Accept::Kind(TokenKind::Identifier),

        Zero | Dec | Oct | Hex | Bin | SufU | SufUl | SufUll | SufL | SufLl | SufLu | SufLlu => {
            Accept::Kind(TokenKind::IntLiteral)
        }
        HexPrefix => Accept::Error("hexadecimal constant has no digits"),
        BinPrefix => Accept::Error("binary constant has no digits"),

        Dot => Accept::Kind(TokenKind::Dot),
        DotDot => Accept::Error("'..' is not a valid token"),
        EllipsisSt => Accept::Kind(TokenKind::Ellipsis),
        FloatFrac | FloatExp | FloatSuf => Accept::Kind(TokenKind::FloatLiteral),
        FloatExpStart | FloatExpSign => Accept::Error("floating exponent has no digits"),

        CharEnd => Accept::Kind(TokenKind::CharLiteral),
        CharEmpty => Accept::Error("empty character literal"),
        CharMultiEnd => Accept::Error("character literal has more than one character"),
        CharStart | CharBody | CharMulti | CharEscape | CharOct1 | CharOct2 | CharHexStart
        | CharHex => Accept::Error("unterminated character literal"),

        StrEnd => Accept::Kind(TokenKind::StringLiteral),
        Str | StrEscape | StrOct1 | StrOct2 | StrHexStart | StrHex => {
            Accept::Error("unterminated string literal")
        }

        LineComment | BlockCommentEnd => Accept::Skip,
        BlockComment | BlockCommentStar => Accept::Error("unterminated block comment"),

        Plus => Accept::Kind(TokenKind::Plus),
        PlusPlus => Accept::Kind(TokenKind::PlusPlus),
        PlusEq => Accept::Kind(TokenKind::PlusAssign),
        Minus => Accept::Kind(TokenKind::Minus),
        MinusMinus => Accept::Kind(TokenKind::MinusMinus),
        MinusEq => Accept::Kind(TokenKind::MinusAssign),
        ArrowSt => Accept::Kind(TokenKind::Arrow),
        Star => Accept::Kind(TokenKind::Star),
        StarEq => Accept::Kind(TokenKind::StarAssign),
        Slash => Accept::Kind(TokenKind::Slash),
        SlashEq => Accept::Kind(TokenKind::SlashAssign),
        Percent => Accept::Kind(TokenKind::Percent),
        PercentEq => Accept::Kind(TokenKind::PercentAssign),
        Amp => Accept::Kind(TokenKind::Amp),
        AmpAmp => Accept::Kind(TokenKind::AmpAmp),
        AmpEq => Accept::Kind(TokenKind::AmpAssign),
        Pipe => Accept::Kind(TokenKind::Pipe),
        PipePipe => Accept::Kind(TokenKind::PipePipe),
        PipeEq => Accept::Kind(TokenKind::PipeAssign),
        Caret => Accept::Kind(TokenKind::Caret),
        CaretEq => Accept::Kind(TokenKind::CaretAssign),
        Bang => Accept::Kind(TokenKind::Bang),
        BangEq => Accept::Kind(TokenKind::Ne),
        EqSt => Accept::Kind(TokenKind::Assign),
        EqEqSt => Accept::Kind(TokenKind::EqEq),
        LtSt => Accept::Kind(TokenKind::Lt),
        LeSt => Accept::Kind(TokenKind::Le),
        ShlSt => Accept::Kind(TokenKind::Shl),
        ShlEqSt => Accept::Kind(TokenKind::ShlAssign),
        GtSt => Accept::Kind(TokenKind::Gt),
        GeSt => Accept::Kind(TokenKind::Ge),
        ShrSt => Accept::Kind(TokenKind::Shr),
        ShrEqSt => Accept::Kind(TokenKind::ShrAssign),
    }
}

pub struct Lexer<'a> {
    src: &'a [u8],
    file: Rc<str>,
    pos: usize,
    line: u32,
    column: u32,
    diagnostics: DiagnosticBag,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: &str) -> Self {
        Lexer {
            src: source.as_bytes(),
            file: Rc::from(file),
            pos: 0,
            line: 1,
            column: 1,
            diagnostics: DiagnosticBag::new(),
            peeked: None,
        }
    }

    /// The next token. Returns `EndOfFile` forever once the input is
    /// exhausted.
    pub fn next(&mut self) -> Token {
        if let Some(token) = self.peeked.take() {
            return token;
        }
        self.scan_token()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            let token = self.scan_token();
            self.peeked = Some(token);
        }
        // The line above guarantees the slot is filled.
        match &self.peeked {
            Some(token) => token,
            None => unreachable!("peek slot was just filled"),
        }
    }

    /// Lexical diagnostics collected so far. Callers typically inspect
    /// this after reaching `EndOfFile`.
    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> DiagnosticBag {
        self.diagnostics
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line, self.column, self.pos)
    }

    fn advance(&mut self) {
        if self.src[self.pos] == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.advance();
        }
    }

    /// Skip to the next whitespace byte after a lexical error, returning
    /// the number of extra bytes consumed. Keeping them in the invalid
    /// token's lexeme preserves the byte-exact reconstruction property.
    fn resync(&mut self) -> usize {
        let start = self.pos;
        while self.pos < self.src.len() && !self.src[self.pos].is_ascii_whitespace() {
            self.advance();
        }
        self.pos - start
    }

    fn scan_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let start = self.location();
            if self.pos >= self.src.len() {
                return Token::new(TokenKind::EndOfFile, start, "");
            }

            let b = self.src[self.pos];
            if let Some(kind) = single_punct(b) {
                self.advance();
                return Token::new(kind, start, (b as char).to_string());
            }

            let Some(mut state) = initial_state(b) else {
                self.advance();
                self.resync();
                let lexeme = self.lexeme_from(start.offset);
                self.diagnostics
                    .error(start.clone(), format!("stray '{}' in program", b as char));
                return Token::new(TokenKind::Invalid, start, lexeme);
            };
            self.advance();

            while self.pos < self.src.len() {
                match step(state, self.src[self.pos]) {
                    Some(next) => {
                        state = next;
                        self.advance();
                    }
                    None => break,
                }
            }

            let lexeme = self.lexeme_from(start.offset);
            match classify(state) {
                Accept::Kind(kind) => return self.finish_token(kind, start, lexeme),
                Accept::Skip => continue,
                Accept::Error(message) => {
                    self.resync();
                    let lexeme = self.lexeme_from(start.offset);
                    self.diagnostics.error(start.clone(), message);
                    return Token::new(TokenKind::Invalid, start, lexeme);
                }
            }
        }
    }

    fn lexeme_from(&self, offset: usize) -> String {
        String::from_utf8_lossy(&self.src[offset..self.pos]).into_owned()
    }

    /// Post-pass over an accepted lexeme: keyword rewriting and payload
    /// decoding.
    fn finish_token(&mut self, kind: TokenKind, start: SourceLocation, lexeme: String) -> Token {
        match kind {
            TokenKind::Identifier => match keyword_kind(&lexeme) {
                Some(keyword) => Token::new(keyword, start, lexeme),
                None => Token::new(TokenKind::Identifier, start, lexeme),
            },
            TokenKind::IntLiteral => {
                let value = self.decode_int(&lexeme, &start);
                Token::with_value(kind, start, lexeme, value)
            }
            TokenKind::FloatLiteral => {
                let value = self.decode_float(&lexeme, &start);
                Token::with_value(kind, start, lexeme, value)
            }
            TokenKind::CharLiteral => {
                let value = self.decode_char(&lexeme, &start);
                Token::with_value(kind, start, lexeme, value)
            }
            TokenKind::StringLiteral => {
                let value = self.decode_string(&lexeme, &start);
                Token::with_value(kind, start, lexeme, value)
            }
            _ => Token::new(kind, start, lexeme),
        }
    }

    fn decode_int(&mut self, lexeme: &str, loc: &SourceLocation) -> TokenValue {
        let bytes = lexeme.as_bytes();
        let (base, digits_at) = if bytes.len() >= 2 && (bytes[1] == b'x' || bytes[1] == b'X') {
            (16u64, 2)
        } else if bytes.len() >= 2 && (bytes[1] == b'b' || bytes[1] == b'B') {
            (2u64, 2)
        } else if bytes[0] == b'0' && bytes.len() > 1 {
            (8u64, 1)
        } else {
            (10u64, 0)
        };

        let mut value: u64 = 0;
        let mut unsigned = false;
        let mut long_count = 0u8;
        let mut bad_digit = false;
        for &b in &bytes[digits_at..] {
            match b {
                b'u' | b'U' => unsigned = true,
                b'l' | b'L' => long_count += 1,
                _ => {
                    let digit = match b {
                        b'0'..=b'9' => (b - b'0') as u64,
                        b'a'..=b'f' => (b - b'a' + 10) as u64,
                        b'A'..=b'F' => (b - b'A' + 10) as u64,
                        _ => continue,
                    };
                    if digit >= base {
                        bad_digit = true;
                        continue;
                    }
                    value = value.wrapping_mul(base).wrapping_add(digit);
                }
            }
        }
        if bad_digit {
            self.diagnostics.error(
                loc.clone(),
                format!("invalid digit in base-{} constant '{}'", base, lexeme),
            );
        }
        TokenValue::Int {
            value: value as i64,
            unsigned,
            long: long_count == 1,
            long_long: long_count >= 2,
        }
    }

    fn decode_float(&mut self, lexeme: &str, loc: &SourceLocation) -> TokenValue {
        let (numeric, single) = match lexeme.as_bytes().last() {
            Some(b'f') | Some(b'F') => (&lexeme[..lexeme.len() - 1], true),
            Some(b'l') | Some(b'L') => (&lexeme[..lexeme.len() - 1], false),
            _ => (lexeme, false),
        };
        let value = match numeric.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                self.diagnostics.error(
                    loc.clone(),
                    format!("malformed floating constant '{}'", lexeme),
                );
                0.0
            }
        };
        TokenValue::Float { value, single }
    }

    fn decode_char(&mut self, lexeme: &str, loc: &SourceLocation) -> TokenValue {
        // Strip the surrounding quotes; the DFA guarantees they exist.
        let inner = &lexeme.as_bytes()[1..lexeme.len() - 1];
        let decoded = self.unescape(inner, loc);
        TokenValue::Char(decoded.first().copied().unwrap_or(0))
    }

    fn decode_string(&mut self, lexeme: &str, loc: &SourceLocation) -> TokenValue {
        let inner = &lexeme.as_bytes()[1..lexeme.len() - 1];
        let decoded = self.unescape(inner, loc);
        TokenValue::Str(decoded)
    }

    /// Decode escape sequences in the body of a char or string literal.
    fn unescape(&mut self, bytes: &[u8], loc: &SourceLocation) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\\' {
                out.push(bytes[i]);
                i += 1;
                continue;
            }
            i += 1;
            if i >= bytes.len() {
                break;
            }
            match bytes[i] {
                b'n' => out.push(b'\n'),
                b't' => out.push(b'\t'),
                b'r' => out.push(b'\r'),
                b'a' => out.push(0x07),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0c),
                b'v' => out.push(0x0b),
                b'\\' => out.push(b'\\'),
                b'\'' => out.push(b'\''),
                b'"' => out.push(b'"'),
                b'?' => out.push(b'?'),
                b'0'..=b'7' => {
                    let mut value = 0u32;
                    let mut digits = 0;
                    while i < bytes.len() && digits < 3 && (b'0'..=b'7').contains(&bytes[i]) {
                        value = value * 8 + (bytes[i] - b'0') as u32;
                        i += 1;
                        digits += 1;
                    }
                    out.push((value & 0xff) as u8);
                    continue;
                }
                b'x' => {
                    i += 1;
                    let mut value = 0u32;
                    let mut digits = 0;
                    while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                        let digit = match bytes[i] {
                            b'0'..=b'9' => (bytes[i] - b'0') as u32,
                            b'a'..=b'f' => (bytes[i] - b'a' + 10) as u32,
                            _ => (bytes[i] - b'A' + 10) as u32,
                        };
                        value = value.wrapping_mul(16).wrapping_add(digit);
                        i += 1;
                        digits += 1;
                    }
                    if digits == 0 {
                        self.diagnostics
                            .error(loc.clone(), "\\x escape has no hex digits");
                    }
                    out.push((value & 0xff) as u8);
                    continue;
                }
                other => {
                    self.diagnostics.error(
                        loc.clone(),
                        format!("unknown escape sequence '\\{}'", other as char),
                    );
                    out.push(other);
                }
            }
            i += 1;
        }
        out
    }
}

/// Lex an entire source buffer, returning the token stream (terminated by
/// `EndOfFile`) and the collected diagnostics.
pub fn tokenize(source: &str, file: &str) -> (Vec<Token>, DiagnosticBag) {
    let mut lexer = Lexer::new(source, file);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next();
        let done = token.kind == TokenKind::EndOfFile;
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, lexer.into_diagnostics())
}
