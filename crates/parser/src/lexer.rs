//! Tokenizer for contract sources.
//!
//! `logos` splits the text into raw tokens, newlines included. A layout pass then drops newlines
//! inside brackets and blank lines, and turns changes in leading whitespace into `Indent` and
//! `Dedent` tokens the way Python does.

use crate::error::{AnalysisError, Result};
use alloy_primitives::U256;
use cobra_data::{BinaryOp, SourceLocation};
use logos::{Lexer, Logos, Skip};
use std::{fmt, ops::Range};

pub type Span = Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Str,
    Bytes,
    /// Formatted string literal, rejected by the parser.
    Format,
}

/// A string literal with its escapes resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub kind: TextKind,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LexError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    NonAsciiBytes,
    InvalidEscape(String),
    InvalidInteger(String),
}

impl LexError {
    fn describe(&self, slice: &str) -> String {
        match self {
            Self::UnexpectedCharacter => format!("unexpected character `{slice}`"),
            Self::UnterminatedString => "unterminated string literal".to_string(),
            Self::NonAsciiBytes => "bytes literal may only contain ASCII characters".to_string(),
            Self::InvalidEscape(escape) => format!("invalid escape `\\{escape}`"),
            Self::InvalidInteger(digits) => {
                format!("invalid integer literal `{digits}` (must fit in 256 bits)")
            }
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(error = LexError)]
#[logos(skip r"([ \t\r\x0c]+|\\\r?\n)")]
pub enum Token {
    #[token("#", skip_comment)]
    Comment,
    #[token("\n")]
    Newline,
    /// Emitted by the layout pass.
    Indent,
    /// Emitted by the layout pass.
    Dedent,

    #[token("class")]
    Class,
    #[token("def")]
    Def,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("lambda")]
    Lambda,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,
    #[token("raise")]
    Raise,
    #[token("with")]
    With,
    #[token("yield")]
    Yield,
    #[token("del")]
    Del,
    #[token("global")]
    Global,
    #[token("nonlocal")]
    Nonlocal,
    #[token("assert")]
    Assert,
    #[token("is")]
    Is,
    #[token("async")]
    Async,
    #[token("await")]
    Await,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),
    #[regex(r"[0-9][0-9_]*", |lex| integer(lex.slice(), 10))]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| integer(&lex.slice()[2..], 16))]
    #[regex(r"0[oO][0-7_]+", |lex| integer(&lex.slice()[2..], 8))]
    #[regex(r"0[bB][01_]+", |lex| integer(&lex.slice()[2..], 2))]
    Int(U256),
    /// Floating point literal, only kept so the parser can reject it with a location.
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9_]+")]
    Float,
    #[regex(r#"[bBrRfF]{0,2}["']"#, text)]
    Text(Text),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("->")]
    Arrow,
    #[token(";")]
    Semicolon,
    #[token("...")]
    Ellipsis,
    #[token("=")]
    Assign,
    #[token("+=", |_| BinaryOp::Add)]
    #[token("-=", |_| BinaryOp::Sub)]
    #[token("*=", |_| BinaryOp::Mul)]
    #[token("/=", |_| BinaryOp::Div)]
    #[token("//=", |_| BinaryOp::Div)]
    #[token("%=", |_| BinaryOp::Mod)]
    #[token("**=", |_| BinaryOp::Pow)]
    #[token("&=", |_| BinaryOp::BitAnd)]
    #[token("|=", |_| BinaryOp::BitOr)]
    #[token("^=", |_| BinaryOp::BitXor)]
    #[token("<<=", |_| BinaryOp::Shl)]
    #[token(">>=", |_| BinaryOp::Shr)]
    AugAssign(BinaryOp),
    #[token(":=")]
    Walrus,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
}

impl Token {
    pub(crate) fn is_opening(&self) -> bool {
        matches!(self, Self::LParen | Self::LBracket | Self::LBrace)
    }

    pub(crate) fn is_closing(&self) -> bool {
        matches!(self, Self::RParen | Self::RBracket | Self::RBrace)
    }

    fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Self::Class => "class",
            Self::Def => "def",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::While => "while",
            Self::Return => "return",
            Self::Pass => "pass",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::True => "True",
            Self::False => "False",
            Self::None => "None",
            Self::Import => "import",
            Self::From => "from",
            Self::As => "as",
            Self::Lambda => "lambda",
            Self::Try => "try",
            Self::Except => "except",
            Self::Finally => "finally",
            Self::Raise => "raise",
            Self::With => "with",
            Self::Yield => "yield",
            Self::Del => "del",
            Self::Global => "global",
            Self::Nonlocal => "nonlocal",
            Self::Assert => "assert",
            Self::Is => "is",
            Self::Async => "async",
            Self::Await => "await",
            _ => return None,
        })
    }

    fn punctuation(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Colon => ":",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::At => "@",
            Self::Arrow => "->",
            Self::Semicolon => ";",
            Self::Ellipsis => "...",
            Self::Assign => "=",
            Self::Walrus => ":=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::DoubleStar => "**",
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::Percent => "%",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            _ => "?",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(keyword) = self.keyword() {
            return write!(f, "keyword `{keyword}`");
        }
        match self {
            Self::Name(name) => write!(f, "name `{name}`"),
            Self::Int(value) => write!(f, "integer `{value}`"),
            Self::Float => f.write_str("float literal"),
            Self::Text(_) => f.write_str("string literal"),
            Self::Comment => f.write_str("comment"),
            Self::Newline => f.write_str("end of line"),
            Self::Indent => f.write_str("indent"),
            Self::Dedent => f.write_str("dedent"),
            Self::AugAssign(op) => write!(f, "`{}=`", op.symbol()),
            other => write!(f, "`{}`", other.punctuation()),
        }
    }
}

fn skip_comment(lex: &mut Lexer<'_, Token>) -> Skip {
    let rest = lex.remainder();
    lex.bump(rest.find('\n').unwrap_or(rest.len()));
    Skip
}

fn integer(digits: &str, radix: u64) -> std::result::Result<U256, LexError> {
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if digits.is_empty() {
        return Err(LexError::InvalidInteger(digits));
    }
    U256::from_str_radix(&digits, radix).map_err(|_| LexError::InvalidInteger(digits))
}

/// Scans a string literal. The matched slice holds the prefix and the opening quote.
fn text(lex: &mut Lexer<'_, Token>) -> std::result::Result<Text, LexError> {
    let slice = lex.slice();
    let prefix = slice[..slice.len() - 1].to_ascii_lowercase();
    let kind = if prefix.contains('f') {
        TextKind::Format
    } else if prefix.contains('b') {
        TextKind::Bytes
    } else {
        TextKind::Str
    };
    let raw = prefix.contains('r');
    let quote = if slice.ends_with('"') { '"' } else { '\'' };
    let rest = lex.remainder();
    let triple = rest.starts_with(&format!("{quote}{quote}"));
    let closing = if triple { format!("{quote}{quote}{quote}") } else { quote.to_string() };
    let opening_len = if triple { 2 } else { 0 };
    let body = &rest[opening_len..];

    let mut value = Vec::new();
    let mut chars = body.char_indices();
    let end = loop {
        let Some((index, c)) = chars.next() else {
            return Err(LexError::UnterminatedString);
        };
        match c {
            c if c == quote && body[index..].starts_with(&closing) => break index + closing.len(),
            '\n' if !triple => return Err(LexError::UnterminatedString),
            '\\' if raw => {
                value.push(b'\\');
                if let Some((_, next)) = chars.next() {
                    push_char(&mut value, next, kind)?;
                }
            }
            '\\' => escape(&mut chars, &mut value, kind)?,
            c => push_char(&mut value, c, kind)?,
        }
    };
    lex.bump(opening_len + end);
    Ok(Text { kind, value })
}

fn push_char(value: &mut Vec<u8>, c: char, kind: TextKind) -> std::result::Result<(), LexError> {
    if kind == TextKind::Bytes && !c.is_ascii() {
        return Err(LexError::NonAsciiBytes);
    }
    let mut buffer = [0; 4];
    value.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
    Ok(())
}

fn escape(
    chars: &mut std::str::CharIndices<'_>,
    value: &mut Vec<u8>,
    kind: TextKind,
) -> std::result::Result<(), LexError> {
    let Some((_, c)) = chars.next() else {
        return Err(LexError::UnterminatedString);
    };
    match c {
        'n' => value.push(b'\n'),
        't' => value.push(b'\t'),
        'r' => value.push(b'\r'),
        '0' => value.push(0),
        '\\' | '\'' | '"' => value.push(c as u8),
        '\n' => {}
        'x' => {
            let digits: String = chars.by_ref().take(2).map(|(_, c)| c).collect();
            let byte = u8::from_str_radix(&digits, 16)
                .map_err(|_| LexError::InvalidEscape(format!("x{digits}")))?;
            match kind {
                TextKind::Bytes => value.push(byte),
                _ => push_char(value, char::from(byte), kind)?,
            }
        }
        other => {
            value.push(b'\\');
            push_char(value, other, kind)?;
        }
    }
    Ok(())
}

/// Maps byte offsets to 1-based line and column numbers.
pub struct LineIndex<'src> {
    source: &'src str,
    starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub fn new(source: &'src str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self { source, starts }
    }

    fn line_start(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        (line, self.starts[line - 1])
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        let offset = offset.min(self.source.len());
        let (line, start) = self.line_start(offset);
        let column = self.source.get(start..offset).map_or(0, |prefix| prefix.chars().count());
        SourceLocation::new(line as u32, column as u32 + 1)
    }

    /// Width of the whitespace before `offset` on its line; tabs advance to the next multiple of 8.
    fn indentation(&self, offset: usize) -> usize {
        let (_, start) = self.line_start(offset);
        self.source.get(start..offset).unwrap_or_default().chars().fold(0, |width, c| match c {
            ' ' => width + 1,
            '\t' => (width / 8 + 1) * 8,
            _ => width,
        })
    }

    pub fn end(&self) -> Span {
        self.source.len()..self.source.len()
    }
}

/// Tokenizes `source`, rejecting bracket and block nesting deeper than `max_depth`.
pub fn tokenize(source: &str, max_depth: usize) -> Result<Vec<(Token, Span)>> {
    let lines = LineIndex::new(source);
    let mut raw = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => raw.push((token, lexer.span())),
            Err(error) => {
                return Err(AnalysisError::syntax(
                    error.describe(lexer.slice()),
                    lines.location(lexer.span().start),
                ));
            }
        }
    }
    layout(raw, &lines, max_depth)
}

fn ends_logical_line(tokens: &[(Token, Span)]) -> bool {
    matches!(tokens.last(), None | Some((Token::Newline | Token::Indent | Token::Dedent, _)))
}

fn layout(raw: Vec<(Token, Span)>, lines: &LineIndex<'_>, max_depth: usize) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::with_capacity(raw.len() + 8);
    let mut indents = vec![0usize];
    let mut brackets = 0usize;
    let mut line_start = true;
    // Prefix operators and `**` recurse in the grammar like brackets do.
    let mut prefixes = 0usize;
    let mut powers = 0usize;

    for (token, span) in raw {
        let location = lines.location(span.start);
        if token == Token::Newline {
            if brackets == 0 {
                if !ends_logical_line(&tokens) {
                    tokens.push((Token::Newline, span));
                }
                line_start = true;
                powers = 0;
            }
            continue;
        }

        if line_start {
            line_start = false;
            let width = lines.indentation(span.start);
            let current = indents.last().copied().unwrap_or(0);
            let at = span.start..span.start;
            if width > current {
                if tokens.is_empty() {
                    return Err(AnalysisError::syntax("unexpected indent", location));
                }
                indents.push(width);
                tokens.push((Token::Indent, at));
            } else if width < current {
                while indents.last().is_some_and(|&level| level > width) {
                    indents.pop();
                    tokens.push((Token::Dedent, at.clone()));
                }
                if indents.last() != Some(&width) {
                    return Err(AnalysisError::syntax(
                        "unindent does not match any outer indentation level",
                        location,
                    ));
                }
            }
        }

        if token.is_opening() {
            brackets += 1;
        } else if token.is_closing() {
            if brackets == 0 {
                return Err(AnalysisError::syntax(format!("unmatched {token}"), location));
            }
            brackets -= 1;
        }
        prefixes = match token {
            Token::Minus | Token::Plus | Token::Tilde | Token::Not => prefixes + 1,
            _ => 0,
        };
        if token == Token::DoubleStar {
            powers += 1;
        }
        if indents.len() - 1 + brackets + prefixes + powers > max_depth {
            return Err(AnalysisError::unsupported(
                "nesting depth",
                format!("blocks and expressions nest deeper than {max_depth} levels"),
                location,
            ));
        }
        tokens.push((token, span));
    }

    let end = lines.end();
    if brackets > 0 {
        return Err(AnalysisError::syntax(
            "unexpected end of input inside brackets",
            lines.location(end.start),
        ));
    }
    if !ends_logical_line(&tokens) {
        tokens.push((Token::Newline, end.clone()));
    }
    for _ in 1..indents.len() {
        tokens.push((Token::Dedent, end.clone()));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source, 64).unwrap().into_iter().map(|(token, _)| token).collect()
    }

    fn text(kind: TextKind, value: &[u8]) -> Token {
        Token::Text(Text { kind, value: value.to_vec() })
    }

    #[test]
    fn indentation_produces_block_tokens() {
        let tokens = kinds("class A:\n    x: uint256\n\n    # note\n    y: bool\n");
        assert_eq!(
            tokens,
            vec![
                Token::Class,
                Token::Name("A".into()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Name("x".into()),
                Token::Colon,
                Token::Name("uint256".into()),
                Token::Newline,
                Token::Name("y".into()),
                Token::Colon,
                Token::Name("bool".into()),
                Token::Newline,
                Token::Dedent,
            ]
        );
    }

    #[test]
    fn dedents_close_every_open_block() {
        let tokens = kinds("if a:\n    if b:\n        pass\nx");
        let dedents = tokens.iter().filter(|token| **token == Token::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&Token::Newline));
        assert_eq!(kinds("if a:\n\tpass\n")[4], Token::Indent);
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let tokens = kinds("f(a,\n  b)\nx = 1 + \\\n    2\n");
        assert_eq!(
            &tokens[..7],
            &[
                Token::Name("f".into()),
                Token::LParen,
                Token::Name("a".into()),
                Token::Comma,
                Token::Name("b".into()),
                Token::RParen,
                Token::Newline,
            ]
        );
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn literals() {
        let tokens = kinds("0xff 1_000 'a\\n' b\"hi\" f\"{x}\" 1.5 10**18 r'\\d' \"\"\"a\n'b'\"\"\"");
        assert_eq!(tokens[0], Token::Int(U256::from(255)));
        assert_eq!(tokens[1], Token::Int(U256::from(1000)));
        assert_eq!(tokens[2], text(TextKind::Str, b"a\n"));
        assert_eq!(tokens[3], text(TextKind::Bytes, b"hi"));
        assert!(matches!(&tokens[4], Token::Text(Text { kind: TextKind::Format, .. })));
        assert_eq!(tokens[5], Token::Float);
        assert_eq!(&tokens[6..9], &[Token::Int(U256::from(10)), Token::DoubleStar, Token::Int(U256::from(18))]);
        assert_eq!(tokens[9], text(TextKind::Str, b"\\d"));
        assert_eq!(tokens[10], text(TextKind::Str, b"a\n'b'"));
    }

    #[test]
    fn keywords_and_names() {
        let tokens = kinds("classy class None_ None");
        assert_eq!(
            tokens[..4],
            [Token::Name("classy".into()), Token::Class, Token::Name("None_".into()), Token::None]
        );
    }

    #[test]
    fn augmented_operators() {
        let tokens = kinds("x += 1\ny //= 2\nz **= 3\n");
        assert_eq!(tokens[1], Token::AugAssign(BinaryOp::Add));
        assert_eq!(tokens[5], Token::AugAssign(BinaryOp::Div));
        assert_eq!(tokens[9], Token::AugAssign(BinaryOp::Pow));
    }

    #[test]
    fn token_locations_are_one_based() {
        let source = "class A:\n    pass\n";
        let lines = LineIndex::new(source);
        let tokens = tokenize(source, 64).unwrap();
        assert_eq!(lines.location(tokens[0].1.start), SourceLocation::new(1, 1));
        assert_eq!(tokens[5].0, Token::Pass);
        assert_eq!(lines.location(tokens[5].1.start), SourceLocation::new(2, 5));
    }

    #[test]
    fn lexical_errors() {
        let err = tokenize("x = 'abc\n", 64).unwrap_err();
        assert!(matches!(err, AnalysisError::Syntax { .. }));
        assert_eq!(err.location(), SourceLocation::new(1, 5));
        assert!(err.message().contains("unterminated"));

        let err = tokenize("class A:\n        x: bool\n    y: bool\n", 64).unwrap_err();
        assert!(err.message().contains("unindent"));

        let err = tokenize("x = (1\n", 64).unwrap_err();
        assert!(err.message().contains("brackets"));

        let err = tokenize("x = 1)\n", 64).unwrap_err();
        assert!(err.message().contains("unmatched"));

        let err = tokenize("    x = 1\n", 64).unwrap_err();
        assert!(err.message().contains("unexpected indent"));

        let huge = format!("x = 0x1{}\n", "0".repeat(64));
        assert!(tokenize(&huge, 64).unwrap_err().message().contains("256 bits"));

        let err = tokenize("x = $\n", 64).unwrap_err();
        assert_eq!(err.message(), "unexpected character `$`");
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("x = {}1{}\n", "(".repeat(10), ")".repeat(10));
        assert!(tokenize(&deep, 16).is_ok());
        let err = tokenize(&deep, 8).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported { ref construct, .. } if construct == "nesting depth"));
        let err = tokenize(&format!("x = {}1\n", "-".repeat(20)), 8).unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported { .. }));
    }
}
