//! Lexer for Corten assembly source text.
//!
//! The scanner is a deterministic longest-match-by-priority engine: an
//! ordered rule list is tried at the current offset and the first rule that
//! matches produces the token.  Star variants and multi-character operators
//! are ordered ahead of their prefixes (`.bss*` before `.bss`, `<=` before
//! `<`), and every directive-like keyword requires a trailing boundary so
//! that `#included` lexes as a number sign plus a symbol rather than an
//! `#include` directive.
//!
//! Whitespace and comments are emitted as tokens, not discarded: the
//! preprocessor writes surviving lexemes back out byte-for-byte, so every
//! byte of the input must be covered by exactly one token.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{SourceError, Span};

/// A token produced by the lexer.
///
/// `text` is the raw lexeme, untouched: concatenating the lexemes of a
/// token sequence reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// Raw lexeme text.
    pub text: String,
    /// Source location.
    pub span: Span,
}

impl Token {
    /// Build a token with a dummy span, for preprocessor-synthesized runs.
    #[must_use]
    pub fn synthetic(kind: TokenKind, text: &str) -> Self {
        Self {
            kind,
            text: String::from(text),
            span: Span::dummy(),
        }
    }
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// A single space.
    WsSpace,
    /// A single tab.
    WsTab,
    /// A single newline.
    WsNewline,
    /// Any other whitespace run (`\r`, form feed, ...).
    Ws,
    /// `; ...` to end of line.
    LineComment,
    /// `;* ... *;`.
    BlockComment,

    // ── preprocessor directives ─────────────────────────────────────────
    /// `#include`.
    Include,
    /// `#macro`.
    Macro,
    /// `#macret`.
    Macret,
    /// `#macend`.
    Macend,
    /// `#invoke`.
    Invoke,
    /// `#define`.
    Define,
    /// `#undef`.
    Undef,
    /// `#ifdef`.
    Ifdef,
    /// `#ifndef`.
    Ifndef,
    /// `#ifequ`.
    Ifequ,
    /// `#ifnequ`.
    Ifnequ,
    /// `#ifless`.
    Ifless,
    /// `#ifmore`.
    Ifmore,
    /// `#else`.
    Else,
    /// `#elsedef`.
    Elsedef,
    /// `#elsendef`.
    Elsendef,
    /// `#elseequ`.
    Elseequ,
    /// `#elsenequ`.
    Elsenequ,
    /// `#elseless`.
    Elseless,
    /// `#elsemore`.
    Elsemore,
    /// `#endif`.
    Endif,

    // ── variable types ──────────────────────────────────────────────────
    /// `BYTE`.
    TypeByte,
    /// `DBYTE`.
    TypeDbyte,
    /// `WORD`.
    TypeWord,
    /// `DWORD`.
    TypeDword,
    /// `CHAR`.
    TypeChar,
    /// `STRING`.
    TypeString,
    /// `FLOAT`.
    TypeFloat,
    /// `DOUBLE`.
    TypeDouble,
    /// `BOOLEAN`.
    TypeBoolean,

    // ── assembler directives ────────────────────────────────────────────
    /// `.global`.
    Global,
    /// `.extern`.
    Extern,
    /// `.equ`.
    Equ,
    /// `.org`.
    Org,
    /// `.scope`.
    Scope,
    /// `.scend`.
    Scend,
    /// `.db` — bytes, low-endian.
    Db,
    /// `.ddb` — double bytes, low-endian.
    Ddb,
    /// `.ddb*` — double bytes, high-endian.
    DdbBe,
    /// `.dw` — words, low-endian.
    Dw,
    /// `.dw*` — words, high-endian.
    DwBe,
    /// `.ddw` — double words, low-endian.
    Ddw,
    /// `.ddw*` — double words, high-endian.
    DdwBe,
    /// `.ascii`.
    Ascii,
    /// `.asciz`.
    Asciz,
    /// `.advance`.
    Advance,
    /// `.fill`.
    Fill,
    /// `.space`.
    Space,
    /// `.checkpc`.
    Checkpc,
    /// `.align`.
    Align,
    /// `.bss`.
    Bss,
    /// `.bss*` — absolute form.
    BssAbs,
    /// `.data`.
    Data,
    /// `.data*` — absolute form.
    DataAbs,
    /// `.code`.
    Code,
    /// `.code*` — absolute form.
    CodeAbs,
    /// `.stop`.
    Stop,

    // ── literals and names ──────────────────────────────────────────────
    /// `#` when not opening a directive keyword (immediate marker).
    NumberSign,
    /// `%1010`.
    BinNumber,
    /// `@777`.
    OctNumber,
    /// `42`.
    DecNumber,
    /// `$FF`.
    HexNumber,
    /// `'x'`.
    CharLit,
    /// `"..."` (raw, quotes included).
    StringLit,
    /// Identifier.
    Symbol,

    // ── punctuation ─────────────────────────────────────────────────────
    /// `:`.
    Colon,
    /// `,`.
    Comma,
    /// `;` — shadowed by the comment rules, kept for completeness.
    Semicolon,
    /// `(`.
    OpenParen,
    /// `)`.
    CloseParen,
    /// `[`.
    OpenBracket,
    /// `]`.
    CloseBracket,
    /// `{`.
    OpenBrace,
    /// `}`.
    CloseBrace,

    // ── operators ───────────────────────────────────────────────────────
    /// `+`.
    Plus,
    /// `-`.
    Minus,
    /// `*`.
    Star,
    /// `/`.
    Slash,
    /// `%` (modulus; `%` followed by binary digits is a literal instead).
    Percent,
    /// `<<`.
    Shl,
    /// `>>`.
    Shr,
    /// `^`.
    Caret,
    /// `&`.
    Ampersand,
    /// `|`.
    Pipe,
    /// `~`.
    Tilde,
    /// `!`.
    Bang,
    /// `==`.
    EqEq,
    /// `!=`.
    BangEq,
    /// `<`.
    Lt,
    /// `>`.
    Gt,
    /// `<=`.
    Le,
    /// `>=`.
    Ge,
    /// `||`.
    OrOr,
    /// `&&`.
    AndAnd,
}

impl TokenKind {
    /// Space, tab, or newline.
    #[must_use]
    pub fn is_whitespace(self) -> bool {
        matches!(
            self,
            TokenKind::WsSpace | TokenKind::WsTab | TokenKind::WsNewline | TokenKind::Ws
        )
    }

    /// Line or block comment.
    #[must_use]
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// One of the typed keywords accepted in macro signatures.
    #[must_use]
    pub fn is_variable_type(self) -> bool {
        matches!(
            self,
            TokenKind::TypeByte
                | TokenKind::TypeDbyte
                | TokenKind::TypeWord
                | TokenKind::TypeDword
                | TokenKind::TypeChar
                | TokenKind::TypeString
                | TokenKind::TypeFloat
                | TokenKind::TypeDouble
                | TokenKind::TypeBoolean
        )
    }

    /// A directive that opens a top conditional block.
    #[must_use]
    pub fn is_if_directive(self) -> bool {
        matches!(
            self,
            TokenKind::Ifdef
                | TokenKind::Ifndef
                | TokenKind::Ifequ
                | TokenKind::Ifnequ
                | TokenKind::Ifless
                | TokenKind::Ifmore
        )
    }

    /// A sibling continuation inside a conditional structure.
    #[must_use]
    pub fn is_else_directive(self) -> bool {
        matches!(
            self,
            TokenKind::Else
                | TokenKind::Elsedef
                | TokenKind::Elsendef
                | TokenKind::Elseequ
                | TokenKind::Elsenequ
                | TokenKind::Elseless
                | TokenKind::Elsemore
        )
    }

    /// A kind the preprocessor dispatches a handler for.
    #[must_use]
    pub fn is_preprocessor_directive(self) -> bool {
        matches!(
            self,
            TokenKind::Include
                | TokenKind::Macro
                | TokenKind::Macret
                | TokenKind::Macend
                | TokenKind::Invoke
                | TokenKind::Define
                | TokenKind::Undef
                | TokenKind::Endif
        ) || self.is_if_directive()
            || self.is_else_directive()
    }
}

/// Keyword lexeme for a variable-type kind, used when synthesizing
/// `.equ name value : TYPE` runs.
#[must_use]
pub fn variable_type_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::TypeByte => "BYTE",
        TokenKind::TypeDbyte => "DBYTE",
        TokenKind::TypeWord => "WORD",
        TokenKind::TypeDword => "DWORD",
        TokenKind::TypeChar => "CHAR",
        TokenKind::TypeString => "STRING",
        TokenKind::TypeFloat => "FLOAT",
        TokenKind::TypeDouble => "DOUBLE",
        TokenKind::TypeBoolean => "BOOLEAN",
        _ => "",
    }
}

/// Preprocessor directive keywords.  Longer spellings come first so a
/// prefix never wins against its extension.
const PREPROCESSOR_KEYWORDS: &[(&str, TokenKind)] = &[
    ("#include", TokenKind::Include),
    ("#invoke", TokenKind::Invoke),
    ("#macro", TokenKind::Macro),
    ("#macret", TokenKind::Macret),
    ("#macend", TokenKind::Macend),
    ("#define", TokenKind::Define),
    ("#undef", TokenKind::Undef),
    ("#ifdef", TokenKind::Ifdef),
    ("#ifndef", TokenKind::Ifndef),
    ("#ifequ", TokenKind::Ifequ),
    ("#ifnequ", TokenKind::Ifnequ),
    ("#ifless", TokenKind::Ifless),
    ("#ifmore", TokenKind::Ifmore),
    ("#elsedef", TokenKind::Elsedef),
    ("#elsendef", TokenKind::Elsendef),
    ("#elseequ", TokenKind::Elseequ),
    ("#elsenequ", TokenKind::Elsenequ),
    ("#elseless", TokenKind::Elseless),
    ("#elsemore", TokenKind::Elsemore),
    ("#else", TokenKind::Else),
    ("#endif", TokenKind::Endif),
];

/// Typed keywords accepted in macro signatures.
const VARIABLE_TYPES: &[(&str, TokenKind)] = &[
    ("DBYTE", TokenKind::TypeDbyte),
    ("BYTE", TokenKind::TypeByte),
    ("DWORD", TokenKind::TypeDword),
    ("WORD", TokenKind::TypeWord),
    ("CHAR", TokenKind::TypeChar),
    ("STRING", TokenKind::TypeString),
    ("FLOAT", TokenKind::TypeFloat),
    ("DOUBLE", TokenKind::TypeDouble),
    ("BOOLEAN", TokenKind::TypeBoolean),
];

/// Assembler directive keywords; star variants precede their prefixes.
const ASSEMBLER_KEYWORDS: &[(&str, TokenKind)] = &[
    (".global", TokenKind::Global),
    (".extern", TokenKind::Extern),
    (".equ", TokenKind::Equ),
    (".org", TokenKind::Org),
    (".scope", TokenKind::Scope),
    (".scend", TokenKind::Scend),
    (".ddw*", TokenKind::DdwBe),
    (".ddw", TokenKind::Ddw),
    (".ddb*", TokenKind::DdbBe),
    (".ddb", TokenKind::Ddb),
    (".dw*", TokenKind::DwBe),
    (".dw", TokenKind::Dw),
    (".db", TokenKind::Db),
    (".ascii", TokenKind::Ascii),
    (".asciz", TokenKind::Asciz),
    (".advance", TokenKind::Advance),
    (".fill", TokenKind::Fill),
    (".space", TokenKind::Space),
    (".checkpc", TokenKind::Checkpc),
    (".align", TokenKind::Align),
    (".bss*", TokenKind::BssAbs),
    (".bss", TokenKind::Bss),
    (".data*", TokenKind::DataAbs),
    (".data", TokenKind::Data),
    (".code*", TokenKind::CodeAbs),
    (".code", TokenKind::Code),
    (".stop", TokenKind::Stop),
];

/// Single-character punctuation.  Semicolon is shadowed by the comment
/// rules and never actually produced.
const PUNCTUATION: &[(u8, TokenKind)] = &[
    (b'{', TokenKind::OpenBrace),
    (b'}', TokenKind::CloseBrace),
    (b'[', TokenKind::OpenBracket),
    (b']', TokenKind::CloseBracket),
    (b'(', TokenKind::OpenParen),
    (b')', TokenKind::CloseParen),
    (b',', TokenKind::Comma),
    (b':', TokenKind::Colon),
    (b';', TokenKind::Semicolon),
];

/// Operators, multi-character spellings first.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("<<", TokenKind::Shl),
    (">>", TokenKind::Shr),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::BangEq),
    ("||", TokenKind::OrOr),
    ("&&", TokenKind::AndAnd),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("^", TokenKind::Caret),
    ("&", TokenKind::Ampersand),
    ("|", TokenKind::Pipe),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
];

/// Directive keywords only match when followed by a boundary: whitespace,
/// comma, close-paren, or end of input.
fn keyword_boundary(bytes: &[u8], pos: usize) -> bool {
    match bytes.get(pos) {
        None => true,
        Some(b) => matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b',' | b')'),
    }
}

/// Try the keyword table at `pos`; returns the matched kind and length.
fn match_keyword(bytes: &[u8], pos: usize, table: &[(&str, TokenKind)]) -> Option<(TokenKind, usize)> {
    for &(kw, kind) in table {
        let end = pos + kw.len();
        if bytes.len() >= end
            && &bytes[pos..end] == kw.as_bytes()
            && keyword_boundary(bytes, end)
        {
            return Some((kind, kw.len()));
        }
    }
    None
}

/// Tokenize source text into a vector of tokens.
///
/// Every byte of the input is covered by exactly one token; whitespace and
/// comments are emitted, not discarded, so that the preprocessed artifact
/// can be reproduced byte-faithfully from surviving lexemes.
///
/// # Errors
///
/// Returns [`SourceError::Lex`] if no rule matches at some offset.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SourceError> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::with_capacity(len / 3 + 1);
    let mut pos = 0;
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    while pos < len {
        let (kind, tok_len) = scan_at(bytes, pos).ok_or_else(|| SourceError::Lex {
            msg: alloc::format!("unexpected character '{}'", bytes[pos] as char),
            span: Span::new(line, col, pos, 1),
        })?;

        let text = &source[pos..pos + tok_len];
        tokens.push(Token {
            kind,
            text: String::from(text),
            span: Span::new(line, col, pos, tok_len),
        });

        // Advance line/col over the lexeme (block comments span lines).
        for &b in &bytes[pos..pos + tok_len] {
            if b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        pos += tok_len;
    }

    Ok(tokens)
}

/// One step of the rule engine: classify the token starting at `pos`.
fn scan_at(bytes: &[u8], pos: usize) -> Option<(TokenKind, usize)> {
    let len = bytes.len();
    let ch = bytes[pos];

    // Whitespace, one token per space/tab/newline.
    match ch {
        b' ' => return Some((TokenKind::WsSpace, 1)),
        b'\t' => return Some((TokenKind::WsTab, 1)),
        b'\n' => return Some((TokenKind::WsNewline, 1)),
        b'\r' | 0x0B | 0x0C => {
            let mut end = pos + 1;
            while end < len && matches!(bytes[end], b'\r' | 0x0B | 0x0C) {
                end += 1;
            }
            return Some((TokenKind::Ws, end - pos));
        }
        _ => {}
    }

    // Comments.  Block form first; an unterminated `;*` degrades to a line
    // comment, matching the rule ordering.
    if ch == b';' {
        if pos + 1 < len && bytes[pos + 1] == b'*' {
            let mut end = pos + 2;
            while end + 1 < len {
                if bytes[end] == b'*' && bytes[end + 1] == b';' {
                    return Some((TokenKind::BlockComment, end + 2 - pos));
                }
                end += 1;
            }
        }
        let mut end = pos + 1;
        while end < len && bytes[end] != b'\n' {
            end += 1;
        }
        return Some((TokenKind::LineComment, end - pos));
    }

    // Punctuation (semicolon unreachable behind the comment rules).
    for &(b, kind) in PUNCTUATION {
        if ch == b {
            return Some((kind, 1));
        }
    }

    // Directive keywords and typed keywords, boundary-checked.
    if ch == b'#' {
        if let Some(hit) = match_keyword(bytes, pos, PREPROCESSOR_KEYWORDS) {
            return Some(hit);
        }
        // Bare number sign (immediate marker).
        return Some((TokenKind::NumberSign, 1));
    }
    if ch == b'.' {
        if let Some(hit) = match_keyword(bytes, pos, ASSEMBLER_KEYWORDS) {
            return Some(hit);
        }
        return None;
    }
    if let Some(hit) = match_keyword(bytes, pos, VARIABLE_TYPES) {
        return Some(hit);
    }

    // Number literals: % binary, @ octal, bare decimal, $ hex.
    if ch == b'%' && pos + 1 < len && matches!(bytes[pos + 1], b'0' | b'1') {
        let mut end = pos + 1;
        while end < len && matches!(bytes[end], b'0' | b'1') {
            end += 1;
        }
        return Some((TokenKind::BinNumber, end - pos));
    }
    if ch == b'@' && pos + 1 < len && matches!(bytes[pos + 1], b'0'..=b'7') {
        let mut end = pos + 1;
        while end < len && matches!(bytes[end], b'0'..=b'7') {
            end += 1;
        }
        return Some((TokenKind::OctNumber, end - pos));
    }
    if ch.is_ascii_digit() {
        let mut end = pos + 1;
        while end < len && bytes[end].is_ascii_digit() {
            end += 1;
        }
        return Some((TokenKind::DecNumber, end - pos));
    }
    if ch == b'$' && pos + 1 < len && bytes[pos + 1].is_ascii_hexdigit() {
        let mut end = pos + 1;
        while end < len && bytes[end].is_ascii_hexdigit() {
            end += 1;
        }
        return Some((TokenKind::HexNumber, end - pos));
    }

    // Character literal: exactly one byte between quotes.
    if ch == b'\'' && pos + 2 < len && bytes[pos + 2] == b'\'' {
        return Some((TokenKind::CharLit, 3));
    }

    // String literal: raw text to the next quote on the same line.
    if ch == b'"' {
        let mut end = pos + 1;
        while end < len && bytes[end] != b'"' && bytes[end] != b'\n' {
            end += 1;
        }
        if end < len && bytes[end] == b'"' {
            return Some((TokenKind::StringLit, end + 1 - pos));
        }
        return None;
    }

    // Symbol.
    if ch.is_ascii_alphabetic() || ch == b'_' {
        let mut end = pos + 1;
        while end < len && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        return Some((TokenKind::Symbol, end - pos));
    }

    // Operators, longest spellings first.
    for &(op, kind) in OPERATORS {
        let end = pos + op.len();
        if bytes.len() >= end && &bytes[pos..end] == op.as_bytes() {
            return Some((kind, op.len()));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn joined(src: &str) -> String {
        tokenize(src)
            .unwrap()
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn empty_input() {
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn round_trip_covers_every_byte() {
        let src = "#macro add(a:BYTE, b:BYTE): BYTE\n\t.scope\n#macret a+b\n#macend\n";
        assert_eq!(joined(src), src);
    }

    #[test]
    fn whitespace_is_emitted() {
        assert_eq!(
            kinds(" \t\n"),
            vec![TokenKind::WsSpace, TokenKind::WsTab, TokenKind::WsNewline]
        );
    }

    #[test]
    fn directive_requires_boundary() {
        // `#included` is not the include directive.
        assert_eq!(
            kinds("#included"),
            vec![TokenKind::NumberSign, TokenKind::Symbol]
        );
        assert_eq!(
            kinds("#include x"),
            vec![TokenKind::Include, TokenKind::WsSpace, TokenKind::Symbol]
        );
    }

    #[test]
    fn directive_at_end_of_input() {
        assert_eq!(kinds("#endif"), vec![TokenKind::Endif]);
    }

    #[test]
    fn else_vs_elsedef() {
        assert_eq!(kinds("#elsedef x")[0], TokenKind::Elsedef);
        assert_eq!(kinds("#else\n")[0], TokenKind::Else);
    }

    #[test]
    fn star_variants_precede_prefixes() {
        assert_eq!(kinds(".bss* ")[0], TokenKind::BssAbs);
        assert_eq!(kinds(".bss ")[0], TokenKind::Bss);
        assert_eq!(kinds(".dw* ")[0], TokenKind::DwBe);
        assert_eq!(kinds(".dw ")[0], TokenKind::Dw);
        assert_eq!(kinds(".ddw* ")[0], TokenKind::DdwBe);
    }

    #[test]
    fn variable_type_boundary() {
        assert_eq!(kinds("BYTE,")[0], TokenKind::TypeByte);
        assert_eq!(kinds("BYTE)")[0], TokenKind::TypeByte);
        // Identifier prefixes are not eaten.
        assert_eq!(kinds("BYTES"), vec![TokenKind::Symbol]);
        assert_eq!(kinds("DBYTE ")[0], TokenKind::TypeDbyte);
    }

    #[test]
    fn number_literal_bases() {
        assert_eq!(kinds("%1010"), vec![TokenKind::BinNumber]);
        assert_eq!(kinds("@777"), vec![TokenKind::OctNumber]);
        assert_eq!(kinds("42"), vec![TokenKind::DecNumber]);
        assert_eq!(kinds("$FF"), vec![TokenKind::HexNumber]);
    }

    #[test]
    fn percent_without_digits_is_modulus() {
        assert_eq!(
            kinds("a % b"),
            vec![
                TokenKind::Symbol,
                TokenKind::WsSpace,
                TokenKind::Percent,
                TokenKind::WsSpace,
                TokenKind::Symbol
            ]
        );
    }

    #[test]
    fn number_sign_immediate() {
        assert_eq!(kinds("#11"), vec![TokenKind::NumberSign, TokenKind::DecNumber]);
    }

    #[test]
    fn line_comment_runs_to_newline() {
        let toks = tokenize("; hello world\nx").unwrap();
        assert_eq!(toks[0].kind, TokenKind::LineComment);
        assert_eq!(toks[0].text, "; hello world");
        assert_eq!(toks[1].kind, TokenKind::WsNewline);
    }

    #[test]
    fn block_comment() {
        let toks = tokenize(";* multi\nline *; x").unwrap();
        assert_eq!(toks[0].kind, TokenKind::BlockComment);
        assert_eq!(toks[0].text, ";* multi\nline *;");
    }

    #[test]
    fn unterminated_block_comment_degrades_to_line_comment() {
        let toks = tokenize(";* never closed\nx").unwrap();
        assert_eq!(toks[0].kind, TokenKind::LineComment);
        assert_eq!(toks[0].text, ";* never closed");
    }

    #[test]
    fn string_literal_keeps_quotes() {
        let toks = tokenize("\"hello\"").unwrap();
        assert_eq!(toks[0].kind, TokenKind::StringLit);
        assert_eq!(toks[0].text, "\"hello\"");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            tokenize("\"oops\n").unwrap_err(),
            SourceError::Lex { .. }
        ));
    }

    #[test]
    fn char_literal() {
        assert_eq!(kinds("'x'"), vec![TokenKind::CharLit]);
    }

    #[test]
    fn operators_maximal_munch() {
        assert_eq!(kinds("<<"), vec![TokenKind::Shl]);
        assert_eq!(kinds("<="), vec![TokenKind::Le]);
        assert_eq!(kinds("<"), vec![TokenKind::Lt]);
        assert_eq!(kinds("||"), vec![TokenKind::OrOr]);
        assert_eq!(kinds("|"), vec![TokenKind::Pipe]);
        assert_eq!(kinds("!="), vec![TokenKind::BangEq]);
        assert_eq!(kinds("!"), vec![TokenKind::Bang]);
    }

    #[test]
    fn angle_include_tokens() {
        assert_eq!(
            kinds("#include <\"defs.csm\">"),
            vec![
                TokenKind::Include,
                TokenKind::WsSpace,
                TokenKind::Lt,
                TokenKind::StringLit,
                TokenKind::Gt
            ]
        );
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = tokenize("x ?").unwrap_err();
        match err {
            SourceError::Lex { msg, span } => {
                assert!(msg.contains('?'), "msg: {msg}");
                assert_eq!(span.line, 1);
                assert_eq!(span.col, 3);
            }
            other => panic!("expected Lex error, got {other:?}"),
        }
    }

    #[test]
    fn bare_dot_is_an_error() {
        assert!(tokenize(". x").is_err());
    }

    #[test]
    fn span_tracking_across_lines() {
        let toks = tokenize("x\ny").unwrap();
        assert_eq!(toks[0].span, Span::new(1, 1, 0, 1));
        assert_eq!(toks[2].span, Span::new(2, 1, 2, 1));
    }

    #[test]
    fn equ_line_round_trip() {
        let src = ".equ y 0 : BYTE\n";
        assert_eq!(joined(src), src);
        let ks = kinds(src);
        assert_eq!(ks[0], TokenKind::Equ);
        assert!(ks.contains(&TokenKind::TypeByte));
    }

    #[test]
    fn semicolon_kind_is_shadowed() {
        // A lone `;` lexes as a comment, not punctuation.
        assert_eq!(kinds(";"), vec![TokenKind::LineComment]);
    }

    #[test]
    fn symbol_names() {
        assert_eq!(kinds("_foo9"), vec![TokenKind::Symbol]);
        assert_eq!(joined("_foo9"), "_foo9".to_string());
    }
}
