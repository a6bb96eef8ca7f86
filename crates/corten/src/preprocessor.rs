//! Token-rewriting preprocessor for Corten assembly source.
//!
//! The input is tokenized once; a single left-to-right pass then advances a
//! cursor over the stream, rewriting it in place: directives execute and
//! consume their input range, `#include` and `#invoke` splice fresh token
//! runs ahead of the cursor so the same pass continues into them, and
//! conditional blocks erase arbitrary ranges.  Tokens that survive are
//! written to the output byte-for-byte, with indentation normalized against
//! the `.scope`/`.scend` nesting level.
//!
//! Include resolution goes through the [`IncludeResolver`] seam so the core
//! stays `no_std`-clean; [`FsResolver`] provides the filesystem behaviour
//! behind the `std` feature and [`MemResolver`] backs tests and embedded
//! use.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{SourceError, Span};
use crate::lexer::{self, variable_type_name, Token, TokenKind};
use crate::stream::TokenStream;

/// Extension of assembly source files.
pub const SOURCE_EXTENSION: &str = "csm";
/// Extension of the preprocessed artifact.
pub const PROCESSED_EXTENSION: &str = "csi";

/// Upper bound on symbol splices per run; a `#define X X` style cycle
/// terminates with [`SourceError::ResourceLimit`] instead of spinning.
const MAX_SUBSTITUTIONS: usize = 100_000;

/// Upper bound on the macro invocation stack.
const MAX_INVOKE_DEPTH: usize = 256;

/// Resolves `#include` requests to file contents.
///
/// The quoted form (`#include "path"`) resolves relative to the directory
/// of the file being preprocessed; the angled form (`#include <"path">`)
/// searches the configured system include directories and must match
/// exactly one of them.
pub trait IncludeResolver {
    /// Contents for a quoted include, or `None` if the file does not exist.
    fn resolve_quoted(&self, source_dir: &str, path: &str) -> Option<String>;

    /// All system-directory hits for an angled include, as
    /// `(origin, contents)` pairs.  Zero hits is "not found"; more than one
    /// is ambiguous.
    fn resolve_angled(&self, path: &str) -> Vec<(String, String)>;
}

/// Resolver that refuses every include — the default for string inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve_quoted(&self, _source_dir: &str, _path: &str) -> Option<String> {
        None
    }

    fn resolve_angled(&self, _path: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// In-memory resolver backed by path → contents maps.
#[derive(Debug, Clone, Default)]
pub struct MemResolver {
    local: BTreeMap<String, String>,
    system: Vec<(String, String)>,
}

impl MemResolver {
    /// An empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for quoted includes.
    pub fn add_local(&mut self, path: &str, text: &str) {
        self.local.insert(String::from(path), String::from(text));
    }

    /// Register a file for angled includes.  Registering the same path
    /// twice models an ambiguous system include.
    pub fn add_system(&mut self, path: &str, text: &str) {
        self.system.push((String::from(path), String::from(text)));
    }
}

impl IncludeResolver for MemResolver {
    fn resolve_quoted(&self, source_dir: &str, path: &str) -> Option<String> {
        if !source_dir.is_empty() {
            let key = format!("{}/{}", source_dir, path);
            if let Some(text) = self.local.get(&key) {
                return Some(text.clone());
            }
        }
        self.local.get(path).cloned()
    }

    fn resolve_angled(&self, path: &str) -> Vec<(String, String)> {
        self.system
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(p, t)| (p.clone(), t.clone()))
            .collect()
    }
}

/// Filesystem-backed resolver with a list of system include directories.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    system_dirs: Vec<std::path::PathBuf>,
}

#[cfg(feature = "std")]
impl FsResolver {
    /// Build a resolver searching `system_dirs` in order for angled
    /// includes.
    #[must_use]
    pub fn new(system_dirs: Vec<std::path::PathBuf>) -> Self {
        Self { system_dirs }
    }
}

#[cfg(feature = "std")]
impl IncludeResolver for FsResolver {
    fn resolve_quoted(&self, source_dir: &str, path: &str) -> Option<String> {
        std::fs::read_to_string(std::path::Path::new(source_dir).join(path)).ok()
    }

    fn resolve_angled(&self, path: &str) -> Vec<(String, String)> {
        let mut hits = Vec::new();
        for dir in &self.system_dirs {
            let candidate = dir.join(path);
            if let Ok(text) = std::fs::read_to_string(&candidate) {
                hits.push((candidate.display().to_string(), text));
            }
        }
        hits
    }
}

/// One declared macro argument, optionally typed.
#[derive(Debug, Clone)]
struct MacroArg {
    name: String,
    ty: Option<TokenKind>,
}

/// A registered macro.  Identity is `(name, arity)`.
#[derive(Debug, Clone)]
struct MacroDef {
    name: String,
    args: Vec<MacroArg>,
    ret: Option<TokenKind>,
    body: Vec<Token>,
}

/// One entry of the macro invocation stack, pushed by `#invoke` and popped
/// by the matching `#macret`.
#[derive(Debug, Clone)]
struct Frame {
    output_symbol: Option<String>,
    ret: Option<TokenKind>,
}

/// The preprocessor.
///
/// Owns the token stream, macro table, symbol table, macro stack, and the
/// output buffer for the duration of one `process` pass.
pub struct Preprocessor {
    stream: TokenStream,
    cursor: usize,
    out: String,
    macros: BTreeMap<String, Vec<MacroDef>>,
    symbols: BTreeMap<String, Vec<Token>>,
    invoke_stack: Vec<Frame>,
    resolver: Box<dyn IncludeResolver>,
    source_dir: String,
    substitutions: usize,
}

impl Preprocessor {
    /// Tokenize `source` with includes disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Lex`] if the source does not tokenize.
    pub fn new(source: &str) -> Result<Self, SourceError> {
        Self::with_resolver(source, Box::new(NoIncludes), "")
    }

    /// Tokenize `source` with an include resolver; `source_dir` is the
    /// directory quoted includes resolve against.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Lex`] if the source does not tokenize.
    pub fn with_resolver(
        source: &str,
        resolver: Box<dyn IncludeResolver>,
        source_dir: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            stream: TokenStream::new(lexer::tokenize(source)?),
            cursor: 0,
            out: String::new(),
            macros: BTreeMap::new(),
            symbols: BTreeMap::new(),
            invoke_stack: Vec::new(),
            resolver,
            source_dir: String::from(source_dir),
            substitutions: 0,
        })
    }

    /// Bind `name` to a replacement before processing starts, as if the
    /// source opened with `#define name replacement`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Lex`] if the replacement does not tokenize.
    pub fn define_symbol(&mut self, name: &str, replacement: &str) -> Result<(), SourceError> {
        let tokens = lexer::tokenize(replacement)?;
        self.symbols.insert(String::from(name), tokens);
        Ok(())
    }

    /// Remove a symbol binding; absent names are ignored.
    pub fn undefine_symbol(&mut self, name: &str) {
        self.symbols.remove(name);
    }

    /// Run the rewrite pass and return the preprocessed text.
    ///
    /// # Errors
    ///
    /// Any directive parse error, unresolved include, macro identity
    /// violation, or resource limit aborts the pass.
    pub fn process(mut self) -> Result<String, SourceError> {
        let mut current_indent: usize = 0;
        let mut target_indent: usize = 0;

        while let Some(kind) = self.stream.kind(self.cursor) {
            // Collapse runs of blank lines.
            if kind == TokenKind::WsNewline && self.out.ends_with('\n') {
                self.cursor += 1;
                continue;
            }

            if kind == TokenKind::WsTab {
                current_indent += 1;
            } else if kind == TokenKind::WsNewline {
                current_indent = 0;
            }
            // `.scend` dedents its own line; `.scope` indents from the next.
            if kind == TokenKind::Scend {
                target_indent = target_indent.saturating_sub(1);
            }

            if current_indent < target_indent && kind == TokenKind::WsSpace {
                // Leading spaces that undershoot the target are dropped.
                self.cursor += 1;
                continue;
            }
            if current_indent < target_indent
                && kind != TokenKind::WsTab
                && kind != TokenKind::WsNewline
            {
                while current_indent < target_indent {
                    self.out.push('\t');
                    current_indent += 1;
                }
            }

            if kind.is_preprocessor_directive() {
                self.dispatch(kind)?;
            } else if self.is_bound_symbol() {
                self.substitute_symbol()?;
                continue;
            } else {
                self.out.push_str(&self.stream.get(self.cursor).unwrap().text);
                self.cursor += 1;
            }

            if kind == TokenKind::Scope {
                target_indent += 1;
            }
        }

        Ok(self.out)
    }

    // ── cursor helpers ──────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.stream.get(self.cursor)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.stream.kind(self.cursor)
    }

    fn peek_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_default()
    }

    /// Skip spaces and tabs.
    fn skip_spaces(&mut self) {
        while matches!(
            self.peek_kind(),
            Some(TokenKind::WsSpace | TokenKind::WsTab)
        ) {
            self.cursor += 1;
        }
    }

    /// Skip spaces, tabs, and newlines.
    fn skip_whitespace(&mut self) {
        while self.peek_kind().is_some_and(TokenKind::is_whitespace) {
            self.cursor += 1;
        }
    }

    fn consume(&mut self, directive: &str, expected: &str) -> Result<Token, SourceError> {
        match self.stream.get(self.cursor).cloned() {
            Some(tok) => {
                self.cursor += 1;
                Ok(tok)
            }
            None => Err(SourceError::UnexpectedEof {
                directive: String::from(directive),
                expected: String::from(expected),
            }),
        }
    }

    fn consume_expect(
        &mut self,
        kinds: &[TokenKind],
        directive: &str,
        expected: &str,
    ) -> Result<Token, SourceError> {
        match self.peek() {
            None => Err(SourceError::UnexpectedEof {
                directive: String::from(directive),
                expected: String::from(expected),
            }),
            Some(tok) if kinds.contains(&tok.kind) => {
                let tok = tok.clone();
                self.cursor += 1;
                Ok(tok)
            }
            Some(tok) => Err(SourceError::Directive {
                directive: String::from(directive),
                msg: format!("expected {}, found '{}'", expected, tok.text),
                span: tok.span,
            }),
        }
    }

    fn consume_variable_type(&mut self, directive: &str) -> Result<TokenKind, SourceError> {
        match self.peek() {
            None => Err(SourceError::UnexpectedEof {
                directive: String::from(directive),
                expected: String::from("variable type"),
            }),
            Some(tok) if tok.kind.is_variable_type() => {
                let kind = tok.kind;
                self.cursor += 1;
                Ok(kind)
            }
            Some(tok) => Err(SourceError::Directive {
                directive: String::from(directive),
                msg: format!("expected variable type, found '{}'", tok.text),
                span: tok.span,
            }),
        }
    }

    fn tokenize_fragment(&self, fragment: &str) -> Result<Vec<Token>, SourceError> {
        lexer::tokenize(fragment)
    }

    // ── symbol substitution ─────────────────────────────────────────────

    fn is_bound_symbol(&self) -> bool {
        match self.peek() {
            Some(tok) => tok.kind == TokenKind::Symbol && self.symbols.contains_key(&tok.text),
            None => false,
        }
    }

    /// Splice the replacement tokens in place of the symbol; the cursor
    /// stays put so the run is itself reprocessed.
    fn substitute_symbol(&mut self) -> Result<(), SourceError> {
        self.substitutions += 1;
        if self.substitutions > MAX_SUBSTITUTIONS {
            return Err(SourceError::ResourceLimit {
                resource: String::from("symbol substitutions"),
                limit: MAX_SUBSTITUTIONS,
            });
        }
        let name = self.stream.get(self.cursor).unwrap().text.clone();
        let run = self.symbols.get(&name).cloned().unwrap_or_default();
        self.stream.erase(self.cursor..self.cursor + 1);
        self.stream.insert(self.cursor, run);
        Ok(())
    }

    // ── directive dispatch ──────────────────────────────────────────────

    fn dispatch(&mut self, kind: TokenKind) -> Result<(), SourceError> {
        match kind {
            TokenKind::Include => self.handle_include(),
            TokenKind::Define => self.handle_define(),
            TokenKind::Undef => self.handle_undef(),
            TokenKind::Macro => self.handle_macro(),
            TokenKind::Macret => self.handle_macret(),
            TokenKind::Invoke => self.handle_invoke(),
            TokenKind::Macend => Err(SourceError::Directive {
                directive: String::from("#macend"),
                msg: String::from("unexpected #macend outside a macro definition"),
                span: self.peek_span(),
            }),
            // `#else` and `#endif` reached in the natural flow just close
            // out; the block structure was handled when the chain opened.
            TokenKind::Else | TokenKind::Endif => {
                self.cursor += 1;
                self.skip_spaces();
                Ok(())
            }
            _ => self.handle_conditional(kind),
        }
    }

    /// `#include "path"` or `#include <"path">` — tokenize the file and
    /// splice its tokens at the cursor so this pass continues into them.
    fn handle_include(&mut self) -> Result<(), SourceError> {
        self.cursor += 1;
        self.skip_spaces();

        let text = if self.peek_kind() == Some(TokenKind::StringLit) {
            let tok = self.consume("#include", "path")?;
            let path = trim_quotes(&tok.text).to_string();
            self.resolver
                .resolve_quoted(&self.source_dir, &path)
                .ok_or(SourceError::IncludeNotFound { path })?
        } else {
            self.consume_expect(&[TokenKind::Lt], "#include", "a quoted or angled path")?;
            let tok = self.consume_expect(&[TokenKind::StringLit], "#include", "a quoted path")?;
            self.consume_expect(&[TokenKind::Gt], "#include", "'>'")?;
            let path = trim_quotes(&tok.text).to_string();
            let mut hits = self.resolver.resolve_angled(&path);
            match hits.len() {
                0 => return Err(SourceError::IncludeNotFound { path }),
                1 => hits.pop().unwrap().1,
                candidates => {
                    return Err(SourceError::IncludeAmbiguous { path, candidates });
                }
            }
        };

        // Lexer errors inside the included content are fatal here, at the
        // include site.
        let tokens = lexer::tokenize(&text)?;
        self.stream.insert(self.cursor, tokens);
        Ok(())
    }

    /// `#define SYM tokens…` — capture the rest of the line as the
    /// replacement (possibly empty).
    fn handle_define(&mut self) -> Result<(), SourceError> {
        self.cursor += 1;
        self.skip_spaces();
        let name = self
            .consume_expect(&[TokenKind::Symbol], "#define", "a symbol")?
            .text;
        self.skip_spaces();

        let mut replacement = Vec::new();
        while let Some(kind) = self.peek_kind() {
            if kind == TokenKind::WsNewline {
                break;
            }
            replacement.push(self.consume("#define", "replacement tokens")?);
        }
        self.symbols.insert(name, replacement);
        Ok(())
    }

    /// `#undef SYM` — no error if the symbol was never defined.
    fn handle_undef(&mut self) -> Result<(), SourceError> {
        self.cursor += 1;
        self.skip_spaces();
        let name = self
            .consume_expect(&[TokenKind::Symbol], "#undef", "a symbol")?
            .text;
        self.skip_spaces();
        self.symbols.remove(&name);
        Ok(())
    }

    /// `#macro NAME(arg[:TYPE], …)[: RETTYPE] … #macend` — register the
    /// macro under its `(name, arity)` identity.
    fn handle_macro(&mut self) -> Result<(), SourceError> {
        self.cursor += 1;
        self.skip_spaces();
        let name = self
            .consume_expect(&[TokenKind::Symbol], "#macro", "a macro name")?
            .text;
        self.skip_whitespace();
        self.consume_expect(&[TokenKind::OpenParen], "#macro", "'('")?;

        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_kind() {
                None => {
                    return Err(SourceError::UnexpectedEof {
                        directive: String::from("#macro"),
                        expected: String::from("')'"),
                    });
                }
                Some(TokenKind::CloseParen) => break,
                _ => {}
            }
            let arg_name = self
                .consume_expect(&[TokenKind::Symbol], "#macro", "an argument name")?
                .text;
            self.skip_whitespace();
            let ty = if self.peek_kind() == Some(TokenKind::Colon) {
                self.cursor += 1;
                self.skip_whitespace();
                Some(self.consume_variable_type("#macro")?)
            } else {
                None
            };
            self.skip_whitespace();
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.cursor += 1;
            }
            args.push(MacroArg { name: arg_name, ty });
        }
        self.cursor += 1; // ')'

        self.skip_whitespace();
        let ret = if self.peek_kind() == Some(TokenKind::Colon) {
            self.cursor += 1;
            self.skip_whitespace();
            Some(self.consume_variable_type("#macro")?)
        } else {
            None
        };

        self.skip_whitespace();
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                None => {
                    return Err(SourceError::UnexpectedEof {
                        directive: String::from("#macro"),
                        expected: String::from("#macend"),
                    });
                }
                Some(TokenKind::Macend) => break,
                _ => body.push(self.consume("#macro", "#macend")?),
            }
        }
        self.cursor += 1; // #macend

        let arity = args.len();
        let defs = self.macros.entry(name.clone()).or_default();
        if defs.iter().any(|m| m.args.len() == arity) {
            return Err(SourceError::MacroRedefinition { name, arity });
        }
        defs.push(MacroDef {
            name,
            args,
            ret,
            body,
        });
        Ok(())
    }

    /// `#invoke NAME(expr, …) [OUTSYM]` — expand the macro at the cursor
    /// and push an invocation frame.
    fn handle_invoke(&mut self) -> Result<(), SourceError> {
        let span = self.peek_span();
        self.cursor += 1;
        self.skip_spaces();
        let name = self
            .consume_expect(&[TokenKind::Symbol], "#invoke", "a macro name")?
            .text;
        self.skip_whitespace();
        self.consume_expect(&[TokenKind::OpenParen], "#invoke", "'('")?;

        // Each argument is a token run terminated by a comma, the closing
        // parenthesis, or a newline.
        let mut args: Vec<Vec<Token>> = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_kind() {
                None => {
                    return Err(SourceError::UnexpectedEof {
                        directive: String::from("#invoke"),
                        expected: String::from("')'"),
                    });
                }
                Some(TokenKind::CloseParen) => break,
                _ => {}
            }
            let mut run = Vec::new();
            loop {
                match self.peek_kind() {
                    None => {
                        return Err(SourceError::UnexpectedEof {
                            directive: String::from("#invoke"),
                            expected: String::from("')'"),
                        });
                    }
                    Some(
                        TokenKind::Comma | TokenKind::CloseParen | TokenKind::WsNewline,
                    ) => break,
                    _ => run.push(self.consume("#invoke", "')'")?),
                }
            }
            args.push(run);
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.cursor += 1;
            }
        }
        self.cursor += 1; // ')'
        self.skip_spaces();

        let output_symbol = if self.peek_kind() == Some(TokenKind::Symbol) {
            Some(self.consume("#invoke", "output symbol")?.text)
        } else {
            None
        };

        let arity = args.len();
        let mac = {
            let candidates: Vec<&MacroDef> = self
                .macros
                .get(&name)
                .map(|defs| defs.iter().filter(|m| m.args.len() == arity).collect())
                .unwrap_or_default();
            match candidates.len() {
                0 => return Err(SourceError::MacroNotFound { name, arity }),
                1 => candidates[0].clone(),
                _ => return Err(SourceError::MacroAmbiguous { name, arity }),
            }
        };

        // Expansion: an output equate when requested, a fresh scope binding
        // each argument, the captured body, and the closing scend.
        let mut expansion: Vec<Token> = Vec::new();
        if let Some(out) = &output_symbol {
            let ret = mac.ret.ok_or_else(|| SourceError::Directive {
                directive: String::from("#invoke"),
                msg: format!("macro '{}' does not return a value", mac.name),
                span,
            })?;
            expansion.extend(self.tokenize_fragment(&format!(
                ".equ {} 0 : {}\n",
                out,
                variable_type_name(ret)
            ))?);
        }
        expansion.push(Token::synthetic(TokenKind::Scope, ".scope"));
        expansion.push(Token::synthetic(TokenKind::WsNewline, "\n"));
        for (arg, values) in mac.args.iter().zip(&args) {
            expansion.extend(self.tokenize_fragment(&format!(".equ {} ", arg.name))?);
            expansion.extend(values.iter().cloned());
            match arg.ty {
                Some(ty) => expansion.extend(
                    self.tokenize_fragment(&format!(" : {}\n", variable_type_name(ty)))?,
                ),
                None => expansion.push(Token::synthetic(TokenKind::WsNewline, "\n")),
            }
        }
        expansion.extend(mac.body.iter().cloned());
        expansion.push(Token::synthetic(TokenKind::WsNewline, "\n"));
        expansion.push(Token::synthetic(TokenKind::Scend, ".scend"));

        if self.invoke_stack.len() >= MAX_INVOKE_DEPTH {
            return Err(SourceError::ResourceLimit {
                resource: String::from("macro invocation depth"),
                limit: MAX_INVOKE_DEPTH,
            });
        }
        self.invoke_stack.push(Frame {
            output_symbol,
            ret: mac.ret,
        });
        self.stream.insert(self.cursor, expansion);
        Ok(())
    }

    /// `#macret [expr]` — capture the return value, fast-forward past the
    /// rest of the body until the invocation scope closes, splice the
    /// output equate, and pop the frame.
    fn handle_macret(&mut self) -> Result<(), SourceError> {
        let span = self.peek_span();
        self.cursor += 1;
        self.skip_spaces();

        let frame = self
            .invoke_stack
            .last()
            .cloned()
            .ok_or(SourceError::MacretOutsideMacro { span })?;

        let mut value = Vec::new();
        if frame.ret.is_some() {
            while let Some(kind) = self.peek_kind() {
                if kind == TokenKind::WsNewline {
                    break;
                }
                value.push(self.consume("#macret", "a return expression")?);
            }
        }

        // Skip to the `.scend` that closes the invocation's scope, counting
        // nested scope levels on the way.
        let mut depth = 1i32;
        let mut closed = false;
        while let Some(kind) = self.peek_kind() {
            if kind == TokenKind::Scope {
                depth += 1;
            } else if kind == TokenKind::Scend {
                depth -= 1;
            }
            self.cursor += 1;
            if depth == 0 {
                closed = true;
                break;
            }
        }
        if !closed {
            return Err(SourceError::Directive {
                directive: String::from("#macret"),
                msg: String::from("unclosed scope in macro body"),
                span,
            });
        }

        if let (Some(ret), Some(out)) = (frame.ret, &frame.output_symbol) {
            let mut run = self.tokenize_fragment(&format!(".equ {} ", out))?;
            run.extend(value);
            run.extend(
                self.tokenize_fragment(&format!(" : {}\n", variable_type_name(ret)))?,
            );
            self.stream.insert(self.cursor, run);
        }

        self.invoke_stack.pop();
        Ok(())
    }

    /// Any of the `#if…`/`#else…` predicates: evaluate and enter, skip, or
    /// excise the block structure.
    fn handle_conditional(&mut self, kind: TokenKind) -> Result<(), SourceError> {
        let directive = conditional_name(kind);
        let opening = self.peek_span();
        self.cursor += 1;
        self.skip_spaces();
        let symbol = self
            .consume_expect(&[TokenKind::Symbol], directive, "a symbol")?
            .text;
        self.skip_spaces();

        let condition = match kind {
            TokenKind::Ifdef | TokenKind::Elsedef => self.symbols.contains_key(&symbol),
            TokenKind::Ifndef | TokenKind::Elsendef => !self.symbols.contains_key(&symbol),
            _ => {
                // Comparison predicates stringify the symbol's replacement
                // and compare lexicographically against the literal.
                let value = self
                    .consume_expect(&[TokenKind::StringLit], directive, "a string literal")?;
                self.skip_spaces();
                let symbol_value = self.symbol_string(&symbol);
                let literal = trim_quotes(&value.text);
                match kind {
                    TokenKind::Ifequ | TokenKind::Elseequ => symbol_value == literal,
                    TokenKind::Ifnequ | TokenKind::Elsenequ => symbol_value != literal,
                    TokenKind::Ifless | TokenKind::Elseless => symbol_value.as_str() < literal,
                    TokenKind::Ifmore | TokenKind::Elsemore => symbol_value.as_str() > literal,
                    _ => unreachable!("non-conditional kind dispatched as conditional"),
                }
            }
        };

        self.conditional_block(condition, opening)
    }

    /// Scan the block belonging to an evaluated predicate.  If the
    /// condition holds, the remaining branches (first sibling through
    /// `#endif`) are excised and processing continues into the kept body;
    /// otherwise the cursor jumps to the next sibling (or `#endif`) for
    /// re-evaluation.  Only same-level siblings terminate the branch.
    fn conditional_block(
        &mut self,
        condition: bool,
        opening: Span,
    ) -> Result<(), SourceError> {
        let mut depth = 0usize;
        let mut scan = self.cursor;
        let mut sibling: Option<usize> = None;
        let mut endif: Option<usize> = None;

        while let Some(kind) = self.stream.kind(scan) {
            if depth == 0 && kind == TokenKind::Endif {
                endif = Some(scan);
                break;
            }
            if depth == 0 && kind.is_else_directive() {
                if sibling.is_none() {
                    sibling = Some(scan);
                }
                if !condition {
                    break;
                }
            }
            if kind.is_if_directive() {
                depth += 1;
            } else if kind == TokenKind::Endif {
                depth -= 1;
            }
            scan += 1;
        }

        if condition {
            let end = endif.ok_or(SourceError::UnclosedConditional { span: opening })?;
            if let Some(start) = sibling {
                self.stream.erase(start..end);
            }
        } else if let Some(start) = sibling {
            self.cursor = start;
        } else if let Some(end) = endif {
            self.cursor = end;
        } else {
            return Err(SourceError::UnclosedConditional { span: opening });
        }
        Ok(())
    }

    /// The symbol's replacement stringified by lexeme concatenation, or
    /// empty when undefined.
    fn symbol_string(&self, name: &str) -> String {
        self.symbols
            .get(name)
            .map(|tokens| tokens.iter().map(|t| t.text.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Preprocess a source string with includes disabled.
///
/// # Errors
///
/// See [`Preprocessor::process`].
///
/// # Examples
///
/// ```
/// let out = corten::preprocess("#define X 42\nX\n").unwrap();
/// assert!(out.contains("42"));
/// assert!(!out.contains('X'));
/// ```
pub fn preprocess(source: &str) -> Result<String, SourceError> {
    Preprocessor::new(source)?.process()
}

/// Preprocess `input` and write the artifact next to it (or to `output`),
/// returning the path written.
///
/// # Errors
///
/// Propagates [`SourceError::Io`] for filesystem failures on top of the
/// usual preprocessing errors.
#[cfg(feature = "std")]
pub fn preprocess_file(
    input: &std::path::Path,
    output: Option<&std::path::Path>,
    system_dirs: Vec<std::path::PathBuf>,
) -> Result<std::path::PathBuf, SourceError> {
    let text = std::fs::read_to_string(input).map_err(|e| SourceError::Io {
        path: input.display().to_string(),
        msg: e.to_string(),
    })?;
    let dir = input
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let out = Preprocessor::with_resolver(&text, Box::new(FsResolver::new(system_dirs)), &dir)?
        .process()?;
    let out_path = output
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(PROCESSED_EXTENSION));
    std::fs::write(&out_path, out).map_err(|e| SourceError::Io {
        path: out_path.display().to_string(),
        msg: e.to_string(),
    })?;
    Ok(out_path)
}

/// Strip the surrounding quotes from a raw string-literal lexeme.
fn trim_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Diagnostic name for a conditional directive kind.
fn conditional_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Ifdef => "#ifdef",
        TokenKind::Ifndef => "#ifndef",
        TokenKind::Ifequ => "#ifequ",
        TokenKind::Ifnequ => "#ifnequ",
        TokenKind::Ifless => "#ifless",
        TokenKind::Ifmore => "#ifmore",
        TokenKind::Elsedef => "#elsedef",
        TokenKind::Elsendef => "#elsendef",
        TokenKind::Elseequ => "#elseequ",
        TokenKind::Elsenequ => "#elsenequ",
        TokenKind::Elseless => "#elseless",
        TokenKind::Elsemore => "#elsemore",
        _ => "#if",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn run(source: &str) -> String {
        preprocess(source).unwrap()
    }

    // === plain text ===

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(run("add x0, x1, x2\n"), "add x0, x1, x2\n");
    }

    #[test]
    fn comments_are_preserved() {
        let out = run("x ; trailing\n;* block *;\n");
        assert!(out.contains("; trailing"));
        assert!(out.contains(";* block *;"));
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(run("a\n\n\n\nb\n"), "a\nb\n");
    }

    // === #define / #undef ===

    #[test]
    fn define_substitutes() {
        let out = run("#define X 42\nX\n");
        assert!(out.contains("42"));
        assert!(!out.contains('X'));
    }

    #[test]
    fn define_replacement_is_rest_of_line() {
        let out = run("#define PAIR 1, 2\nPAIR\n");
        assert!(out.contains("1, 2"));
    }

    #[test]
    fn define_empty_replacement_erases() {
        assert_eq!(run("#define GONE\nGONE x\n"), "\n x\n");
    }

    #[test]
    fn undef_removes_binding() {
        let out = run("#define X 1\n#undef X\nX\n");
        assert!(out.contains('X'));
    }

    #[test]
    fn undef_of_unknown_symbol_is_fine() {
        assert!(preprocess("#undef NEVER\n").is_ok());
    }

    #[test]
    fn replacement_is_reprocessed() {
        let out = run("#define A B\n#define B 7\nA\n");
        assert!(out.contains('7'));
    }

    #[test]
    fn self_referential_define_hits_limit() {
        let err = preprocess("#define X X\nX\n").unwrap_err();
        assert!(matches!(err, SourceError::ResourceLimit { .. }));
    }

    #[test]
    fn predefined_symbol() {
        let mut pp = Preprocessor::new("MODE\n").unwrap();
        pp.define_symbol("MODE", "fast").unwrap();
        assert!(pp.process().unwrap().contains("fast"));
    }

    // === conditionals ===

    #[test]
    fn ifdef_keeps_and_excises() {
        let out = run("#define A 1\n#ifdef A\nKEEP\n#else\nDROP\n#endif\n");
        assert!(out.contains("KEEP"));
        assert!(!out.contains("DROP"));
    }

    #[test]
    fn ifndef_inverts() {
        let out = run("#define A 1\n#ifndef A\nKEEP\n#else\nDROP\n#endif\n");
        assert!(!out.contains("KEEP"));
        assert!(out.contains("DROP"));
    }

    #[test]
    fn ifdef_without_else_and_false() {
        let out = run("#ifdef NOPE\nDROP\n#endif\nafter\n");
        assert!(!out.contains("DROP"));
        assert!(out.contains("after"));
    }

    #[test]
    fn nested_same_name_block_skips_as_a_unit() {
        let src = "#ifndef A\n#ifdef A\nX\n#endif\nY\n#endif\nZ\n";
        let mut pp = Preprocessor::new(src).unwrap();
        pp.define_symbol("A", "1").unwrap();
        let out = pp.process().unwrap();
        assert!(!out.contains('X'));
        assert!(!out.contains('Y'));
        assert!(out.contains('Z'));
    }

    #[test]
    fn elsedef_chain() {
        let src = "#ifdef A\nONE\n#elsedef B\nTWO\n#else\nTHREE\n#endif\n";
        let mut pp = Preprocessor::new(src).unwrap();
        pp.define_symbol("B", "1").unwrap();
        let out = pp.process().unwrap();
        assert!(!out.contains("ONE"));
        assert!(out.contains("TWO"));
        assert!(!out.contains("THREE"));
    }

    #[test]
    fn ifequ_compares_lexically() {
        let out = run("#define V abc\n#ifequ V \"abc\"\nYES\n#else\nNO\n#endif\n");
        assert!(out.contains("YES"));
        assert!(!out.contains("NO"));
    }

    #[test]
    fn ifnequ() {
        let out = run("#define V abc\n#ifnequ V \"xyz\"\nYES\n#endif\n");
        assert!(out.contains("YES"));
    }

    #[test]
    fn ifless_and_ifmore() {
        let out = run("#define V bbb\n#ifless V \"ccc\"\nLESS\n#endif\n#ifmore V \"aaa\"\nMORE\n#endif\n");
        assert!(out.contains("LESS"));
        assert!(out.contains("MORE"));
    }

    #[test]
    fn ifequ_of_undefined_symbol_compares_empty() {
        let out = run("#ifequ V \"\"\nEMPTY\n#endif\n");
        assert!(out.contains("EMPTY"));
    }

    #[test]
    fn unclosed_conditional_is_fatal() {
        let err = preprocess("#ifdef A\nX\n").unwrap_err();
        assert!(matches!(err, SourceError::UnclosedConditional { .. }));
    }

    // === macros ===

    const ADD_MACRO: &str = "#macro add(a:BYTE,b:BYTE): BYTE\n.scope\n#macret a+b\n#macend\n";

    #[test]
    fn invoke_expands_per_contract() {
        let src = alloc::format!("{}#invoke add(3,4) y\n", ADD_MACRO);
        let out = preprocess(&src).unwrap();
        assert!(out.contains(".equ y 0 : BYTE"), "out: {out:?}");
        assert!(out.contains(".scope"));
        assert!(out.contains(".equ a 3 : BYTE"));
        assert!(out.contains(".equ b 4 : BYTE"));
        assert!(out.contains(".equ y a+b : BYTE"));
    }

    #[test]
    fn invoke_without_output_symbol_discards_return() {
        let src = alloc::format!("{}#invoke add(3,4)\n", ADD_MACRO);
        let out = preprocess(&src).unwrap();
        assert!(!out.contains(".equ y"));
        assert!(out.contains(".equ a 3 : BYTE"));
    }

    #[test]
    fn macro_without_return_type() {
        let src = "#macro emit(v)\n.db v\n#macend\n#invoke emit(9)\n";
        let out = preprocess(src).unwrap();
        assert!(out.contains(".equ v 9"));
        assert!(out.contains(".db v"));
    }

    #[test]
    fn macro_redefinition_is_fatal() {
        let src = "#macro m(a)\n#macend\n#macro m(b)\n#macend\n";
        let err = preprocess(src).unwrap_err();
        assert!(matches!(
            err,
            SourceError::MacroRedefinition { arity: 1, .. }
        ));
    }

    #[test]
    fn same_name_different_arity_coexist() {
        let src = "#macro m(a)\n#macend\n#macro m(a, b)\n#macend\n#invoke m(1)\n#invoke m(1, 2)\n";
        assert!(preprocess(src).is_ok());
    }

    #[test]
    fn invoke_unknown_macro_is_fatal() {
        let err = preprocess("#invoke nope(1)\n").unwrap_err();
        assert!(matches!(err, SourceError::MacroNotFound { arity: 1, .. }));
    }

    #[test]
    fn invoke_wrong_arity_is_fatal() {
        let src = "#macro m(a)\n#macend\n#invoke m(1, 2)\n";
        let err = preprocess(src).unwrap_err();
        assert!(matches!(err, SourceError::MacroNotFound { arity: 2, .. }));
    }

    #[test]
    fn macret_outside_macro_is_fatal() {
        let err = preprocess("#macret 1\n").unwrap_err();
        assert!(matches!(err, SourceError::MacretOutsideMacro { .. }));
    }

    #[test]
    fn output_symbol_without_return_type_is_fatal() {
        let src = "#macro m(a)\n#macend\n#invoke m(1) out\n";
        let err = preprocess(src).unwrap_err();
        assert!(matches!(err, SourceError::Directive { .. }));
    }

    #[test]
    fn stray_macend_is_fatal() {
        let err = preprocess("#macend\n").unwrap_err();
        assert!(matches!(err, SourceError::Directive { .. }));
    }

    #[test]
    fn recursive_invoke_hits_depth_limit() {
        let src = "#macro loopy(a)\n#invoke loopy(a)\n#macend\n#invoke loopy(1)\n";
        let err = preprocess(src).unwrap_err();
        assert!(matches!(err, SourceError::ResourceLimit { .. }));
    }

    // === includes ===

    #[test]
    fn quoted_include_splices_tokens() {
        let mut resolver = MemResolver::new();
        resolver.add_local("defs.csm", "FOO\n");
        let pp = Preprocessor::with_resolver(
            "#include \"defs.csm\"\nBAR\n",
            Box::new(resolver),
            "",
        )
        .unwrap();
        let out = pp.process().unwrap();
        assert!(out.contains("FOO"));
        assert!(out.contains("BAR"));
    }

    #[test]
    fn included_directives_are_processed() {
        let mut resolver = MemResolver::new();
        resolver.add_local("defs.csm", "#define FROM_INCLUDE 5\n");
        let pp = Preprocessor::with_resolver(
            "#include \"defs.csm\"\nFROM_INCLUDE\n",
            Box::new(resolver),
            "",
        )
        .unwrap();
        assert!(pp.process().unwrap().contains('5'));
    }

    #[test]
    fn missing_include_is_fatal() {
        let err = preprocess("#include \"nope.csm\"\n").unwrap_err();
        assert!(matches!(err, SourceError::IncludeNotFound { .. }));
    }

    #[test]
    fn angled_include_requires_exactly_one_hit() {
        let mut resolver = MemResolver::new();
        resolver.add_system("sys.csm", "ONE\n");
        let pp = Preprocessor::with_resolver(
            "#include <\"sys.csm\">\n",
            Box::new(resolver.clone()),
            "",
        )
        .unwrap();
        assert!(pp.process().unwrap().contains("ONE"));

        resolver.add_system("sys.csm", "TWO\n");
        let pp = Preprocessor::with_resolver("#include <\"sys.csm\">\n", Box::new(resolver), "")
            .unwrap();
        let err = pp.process().unwrap_err();
        assert!(matches!(
            err,
            SourceError::IncludeAmbiguous { candidates: 2, .. }
        ));
    }

    // === indent normalization ===

    #[test]
    fn scope_indents_following_lines() {
        let out = run(".scope\nx\n.scend\n");
        assert_eq!(out, ".scope\n\tx\n.scend\n");
    }

    #[test]
    fn undershooting_spaces_are_dropped() {
        let out = run(".scope\n  x\n.scend\n");
        assert_eq!(out, ".scope\n\tx\n.scend\n");
    }

    #[test]
    fn nested_scopes_indent_deeper() {
        let out = run(".scope\n.scope\nx\n.scend\n.scend\n");
        assert_eq!(out, ".scope\n\t.scope\n\t\tx\n\t.scend\n.scend\n");
    }

    #[test]
    fn existing_tabs_are_kept() {
        let out = run(".scope\n\tx\n.scend\n");
        assert_eq!(out, ".scope\n\tx\n.scend\n");
    }

    // === errors carry context ===

    #[test]
    fn directive_error_names_the_directive() {
        let err = preprocess("#define 1\n").unwrap_err();
        match err {
            SourceError::Directive { directive, .. } => assert_eq!(directive, "#define"),
            other => panic!("expected Directive error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_macro_is_eof() {
        let err = preprocess("#macro m(a)\nbody\n").unwrap_err();
        assert!(matches!(err, SourceError::UnexpectedEof { .. }));
    }

    #[test]
    fn conditional_operand_must_be_string() {
        let err = preprocess("#ifequ V 42\nX\n#endif\n").unwrap_err();
        assert!(matches!(err, SourceError::Directive { .. }));
    }

    #[test]
    fn non_directive_kinds_are_not_dispatched() {
        // `.equ` and friends pass straight through to the output.
        let out = run(".equ K 1 : BYTE\n");
        assert!(out.contains(".equ K 1 : BYTE"));
    }

    #[test]
    fn invoke_args_keep_expression_tokens() {
        let src = "#macro m(a)\n#macend\n#invoke m(1+2*3)\n";
        let out = preprocess(src).unwrap();
        assert!(out.contains(".equ a 1+2*3"));
    }

    #[test]
    fn conditional_name_covers_all_kinds() {
        let kinds = vec![
            TokenKind::Ifdef,
            TokenKind::Ifnequ,
            TokenKind::Elseless,
            TokenKind::Elsemore,
        ];
        for k in kinds {
            assert!(conditional_name(k).starts_with('#'));
        }
    }
}
