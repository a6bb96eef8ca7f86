//! Error types and source span tracking for diagnostics.
//!
//! Two error families live here: [`SourceError`] for everything the text
//! pipeline (lexer + preprocessor) can reject, and [`Fault`] for everything
//! the emulator can trip over at run time.  Both are plain data — callers
//! decide whether a fault halts the machine or is reported and retried.

use alloc::string::String;
use core::fmt;

/// Where a token or construct sits in the source text.
///
/// Tokens carry the position the lexer scanned them at; runs synthesized
/// by the preprocessor carry [`Span::dummy`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Line number, counting from 1.
    pub line: u32,
    /// Column within the line, counting from 1 (in bytes).
    pub col: u32,
    /// Distance in bytes from the start of the input.
    pub offset: usize,
    /// How many bytes the construct covers.
    pub len: usize,
}

impl Span {
    /// Assemble a span from its parts.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }

    /// The zeroed span attached to preprocessor-synthesized tokens.
    #[must_use]
    pub fn dummy() -> Self {
        Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// An error raised while lexing or preprocessing source text.
///
/// Every variant carries enough context to print a one-line human-readable
/// diagnostic; the preprocessor aborts on the first error it hits.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceError {
    /// No lexer rule matched at the given position.
    Lex {
        /// Description of the unmatched input.
        msg: String,
        /// Location of the first unmatched byte.
        span: Span,
    },

    /// A preprocessor directive was malformed.
    Directive {
        /// The directive being parsed (e.g. `#macro`).
        directive: String,
        /// What went wrong.
        msg: String,
        /// Location of the offending token.
        span: Span,
    },

    /// The token stream ended in the middle of a directive.
    UnexpectedEof {
        /// The directive being parsed.
        directive: String,
        /// What the parser was looking for.
        expected: String,
    },

    /// A macro with the same `(name, arity)` identity already exists.
    MacroRedefinition {
        /// Macro name.
        name: String,
        /// Number of declared arguments.
        arity: usize,
    },

    /// No macro matches the invoked `(name, arity)`.
    MacroNotFound {
        /// Invoked name.
        name: String,
        /// Number of supplied arguments.
        arity: usize,
    },

    /// More than one macro matches the invoked `(name, arity)`.
    MacroAmbiguous {
        /// Invoked name.
        name: String,
        /// Number of supplied arguments.
        arity: usize,
    },

    /// `#macret` appeared outside any macro invocation.
    MacretOutsideMacro {
        /// Location of the `#macret` token.
        span: Span,
    },

    /// A quoted or angled include did not resolve to a file.
    IncludeNotFound {
        /// The requested path.
        path: String,
    },

    /// An angled include matched more than one system include directory.
    IncludeAmbiguous {
        /// The requested path.
        path: String,
        /// How many directories matched.
        candidates: usize,
    },

    /// A conditional block was never closed by `#endif`.
    UnclosedConditional {
        /// Location of the opening directive.
        span: Span,
    },

    /// A configurable resource limit was exceeded (runaway expansion guard).
    ResourceLimit {
        /// Human-readable name of the resource.
        resource: String,
        /// The configured limit that was exceeded.
        limit: usize,
    },

    /// A filesystem operation failed (std builds only raise this).
    Io {
        /// The path involved.
        path: String,
        /// The underlying error message.
        msg: String,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Lex { msg, span } => write!(f, "{}: {}", span, msg),
            SourceError::Directive {
                directive,
                msg,
                span,
            } => {
                write!(f, "{}: {}: {}", span, directive, msg)
            }
            SourceError::UnexpectedEof {
                directive,
                expected,
            } => {
                write!(
                    f,
                    "unexpected end of input in {}: expected {}",
                    directive, expected
                )
            }
            SourceError::MacroRedefinition { name, arity } => {
                write!(f, "macro '{}' with {} argument(s) already defined", name, arity)
            }
            SourceError::MacroNotFound { name, arity } => {
                write!(f, "no macro '{}' taking {} argument(s)", name, arity)
            }
            SourceError::MacroAmbiguous { name, arity } => {
                write!(
                    f,
                    "multiple macros named '{}' take {} argument(s)",
                    name, arity
                )
            }
            SourceError::MacretOutsideMacro { span } => {
                write!(f, "{}: #macret outside of a macro invocation", span)
            }
            SourceError::IncludeNotFound { path } => {
                write!(f, "include file not found: {}", path)
            }
            SourceError::IncludeAmbiguous { path, candidates } => {
                write!(
                    f,
                    "include '{}' matches {} system include directories",
                    path, candidates
                )
            }
            SourceError::UnclosedConditional { span } => {
                write!(f, "{}: conditional block is missing #endif", span)
            }
            SourceError::ResourceLimit { resource, limit } => {
                write!(f, "resource limit exceeded: {} (limit: {})", resource, limit)
            }
            SourceError::Io { path, msg } => {
                write!(f, "io error on {}: {}", path, msg)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SourceError {}

/// A fault raised by the emulator.
///
/// `run` surfaces the first fault to the driver, which decides whether to
/// halt or continue; assertion failures always halt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fault {
    /// No memory region contains the full `[addr, addr + width)` range.
    OutOfBounds {
        /// The faulting address.
        addr: u32,
    },

    /// A write landed in a read-only region.
    AccessDenied {
        /// The faulting address.
        addr: u32,
        /// The value that was being written.
        value: u32,
        /// The write width in bytes.
        width: u8,
    },

    /// The fetched word does not decode to a known opcode.
    InvalidOpcode {
        /// The undecodable instruction word.
        word: u32,
        /// The address it was fetched from.
        pc: u32,
    },

    /// A software interrupt carried an unknown request id.
    InvalidSyscall {
        /// The request id read from the `NR` register.
        id: u32,
    },

    /// A software interrupt named a register index outside the file.
    InvalidRegister {
        /// The out-of-range register id.
        id: u32,
    },

    /// An `emu_assert*` service failed; execution halts.
    AssertionFailed {
        /// Human-readable description of the failed assertion.
        msg: String,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::OutOfBounds { addr } => {
                write!(f, "memory access out of bounds at {:#010x}", addr)
            }
            Fault::AccessDenied { addr, value, width } => {
                write!(
                    f,
                    "write of {:#x} ({} byte(s)) denied at read-only {:#010x}",
                    value, width, addr
                )
            }
            Fault::InvalidOpcode { word, pc } => {
                write!(f, "invalid opcode {:#010x} at {:#010x}", word, pc)
            }
            Fault::InvalidSyscall { id } => write!(f, "invalid syscall number: {}", id),
            Fault::InvalidRegister { id } => write!(f, "invalid register id: {}", id),
            Fault::AssertionFailed { msg } => write!(f, "assertion failed: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Fault {}
