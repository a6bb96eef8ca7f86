//! # corten — Corten-32 toolchain and emulator
//!
//! `corten` is a pure Rust toolchain core for a 32-bit RISC-style
//! architecture: a byte-faithful lexer, a token-rewriting preprocessor
//! (includes, typed macros with return values, conditional blocks, scope
//! indentation), and a cycle-stepped emulator with a memory-mapped system
//! bus, conditional execution, a barrel shifter, and a software-interrupt
//! facility for debug printing and assertions.
//!
//! ## Quick start
//!
//! Preprocess a source string:
//!
//! ```rust
//! let out = corten::preprocess("#define X 42\nX\n").unwrap();
//! assert!(out.contains("42"));
//! ```
//!
//! Encode a word by hand and run it:
//!
//! ```rust
//! use corten::isa::{format_o, Cond, Opcode, Operand2};
//! use corten::Emulator32;
//!
//! let mut cpu = Emulator32::with_default_memory();
//! let word = format_o(Opcode::Add, Cond::Al, false, 0, 1, Operand2::Imm(2));
//! cpu.load_image(&word.to_be_bytes(), 0).unwrap();
//! cpu.write_reg(1, 40);
//! cpu.run(1).unwrap();
//! assert_eq!(cpu.read_reg(0), 42);
//! ```
//!
//! ## Features
//!
//! - **Byte-faithful lexing** — whitespace and comments are tokens, so
//!   the preprocessed artifact reproduces untouched input exactly.
//! - **In-place token rewriting** — directives splice and erase runs in a
//!   single mutable stream; macro return values are stitched back in via
//!   the invocation stack.
//! - **Shared ISA constants** — encoder helpers and the decoder read the
//!   same bitfield definitions in [`isa`].
//! - **`no_std` + `alloc`** — filesystem include resolution sits behind
//!   the default-on `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// An emulator core performs many deliberate narrowing casts between
// integer widths and packs dense hex literals; these lints are expected
// and acceptable in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::too_many_lines
)]

extern crate alloc;

/// Processor core: register file, PSTATE, fetch/decode/execute loop.
pub mod cpu;
/// Error types and source-span diagnostics.
pub mod error;
/// Instruction-set constants and word formats shared by encoder and
/// decoder.
pub mod isa;
/// Byte-faithful lexer producing typed tokens.
pub mod lexer;
/// Memory regions and the address-decoded system bus.
pub mod mem;
/// Token-rewriting preprocessor: directives, macros, conditionals.
pub mod preprocessor;
/// Mutable token stream with splice operations.
pub mod stream;
/// Software-interrupt services (debug print, assertions, host I/O).
pub mod swi;

// Re-exports
pub use cpu::Emulator32;
pub use error::{Fault, SourceError, Span};
pub use lexer::{tokenize, Token, TokenKind};
pub use mem::{MemoryRegion, SystemBus};
#[cfg(feature = "std")]
pub use preprocessor::{preprocess_file, FsResolver};
pub use preprocessor::{
    preprocess, IncludeResolver, MemResolver, NoIncludes, Preprocessor, PROCESSED_EXTENSION,
    SOURCE_EXTENSION,
};
pub use stream::TokenStream;
