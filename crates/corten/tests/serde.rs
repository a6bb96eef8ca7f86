//! Serde round-trip tests for the public data types.

#![cfg(feature = "serde")]

use corten::isa::{Cond, Opcode, ShiftKind};
use corten::{Fault, SourceError, Span, TokenKind};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + core::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

#[test]
fn serde_span() {
    round_trip(&Span::new(3, 7, 42, 5));
    round_trip(&Span::default());
}

#[test]
fn serde_token_kinds() {
    for kind in [
        TokenKind::WsNewline,
        TokenKind::Include,
        TokenKind::Macret,
        TokenKind::Elsendef,
        TokenKind::TypeDword,
        TokenKind::DdwBe,
        TokenKind::BinNumber,
        TokenKind::StringLit,
        TokenKind::Symbol,
        TokenKind::Shl,
        TokenKind::AndAnd,
    ] {
        round_trip(&kind);
    }
}

#[test]
fn serde_source_errors() {
    round_trip(&SourceError::Lex {
        msg: "unexpected character '?'".into(),
        span: Span::new(1, 2, 1, 1),
    });
    round_trip(&SourceError::MacroRedefinition {
        name: "add".into(),
        arity: 2,
    });
    round_trip(&SourceError::IncludeAmbiguous {
        path: "defs.csm".into(),
        candidates: 3,
    });
    round_trip(&SourceError::ResourceLimit {
        resource: "symbol substitutions".into(),
        limit: 100_000,
    });
}

#[test]
fn serde_faults() {
    round_trip(&Fault::OutOfBounds { addr: 0xdead });
    round_trip(&Fault::AccessDenied {
        addr: 0x4000,
        value: 0xAB,
        width: 2,
    });
    round_trip(&Fault::InvalidOpcode {
        word: 0xFC00_0000,
        pc: 0x100,
    });
    round_trip(&Fault::AssertionFailed {
        msg: "expected x0 in [1, 2], got 9".into(),
    });
}

#[test]
fn serde_isa_enums() {
    for op in [Opcode::Hlt, Opcode::Rsc, Opcode::Smull, Opcode::Swi] {
        round_trip(&op);
    }
    for cond in [Cond::Eq, Cond::Hi, Cond::Al, Cond::Nv] {
        round_trip(&cond);
    }
    for shift in [
        ShiftKind::Lsl,
        ShiftKind::Lsr,
        ShiftKind::Asr,
        ShiftKind::Ror,
    ] {
        round_trip(&shift);
    }
}
