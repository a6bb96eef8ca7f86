//! Preprocessor example — macros, conditionals, and symbol substitution.
//!
//! Run with: `cargo run --example preprocess`

use corten::Preprocessor;

fn main() {
    let source = r#"#define DEBUG 1
#define BASE $4000

#macro checked_store(val:WORD): WORD
.scope
.dw val
#macret val
#macend

.org BASE
#ifdef DEBUG
#invoke checked_store(99) stored
#else
#invoke checked_store(0) stored
#endif
.stop
"#;

    let pp = Preprocessor::new(source).expect("source should tokenize");
    match pp.process() {
        Ok(out) => {
            println!("=== preprocessed artifact ===");
            print!("{out}");
        }
        Err(err) => eprintln!("preprocessing failed: {err}"),
    }
}
