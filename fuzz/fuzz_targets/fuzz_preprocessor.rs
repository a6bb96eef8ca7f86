#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Preprocessing arbitrary input must terminate (the substitution and
    // invocation limits bound runaway expansion) and never panic.
    let _ = corten::preprocess(data);

    // A resolver-backed run must behave the same way.
    let mut resolver = corten::MemResolver::new();
    resolver.add_local("a.csm", "FOO\n");
    resolver.add_system("b.csm", "BAR\n");
    if let Ok(pp) = corten::Preprocessor::with_resolver(data, Box::new(resolver), "") {
        let _ = pp.process();
    }
});
