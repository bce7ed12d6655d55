//! Library surface for the `ammc` binary: wires a root module AST and its
//! `@std/...` dependencies to `amm_lower::DriverContext::run` and renders
//! the result as AMM text, or a `Diagnostic` report on failure (spec.md §6,
//! §7).
//!
//! The surface-syntax parser, the standard-library source tree on disk,
//! and the execution backend are all external collaborators out of scope
//! for the lowering pass itself (spec.md §1) — this crate's job is strictly
//! the glue between a pre-parsed module table and the driver, plus the
//! concrete opcode-table registration spec.md leaves "specified only by
//! interface".

pub mod fixtures;
pub mod opcodes;
pub mod tracing_setup;

use rustc_hash::FxHashMap;

use amm_diagnostic::Diagnostic;
use amm_ir::ast::Module;
use amm_ir::StringInterner;
use amm_lower::DriverContext;

/// One compilation request: a root module under `root_path`, its
/// `@std/...` dependencies, and the `StringInterner` every `Name` in both
/// was built against.
///
/// A `Name` is only meaningful relative to the interner that produced it
/// (there is no process-wide interner to fall back on — spec.md §9 rules
/// out global mutable state), so whatever builds `root`/`std_modules` must
/// hand back the same interner it used, for `compile` to build the opcode
/// scope and the driver against.
pub struct Config {
    pub interner: StringInterner,
    pub root_path: String,
    pub root: Module,
    pub std_modules: FxHashMap<String, Module>,
}

/// Runs one lowering pass end to end: builds the opcode scope against
/// `config.interner`, registers the built-in `start` event (spec.md §3
/// GLOSSARY lists `start` among the built-in events every run carries), and
/// renders AMM text for `config.root`.
pub fn compile(config: Config) -> Result<String, Diagnostic> {
    let opcode_scope = opcodes::builtin_opcodes(&config.interner);
    let mut driver = DriverContext::new(config.interner, opcode_scope);
    let void = driver.builtins.void.clone();
    driver.register_builtin_event("start", void);
    driver.run(&config.root_path, &config.root, &config.std_modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_fixture_compiles_to_amm_text() {
        let interner = StringInterner::new();
        let config = Config {
            root: fixtures::demo_root(&interner),
            std_modules: fixtures::std_modules(&interner),
            root_path: "demo.ln".to_string(),
            interner,
        };
        let amm = compile(config).expect("demo fixture lowers cleanly");
        assert!(amm.contains("on tick fn"));
    }
}
