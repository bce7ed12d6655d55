//! AMM lowering pass CLI.

use ammc::{fixtures, tracing_setup, compile, Config};
use amm_ir::StringInterner;

fn main() {
    tracing_setup::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "demo" => run_demo(),
        "help" | "--help" | "-h" => print_usage(),
        "version" | "--version" => println!("ammc 0.1.0"),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("AMM lowering pass driver");
    println!();
    println!("Usage: ammc <command>");
    println!();
    println!("Commands:");
    println!("  demo       Lower the bundled demo module and print its AMM text");
    println!("  help       Show this help message");
    println!("  version    Show version information");
    println!();
    println!("The surface-syntax parser is an external collaborator this crate does");
    println!("not implement (spec.md §1) — `demo` lowers a module built directly as an");
    println!("AST fixture rather than reading a `.ln` file from disk.");
}

fn run_demo() {
    let interner = StringInterner::new();
    let config = Config {
        root: fixtures::demo_root(&interner),
        std_modules: fixtures::std_modules(&interner),
        root_path: "demo.ln".to_string(),
        interner,
    };
    match compile(config) {
        Ok(amm) => print!("{amm}"),
        Err(diagnostic) => {
            eprintln!("error[{}]: {}", diagnostic.code, diagnostic.message);
            std::process::exit(1);
        }
    }
}
