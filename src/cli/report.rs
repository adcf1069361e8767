use crate::common;
use crate::compiler::Output;
use crate::config::Config;
use std::fmt::Write;

const RULE_LEN: usize = 60;

/// The summary printed after a successful compilation.
pub fn stats(output: &Output, input_size: usize, output_size: usize) -> String {
    let stats = &output.stats;
    let mut out = String::new();

    // Writing to a `String` cannot fail.
    let _ = writeln!(out, "\n=== Compilation Statistics ===");
    let _ = writeln!(out, "  Input file size:          {} bytes", input_size);
    let _ = writeln!(out, "  Output file size:         {} bytes", output_size);
    let _ = writeln!(out, "  Assembly instructions:    {}", stats.instructions);
    let _ = writeln!(out, "  Labels:                   {}", stats.labels);
    let _ = writeln!(out, "  Variables allocated:      {}", stats.variables);
    let _ = writeln!(
        out,
        "  Memory used:              {}/{} bytes ({:.1}%)",
        stats.bytes_used,
        stats.bytes_available,
        stats.memory_percent()
    );
    let _ = writeln!(out, "  Stack size:               {} bytes", stats.stack_size);

    let breakdown = stats.breakdown();
    if !breakdown.is_empty() {
        let _ = writeln!(out, "\n  Instruction breakdown:");
        for (mnemonic, count) in breakdown {
            let _ = writeln!(
                out,
                "    {:8} : {:4} ({:5.1}%)",
                mnemonic,
                count,
                common::percent(count, stats.instructions)
            );
        }
    }

    out
}

pub fn info(config: &Config) -> String {
    let layout = config.layout();
    let rule = "=".repeat(RULE_LEN);
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "{:^width$}", "ArniComp Compiler", width = RULE_LEN);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "\nA high-level language compiler for the ArniComp ISA");

    let _ = writeln!(out, "\nSupported Features:");
    for feature in &[
        "Variable declarations (byte, byte arrays, uint16)",
        "Arithmetic expressions (+, -, &, ^, ~)",
        "Control flow (if/elif/else, while loops)",
        "Direct memory access (*address)",
        "Array indexing with constant/variable indices",
        "Register optimization and caching (-O0, -O1, -O2)",
        "Preprocessor macros (#define)",
        "Direct assembly insertion (dasm/endasm)",
    ] {
        let _ = writeln!(out, "  * {}", feature);
    }

    let _ = writeln!(out, "\nMemory Layout:");
    let _ = writeln!(
        out,
        "  Variables:  0x{:04X} - 0x{:04X}",
        config.variable_start_addr, config.variable_end_addr
    );
    let _ = writeln!(
        out,
        "  Stack:      0x{:04X} - 0x{:04X}",
        config.stack_start_addr,
        layout.stack_end().saturating_sub(1)
    );

    let _ = writeln!(out, "\nCommand-Line Usage:");
    let _ = writeln!(out, "  arnc compile <in.arn> [options]");
    let _ = writeln!(out, "  arnc config [options]");
    let _ = writeln!(out, "  arnc validate <in.arn>");
    let _ = writeln!(out, "  arnc suite [dir]");
    let _ = writeln!(out, "  arnc info");
    let _ = writeln!(out, "\nFor detailed help: arnc --help");
    let _ = writeln!(out, "{}", rule);

    out
}
