use crate::common;
use crate::compiler::memory::{MemoryManager, Symbol};
use crate::isa::Inst;
use itertools::Itertools;
use log::info;
use std::collections::BTreeMap;

/// One line of generated output, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Inst(Inst),
    Label(String),
    /// The body of a `dasm` block, verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    /// Instruction counts by upper-case mnemonic, including raw blocks.
    pub mnemonics: BTreeMap<String, usize>,
    pub instructions: usize,
    pub labels: usize,
    pub variables: usize,
    pub bytes_used: usize,
    pub bytes_available: usize,
    pub stack_size: usize,
}

impl Stats {
    fn count(&mut self, mnemonic: &str) {
        *self.mnemonics.entry(mnemonic.to_uppercase()).or_default() += 1;
        self.instructions += 1;
    }

    /// Mnemonics ordered by how often they occur, most frequent first.
    pub fn breakdown(&self) -> Vec<(&str, usize)> {
        self.mnemonics
            .iter()
            .map(|(m, n)| (m.as_str(), *n))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .collect()
    }

    pub fn memory_percent(&self) -> f64 {
        common::percent(self.bytes_used, self.bytes_available)
    }
}

#[derive(Debug, Clone)]
pub struct Output {
    lines: Vec<String>,
    symbols: Vec<Symbol>,
    pub stats: Stats,
}

impl Output {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Variables in declaration order, with their addresses.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Strip a trailing comment, and drop the line if nothing is left.
fn strip_comment<'a>(line: &'a str, comment: &str) -> Option<&'a str> {
    let code = match line.find(comment) {
        Some(pos) => &line[..pos],
        None => line,
    }
    .trim_end();

    if code.trim().is_empty() {
        None
    } else {
        Some(code)
    }
}

pub fn emit(lines: Vec<Line>, memory: &MemoryManager, comment: &str) -> Output {
    let mut stats = Stats {
        variables: memory.variable_count(),
        bytes_used: memory.bytes_used(),
        bytes_available: memory.bytes_available(),
        stack_size: memory.stack_size(),
        ..Stats::default()
    };

    let mut text = Vec::with_capacity(lines.len());
    for line in lines {
        match line {
            Line::Inst(inst) => {
                stats.count(&inst.mnemonic().to_string());
                text.push(inst.to_string());
            }
            Line::Label(label) => {
                stats.labels += 1;
                text.push(format!("{}:", label));
            }
            Line::Raw(raw) => {
                for code in raw.lines().filter_map(|l| strip_comment(l, comment)) {
                    match code.split_whitespace().next() {
                        Some(word) if word.ends_with(':') => stats.labels += 1,
                        Some(word) => stats.count(word),
                        None => (),
                    }
                    text.push(code.to_owned());
                }
            }
        }
    }

    info!(
        "emitted {} instruction(s), {} label(s)",
        stats.instructions, stats.labels
    );

    Output {
        lines: text,
        symbols: memory.symbols().cloned().collect(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::memory::{Layout, Type};
    use crate::isa::{Cond, Dst, GpReg, Src};

    fn memory() -> MemoryManager {
        let mut mm = MemoryManager::new(&Layout {
            variable_start: 0,
            variable_end: 0x48,
            stack_start: 0x100,
            stack_size: 16,
        });
        mm.declare("a", Type::Byte).unwrap();
        mm.declare("w", Type::UInt16).unwrap();
        mm
    }

    #[test]
    fn renders_and_counts() {
        let lines = vec![
            Line::Label(String::from("while_1")),
            Line::Inst(Inst::Ldi(3)),
            Line::Inst(Inst::Mov(Dst::Gp(GpReg::RD), Src::Gp(GpReg::RA))),
            Line::Raw(String::from("  ldi #4 // four\n\n// nothing\nloop:\n  MOV RB, RA")),
            Line::Inst(Inst::Jump(Cond::Always, String::from("while_1"))),
            Line::Inst(Inst::Hlt),
        ];
        let out = emit(lines, &memory(), "//");

        assert_eq!(
            out.lines(),
            &[
                "while_1:",
                "LDI #3",
                "MOV RD, RA",
                "  ldi #4",
                "loop:",
                "  MOV RB, RA",
                "JMP while_1",
                "HLT"
            ]
        );
        assert_eq!(out.stats.instructions, 6);
        assert_eq!(out.stats.labels, 2);
        assert_eq!(out.stats.mnemonics.get("LDI"), Some(&2));
        assert_eq!(out.stats.mnemonics.get("MOV"), Some(&2));
        assert_eq!(out.stats.breakdown()[0], ("LDI", 2));
        assert!(out.text().ends_with("HLT\n"));
    }

    #[test]
    fn memory_figures() {
        let out = emit(vec![Line::Inst(Inst::Hlt)], &memory(), "//");
        assert_eq!(out.stats.variables, 2);
        assert_eq!(out.stats.bytes_used, 3);
        assert_eq!(out.stats.bytes_available, 0x40);
        assert_eq!(out.stats.stack_size, 16);
        assert!((out.stats.memory_percent() - 4.6875).abs() < 1e-9);
        assert_eq!(
            out.symbols().iter().map(|s| s.addr).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }
}
