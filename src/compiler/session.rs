use super::labels::LabelManager;
use super::memory::MemoryManager;
use super::phases::emit::Line;
use super::regalloc::RegisterCache;
use crate::config::{Config, OptLevel};
use crate::isa::inst::{self, Inst};
use log::trace;

/// Everything one compilation mutates: the symbol table, the register
/// cache, the label counters and the output so far. Owned by exactly one
/// pipeline run.
#[derive(Debug)]
pub struct CompileSession {
    pub(crate) memory: MemoryManager,
    pub(crate) regs: RegisterCache,
    pub(crate) labels: LabelManager,
    lines: Vec<Line>,
    opt: OptLevel,
}

impl CompileSession {
    pub fn new(config: &Config) -> Self {
        CompileSession {
            memory: MemoryManager::new(&config.layout()),
            regs: RegisterCache::new(config.optimization_level >= OptLevel::Cache),
            labels: LabelManager::new(),
            lines: Vec::new(),
            opt: config.optimization_level,
        }
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Append one instruction, after checking it against the operand
    /// rules and updating the register cache with its effect.
    pub fn emit(&mut self, inst: Inst) -> Result<(), inst::Error> {
        inst.validate()?;
        trace!("emit {}", inst);
        self.regs.observe(&inst);
        self.lines.push(Line::Inst(inst));
        Ok(())
    }

    /// Define a label which some jump targets. Control may arrive here from
    /// elsewhere, so nothing known about the registers survives.
    pub fn define_label(&mut self, name: &str) {
        self.regs.forget_all();
        self.lines.push(Line::Label(name.to_owned()));
    }

    /// Define a label which is only ever fallen into.
    pub fn mark_label(&mut self, name: &str) {
        self.lines.push(Line::Label(name.to_owned()));
    }

    pub fn raw(&mut self, text: &str) {
        self.regs.forget_all();
        self.lines.push(Line::Raw(text.to_owned()));
    }

    pub fn into_parts(self) -> (Vec<Line>, MemoryManager) {
        (self.lines, self.memory)
    }
}
