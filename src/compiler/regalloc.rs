use super::phases::generate::Error;
use super::session::CompileSession;
use crate::isa::types::{hi, lo, Byte, Word, LDI_MAX};
use crate::isa::{AluOp, Dst, GpReg, Inst, Regs, Src};
use enum_map::EnumMap;
use log::debug;
use strum::IntoEnumIterator;

/// A byte whose value the compiler knows how to produce without
/// running any arithmetic: a constant, or the contents of a fixed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Lit(Byte),
    Cell(Word),
}

/// Where a freshly computed byte currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Acc,
    Reg(GpReg),
}

impl Value {
    pub fn src(self) -> Src {
        match self {
            Value::Acc => Src::Acc,
            Value::Reg(r) => Src::Gp(r),
        }
    }

    pub(crate) fn regs(self) -> Regs {
        match self {
            Value::Acc => Regs::ACC,
            Value::Reg(r) => Regs::from(r),
        }
    }
}

/// Where an intermediate was put aside while another operand is staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Acc,
    Reg(GpReg),
    Cell(Word),
}

/// What is still to be loaded into `RD` while a saved value must survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Operand(Operand),
    /// An arbitrary expression, reading the given operands.
    Compound(Vec<Operand>),
}

/// Compile-time knowledge of the machine's registers: which known value
/// each holds, the last constant written to each address half, and which
/// registers are reserved by an in-flight expression.
#[derive(Debug, Clone)]
pub struct RegisterCache {
    held: EnumMap<GpReg, Option<Operand>>,
    acc: Option<Operand>,
    marl: Option<Byte>,
    marh: Option<Byte>,
    pins: EnumMap<GpReg, usize>,
    reuse: bool,
}

impl RegisterCache {
    pub fn new(reuse: bool) -> Self {
        RegisterCache {
            held: EnumMap::new(),
            acc: None,
            marl: None,
            marh: None,
            pins: EnumMap::new(),
            reuse,
        }
    }

    pub fn reuse(&self) -> bool {
        self.reuse
    }

    pub fn tag(&self, r: GpReg) -> Option<Operand> {
        self.held[r]
    }

    pub fn mar(&self) -> Option<Word> {
        match (self.marl, self.marh) {
            (Some(l), Some(h)) => Some(crate::isa::types::word(l, h)),
            _ => None,
        }
    }

    pub(crate) fn src_tag(&self, src: Src) -> Option<Operand> {
        match src {
            Src::Gp(r) => self.held[r],
            Src::Acc => self.acc,
            Src::M => self.mar().map(Operand::Cell),
            Src::Pcl | Src::Pch => None,
        }
    }

    fn lit_tag(&self, src: Src) -> Option<Byte> {
        match self.src_tag(src) {
            Some(Operand::Lit(v)) => Some(v),
            _ => None,
        }
    }

    pub fn invalidate(&mut self, r: GpReg) {
        self.held[r] = None;
    }

    pub fn forget_all(&mut self) {
        for r in GpReg::iter() {
            self.invalidate(r);
        }
        self.acc = None;
        self.marl = None;
        self.marh = None;
    }

    /// Drop every register's claim to mirror `addr`, or any cell at all.
    fn forget_cells(&mut self, addr: Option<Word>) {
        let stale = |tag: Option<Operand>| match (tag, addr) {
            (Some(Operand::Cell(_)), None) => true,
            (Some(Operand::Cell(a)), Some(addr)) => a == addr,
            _ => false,
        };

        for r in GpReg::iter() {
            if stale(self.held[r]) {
                self.held[r] = None;
            }
        }
        if stale(self.acc) {
            self.acc = None;
        }
    }

    /// Update the tags with the effect of an emitted instruction.
    pub fn observe(&mut self, inst: &Inst) {
        match inst {
            Inst::Ldi(v) => self.held[GpReg::RA] = Some(Operand::Lit(*v)),
            Inst::Mov(dst, src) => {
                let tag = self.src_tag(*src);
                match dst {
                    Dst::Gp(r) => self.held[*r] = tag,
                    Dst::Marl => self.marl = self.lit_tag(*src),
                    Dst::Marh => self.marh = self.lit_tag(*src),
                    Dst::M => match self.mar() {
                        Some(addr) => {
                            self.forget_cells(Some(addr));
                            // A register known to hold a constant keeps saying
                            // so; otherwise it now mirrors the cell.
                            if let Some(Operand::Lit(_)) = tag {
                                return;
                            }
                            match src {
                                Src::Gp(r) => self.held[*r] = Some(Operand::Cell(addr)),
                                Src::Acc => self.acc = Some(Operand::Cell(addr)),
                                _ => (),
                            }
                        }
                        None => self.forget_cells(None),
                    },
                }
            }
            Inst::Alu(AluOp::Not, src) => {
                self.acc = self.lit_tag(*src).map(|v| Operand::Lit(!v));
            }
            Inst::Alu(..) | Inst::AluImm(..) => self.acc = None,
            Inst::Jump(..) | Inst::Nop | Inst::Hlt => (),
        }
    }

    pub fn pin(&mut self, r: GpReg) {
        self.pins[r] += 1;
    }

    pub fn unpin(&mut self, r: GpReg) {
        self.pins[r] = self.pins[r].saturating_sub(1);
    }

    pub fn is_pinned(&self, r: GpReg) -> bool {
        self.pins[r] > 0
    }

    /// A register holding `op` which `accept` allows, when reuse is on.
    fn holding_where(&self, op: Operand, accept: impl Fn(GpReg) -> bool) -> Option<GpReg> {
        if !self.reuse {
            return None;
        }
        GpReg::iter().find(|&r| self.held[r] == Some(op) && accept(r))
    }

    pub fn holding(&self, op: Operand) -> Option<GpReg> {
        self.holding_where(op, |_| true)
    }

    pub(crate) fn acc_holds(&self, op: Operand) -> bool {
        self.reuse && self.acc == Some(op)
    }
}

/// How a byte gets into a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Hit,
    Copy(Src),
    Ldi(Byte),
    LdiNot(Byte),
    Mem(Word),
}

fn dst_regs(dst: Dst) -> Regs {
    match dst {
        Dst::Gp(r) => Regs::from(r),
        Dst::Marl => Regs::MARL,
        Dst::Marh => Regs::MARH,
        Dst::M => Regs::empty(),
    }
}

impl CompileSession {
    fn plan(&self, dst: Dst, op: Operand) -> Plan {
        let regs = &self.regs;
        if regs.reuse {
            let hit = match (dst, op) {
                (Dst::Gp(r), op) => regs.held[r] == Some(op),
                (Dst::Marl, Operand::Lit(v)) => regs.marl == Some(v),
                (Dst::Marh, Operand::Lit(v)) => regs.marh == Some(v),
                _ => false,
            };
            if hit {
                return Plan::Hit;
            }

            if let Some(r) = regs.holding_where(op, |r| dst != Dst::Gp(r)) {
                return Plan::Copy(Src::Gp(r));
            }

            if regs.acc_holds(op) {
                return Plan::Copy(Src::Acc);
            }
        }

        match op {
            Operand::Lit(v) if v <= LDI_MAX => Plan::Ldi(v),
            Operand::Lit(v) => Plan::LdiNot(v),
            Operand::Cell(addr) => Plan::Mem(addr),
        }
    }

    fn plan_clobbers(&self, dst: Dst, plan: Plan) -> Regs {
        match plan {
            Plan::Hit => Regs::empty(),
            Plan::Copy(_) => dst_regs(dst),
            Plan::Ldi(_) => Regs::RA | dst_regs(dst),
            Plan::LdiNot(_) => Regs::RA | Regs::ACC | dst_regs(dst),
            Plan::Mem(addr) => self.mar_clobbers(addr) | dst_regs(dst),
        }
    }

    fn realize(&mut self, dst: Dst, plan: Plan) -> Result<(), Error> {
        match plan {
            Plan::Hit => (),
            Plan::Copy(src) => self.emit(Inst::Mov(dst, src))?,
            Plan::Ldi(v) => {
                self.emit(Inst::Ldi(v))?;
                if dst != Dst::Gp(GpReg::RA) {
                    self.emit(Inst::Mov(dst, Src::Gp(GpReg::RA)))?;
                }
            }
            Plan::LdiNot(v) => {
                self.emit(Inst::Ldi(!v))?;
                self.emit(Inst::Alu(AluOp::Not, Src::Gp(GpReg::RA)))?;
                self.emit(Inst::Mov(dst, Src::Acc))?;
            }
            Plan::Mem(addr) => {
                self.set_mar(addr)?;
                self.emit(Inst::Mov(dst, Src::M))?;
            }
        }
        Ok(())
    }

    /// Point the memory address pair at `addr`, skipping halves that
    /// already hold the right byte.
    pub(crate) fn set_mar(&mut self, addr: Word) -> Result<(), Error> {
        let plan = self.plan(Dst::Marl, Operand::Lit(lo(addr)));
        self.realize(Dst::Marl, plan)?;
        let plan = self.plan(Dst::Marh, Operand::Lit(hi(addr)));
        self.realize(Dst::Marh, plan)
    }

    /// Registers `set_mar(addr)` would overwrite, given the current cache.
    pub(crate) fn mar_clobbers(&self, addr: Word) -> Regs {
        let l = self.plan(Dst::Marl, Operand::Lit(lo(addr)));
        let h = self.plan(Dst::Marh, Operand::Lit(hi(addr)));
        self.plan_clobbers(Dst::Marl, l) | self.plan_clobbers(Dst::Marh, h)
    }

    /// Write a byte known at compile time (or mirrored from memory) into
    /// an address half or straight into `M`.
    pub(crate) fn put(&mut self, dst: Dst, op: Operand) -> Result<(), Error> {
        let plan = self.plan(dst, op);
        if dst == Dst::M {
            if let Plan::Mem(_) = plan {
                // A memory operand must pass through a register first, and the
                // address pair is already spoken for.
                self.load(GpReg::RD, op)?;
                return self.emit(Inst::Mov(Dst::M, Src::Gp(GpReg::RD))).map_err(Error::from);
            }
        }
        self.realize(dst, plan)
    }

    /// Make `reg` hold `op`.
    pub(crate) fn load(&mut self, reg: GpReg, op: Operand) -> Result<(), Error> {
        let plan = self.plan(Dst::Gp(reg), op);
        if plan != Plan::Hit {
            debug!("load {:?} into {}", op, reg);
        }
        self.realize(Dst::Gp(reg), plan)
    }

    pub(crate) fn load_clobbers(&self, reg: GpReg, op: Operand) -> Regs {
        self.plan_clobbers(Dst::Gp(reg), self.plan(Dst::Gp(reg), op))
    }

    /// Produce a source operand for `alu` holding `op`, without touching `RD`.
    pub(crate) fn source(&mut self, op: Operand, alu: AluOp) -> Result<Src, Error> {
        if let Some(r) = self.regs.holding_where(op, |r| alu.accepts_reg(r)) {
            return Ok(Src::Gp(r));
        }

        if self.regs.acc_holds(op) {
            return Ok(Src::Acc);
        }

        if let Some(r) = self.regs.holding(op) {
            self.emit(Inst::Mov(Dst::Gp(GpReg::RA), Src::Gp(r)))?;
            return Ok(Src::Gp(GpReg::RA));
        }

        match op {
            Operand::Lit(v) if v <= LDI_MAX => {
                self.emit(Inst::Ldi(v))?;
                Ok(Src::Gp(GpReg::RA))
            }
            Operand::Lit(v) => {
                self.emit(Inst::Ldi(!v))?;
                self.emit(Inst::Alu(AluOp::Not, Src::Gp(GpReg::RA)))?;
                Ok(Src::Acc)
            }
            Operand::Cell(addr) => {
                self.set_mar(addr)?;
                Ok(Src::M)
            }
        }
    }

    /// Put `v` somewhere it survives while `left` is brought into `RD`.
    pub(crate) fn spill(&mut self, v: Value, left: &Pending) -> Result<Saved, Error> {
        let (clobbers, live) = match left {
            Pending::Operand(op) => (self.load_clobbers(GpReg::RD, *op), vec![*op]),
            // Only a reserved `RB` is safe from arbitrary code.
            Pending::Compound(live) => (Regs::all() - Regs::RB, live.clone()),
        };

        match v {
            Value::Acc if !clobbers.contains(Regs::ACC) => return Ok(Saved::Acc),
            Value::Reg(r) if r != GpReg::RD && !clobbers.holds(r) => {
                self.regs.pin(r);
                return Ok(Saved::Reg(r));
            }
            _ => (),
        }

        let mut candidates: Vec<GpReg> = GpReg::SCRATCH_ORDER
            .iter()
            .copied()
            .filter(|&r| r != GpReg::RD && !self.regs.is_pinned(r) && !clobbers.holds(r))
            .collect();
        // Stable, so the fixed preference order breaks ties.
        candidates.sort_by_key(|&r| self.regs.tag(r).map_or(false, |t| live.contains(&t)));

        if let Some(&r) = candidates.first() {
            debug!("parking intermediate in {}", r);
            self.emit(Inst::Mov(Dst::Gp(r), v.src()))?;
            self.regs.pin(r);
            return Ok(Saved::Reg(r));
        }

        let addr = self.memory.acquire_scratch(1)?;
        debug!("parking intermediate in scratch cell {:#06x}", addr);
        let mut held = v;
        if self.mar_clobbers(addr).intersects(held.regs()) {
            self.emit(Inst::Mov(Dst::Gp(GpReg::RD), held.src()))?;
            held = Value::Reg(GpReg::RD);
        }
        self.set_mar(addr)?;
        self.emit(Inst::Mov(Dst::M, held.src()))?;
        Ok(Saved::Cell(addr))
    }

    /// Recover a value put aside by `spill` as a source operand for `alu`.
    pub(crate) fn restore(&mut self, saved: Saved, alu: AluOp) -> Result<Src, Error> {
        match saved {
            Saved::Acc => Ok(Src::Acc),
            Saved::Reg(r) => {
                self.regs.unpin(r);
                if alu.accepts_reg(r) {
                    Ok(Src::Gp(r))
                } else {
                    self.emit(Inst::Mov(Dst::Gp(GpReg::RA), Src::Gp(r)))?;
                    Ok(Src::Gp(GpReg::RA))
                }
            }
            Saved::Cell(addr) => {
                self.set_mar(addr)?;
                self.memory.release_scratch(addr, 1);
                Ok(Src::M)
            }
        }
    }
}
