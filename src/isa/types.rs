use bitflags::bitflags;
use derive_more::Display;
use enum_map::Enum;
use static_assertions::const_assert;
use strum_macros::EnumIter;

pub type Byte = u8;
pub type Word = u16;

pub const BYTE_WIDTH: usize = 8;
pub const BYTE_MAX: Byte = 0xFF;
pub const WORD_MAX: Word = 0xFFFF;

pub const LDI_WIDTH: u32 = 7;
pub const LDI_MAX: Byte = (1 << LDI_WIDTH) - 1;

pub const IMM3_WIDTH: u32 = 3;
pub const IMM3_MAX: Byte = (1 << IMM3_WIDTH) - 1;

const_assert!(LDI_MAX == 127);
const_assert!(IMM3_MAX == 7);
const_assert!((LDI_MAX as usize) < (BYTE_MAX as usize));

pub const fn lo(w: Word) -> Byte {
    (w & 0x00FF) as Byte
}

pub const fn hi(w: Word) -> Byte {
    ((w & 0xFF00) >> BYTE_WIDTH) as Byte
}

pub const fn word(lo: Byte, hi: Byte) -> Word {
    ((hi as Word) << BYTE_WIDTH) | (lo as Word)
}

/// The three registers an instruction may write directly. `ACC` is
/// deliberately absent: only the ALU writes it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, EnumIter)]
pub enum GpReg {
    RA,
    RD,
    RB,
}

impl GpReg {
    /// Scratch preference order when a value has to be parked.
    pub const SCRATCH_ORDER: [GpReg; 3] = [GpReg::RB, GpReg::RD, GpReg::RA];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Src {
    Gp(GpReg),
    Acc,
    Pcl,
    Pch,
    M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dst {
    Gp(GpReg),
    Marl,
    Marh,
    M,
}

impl std::fmt::Display for Src {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Src::Gp(r) => write!(f, "{}", r),
            Src::Acc => write!(f, "ACC"),
            Src::Pcl => write!(f, "PCL"),
            Src::Pch => write!(f, "PCH"),
            Src::M => write!(f, "M"),
        }
    }
}

impl std::fmt::Display for Dst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dst::Gp(r) => write!(f, "{}", r),
            Dst::Marl => write!(f, "MARL"),
            Dst::Marh => write!(f, "MARH"),
            Dst::M => write!(f, "M"),
        }
    }
}

impl From<GpReg> for Src {
    fn from(r: GpReg) -> Self {
        Src::Gp(r)
    }
}

impl From<GpReg> for Dst {
    fn from(r: GpReg) -> Self {
        Dst::Gp(r)
    }
}

bitflags! {
    /// A set of machine registers, used to describe what an instruction
    /// sequence overwrites.
    pub struct Regs: u8 {
        const RA = 0b0000_0001;
        const RD = 0b0000_0010;
        const RB = 0b0000_0100;
        const ACC = 0b0000_1000;
        const MARL = 0b0001_0000;
        const MARH = 0b0010_0000;
    }
}

impl From<GpReg> for Regs {
    fn from(r: GpReg) -> Self {
        match r {
            GpReg::RA => Regs::RA,
            GpReg::RD => Regs::RD,
            GpReg::RB => Regs::RB,
        }
    }
}

impl Regs {
    pub fn holds(self, r: GpReg) -> bool {
        self.contains(Regs::from(r))
    }
}
