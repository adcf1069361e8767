use crate::isa::types::Word;
use log::debug;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::Display;

/// Bytes at the top of the variable region kept back for compiler temporaries.
pub const SCRATCH_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Byte,
    ByteArray(usize),
    UInt16,
}

impl Type {
    pub fn size(self) -> usize {
        match self {
            Type::Byte => 1,
            Type::ByteArray(n) => n,
            Type::UInt16 => 2,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Byte => write!(f, "byte"),
            Type::ByteArray(n) => write!(f, "byte[{}]", n),
            Type::UInt16 => write!(f, "uint16"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub addr: Word,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    UndefinedSymbol(String),
    DuplicateSymbol(String),
    OutOfMemory(String, usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UndefinedSymbol(name) => write!(f, "Undefined symbol '{}'", name),
            Error::DuplicateSymbol(name) => write!(f, "Symbol '{}' is already declared", name),
            Error::OutOfMemory(name, size) => write!(
                f,
                "Out of memory allocating {} byte(s) for '{}'",
                size, name
            ),
        }
    }
}

/// A half-open address range `[start, end)` with a bump cursor.
#[derive(Debug, Clone)]
pub struct Region {
    start: u32,
    end: u32,
    cursor: u32,
}

impl Region {
    pub fn new(start: u32, end: u32) -> Self {
        Region {
            start,
            end: end.max(start),
            cursor: start,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn used(&self) -> usize {
        (self.cursor - self.start) as usize
    }

    fn alloc(&mut self, size: usize) -> Option<u32> {
        let size = u32::try_from(size).ok()?;
        let next = self.cursor.checked_add(size)?;
        if next > self.end {
            return None;
        }

        let addr = self.cursor;
        self.cursor = next;
        Some(addr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub variable_start: u32,
    pub variable_end: u32,
    pub stack_start: u32,
    pub stack_size: u32,
}

impl Layout {
    /// The user variable region. A stack window beginning inside the
    /// configured variable range cuts the range short there.
    pub fn variable_region(&self) -> (u32, u32) {
        let start = self.variable_start;
        let mut end = self.variable_end;
        if self.stack_start > start && self.stack_start < end {
            end = self.stack_start;
        }
        (start, end)
    }

    pub fn stack_end(&self) -> u32 {
        self.stack_start.saturating_add(self.stack_size)
    }

    /// Whether the stack window covers the first variable address.
    pub fn stack_covers_variables(&self) -> bool {
        self.stack_size > 0
            && self.stack_start <= self.variable_start
            && self.variable_start < self.stack_end()
    }
}

#[derive(Debug)]
pub struct MemoryManager {
    vars: Region,
    stack: Region,
    scratch: Region,
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
}

impl MemoryManager {
    pub fn new(layout: &Layout) -> Self {
        let (start, end) = layout.variable_region();
        let scratch_start = end.saturating_sub(SCRATCH_BYTES as u32).max(start);

        MemoryManager {
            vars: Region::new(start, scratch_start),
            stack: Region::new(layout.stack_start, layout.stack_end()),
            scratch: Region::new(scratch_start, end),
            symbols: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn declare(&mut self, name: &str, ty: Type) -> Result<Word, Error> {
        if self.symbols.contains_key(name) {
            return Err(Error::DuplicateSymbol(name.to_owned()));
        }

        let oom = || Error::OutOfMemory(name.to_owned(), ty.size());
        let addr = self.vars.alloc(ty.size()).ok_or_else(oom)?;
        let addr = Word::try_from(addr).map_err(|_| oom())?;

        debug!("allocated {} '{}' at {:#06x}", ty, name, addr);
        self.symbols.insert(
            name.to_owned(),
            Symbol {
                name: name.to_owned(),
                ty,
                addr,
            },
        );
        self.order.push(name.to_owned());
        Ok(addr)
    }

    pub fn resolve(&self, name: &str) -> Result<&Symbol, Error> {
        self.symbols
            .get(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_owned()))
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(move |name| self.symbols.get(name))
    }

    /// Reserve `size` scratch bytes. Released blocks are only reclaimed
    /// from the top; anything else waits for `release_all_scratch`.
    pub fn acquire_scratch(&mut self, size: usize) -> Result<Word, Error> {
        let oom = || Error::OutOfMemory(String::from("<scratch>"), size);
        let addr = self.scratch.alloc(size).ok_or_else(oom)?;
        debug!("scratch cell(s) at {:#06x}", addr);
        Word::try_from(addr).map_err(|_| oom())
    }

    /// Give back the `size` bytes reserved at `addr`, provided nothing was
    /// reserved after them.
    pub fn release_scratch(&mut self, addr: Word, size: usize) {
        let start = u32::from(addr);
        let top = u32::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .map_or(false, |end| end == self.scratch.cursor);

        if top && start >= self.scratch.start {
            self.scratch.cursor = start;
        } else {
            debug!("scratch cell(s) at {:#06x} stay reserved", addr);
        }
    }

    pub fn release_all_scratch(&mut self) {
        self.scratch.cursor = self.scratch.start;
    }

    pub fn variable_region(&self) -> &Region {
        &self.vars
    }

    pub fn variable_count(&self) -> usize {
        self.order.len()
    }

    pub fn bytes_used(&self) -> usize {
        self.vars.used()
    }

    pub fn bytes_available(&self) -> usize {
        self.vars.len()
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }
}
