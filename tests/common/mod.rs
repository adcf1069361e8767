#![allow(dead_code)]

use arnc::compiler::{self, Output};
use arnc::config::{Config, OptLevel};
use arnc::isa::inst::Mnemonic;
use std::collections::HashMap;

pub const MAX_STEPS: usize = 100_000;

pub fn config(level: OptLevel) -> Config {
    let mut cfg = Config::default();
    cfg.optimization_level = level;
    cfg
}

pub fn compile(src: &str) -> Output {
    compile_with(src, &Config::default())
}

pub fn compile_with(src: &str, cfg: &Config) -> Output {
    match compiler::compile(src, cfg) {
        Ok(out) => out,
        Err(err) => panic!("compilation failed: {}\n--- source ---\n{}", err, src),
    }
}

pub fn count(out: &Output, line: &str) -> usize {
    out.lines().iter().filter(|l| l.trim() == line).count()
}

pub fn position(out: &Output, line: &str) -> Option<usize> {
    out.lines().iter().position(|l| l.trim() == line)
}

pub fn addr_of(out: &Output, name: &str) -> usize {
    out.symbols()
        .iter()
        .find(|s| s.name == name)
        .map(|s| usize::from(s.addr))
        .unwrap_or_else(|| panic!("no symbol '{}'", name))
}

/// A register-level model of the processor, enough to run compiler output
/// and check the values it leaves in memory.
pub struct Machine {
    ra: u8,
    rb: u8,
    rd: u8,
    acc: u8,
    marl: u8,
    marh: u8,
    carry: bool,
    cmp: (u8, u8),
    pub mem: Vec<u8>,
    pub steps: usize,
}

impl Default for Machine {
    fn default() -> Self {
        Machine {
            ra: 0,
            rb: 0,
            rd: 0,
            acc: 0,
            marl: 0,
            marh: 0,
            carry: false,
            cmp: (0, 0),
            mem: vec![0; 0x1_0000],
            steps: 0,
        }
    }
}

fn imm(arg: &str, max: u8) -> Result<u8, String> {
    let v = arg
        .strip_prefix('#')
        .ok_or_else(|| format!("'{}' is not an immediate", arg))?
        .parse::<u8>()
        .map_err(|err| format!("bad immediate '{}': {}", arg, err))?;
    if v > max {
        return Err(format!("immediate {} is above {}", v, max));
    }
    Ok(v)
}

impl Machine {
    fn mar(&self) -> usize {
        usize::from(self.marh) << 8 | usize::from(self.marl)
    }

    fn read(&self, src: &str) -> Result<u8, String> {
        Ok(match src {
            "RA" => self.ra,
            "RB" => self.rb,
            "RD" => self.rd,
            "ACC" => self.acc,
            "M" => self.mem[self.mar()],
            _ => return Err(format!("'{}' cannot be read", src)),
        })
    }

    fn write(&mut self, dst: &str, v: u8) -> Result<(), String> {
        match dst {
            "RA" => self.ra = v,
            "RB" => self.rb = v,
            "RD" => self.rd = v,
            "MARL" => self.marl = v,
            "MARH" => self.marh = v,
            "M" => {
                let addr = self.mar();
                self.mem[addr] = v;
            }
            _ => return Err(format!("'{}' cannot be written", dst)),
        }
        Ok(())
    }

    fn arith(&mut self, sum: u16) {
        self.acc = sum as u8;
        self.carry = sum > 0xFF;
    }

    fn sub(&mut self, a: u8, b: u8, borrow: bool) {
        let rhs = u16::from(b) + u16::from(borrow);
        self.acc = a.wrapping_sub(b).wrapping_sub(u8::from(borrow));
        self.carry = u16::from(a) < rhs;
    }

    fn taken(&self, m: Mnemonic) -> bool {
        let (a, b) = self.cmp;
        match m {
            Mnemonic::JMP => true,
            Mnemonic::JEQ => a == b,
            Mnemonic::JNE => a != b,
            Mnemonic::JGT => a > b,
            Mnemonic::JLT => a < b,
            Mnemonic::JGE => a >= b,
            Mnemonic::JLE => a <= b,
            Mnemonic::JC => self.carry,
            _ => false,
        }
    }

    /// Execute `lines` from the top until `HLT`. Any line the processor
    /// would reject is an error.
    pub fn run(&mut self, lines: &[String]) -> Result<(), String> {
        let labels: HashMap<&str, usize> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.trim().strip_suffix(':').map(|name| (name, i)))
            .collect();

        let mut pc = 0;
        loop {
            let line = lines.get(pc).ok_or("ran off the end without HLT")?.trim();
            pc += 1;
            if line.ends_with(':') {
                continue;
            }

            self.steps += 1;
            if self.steps > MAX_STEPS {
                return Err(String::from("step limit reached"));
            }

            let (word, rest) = line.split_at(line.find(' ').unwrap_or_else(|| line.len()));
            let args: Vec<&str> = rest
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            let m = Mnemonic::lookup(word).ok_or_else(|| format!("unknown mnemonic in '{}'", line))?;
            let arg = |i: usize| -> Result<&str, String> {
                args.get(i)
                    .copied()
                    .ok_or_else(|| format!("'{}' is missing an operand", line))
            };

            match m {
                Mnemonic::LDI => self.ra = imm(arg(0)?, 127)?,
                Mnemonic::MOV => {
                    let (dst, src) = (arg(0)?, arg(1)?);
                    if dst == src {
                        return Err(format!("'{}' moves a register onto itself", line));
                    }
                    let v = self.read(src)?;
                    self.write(dst, v)?;
                }
                Mnemonic::ADD | Mnemonic::ADC => {
                    let c = m == Mnemonic::ADC && self.carry;
                    let sum = u16::from(self.rd) + u16::from(self.read(arg(0)?)?) + u16::from(c);
                    self.arith(sum);
                }
                Mnemonic::SUB | Mnemonic::SBC => {
                    let b = self.read(arg(0)?)?;
                    let borrow = m == Mnemonic::SBC && self.carry;
                    self.sub(self.rd, b, borrow);
                }
                Mnemonic::ADDI => {
                    let k = imm(arg(0)?, 7)?;
                    self.arith(u16::from(self.rd) + u16::from(k));
                }
                Mnemonic::SUBI => {
                    let k = imm(arg(0)?, 7)?;
                    self.sub(self.rd, k, false);
                }
                Mnemonic::AND => self.acc = self.rd & self.read(arg(0)?)?,
                Mnemonic::XOR | Mnemonic::NOT | Mnemonic::CMP => {
                    let src = arg(0)?;
                    if !["RA", "M", "ACC"].contains(&src) {
                        return Err(format!("'{}' takes RA, M or ACC only", line));
                    }
                    let v = self.read(src)?;
                    match m {
                        Mnemonic::XOR => self.acc = self.rd ^ v,
                        Mnemonic::NOT => self.acc = !v,
                        _ => self.cmp = (self.rd, v),
                    }
                }
                Mnemonic::NOP => (),
                Mnemonic::HLT => return Ok(()),
                jump => {
                    if self.taken(jump) {
                        let target = arg(0)?;
                        pc = *labels
                            .get(target)
                            .ok_or_else(|| format!("undefined label '{}'", target))?;
                    }
                }
            }
        }
    }
}

/// Compile and run `src`, returning the final machine.
pub fn run_with(src: &str, cfg: &Config) -> (Machine, Output) {
    let out = compile_with(src, cfg);
    let mut machine = Machine::default();
    if let Err(err) = machine.run(out.lines()) {
        panic!("{}\n--- listing ---\n{}", err, out.text());
    }
    (machine, out)
}

pub fn run(src: &str) -> (Machine, Output) {
    run_with(src, &Config::default())
}

/// The byte stored in the variable `name` after running.
pub fn byte(m: &Machine, out: &Output, name: &str) -> u8 {
    m.mem[addr_of(out, name)]
}

pub fn word(m: &Machine, out: &Output, name: &str) -> u16 {
    let addr = addr_of(out, name);
    u16::from_le_bytes([m.mem[addr], m.mem[addr + 1]])
}
