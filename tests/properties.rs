mod common;

use arnc::compiler::memory::Type;
use arnc::config::{Config, OptLevel};
use common::*;
use std::collections::HashSet;

#[test]
fn byte_variables_get_distinct_addresses() {
    let out = compile("byte a; byte b = 3; byte c; byte d = b;");
    let addrs: HashSet<_> = out.symbols().iter().map(|s| s.addr).collect();
    assert_eq!(addrs.len(), 4);
    assert_eq!(out.stats.bytes_used, 4);
}

#[test]
fn allocations_never_overlap() {
    let out = compile("byte a; uint16 w; byte[3] arr; byte b; uint16 v;");
    let mut used = HashSet::new();
    for sym in out.symbols() {
        for offset in 0..sym.ty.size() {
            assert!(
                used.insert(usize::from(sym.addr) + offset),
                "'{}' overlaps another variable",
                sym.name
            );
        }
    }
    assert_eq!(used.len(), 1 + 2 + 3 + 1 + 2);
}

#[test]
fn uint16_halves_are_contiguous() {
    let (m, out) = run("byte a = 1; uint16 w = 0x1234; byte b = 2;");
    let w = out.symbols().iter().find(|s| s.name == "w").unwrap();
    assert_eq!(w.ty, Type::UInt16);
    assert_eq!(m.mem[usize::from(w.addr)], 0x34);
    assert_eq!(m.mem[usize::from(w.addr) + 1], 0x12);
    assert_eq!(addr_of(&out, "b"), usize::from(w.addr) + 2);
}

fn added_lines(prefix: &str, src: &str, cfg: &Config) -> Vec<String> {
    let before = compile_with(prefix, cfg);
    let after = compile_with(src, cfg);
    let n = before.lines().len() - 1;
    // Everything before the trailing `HLT` is shared.
    assert_eq!(before.lines()[..n], after.lines()[..n]);
    after.lines()[n..after.lines().len() - 1].to_vec()
}

#[test]
fn self_assignment_touches_memory_at_most_twice() {
    for level in &[OptLevel::None, OptLevel::Cache, OptLevel::Aggressive] {
        let cfg = config(*level);
        let added = added_lines("byte x = 7;", "byte x = 7;\nx = x;", &cfg);

        let loads = added.iter().filter(|l| l.ends_with(", M")).count();
        let stores = added.iter().filter(|l| l.starts_with("MOV M,")).count();
        assert!(loads <= 1, "{:?}: {:?}", level, added);
        assert!(stores <= 1, "{:?}: {:?}", level, added);
    }

    assert!(added_lines("byte x = 7;", "byte x = 7;\nx = x;", &config(OptLevel::Aggressive)).is_empty());
}

#[test]
fn addition_stages_left_operand_in_rd() {
    let (m, out) = run("byte a = 5; byte b = 10; byte c = a + b;");
    let add = out
        .lines()
        .iter()
        .position(|l| l.starts_with("ADD "))
        .expect("an ADD");
    assert!(out.lines()[..add].iter().any(|l| l.starts_with("MOV RD, ")));
    assert!(!out.lines().iter().any(|l| l.starts_with("ADD #")));
    assert_eq!(byte(&m, &out, "c"), 15);
}

#[test]
fn literal_operands_are_loaded_first() {
    let out = compile("byte a = 5; byte c = a + 100;");
    let add = out
        .lines()
        .iter()
        .position(|l| l.starts_with("ADD "))
        .unwrap();
    assert!(out.lines()[..add].contains(&String::from("LDI #100")));
}

fn high_page_config() -> Config {
    let mut cfg = Config::default();
    cfg.variable_start_addr = 0x00FE;
    cfg.variable_end_addr = 0x0200;
    cfg.stack_start_addr = 0x0300;
    cfg
}

#[test]
fn index_across_page_takes_carry_branch() {
    let cfg = high_page_config();
    let (m, out) = run_with("byte[5] arr; byte i = 4; arr[i] = 9;", &cfg);

    assert_eq!(addr_of(&out, "arr"), 0x00FE);
    assert_eq!(count(&out, "JC idx_carry_1"), 1);
    assert_eq!(count(&out, "idx_carry_1:"), 1);
    assert_eq!(count(&out, "idx_done_1:"), 1);
    assert_eq!(m.mem[0x0102], 9);
    assert_eq!(m.mem[0x0002], 0);
}

#[test]
fn index_without_carry_stays_on_page() {
    let cfg = high_page_config();
    let (m, _) = run_with("byte[5] arr; byte i = 1; arr[i] = 6; byte y = arr[i] + 1;", &cfg);
    assert_eq!(m.mem[0x00FF], 6);
    assert_eq!(m.mem[0x0104], 7);
}

#[test]
fn while_loop_lowering() {
    let (m, out) = run("byte x = 0;\nwhile x < 10 x = x + 1; endwhile");

    assert_eq!(count(&out, "while_1:"), 1);
    assert_eq!(count(&out, "endwhile_1:"), 1);

    let to_end: Vec<_> = out
        .lines()
        .iter()
        .filter(|l| l.ends_with(" endwhile_1"))
        .collect();
    assert_eq!(to_end, vec!["JGE endwhile_1"]);

    let end = position(&out, "endwhile_1:").unwrap();
    assert_eq!(out.lines()[end - 1], "JMP while_1");
    assert!(position(&out, "while_1:").unwrap() < position(&out, "JGE endwhile_1").unwrap());
    assert_eq!(byte(&m, &out, "x"), 10);
}

const IF_CHAIN: &str = "byte a = A; byte x;\nif a == 5 x = 1; elif a == 6 x = 2; else x = 3; endif";

#[test]
fn if_chain_lowering() {
    let out = compile(&IF_CHAIN.replace('A', "5"));

    let labels: Vec<&String> = out.lines().iter().filter(|l| l.ends_with(':')).collect();
    let distinct: HashSet<_> = labels.iter().collect();
    assert_eq!(labels.len(), distinct.len());
    assert!(labels.contains(&&String::from("elif_1_1:")));
    assert!(labels.contains(&&String::from("else_1:")));

    for arm_end in &["elif_1_1:", "else_1:"] {
        let at = position(&out, arm_end).unwrap();
        assert_eq!(out.lines()[at - 1], "JMP endif_1");
    }
    let end = position(&out, "endif_1:").unwrap();
    assert_ne!(out.lines()[end - 1], "JMP endif_1");
}

#[test]
fn if_chain_picks_one_arm() {
    for (a, x) in &[(5, 1), (6, 2), (7, 3), (0, 3)] {
        let (m, out) = run(&IF_CHAIN.replace('A', &a.to_string()));
        assert_eq!(byte(&m, &out, "x"), *x, "a = {}", a);
    }
}

const MIXED: &str = "
#define N 6
byte[N] t;
byte i = 0;
byte s = 0;
byte big = 200;
uint16 w = 1000;
uint16 v = 0x00FF;
while i < N
    t[i] = i + i + 3;
    i = i + 1;
endwhile
i = 0;
while i != N
    s = s + t[i];
    w = w - t[i];
    i = i + 1;
endwhile
v = v + 1;
byte n = ~big & 0x7F;
byte x = big ^ s;
byte d = s - 3;
";

fn check_mixed(cfg: &Config) {
    let (m, out) = run_with(MIXED, cfg);
    let table: Vec<u8> = (0..6).map(|i| i * 2 + 3).collect();
    let sum: u8 = table.iter().sum();

    let t = addr_of(&out, "t");
    assert_eq!(m.mem[t..t + 6], table[..]);
    assert_eq!(byte(&m, &out, "s"), sum);
    assert_eq!(word(&m, &out, "w"), 1000 - u16::from(sum));
    assert_eq!(word(&m, &out, "v"), 0x0100);
    assert_eq!(byte(&m, &out, "big"), 200);
    assert_eq!(byte(&m, &out, "n"), !200 & 0x7F);
    assert_eq!(byte(&m, &out, "x"), 200 ^ sum);
    assert_eq!(byte(&m, &out, "d"), sum - 3);
}

#[test]
fn every_level_computes_the_same_values() {
    for level in &[OptLevel::None, OptLevel::Cache, OptLevel::Aggressive] {
        check_mixed(&config(*level));
    }
}

#[test]
fn caching_shrinks_output() {
    let o0 = compile_with(MIXED, &config(OptLevel::None));
    let o1 = compile_with(MIXED, &config(OptLevel::Cache));
    assert!(o1.stats.instructions < o0.stats.instructions);
}

#[test]
fn pointers_reach_memory() {
    let src = "
uint16 p = 0x0150;
byte q = 0x60;
*p = 7;
*q = 8;
*0x0151 = 9;
byte y = *p + *q;
";
    let (m, out) = run(src);
    assert_eq!(m.mem[0x0150], 7);
    assert_eq!(m.mem[0x0060], 8);
    assert_eq!(m.mem[0x0151], 9);
    assert_eq!(byte(&m, &out, "y"), 15);
}

const NESTED_STORE: &str = "
uint16 p = 0x0150;
byte i = 2;
byte j = 5;
byte c = 3;
byte d = 4;
byte e = 5;
byte f = 6;
*0x0155 = 11;
*(p + i) = (*(p + j) + (c + d)) + (e + f);
byte y = *(p + i);
";

#[test]
fn nested_sums_spill_beside_pointer_pairs() {
    for level in &[OptLevel::None, OptLevel::Cache, OptLevel::Aggressive] {
        let (m, out) = run_with(NESTED_STORE, &config(*level));
        assert_eq!(m.mem[0x0152], 11 + 7 + 11, "{:?}", level);
        assert_eq!(byte(&m, &out, "y"), 29, "{:?}", level);
        assert_eq!(m.mem[0x0155], 11, "{:?}", level);

        // `c + d` had to be parked in the scratch area at the top of the
        // variable region.
        assert!(m.mem[0x00F8..0x0100].contains(&7), "{:?}", level);
    }
}

#[test]
fn wide_carry_and_borrow() {
    let src = "
uint16 a = 0x01FF;
uint16 b = 0x0001;
uint16 s = a + b;
uint16 d = b - a;
uint16 m = a & 0x0F0F;
uint16 x = a ^ 0xFFFF;
";
    let (m, out) = run(src);
    assert_eq!(word(&m, &out, "s"), 0x0200);
    assert_eq!(word(&m, &out, "d"), 0x0001u16.wrapping_sub(0x01FF));
    assert_eq!(word(&m, &out, "m"), 0x010F);
    assert_eq!(word(&m, &out, "x"), 0xFE00);
}

#[test]
fn raw_blocks_run_in_place() {
    let src = "byte a = 3;\ndasm\nLDI #0\nMOV MARL, RA\nMOV MARH, RA\nLDI #42\nMOV M, RA\nendasm\nbyte b = a + 1;";
    let (m, out) = run(src);
    assert_eq!(byte(&m, &out, "a"), 42);
    assert_eq!(byte(&m, &out, "b"), 43);
}

#[test]
fn sieve_finds_primes() {
    let (m, out) = run(include_str!("../arn/bench/sieve.arn"));
    let primes: Vec<u16> = (2..64u16).filter(|n| (2..*n).all(|d| n % d != 0)).collect();

    assert_eq!(usize::from(byte(&m, &out, "primes")), primes.len());
    assert_eq!(word(&m, &out, "total"), primes.iter().sum::<u16>());
}
