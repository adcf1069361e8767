mod common;

use arnc::compiler::{self, Error};
use arnc::config::Config;

fn fails(src: &str) -> Error {
    match compiler::compile(src, &Config::default()) {
        Ok(out) => panic!("compiled unexpectedly:\n{}", out.text()),
        Err(err) => err,
    }
}

#[test]
fn errors_name_their_phase_and_line() {
    let cases: &[(&str, usize, fn(&Error) -> bool)] = &[
        ("byte a;\n#frobnicate x\n", 2, |e| matches!(e, Error::Preprocess(_))),
        ("byte a;\nbyte b = a $ 1;", 2, |e| matches!(e, Error::Tokenize(_))),
        ("byte a;\n\nbyte b = 5", 3, |e| matches!(e, Error::Parse(_))),
        ("byte a;\nif a == 1\n  a = 2;\n", 3, |e| matches!(e, Error::Parse(_))),
        ("byte a;\nb = 1;", 2, |e| matches!(e, Error::Generate(_))),
        ("byte a;\nbyte a;", 2, |e| matches!(e, Error::Generate(_))),
        ("uint16 w;\nbyte b;\nb = w;", 3, |e| matches!(e, Error::Generate(_))),
        ("byte[4] t;\nt[4] = 1;", 2, |e| matches!(e, Error::Generate(_))),
    ];

    for (src, line, kind) in cases {
        let err = fails(src);
        assert!(kind(&err), "wrong phase for {:?}: {}", src, err);
        assert_eq!(err.line(), Some(*line), "{:?}: {}", src, err);
        assert!(!err.is_internal());
    }
}

#[test]
fn messages_are_readable() {
    let err = fails("byte a;\nb = 1;");
    let msg = err.to_string();
    assert!(msg.starts_with("Compile Error (in Generator)"), "{}", msg);
    assert!(msg.contains("'b'"), "{}", msg);
}

#[test]
fn out_of_memory() {
    let mut cfg = Config::default();
    cfg.variable_end_addr = 0x0010;
    let err = compiler::compile("byte[4] a;\nbyte[4] b;\nbyte c;", &cfg).unwrap_err();
    assert!(matches!(err, Error::Generate(_)));
    assert_eq!(err.line(), Some(3));
}

#[test]
fn bad_comment_markers_are_rejected() {
    for marker in &["", ";", "="] {
        let mut cfg = Config::default();
        cfg.comment_char = String::from(*marker);

        for err in vec![
            compiler::compile("byte a = 1;", &cfg).unwrap_err(),
            compiler::check("byte a = 1;", &cfg).unwrap_err(),
        ] {
            assert!(matches!(err, Error::Config(_)), "{:?}: {}", marker, err);
            assert_eq!(err.line(), None);
            assert!(err.to_string().starts_with("Compile Error (in Configuration)"));
        }
    }
}

#[test]
fn other_comment_markers_work() {
    let mut cfg = Config::default();
    cfg.comment_char = String::from("%");
    let out = common::compile_with("byte a = 1; % a = 2;
% byte b;
byte c = a;", &cfg);
    assert_eq!(out.symbols().len(), 2);
}

#[test]
fn first_error_wins() {
    let err = fails("byte a;\nx = 1;\ny = 2;");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn expression_statements_emit_nothing() {
    let with = common::compile("byte a = 1;\na + 1;");
    let without = common::compile("byte a = 1;");
    assert_eq!(with.lines(), without.lines());
}

#[test]
fn output_is_deterministic() {
    let src = arnc::assets::DEMO_SRC;
    let first = common::compile(src).text();
    let second = common::compile(src).text();
    assert_eq!(first, second);
}

#[test]
fn demo_has_expected_shape() {
    let out = arnc::assets::demo().unwrap();
    assert!(out.stats.instructions > 0);
    assert_eq!(common::count(out, "while_1:"), 1);
    assert_eq!(common::count(out, "while_2:"), 1);
    assert_eq!(common::count(out, "if_1:"), 1);
    assert!(out.stats.memory_percent() > 0.0);
}

#[test]
fn demo_runs() {
    let (m, out) = common::run(arnc::assets::DEMO_SRC);
    let table: Vec<u8> = (0..5).map(|i| i + 40).collect();
    let sum: u16 = table.iter().map(|v| u16::from(*v)).sum();

    assert_eq!(common::word(&m, &out, "total"), sum);
    assert_eq!(u16::from(common::byte(&m, &out, "sum")), sum);
    // 210 is above the limit of 200.
    assert_eq!(common::byte(&m, &out, "flags"), 1);
    assert_eq!(m.mem[0x0180], 1);
}
