use arnc::{assets, cli::suite, config::Config};
use std::path::PathBuf;

#[test]
fn run_suite_test() -> anyhow::Result<()> {
    assert!(suite::run_suite(
        &assets::default_suite_dir(),
        None,
        &Config::default()
    )?);
    Ok(())
}

#[test]
fn run_single_unit() -> anyhow::Result<()> {
    let only = std::ffi::OsString::from("store");
    assert!(suite::run_suite(
        &assets::default_suite_dir(),
        Some(&only),
        &Config::default()
    )?);
    Ok(())
}

#[test]
fn missing_unit_is_an_error() {
    let only = std::ffi::OsString::from("no_such_unit");
    assert!(suite::run_suite(&assets::default_suite_dir(), Some(&only), &Config::default()).is_err());
}

#[test]
#[cfg_attr(not(feature = "big_tests"), ignore)]
fn run_suite_bench() -> anyhow::Result<()> {
    assert!(suite::run_suite(
        &["arn", "bench"].iter().collect::<PathBuf>(),
        None,
        &Config::default()
    )?);
    Ok(())
}
