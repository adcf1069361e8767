use crate::assets;
use crate::compiler::{self, Output};
use crate::config::Config;
use ansi_term::Color::{Green, Red};
use anyhow::{anyhow, Context};
use derive_more::Constructor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Units named with this prefix must be rejected by the compiler.
const EXPECT_FAILURE_PREFIX: &str = "fail_";

#[derive(Constructor)]
struct UnitSrc {
    name: OsString,
    src: PathBuf,
    golden: Option<PathBuf>,
}

enum Verdict {
    Pass(String),
    Fail(String),
}

impl UnitSrc {
    fn expects_failure(&self) -> bool {
        self.name
            .to_string_lossy()
            .starts_with(EXPECT_FAILURE_PREFIX)
    }

    fn compile(&self, config: &Config) -> anyhow::Result<Result<Output, compiler::Error>> {
        let source = std::fs::read_to_string(&self.src)
            .with_context(|| format!("could not read '{}'", self.src.display()))?;
        Ok(compiler::compile(&source, config))
    }

    fn check_golden(&self, output: &Output) -> anyhow::Result<Option<String>> {
        let golden = match &self.golden {
            None => return Ok(None),
            Some(golden) => golden,
        };

        let expected = std::fs::read_to_string(golden)
            .with_context(|| format!("could not read '{}'", golden.display()))?;
        let actual = output.text();
        let mismatch = expected
            .lines()
            .map(str::trim_end)
            .zip(actual.lines())
            .position(|(e, a)| e != a)
            .or_else(|| {
                let (ne, na) = (expected.lines().count(), actual.lines().count());
                if ne == na {
                    None
                } else {
                    Some(ne.min(na))
                }
            });

        Ok(mismatch.map(|line| format!("output differs from golden file at line {}", line + 1)))
    }

    fn run(&self, config: &Config) -> anyhow::Result<Verdict> {
        let start = Instant::now();
        let result = self.compile(config)?;
        let elapsed = start.elapsed().as_micros();

        Ok(match (result, self.expects_failure()) {
            (Err(err), true) => Verdict::Pass(format!("rejected: {}", err)),
            (Err(err), false) => Verdict::Fail(format!(
                "{}:\n\t{}",
                Red.bold().paint("FAIL: COMPILE ERROR"),
                err.to_string().replace("\n", "\n\t")
            )),
            (Ok(_), true) => {
                Verdict::Fail(Red.bold().paint("FAIL: COMPILED BUT SHOULD NOT").to_string())
            }
            (Ok(output), false) => match self.check_golden(&output)? {
                Some(msg) => Verdict::Fail(format!("{}: {}", Red.bold().paint("FAIL: GOLDEN"), msg)),
                None => Verdict::Pass(format!(
                    "{:5} insts {: >6}μs",
                    output.stats.instructions, elapsed
                )),
            },
        })
    }
}

fn find_unit(path: &Path) -> Option<UnitSrc> {
    if !path
        .extension()
        .map_or(false, |ext| ext == assets::DEFAULT_SOURCE_EXT)
    {
        return None;
    }

    let golden = path.with_extension(assets::DEFAULT_OUTPUT_EXT);
    Some(UnitSrc::new(
        path.file_stem()?.to_owned(),
        path.to_owned(),
        Some(golden).filter(|g| g.exists()),
    ))
}

fn find_units(suite_dir: &Path) -> anyhow::Result<Vec<UnitSrc>> {
    let entries = suite_dir
        .read_dir()
        .with_context(|| format!("could not read suite directory '{}'", suite_dir.display()))?;

    let mut units = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            units.extend(find_unit(&entry.path()));
        }
    }
    Ok(units)
}

/// Compile every unit in `suite_dir` and report the result of each.
pub fn run_suite(suite_dir: &Path, only_this: Option<&OsString>, config: &Config) -> anyhow::Result<bool> {
    let all_units = find_units(suite_dir)?;

    let mut selected_units = match only_this {
        None => all_units,
        Some(only_this) => vec![all_units
            .into_iter()
            .find(|unit| &unit.name == only_this)
            .ok_or_else(|| anyhow!("no unit named '{}'", only_this.to_string_lossy()))?],
    };

    selected_units.sort_unstable_by(|unit1, unit2| unit1.name.cmp(&unit2.name));

    let name = suite_dir
        .file_name()
        .unwrap_or_else(|| suite_dir.as_os_str())
        .to_string_lossy();
    run_units(&name, config, &selected_units)
}

fn run_units(name: &str, config: &Config, units: &[UnitSrc]) -> anyhow::Result<bool> {
    let name_pad = units.iter().map(|unit| unit.name.len()).max().unwrap_or(0);

    println!("Running suite: '{}' ({} units)", name, units.len());
    println!("{:-<line_len$}", "", line_len = name_pad + 45);

    let mut passes = 0;
    for (num, unit) in units.iter().enumerate() {
        let (success, msg) = match unit.run(config)? {
            Verdict::Pass(detail) => (true, format!("{} {}", Green.bold().paint("PASS"), detail)),
            Verdict::Fail(msg) => (false, msg),
        };

        println!(
            "Unit {:2}: {:name_pad$}  {}",
            num + 1,
            unit.name.to_string_lossy(),
            msg,
            name_pad = name_pad
        );
        if success {
            passes += 1;
        }
    }
    let success = passes == units.len();

    println!("{:-<line_len$}", "", line_len = name_pad + 45);
    println!(
        "Suite Result: {}, {}/{} passes",
        if success {
            Green.bold().paint("SUCCESS")
        } else {
            Red.bold().paint("FAILED")
        },
        passes,
        units.len()
    );

    Ok(success)
}
