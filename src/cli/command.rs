use super::{report, suite};
use crate::compiler;
use crate::config::{self, Config, OptLevel};
use crate::{assets, common};
use ansi_term::Color::{Green, Red};
use anyhow::Context;
use log::LevelFilter;
use std::convert::TryFrom;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[cfg(windows)]
fn enable_ansi() {
    // Plain output is fine when the console refuses.
    let _ = ansi_term::enable_ansi_support();
}

#[cfg(not(windows))]
fn enable_ansi() {}

/// Set up the terminal and the logger. `--debug` wins over `--verbose`,
/// and `RUST_LOG` wins over both.
pub fn terminal_init(verbose: bool, debug: bool) {
    enable_ansi();

    let level = if debug {
        LevelFilter::Debug
    } else if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .try_init();
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let v = common::parse_numeric(s).map_err(|err| format!("'{}': {}", s, err))?;
    u32::try_from(v).map_err(|_| format!("'{}' is too large", s))
}

#[derive(StructOpt, Debug)]
#[structopt(name = "arnc", about = "Compiler for the ArniComp 8-bit processor")]
pub struct CommandRoot {
    /// Configuration file, read when present.
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(short, long)]
    pub verbose: bool,

    #[structopt(short, long)]
    pub debug: bool,

    #[structopt(subcommand)]
    cmd: Subcommand,
}

#[derive(StructOpt, Debug)]
enum Subcommand {
    Compile(SubcommandCompile),
    Config(SubcommandConfig),
    Validate(SubcommandValidate),
    Info,
    Suite(SubcommandSuite),
}

/// Settings which override the configuration file.
#[derive(StructOpt, Debug, Default)]
struct MemoryOpts {
    #[structopt(long, parse(try_from_str = parse_addr))]
    var_start: Option<u32>,

    #[structopt(long, parse(try_from_str = parse_addr))]
    var_end: Option<u32>,

    #[structopt(long, parse(try_from_str = parse_addr))]
    stack_start: Option<u32>,

    #[structopt(long, parse(try_from_str = parse_addr))]
    stack_size: Option<u32>,

    #[structopt(long, parse(try_from_str = parse_addr))]
    memory_size: Option<u32>,

    #[structopt(long)]
    comment_char: Option<String>,

    #[structopt(short = "O", long)]
    opt_level: Option<OptLevel>,
}

impl MemoryOpts {
    fn apply(&self, config: &mut Config) {
        let fields = [
            (self.var_start, &mut config.variable_start_addr),
            (self.var_end, &mut config.variable_end_addr),
            (self.stack_start, &mut config.stack_start_addr),
            (self.stack_size, &mut config.stack_size),
            (self.memory_size, &mut config.memory_size),
        ];
        for (given, field) in fields {
            if let Some(v) = given {
                *field = v;
            }
        }

        if let Some(comment) = &self.comment_char {
            config.comment_char = comment.clone();
        }
        if let Some(level) = self.opt_level {
            config.optimization_level = level;
        }
    }
}

#[derive(StructOpt, Debug)]
struct SubcommandCompile {
    #[structopt(name = "in.arn", parse(from_os_str))]
    in_src: PathBuf,

    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    #[structopt(flatten)]
    mem: MemoryOpts,

    #[structopt(long)]
    no_stats: bool,
}

#[derive(StructOpt, Debug)]
struct SubcommandConfig {
    #[structopt(long)]
    show: bool,

    #[structopt(long)]
    save: bool,

    /// Start again from the defaults.
    #[structopt(long)]
    reset: bool,

    #[structopt(flatten)]
    mem: MemoryOpts,
}

#[derive(StructOpt, Debug)]
struct SubcommandValidate {
    #[structopt(name = "in.arn", parse(from_os_str))]
    in_src: PathBuf,
}

#[derive(StructOpt, Debug)]
struct SubcommandSuite {
    #[structopt(name = "suite/dir", parse(from_os_str))]
    suite_dir: Option<PathBuf>,

    #[structopt(long, parse(from_os_str))]
    only: Option<OsString>,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "arncc", about = "Compile one ArniComp source file")]
pub struct CommandCompileOnly {
    #[structopt(name = "in.arn", parse(from_os_str))]
    in_src: PathBuf,

    #[structopt(name = "out.asm", parse(from_os_str))]
    out_asm: Option<PathBuf>,
}

fn exit_with(result: anyhow::Result<bool>) -> ! {
    match result {
        Ok(success) => std::process::exit(if success { 0 } else { 1 }),
        Err(err) => {
            eprintln!("{} {:#}", Red.bold().paint("error:"), err);
            std::process::exit(2)
        }
    }
}

fn config_path(cmd: &CommandRoot) -> PathBuf {
    cmd.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE))
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_file_or_default(path)
        .with_context(|| format!("could not load configuration '{}'", path.display()))
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("could not read '{}'", path.display()))
}

/// The source path with its extension swapped, so output lands beside the input.
pub fn default_output(in_src: &Path) -> PathBuf {
    in_src.with_extension(assets::DEFAULT_OUTPUT_EXT)
}

pub fn root(cmd: CommandRoot) -> ! {
    let path = config_path(&cmd);
    let result = load_config(&path).and_then(|mut config| {
        config.verbose |= cmd.verbose;
        config.debug_mode |= cmd.debug;

        match cmd.cmd {
            Subcommand::Compile(scmd) => compile(scmd, config),
            Subcommand::Config(scmd) => configure(scmd, config, &path),
            Subcommand::Validate(scmd) => validate(scmd, &config),
            Subcommand::Info => {
                print!("{}", report::info(&config));
                Ok(true)
            }
            Subcommand::Suite(scmd) => suite::run_suite(
                &scmd.suite_dir.unwrap_or_else(assets::default_suite_dir),
                scmd.only.as_ref(),
                &config,
            ),
        }
    });

    exit_with(result);
}

fn compile(cmd: SubcommandCompile, mut config: Config) -> anyhow::Result<bool> {
    cmd.mem.apply(&mut config);
    if cmd.no_stats {
        config.show_stats = false;
    }
    config.validate()?;

    let source = read_source(&cmd.in_src)?;
    let out_path = cmd.output.unwrap_or_else(|| default_output(&cmd.in_src));

    if config.verbose {
        println!("=== ArniComp Compiler ===");
        println!("Input:  {}", cmd.in_src.display());
        println!("Output: {}", out_path.display());
    }

    let output = match compiler::compile(&source, &config) {
        Ok(output) => output,
        Err(err) => {
            report_failure(&err);
            return Ok(false);
        }
    };

    let text = output.text();
    std::fs::write(&out_path, &text)
        .with_context(|| format!("could not write '{}'", out_path.display()))?;

    if config.show_stats {
        print!("{}", report::stats(&output, source.len(), text.len()));
    }
    println!(
        "{} Output written to: {}",
        Green.bold().paint("Compilation successful!"),
        out_path.display()
    );
    Ok(true)
}

fn report_failure(err: &compiler::Error) {
    eprintln!("{} {}", Red.bold().paint("Compilation failed:"), err);
    if err.is_internal() {
        eprintln!("This is a bug in the code generator, not in the program.");
    }
}

fn configure(cmd: SubcommandConfig, loaded: Config, path: &Path) -> anyhow::Result<bool> {
    let mut config = if cmd.reset { Config::default() } else { loaded };
    cmd.mem.apply(&mut config);
    config.validate()?;

    let write = cmd.save || cmd.reset;
    if write {
        config
            .to_file(path)
            .with_context(|| format!("could not save configuration '{}'", path.display()))?;
        println!("Configuration saved to: {}", path.display());
    }

    if cmd.show || !write {
        println!("{}", config);
    }
    Ok(true)
}

fn validate(cmd: SubcommandValidate, config: &Config) -> anyhow::Result<bool> {
    let source = read_source(&cmd.in_src)?;
    println!("=== Validating {} ===", cmd.in_src.display());

    match compiler::check(&source, config) {
        Ok(program) => {
            println!("{}", Green.bold().paint("Syntax validation passed"));
            println!("  Total lines: {}", source.lines().count());
            println!("  Statements:  {}", program.stmt_count());
            Ok(true)
        }
        Err(err) => {
            report_failure(&err);
            Ok(false)
        }
    }
}

/// The `arncc` entry point: compile with the configuration file (if any)
/// and no report.
pub fn compile_only(cmd: CommandCompileOnly) -> ! {
    let result = load_config(Path::new(config::DEFAULT_CONFIG_FILE)).and_then(|mut config| {
        config.show_stats = false;
        compile(
            SubcommandCompile {
                in_src: cmd.in_src,
                output: cmd.out_asm,
                mem: MemoryOpts::default(),
                no_stats: true,
            },
            config,
        )
    });

    exit_with(result);
}
