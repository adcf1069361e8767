use arnc::cli::command;
use structopt::StructOpt;

fn main() {
    command::terminal_init(false, false);
    command::compile_only(command::CommandCompileOnly::from_args());
}
