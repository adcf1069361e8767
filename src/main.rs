use arnc::cli::command;
use structopt::StructOpt;

fn main() {
    let cmd = command::CommandRoot::from_args();
    command::terminal_init(cmd.verbose, cmd.debug);
    command::root(cmd);
}
