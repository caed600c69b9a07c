use std::process::ExitCode;

fn main() -> ExitCode {
    goalboard_cli::run()
}
