use std::process::ExitCode;

fn main() -> ExitCode {
    listgate_cli::run()
}
