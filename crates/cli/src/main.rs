use std::process::ExitCode;

fn main() -> ExitCode {
    salesplan_cli::run()
}
