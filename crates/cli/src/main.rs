use std::process::ExitCode;

fn main() -> ExitCode {
    salonbook_cli::run()
}
