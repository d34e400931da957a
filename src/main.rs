use std::process::ExitCode;

fn main() -> ExitCode {
    httest::entry::run()
}
