use std::process::ExitCode;

fn main() -> ExitCode {
    rsnapshot_once::cli::run()
}
