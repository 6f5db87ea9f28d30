use std::process::ExitCode;

fn main() -> ExitCode {
    cartwise_cli::run()
}
