use std::process::ExitCode;

fn main() -> ExitCode {
    match pathZoom::runner::run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
