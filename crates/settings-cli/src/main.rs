use std::process;

fn main() {
    settings_cli::init_tracing();
    match settings_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("settings-engine error: {err:#}");
            process::exit(2);
        }
    }
}
