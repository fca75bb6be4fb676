use std::path::Path;
use vireo_engine::cli::CliOverrides;
use vireo_engine::config::DEFAULT_CONFIG_PATH;
use vireo_engine::run_with_overrides;

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    let config_path = cli.config_path().unwrap_or(Path::new(DEFAULT_CONFIG_PATH)).to_path_buf();
    if let Err(err) = run_with_overrides(&config_path, cli.into_config_overrides()) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}
