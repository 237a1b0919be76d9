pub mod debug_data;
pub mod layout;
pub mod lower_wi;
pub mod merge;

use std::path::Path;
use std::process;

use genlower::diagnostic::Diagnostic;
use genlower::target::TargetConfig;

fn report_and_exit(diag: &Diagnostic) -> ! {
    eprintln!("error: {}", diag.message);
    for note in &diag.notes {
        eprintln!("note: {}", note);
    }
    if let Some(help) = &diag.help {
        eprintln!("help: {}", help);
    }
    process::exit(1);
}

/// Resolve `--target`: a built-in platform name, a name under `targets/`, or
/// a path to a `.toml` file.
pub fn load_target(name: &str) -> TargetConfig {
    let result = if name.ends_with(".toml") {
        TargetConfig::load(Path::new(name))
    } else {
        TargetConfig::resolve(name)
    };
    match result {
        Ok(config) => {
            tracing::debug!(target = %config.name, grf = config.grf_size, "target loaded");
            config
        }
        Err(diag) => report_and_exit(&diag),
    }
}

pub fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Write `text` to `output`, or stdout when none is given.
pub fn write_output(output: Option<&Path>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
}
