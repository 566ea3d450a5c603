//! Runs the CLI over every program in the samples directory, comparing its
//! output with the expectation in the header of each file.

use libtest_mimic::{Arguments, Failed, Trial};
use std::path::{Path, PathBuf};
use std::process::Command;

enum Expectation {
    /// The printed result of a successful run.
    Value(String),
    /// Part of the diagnostics of a failed run.
    Error(String),
}

fn extract_expectation(source: &str) -> Option<Expectation> {
    source.lines().find_map(|line| {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("-- expect:") {
            Some(Expectation::Value(value.trim().to_owned()))
        } else if let Some(error) = line.strip_prefix("-- expect-error:") {
            Some(Expectation::Error(error.trim().to_owned()))
        } else {
            None
        }
    })
}

fn sample_files(dir: &Path) -> Vec<PathBuf> {
    let mut paths = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "snesl"))
        .collect::<Vec<_>>();
    paths.sort();
    paths
}

fn run_sample(path: &Path) -> Result<(), Failed> {
    let source = std::fs::read_to_string(path).map_err(|error| error.to_string())?;
    let expectation = extract_expectation(&source).ok_or("missing `-- expect` header")?;

    let output = Command::new(env!("CARGO_BIN_EXE_snesl"))
        .arg("run")
        .arg("--cross-check")
        .arg(path)
        .env("RUST_LOG", "off")
        .output()
        .map_err(|error| error.to_string())?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match expectation {
        Expectation::Value(expected) => {
            if !output.status.success() {
                return Err(format!("run failed:\n{}", stderr).into());
            }
            match stdout.lines().last().map(str::trim) {
                Some(found) if found == expected => Ok(()),
                found => Err(format!("expected `{}`, found `{:?}`", expected, found).into()),
            }
        }
        Expectation::Error(expected) => {
            if output.status.success() {
                return Err(format!("expected failure, but printed:\n{}", stdout).into());
            }
            match stderr.contains(&expected) {
                true => Ok(()),
                false => Err(format!("expected `{}` in:\n{}", expected, stderr).into()),
            }
        }
    }
}

fn main() {
    let args = Arguments::from_args();

    let samples_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../samples");
    let tests = sample_files(&samples_dir)
        .into_iter()
        .map(|path| {
            let name = path.file_stem().unwrap().to_string_lossy().into_owned();
            Trial::test(name, move || run_sample(&path))
        })
        .collect();

    libtest_mimic::run(&args, tests).exit();
}
