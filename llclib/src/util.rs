use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// The bundled trace fixtures live alongside the crate
pub const TESTDATA_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata");

pub struct FixturePaths {
    pub config: PathBuf,
    pub trace: PathBuf,
    pub expected: PathBuf,
}

/// Discovers the bundled fixtures. Each is named by its expected-output file,
/// `expect-<trace>-<config>.json`, referring to `<trace>.trace` and
/// `<config>.json` in the same directory.
pub fn get_fixtures() -> Result<Vec<FixturePaths>, Box<dyn Error>> {
    let pattern = Regex::new(r"expect-(?P<trace>[0-9a-zA-Z_]+)-(?P<config>[0-9a-zA-Z_]+)\.json")?;
    let root = Path::new(TESTDATA_PATH);
    let mut entries = fs::read_dir(root)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    let mut fixtures = Vec::new();
    for entry in entries {
        let file_name = entry
            .file_name()
            .into_string()
            .map_err(|name| format!("can't convert OS string ({name:?}) to a standard string"))?;
        let Some(captures) = pattern.captures(&file_name) else {
            continue;
        };
        let trace = captures
            .name("trace")
            .ok_or("couldn't get the trace component of the fixture name")?
            .as_str();
        let config = captures
            .name("config")
            .ok_or("couldn't get the config component of the fixture name")?
            .as_str();
        fixtures.push(FixturePaths {
            config: root.join(format!("{config}.json")),
            trace: root.join(format!("{trace}.trace")),
            expected: entry.path(),
        });
    }
    Ok(fixtures)
}
