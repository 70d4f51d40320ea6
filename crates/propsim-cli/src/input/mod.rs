pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;
use tracing::debug;

/// Load a typed input from `--input <file>`, falling back to piped stdin.
pub fn load<T: DeserializeOwned>(
    path: Option<&str>,
    command: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        debug!(path, command, "reading input file");
        file::read_input(path)
    } else if let Some(data) = stdin::read_stdin()? {
        debug!(command, "read input from stdin");
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json|file.yaml> or stdin required for {}", command).into())
    }
}
