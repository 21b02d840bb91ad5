//! Request input.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use stratus_protocol::BrokerRequest;

/// Marker accepted by `--request` for standard input.
pub const STDIN_MARKER: &str = "-";

/// Read a request from `source`, a file path or `-` for stdin.
pub fn read_request(source: &str) -> Result<BrokerRequest> {
    if source == STDIN_MARKER {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read request from stdin")?;
        return parse_request(&raw).context("Invalid request on stdin");
    }

    let path = Path::new(source);
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    parse_request(&raw).with_context(|| format!("Invalid request {}", path.display()))
}

/// Parse a request document. Blank input is an empty request.
pub fn parse_request(raw: &str) -> Result<BrokerRequest> {
    if raw.trim().is_empty() {
        return Ok(BrokerRequest::default());
    }
    Ok(serde_json::from_str(raw)?)
}
