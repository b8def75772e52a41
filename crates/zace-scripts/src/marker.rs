//! Marker-line scanning for the script catalog (§4.10).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptMarker {
    Register { id: String, path: String, purpose: String },
    Use { id: String },
}

const REGISTER_PREFIX: &str = "ZACE_SCRIPT_REGISTER|";
const USE_PREFIX: &str = "ZACE_SCRIPT_USE|";

/// Scan `output` line by line for script catalog markers, in order.
pub fn scan_markers(output: &str) -> Vec<ScriptMarker> {
    output.lines().filter_map(parse_marker_line).collect()
}

fn parse_marker_line(line: &str) -> Option<ScriptMarker> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(REGISTER_PREFIX) {
        let mut parts = rest.splitn(3, '|');
        let id = parts.next()?.trim().to_string();
        let path = parts.next()?.trim().to_string();
        let purpose = parts.next().unwrap_or("").trim().to_string();
        if id.is_empty() {
            return None;
        }
        return Some(ScriptMarker::Register { id, path, purpose });
    }
    if let Some(rest) = line.strip_prefix(USE_PREFIX) {
        let id = rest.trim().to_string();
        if id.is_empty() {
            return None;
        }
        return Some(ScriptMarker::Use { id });
    }
    None
}
