//! TSV serialization of the script catalog registry file (§4.10).

use std::collections::HashMap;

use zace_core::types::ScriptMetadata;

const HEADER: &str = "id\tpath\tpurpose\tlast_touched_step\ttimes_used";

fn scrub(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// Serialize the catalog sorted by id, with tabs/newlines scrubbed from
/// every field.
pub fn serialize_tsv(catalog: &HashMap<String, ScriptMetadata>) -> String {
    let mut ids: Vec<&String> = catalog.keys().collect();
    ids.sort();

    let mut out = String::from(HEADER);
    out.push('\n');
    for id in ids {
        let entry = &catalog[id];
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            scrub(&entry.id),
            scrub(&entry.path),
            scrub(&entry.purpose),
            entry.last_touched_step,
            entry.times_used
        ));
    }
    out
}

/// Parse a previously serialized TSV registry, tolerating a missing or
/// mismatched header.
pub fn parse_tsv(content: &str) -> HashMap<String, ScriptMetadata> {
    let mut catalog = HashMap::new();
    for line in content.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            continue;
        }
        let (Ok(last_touched_step), Ok(times_used)) = (fields[3].parse(), fields[4].parse()) else {
            continue;
        };
        let entry = ScriptMetadata {
            id: fields[0].to_string(),
            path: fields[1].to_string(),
            purpose: fields[2].to_string(),
            last_touched_step,
            times_used,
        };
        catalog.insert(entry.id.clone(), entry);
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashMap<String, ScriptMetadata> {
        let mut catalog = HashMap::new();
        catalog.insert(
            "fmt".to_string(),
            ScriptMetadata { id: "fmt".into(), path: "scripts/fmt.sh".into(), purpose: "formats".into(), last_touched_step: 3, times_used: 5 },
        );
        catalog.insert(
            "build".to_string(),
            ScriptMetadata { id: "build".into(), path: "scripts/build.sh".into(), purpose: "builds".into(), last_touched_step: 1, times_used: 2 },
        );
        catalog
    }

    #[test]
    fn serialize_sorts_by_id() {
        let tsv = serialize_tsv(&sample());
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("build\t"));
        assert!(lines[2].starts_with("fmt\t"));
    }

    #[test]
    fn scrubs_tabs_and_newlines_from_fields() {
        let mut catalog = HashMap::new();
        catalog.insert(
            "x".to_string(),
            ScriptMetadata { id: "x".into(), path: "a\tb".into(), purpose: "line1\nline2".into(), last_touched_step: 0, times_used: 0 },
        );
        let tsv = serialize_tsv(&catalog);
        assert_eq!(tsv.lines().count(), 2);
        assert!(!tsv.lines().nth(1).unwrap().contains('\n'));
    }

    #[test]
    fn round_trips_through_parse() {
        let catalog = sample();
        let tsv = serialize_tsv(&catalog);
        let parsed = parse_tsv(&tsv);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["fmt"].times_used, 5);
    }

    #[test]
    fn parse_ignores_malformed_rows() {
        let content = format!("{HEADER}\nnot-enough-fields\nfmt\tscripts/fmt.sh\tformats\t3\t5");
        let parsed = parse_tsv(&content);
        assert_eq!(parsed.len(), 1);
    }
}
