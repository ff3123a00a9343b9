// src/utils/debug.rs
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::extractors::SectionMatch;
use crate::utils::error::StorageError;

/// Writes `text` with a marker line at each section boundary, so a reviewer
/// can see where every span starts and stops.
pub fn save_annotated_text(text: &str, path: &Path, matches: &[&SectionMatch]) -> Result<(), StorageError> {
    let mut file = File::create(path)?;
    file.write_all(annotate(text, matches).as_bytes())?;
    tracing::info!("Saved annotated text to {}", path.display());
    Ok(())
}

/// Boundary markers interleaved with the text. Spans may overlap, so each
/// boundary is an independent insertion point; at the same offset an end
/// marker comes before a start marker.
pub fn annotate(text: &str, matches: &[&SectionMatch]) -> String {
    let mut markers: Vec<(usize, u8, String)> = Vec::with_capacity(matches.len() * 2);
    for m in matches {
        let mut flags = Vec::new();
        if m.heuristic_only {
            flags.push("heuristic");
        }
        if m.low_confidence {
            flags.push("low-confidence");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" {}", flags.join(","))
        };
        markers.push((
            m.start,
            1,
            format!("\n<<<BEGIN {} tier={} heading=\"{}\"{}>>>\n", m.section, m.tier, m.heading, flags),
        ));
        markers.push((m.end, 0, format!("\n<<<END {}>>>\n", m.section)));
    }
    markers.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut annotated = String::with_capacity(text.len() + markers.len() * 48);
    let mut last_pos = 0;
    for (pos, _, marker) in markers {
        // Offsets come from the same text; anything else is skipped, not sliced.
        if pos < last_pos || pos > text.len() || !text.is_char_boundary(pos) {
            continue;
        }
        annotated.push_str(&text[last_pos..pos]);
        annotated.push_str(&marker);
        last_pos = pos;
    }
    annotated.push_str(&text[last_pos..]);
    annotated
}
