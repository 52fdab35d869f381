use similar::TextDiff;

/// Whether a transformation result actually changed the record.
///
/// Engines are free to re-indent or re-order insignificant whitespace, so the
/// comparison runs on a whitespace-normalized view of both documents. An
/// idempotent transformation applied to its own output must come back false.
///
/// The tolerance is line-based and deliberately covers whitespace at line
/// edges inside text nodes too: a change to leading or trailing blanks within
/// a multi-line text value does not count as a change. Interior whitespace on
/// a line is always significant.
pub fn has_changes(original: &str, result: &str) -> bool {
    normalize(original) != normalize(result)
}

/// Render a unified diff of original vs result, labelled with the record uuid.
pub fn unified(original: &str, result: &str, uuid: &str) -> String {
    TextDiff::from_lines(original, result)
        .unified_diff()
        .context_radius(3)
        .header(uuid, uuid)
        .to_string()
}

/// Collapse insignificant whitespace: trim each line, drop blank lines, and
/// join inter-tag boundaries so indentation-only changes disappear.
fn normalize(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    for line in xml.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
