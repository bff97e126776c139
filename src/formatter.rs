use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // a line break followed by "<digits>." or "•"
    static ref SECTION_BREAK: Regex = Regex::new(r"\n\d+\.|\n•").expect("section pattern is valid");
}

/// Restructure a generated answer into `## heading` sections.
///
/// The answer is cut at every numbered or bulleted line; each non-empty
/// piece becomes one section whose first line is the heading (without a
/// trailing colon) and whose remaining lines are the body. Input without
/// any list markers comes back as a single section.
pub fn format_answer(generated: &str) -> String {
    SECTION_BREAK
        .split(generated)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .map(format_section)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_section(section: &str) -> String {
    let (first_line, body) = section.split_once('\n').unwrap_or((section, ""));
    // an existing markdown heading is kept as is rather than nested
    let heading = first_line.trim_start_matches('#').trim().trim_end_matches(':');
    format!("## {heading}\n{body}\n")
}
