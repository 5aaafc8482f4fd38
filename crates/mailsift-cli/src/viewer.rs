//! Static HTML page showing where each extracted value came from.

use crate::error::Result;
use mailsift_domain::CanonicalRecord;
use mailsift_extractor::Highlight;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Byte offset of every char boundary, plus the end of the text.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Render the viewer page.
///
/// Spans are character offsets. Spans past the end of `document` and spans
/// overlapping an earlier one are listed in the table but not marked.
pub fn render_html(document: &str, highlights: &[Highlight], record: &CanonicalRecord) -> String {
    let boundaries = char_boundaries(document);
    let char_len = boundaries.len() - 1;

    let mut ordered: Vec<(usize, &Highlight)> = highlights.iter().enumerate().collect();
    ordered.sort_by_key(|(_, h)| (h.span.start, h.span.end));

    let mut highlighted = String::new();
    let mut cursor = 0usize;
    for (index, h) in &ordered {
        let (start, end) = (h.span.start, h.span.end);
        if end > char_len || start >= end || start < cursor {
            debug!("Skipping span {}..{} for {}", start, end, h.class_label);
            continue;
        }
        if start > cursor {
            highlighted.push_str(&html_escape(&document[boundaries[cursor]..boundaries[start]]));
        }
        highlighted.push_str(&format!(
            r#"<mark id="hl-{index}" class="{class}" title="{class} [{start}..{end}]">{segment}</mark>"#,
            index = index,
            class = html_escape(&h.class_label),
            start = start,
            end = end,
            segment = html_escape(&document[boundaries[start]..boundaries[end]]),
        ));
        cursor = end;
    }
    if cursor < char_len {
        highlighted.push_str(&html_escape(&document[boundaries[cursor]..]));
    }

    let mut html = String::new();
    html.push_str(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8" />
<title>mailsift</title>
<style>
body { font-family: system-ui, sans-serif; margin: 20px; }
table { border-collapse: collapse; width: 100%; margin-bottom: 16px; }
th, td { padding: 6px 8px; border-bottom: 1px solid #ddd; text-align: left; }
tr.row:hover { background: #f6f6f6; cursor: pointer; }
mark { background: #fffb8f; padding: 0 2px; border-radius: 2px; }
.code { white-space: pre-wrap; border: 1px solid #eee; padding: 12px; border-radius: 8px; }
</style>
<script>
function jumpTo(id) {
  const el = document.getElementById(id);
  if (el) { el.scrollIntoView({ behavior: 'smooth', block: 'center' }); }
}
</script>
</head>
<body>
"#,
    );

    html.push_str(&format!(
        "<h1>{}</h1>\n<p>{} &middot; {}</p>\n<p>{}</p>\n",
        html_escape(&record.subject),
        html_escape(&record.sender),
        html_escape(record.importance.as_str()),
        html_escape(&record.summary),
    ));

    html.push_str("<table>\n<thead><tr><th>Class</th><th>Text</th><th>Span</th></tr></thead>\n<tbody>\n");
    for (index, h) in &ordered {
        html.push_str(&format!(
            r#"<tr class="row" onclick="jumpTo('hl-{index}')"><td>{class}</td><td>{text}</td><td>[{start}..{end}]</td></tr>"#,
            index = index,
            class = html_escape(&h.class_label),
            text = html_escape(&h.text),
            start = h.span.start,
            end = h.span.end,
        ));
        html.push('\n');
    }
    html.push_str("</tbody>\n</table>\n<div class=\"code\">");
    html.push_str(&highlighted);
    html.push_str("</div>\n</body>\n</html>\n");

    html
}

/// Write the viewer page to `path`.
pub fn write_viewer(
    path: &Path,
    document: &str,
    highlights: &[Highlight],
    record: &CanonicalRecord,
) -> Result<()> {
    info!("Writing HTML viewer: {}", path.display());
    let mut file = File::create(path)?;
    file.write_all(render_html(document, highlights, record).as_bytes())?;
    Ok(())
}
