// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use folio_engine::annotations::{Mark, MarkedDocument, Node};

#[allow(dead_code)]
pub fn generate_note(lines: usize) -> String {
    (0..lines)
        .map(|i| match i % 4 {
            0 => format!("# Section {i}"),
            1 => format!("Paragraph {i} with some content."),
            2 => format!("- Bullet point {i}"),
            _ => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Same note with every `every`-th line rewritten
#[allow(dead_code)]
pub fn edit_every(text: &str, every: usize) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i % every == 0 {
                format!("{line} (edited)")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Document with `paragraphs` paragraphs, each holding a suggestion split
/// over two fragments by a bold run
#[allow(dead_code)]
pub fn generate_suggested_document(paragraphs: usize) -> MarkedDocument {
    let mut nodes = Vec::new();
    for i in 0..paragraphs {
        if i > 0 {
            nodes.push(Node::Break);
        }
        let suggestion = Mark::insert_suggestion(format!("s{i}"), "Alice");
        nodes.push(Node::paragraph(vec![
            Node::text("Plain lead-in text "),
            Node::marked("suggested ", [suggestion.clone()]),
            Node::marked("bold", [suggestion, Mark::Strong]),
            Node::text(" and a tail."),
        ]));
    }
    MarkedDocument::new(nodes)
}
