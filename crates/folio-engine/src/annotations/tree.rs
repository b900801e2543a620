use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::annotations::mark::{Mark, MarkKind, same_marks};

/// Block-level container kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Paragraph,
    Heading(u8),
    ListItem,
    BlockQuote,
}

/// A node of the positioned content tree.
///
/// Positions count characters of text leaves plus one for every [`Node::Break`];
/// elements occupy exactly the span of their children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Element {
        kind: ElementKind,
        children: Vec<Node>,
    },
    Text {
        text: String,
        #[serde(default)]
        marks: Vec<Mark>,
    },
    Break,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: impl IntoIterator<Item = Mark>) -> Self {
        Node::Text {
            text: text.into(),
            marks: marks.into_iter().collect(),
        }
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Element {
            kind: ElementKind::Paragraph,
            children,
        }
    }

    pub fn heading(level: u8, children: Vec<Node>) -> Self {
        Node::Element {
            kind: ElementKind::Heading(level),
            children,
        }
    }

    /// Span length in the flattened position space
    pub fn size(&self) -> usize {
        match self {
            Node::Element { children, .. } => children.iter().map(Node::size).sum(),
            Node::Text { text, .. } => text.chars().count(),
            Node::Break => 1,
        }
    }

    pub fn marks(&self) -> &[Mark] {
        match self {
            Node::Text { marks, .. } => marks,
            Node::Element { .. } | Node::Break => &[],
        }
    }

    /// Text contributed by a leaf; `None` for elements
    pub fn leaf_text(&self) -> Option<&str> {
        match self {
            Node::Text { text, .. } => Some(text),
            Node::Break => Some("\n"),
            Node::Element { .. } => None,
        }
    }
}

/// One edit, expressed in the position space of the document *before* the
/// transaction that carries it.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    InsertText {
        at: usize,
        text: String,
        marks: Vec<Mark>,
    },
    Delete {
        from: usize,
        to: usize,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    /// Strip every mark of `kind` whose identifier is `id`
    RemoveMark {
        from: usize,
        to: usize,
        kind: MarkKind,
        id: String,
    },
}

impl Step {
    fn bounds(&self) -> (usize, usize) {
        match self {
            Step::InsertText { at, .. } => (*at, *at),
            Step::Delete { from, to }
            | Step::AddMark { from, to, .. }
            | Step::RemoveMark { from, to, .. } => (*from, *to),
        }
    }
}

/// An atomic group of steps sharing one fixed position space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    steps: Vec<Step>,
    expected_version: Option<u64>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the transaction unless the document is still at `version`
    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn expected_version(&self) -> Option<u64> {
        self.expected_version
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("Range {from}..{to} is outside the document (size {size})")]
    OutOfBounds { from: usize, to: usize, size: usize },
    #[error("Transaction steps overlap at position {at}")]
    OverlappingSteps { at: usize },
    #[error("Document is at version {actual}, transaction expected {expected}")]
    VersionMismatch { expected: u64, actual: u64 },
    #[error("Suggestion at position {at} covers no text")]
    EmptySuggestion { at: usize },
}

/// Contract with the host editor's document tree.
///
/// The annotation engine only reads the tree and issues transactions; it never
/// owns storage or rendering.
pub trait DocumentTree {
    /// Depth-first pre-order walk, passing each node and its start position
    fn traverse(&self, visit: &mut dyn FnMut(&Node, usize));

    /// Apply every step of `transaction` atomically, returning the new version
    fn apply_edit(&mut self, transaction: Transaction) -> Result<u64, TreeError>;

    fn text_between(&self, from: usize, to: usize) -> String;

    fn size(&self) -> usize;

    /// Document generation, bumped by every applied transaction
    fn version(&self) -> u64;
}

/// In-memory document tree carrying marks on its text leaves
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkedDocument {
    nodes: Vec<Node>,
    version: u64,
}

impl MarkedDocument {
    pub fn new(mut nodes: Vec<Node>) -> Self {
        normalize(&mut nodes);
        Self { nodes, version: 0 }
    }

    /// One paragraph per line, separated by breaks
    pub fn from_text(text: &str) -> Self {
        let mut nodes = Vec::new();
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                nodes.push(Node::Break);
            }
            nodes.push(Node::paragraph(vec![Node::text(line)]));
        }
        Self::new(nodes)
    }

    /// Like `from_text`, for file contents that must be valid UTF-8
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self::from_text(text))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn text(&self) -> String {
        self.text_between(0, self.size())
    }

    fn validate(&self, transaction: &Transaction) -> Result<(), TreeError> {
        if let Some(expected) = transaction.expected_version
            && expected != self.version
        {
            return Err(TreeError::VersionMismatch {
                expected,
                actual: self.version,
            });
        }

        let size = self.size();
        for step in &transaction.steps {
            let (from, to) = step.bounds();
            if from > to || to > size {
                return Err(TreeError::OutOfBounds { from, to, size });
            }
        }

        let mut deletes: Vec<(usize, usize)> = transaction
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Delete { from, to } if from < to => Some((*from, *to)),
                _ => None,
            })
            .collect();
        deletes.sort_unstable();
        for pair in deletes.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(TreeError::OverlappingSteps { at: pair[1].0 });
            }
        }

        for step in &transaction.steps {
            if let Step::InsertText { at, .. } = step
                && deletes.iter().any(|(from, to)| from < at && at < to)
            {
                return Err(TreeError::OverlappingSteps { at: *at });
            }
        }

        Ok(())
    }
}

impl DocumentTree for MarkedDocument {
    fn traverse(&self, visit: &mut dyn FnMut(&Node, usize)) {
        walk(&self.nodes, 0, visit);
    }

    fn apply_edit(&mut self, transaction: Transaction) -> Result<u64, TreeError> {
        self.validate(&transaction)?;

        let mut nodes = self.nodes.clone();
        let mut structural = Vec::new();

        // Mark steps never shift positions, so they run first against the
        // untouched coordinates.
        for (index, step) in transaction.steps.into_iter().enumerate() {
            match step {
                Step::AddMark { from, to, mark } => map_marks(&mut nodes, from, to, &mut |marks| {
                    if !marks.contains(&mark) {
                        marks.push(mark.clone());
                    }
                }),
                Step::RemoveMark { from, to, kind, id } => {
                    map_marks(&mut nodes, from, to, &mut |marks| {
                        marks.retain(|mark| mark.annotation_id(kind) != Some(id.as_str()))
                    })
                }
                step @ (Step::InsertText { .. } | Step::Delete { .. }) => {
                    structural.push((index, step))
                }
            }
        }

        // Highest position first; at equal positions deletes precede inserts
        // and inserts run in reverse so their text ends up in step order.
        structural.sort_by_key(|(index, step)| match step {
            Step::Delete { from, .. } => (Reverse(*from), false, Reverse(*index)),
            Step::InsertText { at, .. } => (Reverse(*at), true, Reverse(*index)),
            Step::AddMark { .. } | Step::RemoveMark { .. } => (Reverse(0), true, Reverse(*index)),
        });

        for (_, step) in structural {
            match step {
                Step::Delete { from, to } => delete_range(&mut nodes, from, to),
                Step::InsertText { at, text, marks } => {
                    if !text.is_empty() {
                        insert_leaf(&mut nodes, at, Node::Text { text, marks });
                    }
                }
                Step::AddMark { .. } | Step::RemoveMark { .. } => {}
            }
        }

        normalize(&mut nodes);
        self.nodes = nodes;
        self.version += 1;
        Ok(self.version)
    }

    fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        self.traverse(&mut |node, pos| {
            let Some(text) = node.leaf_text() else {
                return;
            };
            let end = pos + node.size();
            if end <= from || pos >= to {
                return;
            }
            let lo = from.max(pos) - pos;
            let hi = to.min(end) - pos;
            out.extend(text.chars().skip(lo).take(hi - lo));
        });
        out
    }

    fn size(&self) -> usize {
        self.nodes.iter().map(Node::size).sum()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn walk(nodes: &[Node], start: usize, visit: &mut dyn FnMut(&Node, usize)) {
    let mut pos = start;
    for node in nodes {
        visit(node, pos);
        if let Node::Element { children, .. } = node {
            walk(children, pos, visit);
        }
        pos += node.size();
    }
}

/// Byte offset of the `index`th character, or the string length past the end
fn char_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

fn delete_range(nodes: &mut Vec<Node>, from: usize, to: usize) {
    let mut pos = 0;
    let mut index = 0;
    while index < nodes.len() {
        let start = pos;
        let end = pos + nodes[index].size();
        pos = end;
        if end <= from || start >= to {
            index += 1;
            continue;
        }
        let lo = from.max(start) - start;
        let hi = to.min(end) - start;
        match &mut nodes[index] {
            Node::Text { text, .. } => {
                let range = char_byte(text, lo)..char_byte(text, hi);
                text.replace_range(range, "");
            }
            Node::Element { children, .. } => delete_range(children, lo, hi),
            Node::Break => {
                nodes.remove(index);
                continue;
            }
        }
        index += 1;
    }
}

fn insert_leaf(nodes: &mut Vec<Node>, at: usize, leaf: Node) {
    let mut pos = 0;
    for index in 0..nodes.len() {
        let size = nodes[index].size();
        if at < pos || at > pos + size {
            pos += size;
            continue;
        }
        let tail = match &mut nodes[index] {
            Node::Text { text, marks } => {
                let byte = char_byte(text, at - pos);
                Some(Node::Text {
                    text: text.split_off(byte),
                    marks: marks.clone(),
                })
            }
            Node::Element { children, .. } => {
                insert_leaf(children, at - pos, leaf);
                return;
            }
            Node::Break if at == pos => None,
            Node::Break => {
                pos += size;
                continue;
            }
        };
        match tail {
            Some(tail) => {
                nodes.insert(index + 1, leaf);
                nodes.insert(index + 2, tail);
            }
            None => nodes.insert(index, leaf),
        }
        return;
    }
    nodes.push(leaf);
}

fn map_marks(nodes: &mut Vec<Node>, from: usize, to: usize, f: &mut dyn FnMut(&mut Vec<Mark>)) {
    let mut pos = 0;
    let mut index = 0;
    while index < nodes.len() {
        let start = pos;
        let end = pos + nodes[index].size();
        pos = end;
        if end <= from || start >= to {
            index += 1;
            continue;
        }
        let lo = from.max(start) - start;
        let hi = to.min(end) - start;
        let replacement: Vec<Node> = match &mut nodes[index] {
            Node::Element { children, .. } => {
                map_marks(children, lo, hi, f);
                index += 1;
                continue;
            }
            Node::Break => {
                index += 1;
                continue;
            }
            Node::Text { text, marks } => {
                let after = text.split_off(char_byte(text, hi));
                let middle = text.split_off(char_byte(text, lo));
                let before = std::mem::take(text);
                let mut middle_marks = marks.clone();
                f(&mut middle_marks);
                [
                    (before, marks.clone()),
                    (middle, middle_marks),
                    (after, marks.clone()),
                ]
                .into_iter()
                .filter(|(text, _)| !text.is_empty())
                .map(|(text, marks)| Node::Text { text, marks })
                .collect()
            }
        };
        let count = replacement.len();
        nodes.splice(index..index + 1, replacement);
        index += count;
    }
}

/// Drop empty text leaves and merge neighbours carrying identical marks
fn normalize(nodes: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for mut node in nodes.drain(..) {
        if let Node::Element { children, .. } = &mut node {
            normalize(children);
        }
        if let Node::Text { text, marks } = &node {
            if text.is_empty() {
                continue;
            }
            if let Some(Node::Text {
                text: previous,
                marks: previous_marks,
            }) = merged.last_mut()
                && same_marks(previous_marks, marks)
            {
                previous.push_str(text);
                continue;
            }
        }
        merged.push(node);
    }
    *nodes = merged;
}
