use serde::{Deserialize, Serialize};

/// Whether a tracked change proposes new text or the removal of existing text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Insert,
    Delete,
}

/// Attribute-bearing annotation attached to a text leaf.
///
/// Formatting marks live alongside annotation marks on the same leaf; only
/// [`Mark::Suggestion`] and [`Mark::Comment`] carry an identifier that the
/// aggregator groups on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mark {
    Suggestion {
        id: String,
        suggestion: SuggestionKind,
        author: String,
    },
    Comment {
        id: String,
    },
    Strong,
    Emphasis,
    Code,
    Link {
        href: String,
    },
}

/// The families of marks that aggregate into annotation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Suggestion,
    Comment,
}

/// Type of an aggregated annotation range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Suggestion(SuggestionKind),
    Comment,
}

impl AnnotationKind {
    pub fn mark_kind(&self) -> MarkKind {
        match self {
            AnnotationKind::Suggestion(_) => MarkKind::Suggestion,
            AnnotationKind::Comment => MarkKind::Comment,
        }
    }
}

impl Mark {
    pub fn insert_suggestion(id: impl Into<String>, author: impl Into<String>) -> Self {
        Mark::Suggestion {
            id: id.into(),
            suggestion: SuggestionKind::Insert,
            author: author.into(),
        }
    }

    pub fn delete_suggestion(id: impl Into<String>, author: impl Into<String>) -> Self {
        Mark::Suggestion {
            id: id.into(),
            suggestion: SuggestionKind::Delete,
            author: author.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Mark::Comment { id: id.into() }
    }

    /// Annotation identifier, if this mark belongs to the given family
    pub fn annotation_id(&self, kind: MarkKind) -> Option<&str> {
        match (self, kind) {
            (Mark::Suggestion { id, .. }, MarkKind::Suggestion) => Some(id),
            (Mark::Comment { id }, MarkKind::Comment) => Some(id),
            (Mark::Suggestion { .. }, MarkKind::Comment)
            | (Mark::Comment { .. }, MarkKind::Suggestion)
            | (Mark::Strong | Mark::Emphasis | Mark::Code | Mark::Link { .. }, _) => None,
        }
    }

    /// Type and author recorded on an annotation mark
    pub fn annotation_meta(&self) -> Option<(AnnotationKind, Option<&str>)> {
        match self {
            Mark::Suggestion {
                suggestion, author, ..
            } => Some((AnnotationKind::Suggestion(*suggestion), Some(author))),
            Mark::Comment { .. } => Some((AnnotationKind::Comment, None)),
            Mark::Strong | Mark::Emphasis | Mark::Code | Mark::Link { .. } => None,
        }
    }
}

/// Compare two mark sets ignoring order
pub(crate) fn same_marks(a: &[Mark], b: &[Mark]) -> bool {
    a.len() == b.len() && a.iter().all(|mark| b.contains(mark))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Mark::insert_suggestion("s1", "Alice"), MarkKind::Suggestion, Some("s1"))]
    #[case(Mark::insert_suggestion("s1", "Alice"), MarkKind::Comment, None)]
    #[case(Mark::comment("c1"), MarkKind::Comment, Some("c1"))]
    #[case(Mark::comment("c1"), MarkKind::Suggestion, None)]
    #[case(Mark::Strong, MarkKind::Suggestion, None)]
    #[case(Mark::Link { href: "https://example.com".into() }, MarkKind::Comment, None)]
    fn test_annotation_id(#[case] mark: Mark, #[case] kind: MarkKind, #[case] expected: Option<&str>) {
        assert_eq!(mark.annotation_id(kind), expected);
    }

    #[test]
    fn test_same_marks_ignores_order() {
        let a = vec![Mark::Strong, Mark::comment("c1")];
        let b = vec![Mark::comment("c1"), Mark::Strong];
        assert!(same_marks(&a, &b));
        assert!(!same_marks(&a, &[Mark::Strong]));
    }

    #[test]
    fn test_mark_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Mark::delete_suggestion("s9", "Bob")).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"suggestion","id":"s9","suggestion":"delete","author":"Bob"}"#
        );
    }
}
