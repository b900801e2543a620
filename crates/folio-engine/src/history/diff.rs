use serde::{Deserialize, Serialize};

/// Largest LCS table (in cells) built before falling back to an unminimized script
pub const DEFAULT_MAX_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
}

impl DiffLine {
    pub fn added(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Added,
            text: text.into(),
        }
    }

    pub fn removed(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Removed,
            text: text.into(),
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Context,
            text: text.into(),
        }
    }
}

/// Edit script plus whether it is minimal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiff {
    pub lines: Vec<DiffLine>,
    /// False when the input exceeded the table guard and the script is the
    /// plain "remove everything, add everything" fallback
    pub minimized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub context: usize,
}

impl LineDiff {
    pub fn stats(&self) -> DiffStats {
        stats(&self.lines)
    }

    pub fn is_unchanged(&self) -> bool {
        self.lines.iter().all(|line| line.kind == DiffKind::Context)
    }
}

/// Minimal line diff between two snapshots using the default size guard
pub fn diff(old: &str, new: &str) -> Vec<DiffLine> {
    diff_with_limit(old, new, DEFAULT_MAX_CELLS).lines
}

/// Line diff by longest common subsequence.
///
/// Backtracking prefers the neighbour with the larger LCS value and breaks ties
/// toward consuming a line of `new`. When `(m+1)·(n+1)` exceeds `max_cells` no
/// table is built: every old line is emitted as removed, then every new line
/// as added.
pub fn diff_with_limit(old: &str, new: &str, max_cells: usize) -> LineDiff {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let m = old_lines.len();
    let n = new_lines.len();

    let cells = (m + 1).checked_mul(n + 1);
    if cells.is_none_or(|cells| cells > max_cells) {
        log::debug!("Diff of {m}x{n} lines exceeds {max_cells} cells; emitting unminimized script");
        let lines = old_lines
            .iter()
            .map(|line| DiffLine::removed(*line))
            .chain(new_lines.iter().map(|line| DiffLine::added(*line)))
            .collect();
        return LineDiff {
            lines,
            minimized: false,
        };
    }

    let width = n + 1;
    let mut table = vec![0u32; (m + 1) * width];
    for i in 1..=m {
        for j in 1..=n {
            table[i * width + j] = if old_lines[i - 1] == new_lines[j - 1] {
                table[(i - 1) * width + j - 1] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + j - 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old_lines[i - 1] == new_lines[j - 1] {
            lines.push(DiffLine::context(old_lines[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * width + j - 1] >= table[(i - 1) * width + j]) {
            lines.push(DiffLine::added(new_lines[j - 1]));
            j -= 1;
        } else {
            lines.push(DiffLine::removed(old_lines[i - 1]));
            i -= 1;
        }
    }
    lines.reverse();

    LineDiff {
        lines,
        minimized: true,
    }
}

pub fn stats(lines: &[DiffLine]) -> DiffStats {
    lines.iter().fold(DiffStats::default(), |mut stats, line| {
        match line.kind {
            DiffKind::Added => stats.added += 1,
            DiffKind::Removed => stats.removed += 1,
            DiffKind::Context => stats.context += 1,
        }
        stats
    })
}

/// Rebuild the old snapshot from context and removed lines
pub fn old_text(lines: &[DiffLine]) -> String {
    select(lines, DiffKind::Removed)
}

/// Rebuild the new snapshot from context and added lines
pub fn new_text(lines: &[DiffLine]) -> String {
    select(lines, DiffKind::Added)
}

fn select(lines: &[DiffLine], side: DiffKind) -> String {
    lines
        .iter()
        .filter(|line| line.kind == DiffKind::Context || line.kind == side)
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render as `"  "` / `"- "` / `"+ "` prefixed lines
pub fn render_unified(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let prefix = match line.kind {
                DiffKind::Added => "+ ",
                DiffKind::Removed => "- ",
                DiffKind::Context => "  ",
            };
            format!("{prefix}{}", line.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
