use chrono::{DateTime, NaiveDate, TimeZone};

use crate::history::Commit;

/// Commits made on one local calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub label: String,
    pub date: NaiveDate,
    pub commits: Vec<Commit>,
}

/// Bucket a newest-first commit list by local calendar date.
///
/// Dates are taken in the time zone of `now`. Buckets appear in the order
/// they are first encountered and keep the commit order within them; labels
/// are `"Today"`, `"Yesterday"`, or e.g. `"Monday, October 19, 2026"`.
pub fn group_by_day<Tz: TimeZone>(commits: &[Commit], now: &DateTime<Tz>) -> Vec<DayGroup> {
    let zone = now.timezone();
    let today = now.date_naive();
    let mut groups: Vec<DayGroup> = Vec::new();

    for commit in commits {
        let date = commit.date.with_timezone(&zone).date_naive();
        match groups.iter_mut().find(|group| group.date == date) {
            Some(group) => group.commits.push(commit.clone()),
            None => groups.push(DayGroup {
                label: day_label(date, today),
                date,
                commits: vec![commit.clone()],
            }),
        }
    }

    groups
}

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %B %-d, %Y").to_string()
    }
}
