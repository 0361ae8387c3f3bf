use std::cmp::Ordering;

use logsift_types::{ExportRow, SortPolicy, Summary, SummaryEntry};

/// Render a summary as ordered table rows
///
/// Sorting is stable over the summary's first-occurrence order, so equal
/// rows keep the order they first appeared in.
pub fn project(summary: &Summary, policy: SortPolicy) -> Vec<ExportRow> {
    let mut entries: Vec<&SummaryEntry> = summary.entries().iter().collect();
    match policy {
        SortPolicy::CountDesc => entries.sort_by(|a, b| b.count.cmp(&a.count)),
        SortPolicy::FirstOccurrence => {}
        SortPolicy::Severity => entries.sort_by(|a, b| by_severity(a, b)),
    }

    entries.into_iter().map(to_row).collect()
}

fn by_severity(a: &SummaryEntry, b: &SummaryEntry) -> Ordering {
    b.key
        .error_type
        .rank()
        .cmp(&a.key.error_type.rank())
        .then_with(|| b.count.cmp(&a.count))
}

fn to_row(entry: &SummaryEntry) -> ExportRow {
    ExportRow {
        error_type: entry.key.error_type,
        sub_tag: entry.key.sub_tag.clone(),
        count: entry.count,
        first_occurrence: entry.first_occurrence,
        example_message: entry.sample_messages.first().cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_types::{ErrorKey, ErrorType, LineRange};

    fn summary_with(counts: &[(ErrorType, usize)]) -> Summary {
        let mut summary = Summary::new();
        for (line, (error_type, count)) in counts.iter().enumerate() {
            let key = ErrorKey::new(*error_type, None);
            let entry = summary.entry_or_insert_with(&key, || {
                SummaryEntry::new(key.clone(), LineRange::single(line + 1))
            });
            entry.count = *count;
            entry.sample_messages.push(format!("{error_type} sample"));
        }
        summary
    }

    fn types(rows: &[ExportRow]) -> Vec<ErrorType> {
        rows.iter().map(|r| r.error_type).collect()
    }

    #[test]
    fn test_count_desc() {
        let summary = summary_with(&[
            (ErrorType::Error, 3),
            (ErrorType::Warning, 10),
            (ErrorType::Unknown, 1),
        ]);
        let rows = project(&summary, SortPolicy::CountDesc);
        assert_eq!(
            types(&rows),
            vec![ErrorType::Warning, ErrorType::Error, ErrorType::Unknown]
        );
        assert_eq!(rows[0].example_message, "WARNING sample");
        assert_eq!(rows[0].first_occurrence, LineRange::single(2));
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let summary = summary_with(&[
            (ErrorType::Info, 2),
            (ErrorType::Error, 5),
            (ErrorType::Warning, 2),
        ]);
        let rows = project(&summary, SortPolicy::CountDesc);
        assert_eq!(
            types(&rows),
            vec![ErrorType::Error, ErrorType::Info, ErrorType::Warning]
        );
    }

    #[test]
    fn test_first_occurrence_and_severity() {
        let summary = summary_with(&[
            (ErrorType::Info, 9),
            (ErrorType::Unknown, 4),
            (ErrorType::Fatal, 1),
        ]);
        assert_eq!(
            types(&project(&summary, SortPolicy::FirstOccurrence)),
            vec![ErrorType::Info, ErrorType::Unknown, ErrorType::Fatal]
        );
        assert_eq!(
            types(&project(&summary, SortPolicy::Severity)),
            vec![ErrorType::Fatal, ErrorType::Info, ErrorType::Unknown]
        );
    }

    #[test]
    fn test_stable_across_calls() {
        let summary = summary_with(&[(ErrorType::Error, 1), (ErrorType::Warning, 1)]);
        assert_eq!(
            project(&summary, SortPolicy::default()),
            project(&summary, SortPolicy::default())
        );
    }
}
