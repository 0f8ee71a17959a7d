use crate::catalog::types::Row;
use crate::commit::queue::Target;
use crate::snapshot::Snapshot;

/// Rows of `snapshot` selected by `target`.
///
/// Predicate targets keep storage order. Id targets go through the index and
/// come back in the order the ids were given; ids not present are skipped,
/// repeated ids yield the row repeatedly.
pub fn select(snapshot: &Snapshot, target: &Target) -> Vec<Row> {
    match target {
        Target::All => snapshot.rows.clone(),
        Target::Where(predicate) => snapshot
            .rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect(),
        Target::Ids(ids) => ids
            .iter()
            .filter_map(|id| snapshot.get(*id))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::select;
    use crate::catalog::types::{Row, Value, document};
    use crate::commit::queue::Target;
    use crate::snapshot::Snapshot;

    fn snapshot() -> Snapshot {
        Snapshot::from_rows(
            vec![
                Row::new(1, document([("row", "row1")])),
                Row::new(2, document([("row", "row2")])),
                Row::new(3, document([("row", "row3")])),
            ],
            3,
        )
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter()
            .filter_map(|r| r.get("row").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn all_returns_every_row_in_storage_order() {
        let snap = snapshot();
        assert_eq!(select(&snap, &Target::All), snap.rows);
    }

    #[test]
    fn predicate_preserves_storage_order() {
        let snap = snapshot();
        let rows = select(&snap, &Target::filter(|r| r.id != 2));
        assert_eq!(names(&rows), vec!["row1", "row3"]);
    }

    #[test]
    fn ids_follow_supplied_order_and_skip_missing() {
        let snap = snapshot();
        let rows = select(&snap, &Target::ids([3, 9, 1]));
        assert_eq!(names(&rows), vec!["row3", "row1"]);
        let rows = select(&snap, &Target::id(2));
        assert_eq!(names(&rows), vec!["row2"]);
    }
}
