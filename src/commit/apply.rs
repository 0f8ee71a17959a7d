use crate::catalog::schema::{ParsedSchema, validate};
use crate::catalog::types::{Document, Row, RowId};
use crate::commit::queue::{Mutation, Predicate, Transform};
use crate::error::TableError;
use crate::snapshot::Snapshot;
use std::collections::BTreeSet;

/// Limits checked while replaying. `max_rows == 0` disables the row cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyLimits<'a> {
    pub table_name: &'a str,
    pub max_rows: usize,
}

/// Replays `mutations` in order on top of `base`.
///
/// Each mutation sees the output of the previous one. Inserted and updated
/// rows are validated against `schema`; the first failure aborts the replay
/// and nothing of it is kept. The returned snapshot has a freshly built
/// index.
pub fn apply_mutations<'m, I>(
    base: Snapshot,
    mutations: I,
    schema: &ParsedSchema,
    limits: ApplyLimits<'_>,
) -> Result<Snapshot, TableError>
where
    I: IntoIterator<Item = &'m Mutation>,
{
    let mut snapshot = base;
    for mutation in mutations {
        apply_mutation(&mut snapshot, mutation, schema)?;
    }
    snapshot.rebuild_index();
    if limits.max_rows > 0 && snapshot.rows.len() > limits.max_rows {
        return Err(TableError::RowLimitExceeded {
            table: limits.table_name.to_string(),
            rows: snapshot.rows.len(),
            limit: limits.max_rows,
        });
    }
    Ok(snapshot)
}

pub fn apply_mutation(
    snapshot: &mut Snapshot,
    mutation: &Mutation,
    schema: &ParsedSchema,
) -> Result<(), TableError> {
    match mutation {
        Mutation::Insert { rows } => apply_insert(snapshot, rows, schema),
        Mutation::UpdateAll {
            predicate,
            transform,
        } => {
            let targets: Vec<usize> = snapshot
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| predicate(row))
                .map(|(pos, _)| pos)
                .collect();
            apply_update(snapshot, &targets, transform, schema)
        }
        Mutation::UpdateById { ids, transform } => {
            let targets = positions_of(snapshot, ids);
            apply_update(snapshot, &targets, transform, schema)
        }
        Mutation::DeleteAll { predicate } => {
            apply_delete(snapshot, predicate);
            Ok(())
        }
        Mutation::DeleteById { ids } => {
            if ids.is_empty() {
                return Ok(());
            }
            let predicate: Predicate = {
                let ids = ids.clone();
                std::sync::Arc::new(move |row: &Row| ids.contains(&row.id))
            };
            apply_delete(snapshot, &predicate);
            Ok(())
        }
    }
}

fn apply_insert(
    snapshot: &mut Snapshot,
    rows: &[Document],
    schema: &ParsedSchema,
) -> Result<(), TableError> {
    validate(schema, rows)?;
    let mut next_id = snapshot.last_id;
    for values in rows {
        next_id = next_id.checked_add(1).ok_or_else(|| TableError::IntegrityError {
            message: "row id space exhausted".into(),
        })?;
        snapshot.index.insert(next_id, snapshot.rows.len());
        snapshot.rows.push(Row::new(next_id, values.clone()));
    }
    snapshot.last_id = next_id;
    Ok(())
}

/// Replaces each targeted row with the transform's output, keeping the
/// original id and position whatever the transform returned.
fn apply_update(
    snapshot: &mut Snapshot,
    targets: &[usize],
    transform: &Transform,
    schema: &ParsedSchema,
) -> Result<(), TableError> {
    for &pos in targets {
        let current = snapshot.rows[pos].clone();
        let id = current.id;
        let mut updated = transform(current);
        updated.id = id;
        schema.validate_document(&updated.values)?;
        snapshot.rows[pos] = updated;
    }
    Ok(())
}

/// Absent ids are skipped.
fn positions_of(snapshot: &Snapshot, ids: &BTreeSet<RowId>) -> Vec<usize> {
    let mut positions: Vec<usize> = ids.iter().filter_map(|id| snapshot.position(*id)).collect();
    positions.sort_unstable();
    positions
}

fn apply_delete(snapshot: &mut Snapshot, predicate: &Predicate) {
    let before = snapshot.rows.len();
    snapshot.rows.retain(|row| !predicate(row));
    if snapshot.rows.len() != before {
        snapshot.rebuild_index();
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplyLimits, apply_mutations};
    use crate::catalog::schema::{ParsedSchema, definition, parse};
    use crate::catalog::types::{Document, Row, Value, document};
    use crate::commit::queue::{Mutation, Target};
    use crate::error::ErrorCode;
    use crate::snapshot::Snapshot;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn schema() -> ParsedSchema {
        parse(&definition([("foo", "String")])).expect("parse")
    }

    fn foo(v: &str) -> Document {
        document([("foo", v)])
    }

    fn insert(values: &[&str]) -> Mutation {
        Mutation::Insert {
            rows: values.iter().map(|v| foo(v)).collect(),
        }
    }

    fn set_foo(v: &'static str) -> Arc<dyn Fn(Row) -> Row + Send + Sync> {
        Arc::new(move |row: Row| row.with("foo", v))
    }

    fn run(base: Snapshot, mutations: &[Mutation]) -> Snapshot {
        apply_mutations(base, mutations, &schema(), ApplyLimits::default()).expect("apply")
    }

    fn seeded(values: &[&str]) -> Snapshot {
        run(Snapshot::default(), &[insert(values)])
    }

    #[test]
    fn inserts_assign_sequential_ids_across_descriptors() {
        let out = run(Snapshot::default(), &[insert(&["a"]), insert(&["b"])]);
        assert_eq!(
            out.rows,
            vec![Row::new(1, foo("a")), Row::new(2, foo("b"))]
        );
        assert_eq!(out.last_id, 2);
        assert_eq!(out.index.into_iter().collect::<Vec<_>>(), vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn delete_by_id_compacts_and_keeps_last_id() {
        let base = seeded(&["a"]);
        let out = run(base, &[Mutation::delete(Target::id(1))]);
        assert!(out.rows.is_empty());
        assert!(out.index.is_empty());
        assert_eq!(out.last_id, 1);
    }

    #[test]
    fn ids_are_not_reused_after_deletes() {
        let base = seeded(&["a", "b", "c"]);
        let out = run(base, &[Mutation::delete(Target::id(3)), insert(&["d"])]);
        assert_eq!(out.rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(out.last_id, 4);
    }

    #[test]
    fn update_preserves_id_and_position_even_if_transform_changes_id() {
        let base = seeded(&["a", "b"]);
        let transform = Arc::new(|row: Row| Row::new(99, row.values).with("foo", "z"));
        let out = run(base, &[Mutation::update(transform, Target::id(1))]);
        assert_eq!(out.rows[0], Row::new(1, foo("z")));
        assert_eq!(out.rows[1], Row::new(2, foo("b")));
        assert_eq!(out.last_id, 2);
        out.verify().expect("consistent");
    }

    #[test]
    fn update_all_sees_row_ids_in_predicate() {
        let base = seeded(&["a", "b", "c"]);
        let out = run(
            base,
            &[Mutation::update(set_foo("z"), Target::filter(|r| r.id >= 2))],
        );
        let values: Vec<_> = out
            .rows
            .iter()
            .map(|r| r.get("foo").and_then(Value::as_str).unwrap_or_default().to_string())
            .collect();
        assert_eq!(values, vec!["a", "z", "z"]);
    }

    #[test]
    fn mutations_compose_in_submission_order() {
        let base = seeded(&["a", "b", "c"]);
        let out = run(
            base,
            &[
                Mutation::update(set_foo("gone"), Target::id(2)),
                Mutation::delete(Target::filter(|r| {
                    r.get("foo").and_then(Value::as_str) == Some("gone")
                })),
                Mutation::update(set_foo("last"), Target::id(3)),
            ],
        );
        assert_eq!(out.rows, vec![Row::new(1, foo("a")), Row::new(3, foo("last"))]);
        assert_eq!(out.position(3), Some(1));
    }

    #[test]
    fn absent_ids_are_skipped() {
        let base = seeded(&["a"]);
        let out = run(
            base.clone(),
            &[
                Mutation::update(set_foo("z"), Target::ids([7, 8])),
                Mutation::delete(Target::id(42)),
            ],
        );
        assert_eq!(out, base);
    }

    #[test]
    fn invalid_update_output_aborts_replay() {
        let base = seeded(&["a"]);
        let bad = Arc::new(|row: Row| row.with("foo", 5_i64));
        let err = apply_mutations(
            base,
            &[Mutation::update(bad, Target::All)],
            &schema(),
            ApplyLimits::default(),
        )
        .expect_err("type mismatch");
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn row_limit_is_enforced_after_replay() {
        let limits = ApplyLimits {
            table_name: "t",
            max_rows: 2,
        };
        let err = apply_mutations(
            Snapshot::default(),
            &[insert(&["a", "b", "c"])],
            &schema(),
            limits,
        )
        .expect_err("limit");
        assert_eq!(err.code(), ErrorCode::RowLimitExceeded);
        apply_mutations(
            Snapshot::default(),
            &[insert(&["a", "b", "c"]), Mutation::delete(Target::id(1))],
            &schema(),
            limits,
        )
        .expect("within limit after delete");
    }

    proptest! {
        #[test]
        fn inserted_ids_continue_from_last_id(
            start in 0u64..10_000,
            batches in prop::collection::vec(1usize..5, 1..6),
        ) {
            let mutations: Vec<Mutation> = batches
                .iter()
                .map(|n| Mutation::Insert { rows: vec![foo("x"); *n] })
                .collect();
            let out = run(Snapshot::empty(start), &mutations);
            let total = batches.iter().sum::<usize>() as u64;
            let ids: Vec<u64> = out.rows.iter().map(|r| r.id).collect();
            let expected: Vec<u64> = (start + 1..=start + total).collect();
            prop_assert_eq!(ids, expected);
            prop_assert_eq!(out.last_id, start + total);
            prop_assert!(out.verify().is_ok());
        }
    }
}
