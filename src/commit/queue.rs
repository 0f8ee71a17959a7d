use crate::catalog::schema::{ParsedSchema, validate};
use crate::catalog::types::{Document, Row, RowId};
use crate::error::TableError;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub type Predicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;
pub type Transform = Arc<dyn Fn(Row) -> Row + Send + Sync>;

/// Selects the rows an update, delete or query applies to.
#[derive(Clone, Default)]
pub enum Target {
    #[default]
    All,
    Where(Predicate),
    /// Explicit ids. Queries return rows in this order; updates and deletes
    /// treat it as a set.
    Ids(Vec<RowId>),
}

impl Target {
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        Target::Where(Arc::new(predicate))
    }

    pub fn id(id: RowId) -> Self {
        Target::Ids(vec![id])
    }

    pub fn ids(ids: impl IntoIterator<Item = RowId>) -> Self {
        Target::Ids(ids.into_iter().collect())
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Target::All => true,
            Target::Where(predicate) => predicate(row),
            Target::Ids(ids) => ids.contains(&row.id),
        }
    }

    fn into_predicate(self) -> Result<Predicate, BTreeSet<RowId>> {
        match self {
            Target::All => Ok(Arc::new(|_: &Row| true)),
            Target::Where(predicate) => Ok(predicate),
            Target::Ids(ids) => Err(ids.into_iter().collect()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => write!(f, "All"),
            Target::Where(_) => write!(f, "Where(<predicate>)"),
            Target::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
        }
    }
}

impl From<RowId> for Target {
    fn from(id: RowId) -> Self {
        Target::id(id)
    }
}

impl From<Vec<RowId>> for Target {
    fn from(ids: Vec<RowId>) -> Self {
        Target::Ids(ids)
    }
}

impl<const N: usize> From<[RowId; N]> for Target {
    fn from(ids: [RowId; N]) -> Self {
        Target::ids(ids)
    }
}

/// One queued change, replayed against the stored snapshot on save.
#[derive(Clone)]
pub enum Mutation {
    Insert {
        rows: Vec<Document>,
    },
    UpdateAll {
        predicate: Predicate,
        transform: Transform,
    },
    UpdateById {
        ids: BTreeSet<RowId>,
        transform: Transform,
    },
    DeleteAll {
        predicate: Predicate,
    },
    DeleteById {
        ids: BTreeSet<RowId>,
    },
}

impl Mutation {
    pub fn update(transform: Transform, target: Target) -> Self {
        match target.into_predicate() {
            Ok(predicate) => Mutation::UpdateAll {
                predicate,
                transform,
            },
            Err(ids) => Mutation::UpdateById { ids, transform },
        }
    }

    pub fn delete(target: Target) -> Self {
        match target.into_predicate() {
            Ok(predicate) => Mutation::DeleteAll { predicate },
            Err(ids) => Mutation::DeleteById { ids },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => "insert",
            Mutation::UpdateAll { .. } => "update",
            Mutation::UpdateById { .. } => "update_by_id",
            Mutation::DeleteAll { .. } => "delete_rows",
            Mutation::DeleteById { .. } => "delete_by_id",
        }
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Insert { rows } => f.debug_struct("Insert").field("rows", rows).finish(),
            Mutation::UpdateAll { .. } => write!(f, "UpdateAll {{ .. }}"),
            Mutation::UpdateById { ids, .. } => {
                f.debug_struct("UpdateById").field("ids", ids).finish()
            }
            Mutation::DeleteAll { .. } => write!(f, "DeleteAll {{ .. }}"),
            Mutation::DeleteById { ids } => {
                f.debug_struct("DeleteById").field("ids", ids).finish()
            }
        }
    }
}

/// Ordered pending mutations of one table handle.
#[derive(Debug, Clone, Default)]
pub struct MutationQueue {
    pending: Vec<Mutation>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    pub fn extend(&mut self, mutations: impl IntoIterator<Item = Mutation>) {
        self.pending.extend(mutations);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.pending.iter()
    }

    /// Drains the queue, leaving it empty.
    pub fn take(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.pending)
    }

    /// Puts previously drained mutations back in front of anything queued
    /// since, preserving submission order.
    pub fn restore(&mut self, mut drained: Vec<Mutation>) {
        drained.append(&mut self.pending);
        self.pending = drained;
    }
}

/// Value-semantics alternative to chaining on a table: accumulate mutations,
/// then hand them to [`Table::extend`](crate::table::Table::extend).
#[derive(Debug, Clone)]
pub struct Batch {
    schema: ParsedSchema,
    queue: MutationQueue,
}

impl Batch {
    pub fn new(schema: ParsedSchema) -> Self {
        Self {
            schema,
            queue: MutationQueue::new(),
        }
    }

    pub fn insert<I>(mut self, rows: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = Document>,
    {
        let rows: Vec<Document> = rows.into_iter().collect();
        validate(&self.schema, &rows)?;
        self.queue.push(Mutation::Insert { rows });
        Ok(self)
    }

    pub fn update<F>(mut self, transform: F, target: impl Into<Target>) -> Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        self.queue.push(Mutation::update(Arc::new(transform), target.into()));
        self
    }

    pub fn delete_rows(mut self, target: impl Into<Target>) -> Self {
        self.queue.push(Mutation::delete(target.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.queue.pending
    }
}

#[cfg(test)]
mod tests {
    use super::{Batch, Mutation, MutationQueue, Target};
    use crate::catalog::schema::{definition, parse};
    use crate::catalog::types::{Row, document};
    use std::sync::Arc;

    #[test]
    fn target_dispatch_picks_descriptor_variant() {
        let identity = Arc::new(|row: Row| row);
        assert!(matches!(
            Mutation::update(identity.clone(), Target::All),
            Mutation::UpdateAll { .. }
        ));
        assert!(matches!(
            Mutation::update(identity, Target::id(3)),
            Mutation::UpdateById { ref ids, .. } if ids.len() == 1 && ids.contains(&3)
        ));
        assert!(matches!(
            Mutation::delete(Target::filter(|r| r.id > 2)),
            Mutation::DeleteAll { .. }
        ));
        match Mutation::delete(Target::ids([2, 1, 2])) {
            Mutation::DeleteById { ids } => {
                assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2]);
            }
            other => panic!("expected delete by id, got {other:?}"),
        }
    }

    #[test]
    fn all_target_matches_everything() {
        let Mutation::DeleteAll { predicate } = Mutation::delete(Target::All) else {
            panic!("expected predicate delete");
        };
        assert!(predicate(&Row::new(1, document([("foo", "a")]))));
    }

    #[test]
    fn restore_puts_drained_mutations_first() {
        let mut queue = MutationQueue::new();
        queue.push(Mutation::delete(Target::id(1)));
        let drained = queue.take();
        assert!(queue.is_empty());
        queue.push(Mutation::delete(Target::id(2)));
        queue.restore(drained);
        let kinds: Vec<_> = queue
            .iter()
            .map(|m| match m {
                Mutation::DeleteById { ids } => ids.iter().next().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![Some(1), Some(2)]);
    }

    #[test]
    fn batch_validates_inserts_eagerly() {
        let schema = parse(&definition([("foo", "String")])).expect("parse");
        let batch = Batch::new(schema.clone())
            .insert([document([("foo", "a")])])
            .expect("valid")
            .delete_rows(Target::id(1));
        assert_eq!(batch.len(), 2);
        assert!(
            Batch::new(schema)
                .insert([document([("foo", 1_i64)])])
                .is_err()
        );
    }
}
