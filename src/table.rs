use crate::Database;
use crate::catalog::TableConfig;
use crate::catalog::schema::{ParsedSchema, SchemaDefinition, parse, validate};
use crate::catalog::types::{Document, Row, Value};
use crate::commit::{ApplyLimits, Batch, Mutation, MutationQueue, Target, apply_mutations};
use crate::config::validate_name;
use crate::error::TableError;
use crate::migration::{ColumnChange, rewrite_rows};
use crate::query::select;
use crate::snapshot::{SaveSummary, Snapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Nothing queued.
    Fresh,
    /// Mutations queued and not yet saved.
    Dirty,
}

/// Handle on one table.
///
/// `insert`, `update` and `delete_rows` only queue; nothing touches storage
/// until `save`, which replays the queue in order against the stored
/// snapshot and commits the result atomically. `query` always reads the
/// stored snapshot and ignores the queue. Column operations rewrite stored
/// rows immediately and leave the queue alone.
#[derive(Debug)]
pub struct Table {
    db: Database,
    table_name: String,
    config: TableConfig,
    schema: ParsedSchema,
    queue: MutationQueue,
    snapshot: Option<Snapshot>,
}

impl Table {
    pub(crate) fn open(
        db: Database,
        table_name: &str,
        schema: Option<SchemaDefinition>,
    ) -> Result<Self, TableError> {
        validate_name(table_name, TableError::TableNameRequired)?;
        let config = match db.catalog().read_table(table_name) {
            Some(existing) => {
                if schema.as_ref().is_some_and(|given| *given != existing.schema) {
                    warn!(
                        db = db.name(),
                        table = table_name,
                        "given schema differs from stored schema, using stored schema"
                    );
                }
                existing
            }
            None => {
                let definition = schema.ok_or_else(|| TableError::SchemaRequired {
                    table: table_name.to_string(),
                })?;
                parse(&definition)?;
                if db.row_store().table_exists(db.name(), table_name)? {
                    warn!(
                        db = db.name(),
                        table = table_name,
                        "stored rows found without a catalog entry, adopting them"
                    );
                }
                db.catalog().create_table(table_name, definition)?
            }
        };
        let schema = parse(&config.schema)?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            config,
            schema,
            queue: MutationQueue::new(),
            snapshot: None,
        })
    }

    pub fn db_name(&self) -> &str {
        self.db.name()
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn schema(&self) -> &ParsedSchema {
        &self.schema
    }

    /// Catalog entry as of the last open, save or column change.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        if self.queue.is_empty() {
            HandleState::Fresh
        } else {
            HandleState::Dirty
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot committed by the last successful save or column change.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Queues rows for insertion. Every row is validated first; on failure
    /// nothing is queued.
    pub fn insert<I>(&mut self, rows: I) -> Result<&mut Self, TableError>
    where
        I: IntoIterator<Item = Document>,
    {
        let rows: Vec<Document> = rows.into_iter().collect();
        validate(&self.schema, &rows)?;
        debug!(table = %self.table_name, rows = rows.len(), "queue insert");
        self.queue.push(Mutation::Insert { rows });
        Ok(self)
    }

    /// Queues `transform` for the rows selected by `target`. The row id and
    /// position survive whatever the transform returns.
    pub fn update<F>(&mut self, transform: F, target: impl Into<Target>) -> &mut Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        let mutation = Mutation::update(Arc::new(transform), target.into());
        debug!(table = %self.table_name, kind = mutation.kind(), "queue update");
        self.queue.push(mutation);
        self
    }

    pub fn delete_rows(&mut self, target: impl Into<Target>) -> &mut Self {
        let mutation = Mutation::delete(target.into());
        debug!(table = %self.table_name, kind = mutation.kind(), "queue delete");
        self.queue.push(mutation);
        self
    }

    /// Discards queued mutations. Storage and the catalog are untouched.
    pub fn revert(&mut self) -> &mut Self {
        if !self.queue.is_empty() {
            debug!(table = %self.table_name, discarded = self.queue.len(), "revert");
        }
        self.queue.clear();
        self
    }

    pub fn batch(&self) -> Batch {
        Batch::new(self.schema.clone())
    }

    /// Appends a batch's mutations after anything already queued.
    pub fn extend(&mut self, batch: Batch) -> &mut Self {
        self.queue.extend(batch.into_mutations());
        self
    }

    /// Reads the stored rows selected by `target`. Queued mutations are not
    /// visible here.
    pub async fn query(&self, target: impl Into<Target>) -> Result<Vec<Row>, TableError> {
        let target = target.into();
        let last_id = self
            .db
            .catalog()
            .read_table(&self.table_name)
            .map_or(0, |c| c.last_id);
        let snapshot = self.db.load_snapshot(&self.table_name, last_id).await?;
        Ok(select(&snapshot, &target))
    }

    /// Replays the queue against the stored snapshot and commits the result.
    ///
    /// Runs under the table's write lock. If anything fails before the new
    /// snapshot is persisted, the drained mutations go back to the front of
    /// the queue so the save can be retried.
    pub async fn save(&mut self) -> Result<SaveSummary, TableError> {
        let lock = self.db.table_lock(&self.table_name);
        let _guard = lock.lock().await;
        let mutations = self.queue.take();

        let persisted = match self.replay_and_persist(&mutations).await {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(
                    table = %self.table_name,
                    error = %err,
                    restored = mutations.len(),
                    "save failed, queue restored"
                );
                self.queue.restore(mutations);
                return Err(err);
            }
        };

        let summary = persisted.summary();
        let schema = self.config.schema.clone();
        let updated = self
            .db
            .update_catalog(&self.table_name, schema, persisted.last_id)
            .await;
        self.snapshot = Some(persisted);
        match updated {
            Ok(config) => self.config = config,
            Err(err) => {
                warn!(
                    table = %self.table_name,
                    error = %err,
                    last_id = summary.last_id,
                    "rows persisted but catalog update failed"
                );
                return Err(err);
            }
        }
        info!(
            db = self.db.name(),
            table = %self.table_name,
            mutations = mutations.len(),
            rows = summary.rows.len(),
            last_id = summary.last_id,
            "save committed"
        );
        Ok(summary)
    }

    async fn replay_and_persist(
        &mut self,
        mutations: &[Mutation],
    ) -> Result<Snapshot, TableError> {
        // Another handle may have migrated the schema since this one cached it.
        let config = self.db.read_table_config(&self.table_name)?;
        if config.schema != self.config.schema {
            self.schema = parse(&config.schema)?;
        }
        self.config = config;
        let base = self
            .db
            .load_snapshot(&self.table_name, self.config.last_id)
            .await?;
        let limits = ApplyLimits {
            table_name: &self.table_name,
            max_rows: self.db.config().max_rows_per_table,
        };
        let next = apply_mutations(base, mutations, &self.schema, limits)?;
        self.db.persist_snapshot(&self.table_name, next).await
    }

    /// Adds a column, setting it to `default` on every stored row. A default
    /// is mandatory.
    pub async fn add_column(
        &mut self,
        name: &str,
        column_type: &str,
        default: Option<Value>,
    ) -> Result<(), TableError> {
        let change = ColumnChange::add(name, column_type, default)?;
        self.alter(change).await
    }

    /// Changes a column's declared type. With a default every stored value is
    /// overwritten; without one values are kept as they are.
    pub async fn update_column(
        &mut self,
        name: &str,
        column_type: &str,
        default: Option<Value>,
    ) -> Result<(), TableError> {
        self.alter(ColumnChange::retype(name, column_type, default)).await
    }

    pub async fn drop_columns<I, S>(&mut self, names: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alter(ColumnChange::drop(names)).await
    }

    pub async fn rename_column(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<(), TableError> {
        let change = ColumnChange::rename(source, destination)?;
        self.alter(change).await
    }

    /// Rewrites stored rows, then records the new schema. If the catalog
    /// write fails the previous rows are written back, so stored rows never
    /// follow a schema the catalog does not have.
    async fn alter(&mut self, change: ColumnChange) -> Result<(), TableError> {
        let lock = self.db.table_lock(&self.table_name);
        let _guard = lock.lock().await;
        let config = self.db.read_table_config(&self.table_name)?;
        let next_schema = change.plan(&config.schema)?;
        let parsed = parse(&next_schema)?;
        let base = self
            .db
            .load_snapshot(&self.table_name, config.last_id)
            .await?;
        let previous = base.clone();
        let persisted = self
            .db
            .persist_snapshot(&self.table_name, rewrite_rows(base, &change))
            .await?;
        let updated = match self
            .db
            .update_catalog(&self.table_name, next_schema, persisted.last_id)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!(
                    table = %self.table_name,
                    change = change.kind(),
                    error = %err,
                    "catalog update failed, restoring previous rows"
                );
                let restored = self.db.persist_snapshot(&self.table_name, previous).await;
                if let Err(restore_err) = restored {
                    warn!(
                        table = %self.table_name,
                        change = change.kind(),
                        error = %restore_err,
                        "restoring previous rows failed"
                    );
                }
                return Err(err);
            }
        };
        info!(
            db = self.db.name(),
            table = %self.table_name,
            change = change.kind(),
            rows = persisted.rows.len(),
            pending = self.queue.len(),
            "column change applied"
        );
        self.schema = parsed;
        self.config = updated;
        self.snapshot = Some(persisted);
        Ok(())
    }

    /// Drops this table from its database.
    pub async fn drop(self) -> Result<(), TableError> {
        self.db.drop_table(&self.table_name).await.map(|_| ())
    }
}
