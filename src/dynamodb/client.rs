use aws_sdk_dynamodb::Client;
use futures::future::join_all;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, instrument};

use crate::dynamodb::store::{
    ExpressionAttributes, PutItemRequest, QueryRequest, ScanRequest, Store, WriteRequest,
};
use crate::dynamodb::{Error, Item, Result, Table};
use crate::expression::{compile_filter, compile_key, CompiledExpression};
use crate::utils::RetryPolicy;

/// Most requests a single BatchWriteItem call accepts.
pub const BATCH_WRITE_SIZE_LIMIT: usize = 25;
/// Most keys a single BatchGetItem call accepts.
pub const BATCH_GET_SIZE_LIMIT: usize = 100;

/// Options for [`DynamoDb::query`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Query this secondary index instead of the base table.
    pub index_name: Option<String>,
    /// Filter applied after the key condition.
    pub filter: Option<String>,
    /// Ascending sort key order when `true` (the default).
    pub scan_forward: bool,
    /// Cursor to resume from.
    pub start: Option<Item>,
    /// Stop once this many items have been returned.
    pub limit: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            index_name: None,
            filter: None,
            scan_forward: true,
            start: None,
            limit: None,
        }
    }
}

impl QueryOptions {
    /// Default options: base table, no filter, ascending, from the beginning, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries `index_name`.
    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Filters results with `filter`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the sort key direction.
    pub fn scan_forward(mut self, scan_forward: bool) -> Self {
        self.scan_forward = scan_forward;
        self
    }

    /// Resumes after `cursor`.
    pub fn start(mut self, cursor: Option<Item>) -> Self {
        self.start = cursor;
        self
    }

    /// Limits the number of items returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`DynamoDb::scan`] and [`DynamoDb::parallel_scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Scan this secondary index instead of the base table.
    pub index_name: Option<String>,
    /// Filter applied to scanned items.
    pub filter: Option<String>,
    /// Per-segment item budget.
    pub limit: Option<usize>,
}

impl ScanOptions {
    /// Default options: base table, no filter, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `index_name`.
    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Filters results with `filter`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Limits the number of items returned per segment.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Paginating, batching and retrying access to one DynamoDB table.
///
/// This struct takes care of the parts of the DynamoDB protocol callers should not have to
/// think about:
///
/// - **Expressions**: conditions, key conditions and filters are written in a readable
///   language (`price > 10 and begins_with(SK, "ORDER#")`) and compiled to placeholders.
/// - **Batch limits**: batch writes are split into chunks of 25 and batch gets into chunks
///   of 100. Chunks run concurrently, and unprocessed entries are resubmitted until none
///   are left.
/// - **Pagination**: query and scan hand every page to a callback together with a cursor
///   holding only the key attributes needed to resume.
/// - **Throttling**: every physical request is retried on throughput errors with a fixed
///   delay, see [`RetryPolicy`].
///
/// # Example
///
/// ```rust,no_run
/// use dynamodb_access::{DynamoDb, KeySchema, QueryOptions, Table};
///
/// # async fn run() -> dynamodb_access::Result<()> {
/// let config = aws_config::load_from_env().await;
/// let table = Table::new("orders", KeySchema::new("PK", Some("SK")));
/// let ddb = DynamoDb::new(&config, table);
///
/// let mut cursor = None;
/// ddb.query(
///     "PK = \"USER#1\" and begins_with(SK, \"ORDER#\")",
///     &QueryOptions::new().limit(10),
///     |items, _prev, next| {
///         println!("{} orders", items.len());
///         cursor = next;
///     },
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DynamoDb<S = Client> {
    store: S,
    table: Table,
    retry: RetryPolicy,
}

impl DynamoDb<Client> {
    /// Creates a new `DynamoDb` instance for `table`.
    pub fn new(sdk_config: &aws_config::SdkConfig, table: Table) -> Self {
        Self::with_store(Client::new(sdk_config), table)
    }
}

impl<S: Store> DynamoDb<S> {
    /// Creates an instance on top of any [`Store`].
    pub fn with_store(store: S, table: Table) -> Self {
        Self {
            store,
            table,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy and returns the modified instance.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the table configuration.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Item Operations ---

    /// Gets an item by key. Non-key attributes of `key` are ignored.
    #[instrument(skip(self, key), fields(table = %self.table.name()))]
    pub async fn get_item(&self, key: &Item) -> Result<Option<Item>> {
        let key = self.table.extract_primary_key(key);
        let item = self
            .retry
            .run(|| self.store.get_item(self.table.name(), &key))
            .await?;

        info!(
            "Item lookup in '{}' {}",
            self.table.name(),
            if item.is_some() { "found a match" } else { "found nothing" }
        );
        Ok(item)
    }

    /// Puts an item, optionally only if `condition` holds.
    ///
    /// A condition that does not hold fails with [`Error::ConditionalCheckFailed`] and leaves
    /// the stored item unchanged.
    #[instrument(skip(self, item), fields(table = %self.table.name()))]
    pub async fn put_item(&self, item: Item, condition: Option<&str>) -> Result<()> {
        let condition = compile_filter(condition, None)?;
        let request = PutItemRequest {
            table_name: self.table.name().to_owned(),
            item,
            condition: condition.as_ref().map(|c| c.expression.clone()),
            attributes: condition
                .as_ref()
                .map(ExpressionAttributes::from)
                .unwrap_or_default(),
        };

        self.retry.run(|| self.store.put_item(&request)).await?;

        info!("Item added to '{}'", self.table.name());
        Ok(())
    }

    // --- Batch Operations ---

    /// Writes and deletes items in batches of [`BATCH_WRITE_SIZE_LIMIT`].
    ///
    /// All batches run concurrently. The call returns once every batch has finished, and
    /// fails if any of them failed. Delete keys are reduced to the primary key first.
    #[instrument(skip_all, fields(table = %self.table.name(), requests = requests.len()))]
    pub async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let requests = requests
            .into_iter()
            .map(|request| match request {
                WriteRequest::Delete(key) => {
                    WriteRequest::Delete(self.table.extract_primary_key(&key))
                }
                put => put,
            })
            .collect::<Vec<_>>();

        let batches = requests
            .chunks(BATCH_WRITE_SIZE_LIMIT)
            .map(|batch| self.limited_batch_write(batch.to_vec()));

        join_all(batches)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        info!(
            "Batch write of {} requests completed on '{}'",
            requests.len(),
            self.table.name()
        );
        Ok(())
    }

    async fn limited_batch_write(&self, mut pending: Vec<WriteRequest>) -> Result<()> {
        while !pending.is_empty() {
            let unprocessed = self
                .retry
                .run(|| self.store.batch_write_item(self.table.name(), &pending))
                .await?;
            if !unprocessed.is_empty() {
                debug!("{} unprocessed write requests, resubmitting", unprocessed.len());
            }
            pending = unprocessed;
        }
        Ok(())
    }

    /// Gets items by key in batches of [`BATCH_GET_SIZE_LIMIT`].
    ///
    /// Keys that don't exist are simply missing from the result. The order of the
    /// returned items is unspecified. Keys are reduced to the primary key first.
    #[instrument(skip_all, fields(table = %self.table.name(), keys = keys.len()))]
    pub async fn batch_get(&self, keys: Vec<Item>) -> Result<Vec<Item>> {
        let keys = keys
            .iter()
            .map(|key| self.table.extract_primary_key(key))
            .collect::<Vec<_>>();

        let batches = keys
            .chunks(BATCH_GET_SIZE_LIMIT)
            .map(|batch| self.limited_batch_get(batch.to_vec()));

        let items = join_all(batches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        info!("Batch get returned {} items from '{}'", items.len(), self.table.name());
        Ok(items)
    }

    async fn limited_batch_get(&self, mut pending: Vec<Item>) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        while !pending.is_empty() {
            let output = self
                .retry
                .run(|| self.store.batch_get_item(self.table.name(), &pending))
                .await?;
            items.extend(output.items);
            if !output.unprocessed_keys.is_empty() {
                debug!("{} unprocessed keys, resubmitting", output.unprocessed_keys.len());
            }
            pending = output.unprocessed_keys;
        }
        Ok(items)
    }

    // --- Query and Scan Operations ---

    /// Queries the table or an index, handing every page to `action`.
    ///
    /// `action` receives `(items, prev, next)`:
    /// - `next` is the cursor to pass as `start` to get the following page, or `None` when
    ///   there is nothing left.
    /// - `prev` is the key of `options.start` when one was given. Otherwise it is the key
    ///   of the first item of the first page (if that page is not empty), so even a first
    ///   call yields a cursor marking the beginning of the range.
    ///
    /// The filter shares the key condition's placeholders, so both can be used freely in
    /// one call. With a `limit` the query stops as soon as that many items were returned.
    #[instrument(
        skip(self, options, action),
        fields(table = %self.table.name(), index = ?options.index_name)
    )]
    pub async fn query<F>(
        &self,
        key_expression: &str,
        options: &QueryOptions,
        mut action: F,
    ) -> Result<()>
    where
        F: FnMut(Vec<Item>, Option<Item>, Option<Item>),
    {
        ensure_valid_limit(options.limit)?;

        let key = compile_key(key_expression, None)?;
        let filter = compile_filter(options.filter.as_deref(), Some(&key))?;
        let index = options.index_name.as_deref();

        let mut request = QueryRequest {
            table_name: self.table.name().to_owned(),
            index_name: options.index_name.clone(),
            attributes: ExpressionAttributes::from(filter.as_ref().unwrap_or(&key)),
            key_condition: key.expression,
            filter: filter.map(|f| f.expression),
            scan_forward: options.scan_forward,
            exclusive_start_key: options.start.clone(),
            limit: options.limit,
        };

        let mut prev = options
            .start
            .as_ref()
            .map(|start| self.table.extract_keys(start, index));
        let mut remaining = options.limit;
        let mut first_page = true;

        loop {
            let page = self.retry.run(|| self.store.query(&request)).await?;

            if first_page && prev.is_none() {
                prev = page
                    .items
                    .first()
                    .map(|first| self.table.extract_keys(first, index));
            }
            first_page = false;

            let fetched = page.items.len();
            debug!(fetched, more = page.last_evaluated_key.is_some(), "Query page");

            let next = page.last_evaluated_key;
            action(
                page.items,
                prev.clone(),
                next.as_ref().map(|k| self.table.extract_keys(k, index)),
            );

            let Some(next) = next else {
                break;
            };
            if !charge(&mut remaining, fetched) {
                break;
            }
            request.limit = remaining;
            request.exclusive_start_key = Some(next);
        }

        Ok(())
    }

    /// Scans the table or an index, handing every page to `action` as `(items, next)`.
    ///
    /// Same as [`parallel_scan`](Self::parallel_scan) with a single segment.
    pub async fn scan<F>(
        &self,
        options: &ScanOptions,
        start: Option<Item>,
        mut action: F,
    ) -> Result<()>
    where
        F: FnMut(Vec<Item>, Option<Item>),
    {
        self.parallel_scan(
            1,
            options,
            start.map(|cursor| vec![Some(cursor)]),
            |items, _, next| action(items, next),
        )
        .await
    }

    /// Scans `total_segments` disjoint segments concurrently.
    ///
    /// `action` receives `(items, segment, next)` for every page of every segment. To
    /// resume, collect each segment's last `next` into a vector indexed by segment and
    /// pass it as `start`: segments whose slot is `None` are finished and are skipped.
    /// With `start == None` every segment is scanned from the beginning.
    ///
    /// Returns once every segment is done; fails if any segment failed.
    #[instrument(
        skip(self, options, start, action),
        fields(table = %self.table.name(), index = ?options.index_name)
    )]
    pub async fn parallel_scan<F>(
        &self,
        total_segments: usize,
        options: &ScanOptions,
        start: Option<Vec<Option<Item>>>,
        action: F,
    ) -> Result<()>
    where
        F: FnMut(Vec<Item>, usize, Option<Item>),
    {
        ensure_valid_start_cursors(total_segments, start.as_deref())?;
        ensure_valid_limit(options.limit)?;

        let filter = compile_filter(options.filter.as_deref(), None)?;

        let segments: Vec<(usize, Option<Item>)> = match start {
            None => (0..total_segments).map(|segment| (segment, None)).collect(),
            Some(cursors) => cursors
                .into_iter()
                .enumerate()
                .filter_map(|(segment, cursor)| cursor.map(|c| (segment, Some(c))))
                .collect(),
        };
        debug!("Scanning {} of {} segments", segments.len(), total_segments);

        let action = Mutex::new(action);
        let tasks = segments.into_iter().map(|(segment, cursor)| {
            self.scan_segment(
                segment,
                total_segments,
                options,
                filter.as_ref(),
                cursor,
                &action,
            )
        });

        join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        Ok(())
    }

    async fn scan_segment<F>(
        &self,
        segment: usize,
        total_segments: usize,
        options: &ScanOptions,
        filter: Option<&CompiledExpression>,
        start: Option<Item>,
        action: &Mutex<F>,
    ) -> Result<()>
    where
        F: FnMut(Vec<Item>, usize, Option<Item>),
    {
        let index = options.index_name.as_deref();
        let mut request = ScanRequest {
            table_name: self.table.name().to_owned(),
            index_name: options.index_name.clone(),
            segment,
            total_segments,
            filter: filter.map(|f| f.expression.clone()),
            attributes: filter.map(ExpressionAttributes::from).unwrap_or_default(),
            exclusive_start_key: start,
            limit: options.limit,
        };
        let mut remaining = options.limit;

        loop {
            let page = self.retry.run(|| self.store.scan(&request)).await?;

            let fetched = page.items.len();
            debug!(segment, fetched, more = page.last_evaluated_key.is_some(), "Scan page");

            let next = page.last_evaluated_key;
            {
                let mut guard = action.lock().unwrap_or_else(PoisonError::into_inner);
                let callback = &mut *guard;
                callback(
                    page.items,
                    segment,
                    next.as_ref().map(|k| self.table.extract_keys(k, index)),
                );
            }

            let Some(next) = next else {
                break;
            };
            if !charge(&mut remaining, fetched) {
                break;
            }
            request.limit = remaining;
            request.exclusive_start_key = Some(next);
        }

        Ok(())
    }
}

/// Charges a page against the item budget; `false` once the budget is spent.
fn charge(remaining: &mut Option<usize>, fetched: usize) -> bool {
    match remaining {
        None => true,
        Some(left) => {
            *left = left.saturating_sub(fetched);
            *left > 0
        }
    }
}

fn ensure_valid_limit(limit: Option<usize>) -> Result<()> {
    if limit == Some(0) {
        return Err(Error::InvalidArgument("limit must be at least 1".into()));
    }
    Ok(())
}

fn ensure_valid_start_cursors(total_segments: usize, start: Option<&[Option<Item>]>) -> Result<()> {
    if total_segments == 0 {
        return Err(Error::InvalidArgument(
            "the number of segments must be at least 1".into(),
        ));
    }
    match start {
        Some(cursors) if cursors.len() != total_segments => Err(Error::InvalidArgument(format!(
            "the number of start cursors ({}) must match the number of segments ({})",
            cursors.len(),
            total_segments
        ))),
        _ => Ok(()),
    }
}
