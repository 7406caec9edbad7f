//! Tests for the DynamoDB access engine
//!
//! These tests cover:
//! - Conditional puts and key-reduced gets
//! - Batch writes and gets, including chunking and unprocessed entries
//! - Query pagination with cursors, limits, filters and indexes
//! - Single and parallel scans, resumed from per-segment cursors
//! - Throttling retries and argument validation
//!
//! # Setup
//!
//! The engine runs against `memory::MemoryStore`, an in-memory table that pages,
//! partitions and evaluates expressions the way DynamoDB does. No credentials needed.
//!
//! The tests in `live` talk to a real endpoint and are ignored by default. Point them at
//! DynamoDB Local through your `.env` file:
//!
//! ```text
//! AWS_ACCESS_KEY_ID=dummy
//! AWS_SECRET_ACCESS_KEY=dummy
//! AWS_REGION=us-east-1
//! AWS_ENDPOINT_URL=http://localhost:8000
//! ```
//!
//! and run them with `cargo test -- --ignored`.


use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use futures::future::FutureExt;
use tokio::time::Duration;

use crate::dynamodb::{
    DynamoDb, Error, Item, KeySchema, QueryOptions, ScanOptions, Table, WriteRequest,
};
use crate::expression::ExpressionError;
use crate::utils::RetryPolicy;
use memory::MemoryStore;

const TEST_TABLE_NAME: &str = "test-orders";

fn orders_table() -> Table {
    Table::new(TEST_TABLE_NAME, KeySchema::new("PK", Some("SK")))
        .with_index("GSI1", KeySchema::new("GSI1PK", Some("GSI1SK")))
}

fn order(user: u32, n: u32) -> Item {
    Item::new()
        .set_string("PK", format!("USER#{user}"))
        .set_string("SK", format!("ORDER#{n:04}"))
        .set_string("GSI1PK", if n % 2 == 0 { "STATUS#open" } else { "STATUS#closed" })
        .set_string("GSI1SK", format!("{n:04}"))
        .set_number("total", n)
}

fn no_sleep(max_retries: usize) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(500))
        .with_sleeper(Arc::new(|_: Duration| async {}.boxed()))
}

fn engine(store: MemoryStore) -> DynamoDb<MemoryStore> {
    DynamoDb::with_store(store, orders_table()).with_retry_policy(no_sleep(10))
}

fn engine_with(items: impl IntoIterator<Item = Item>) -> DynamoDb<MemoryStore> {
    engine(MemoryStore::with_items(orders_table(), items))
}

fn sort_keys(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get_string("SK").cloned())
        .collect()
}

/// Runs one query call and returns its pages as `(items, prev, next)`.
async fn query_pages(
    ddb: &DynamoDb<MemoryStore>,
    key_expression: &str,
    options: &QueryOptions,
) -> crate::dynamodb::Result<Vec<(Vec<Item>, Option<Item>, Option<Item>)>> {
    let mut pages = Vec::new();
    ddb.query(key_expression, options, |items, prev, next| {
        pages.push((items, prev, next))
    })
    .await?;
    Ok(pages)
}

// --- Item operations ---

#[tokio::test]
async fn test_put_and_get_item() -> Result<()> {
    let ddb = engine(MemoryStore::new(orders_table()));

    ddb.put_item(order(1, 7), None).await?;

    // Non-key attributes of the lookup key are dropped before the request
    let found = ddb.get_item(&order(1, 7).set_number("total", 999)).await?;
    assert_eq!(found, Some(order(1, 7)));
    assert_eq!(found.and_then(|i| i.get_number("total")), Some(7.0));

    assert_eq!(ddb.get_item(&order(1, 8)).await?, None);
    assert_eq!(ddb.store().log().get_items, 2);
    Ok(())
}

#[tokio::test]
async fn test_conditional_put() -> Result<()> {
    let ddb = engine(MemoryStore::new(orders_table()));
    let condition = Some("attribute_not_exists(PK)");

    ddb.put_item(order(1, 1), condition).await?;

    let result = ddb
        .put_item(order(1, 1).set_number("total", 500), condition)
        .await;
    assert!(matches!(result, Err(Error::ConditionalCheckFailed(_))));

    // The stored item is unchanged and the failure was not retried
    let stored = ddb.get_item(&order(1, 1)).await?;
    assert_eq!(stored.and_then(|i| i.get_number("total")), Some(1.0));
    let log = ddb.store().log();
    assert_eq!(log.puts.len(), 2);
    assert_eq!(log.puts[1].condition.as_deref(), Some("attribute_not_exists(#PK)"));
    assert_eq!(log.puts[1].attributes.names.get("#PK").map(String::as_str), Some("PK"));
    Ok(())
}

#[tokio::test]
async fn test_put_condition_with_values() -> Result<()> {
    let ddb = engine_with([order(1, 1)]);

    ddb.put_item(order(1, 1).set_number("total", 2), Some("total < 2"))
        .await?;
    let result = ddb
        .put_item(order(1, 1).set_number("total", 3), Some("total < 2"))
        .await;

    assert!(matches!(result, Err(Error::ConditionalCheckFailed(_))));
    let stored = ddb.get_item(&order(1, 1)).await?;
    assert_eq!(stored.and_then(|i| i.get_number("total")), Some(2.0));
    Ok(())
}

#[tokio::test]
async fn test_invalid_condition_is_not_sent() {
    let ddb = engine(MemoryStore::new(orders_table()));

    let result = ddb.put_item(order(1, 1), Some("total >")).await;

    assert!(matches!(result, Err(Error::Expression(_))));
    assert!(ddb.store().log().puts.is_empty());
    assert_eq!(ddb.store().len(), 0);
}

// --- Batch operations ---

#[tokio::test]
async fn test_batch_write_chunks_requests() -> Result<()> {
    let ddb = engine(MemoryStore::new(orders_table()));

    let requests = (0..200).map(|n| WriteRequest::put(order(1, n))).collect();
    ddb.batch_write(requests).await?;

    let log = ddb.store().log();
    assert_eq!(log.batch_writes, vec![25; 8]);
    assert_eq!(ddb.store().len(), 200);
    Ok(())
}

#[tokio::test]
async fn test_batch_write_resubmits_unprocessed() -> Result<()> {
    let store = MemoryStore::new(orders_table());
    store.leave_unprocessed(3);
    let ddb = engine(store);

    let requests = (0..30).map(|n| WriteRequest::put(order(1, n))).collect();
    ddb.batch_write(requests).await?;

    // Two chunks plus one resubmission per partially processed round
    assert_eq!(ddb.store().log().batch_writes.len(), 5);
    assert_eq!(ddb.store().len(), 30);
    Ok(())
}

#[tokio::test]
async fn test_batch_delete() -> Result<()> {
    let ddb = engine_with((0..10).map(|n| order(1, n)));

    // Whole items are accepted as delete keys
    let requests = (0..5).map(|n| WriteRequest::delete(order(1, n))).collect();
    ddb.batch_write(requests).await?;
    assert_eq!(ddb.store().len(), 5);

    // Deleting absent keys is a no-op
    let requests = (100..140).map(|n| WriteRequest::delete(order(1, n))).collect();
    ddb.batch_write(requests).await?;
    assert_eq!(ddb.store().len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_batch_write_mixes_puts_and_deletes() -> Result<()> {
    let ddb = engine_with((0..10).map(|n| order(1, n)));

    let requests = (0..10)
        .map(|n| WriteRequest::delete(order(1, n)))
        .chain((10..40).map(|n| WriteRequest::put(order(1, n))))
        .collect();
    ddb.batch_write(requests).await?;

    assert_eq!(ddb.store().log().batch_writes, vec![25, 15]);
    assert_eq!(ddb.store().len(), 30);
    assert_eq!(ddb.get_item(&order(1, 0)).await?, None);
    assert_eq!(ddb.get_item(&order(1, 39)).await?, Some(order(1, 39)));
    Ok(())
}

#[tokio::test]
async fn test_batch_write_fails_after_all_chunks_ran() {
    let store = MemoryStore::new(orders_table());
    store.fail_next(1);
    let ddb = engine(store);

    let requests = (0..200).map(|n| WriteRequest::put(order(1, n))).collect();
    let result = ddb.batch_write(requests).await;

    assert!(matches!(result, Err(Error::Request(_))));
    // The failed chunk is not retried, the other seven were written
    assert_eq!(ddb.store().log().batch_writes, vec![25; 7]);
    assert_eq!(ddb.store().len(), 175);
}

#[tokio::test]
async fn test_batch_write_empty() -> Result<()> {
    let ddb = engine(MemoryStore::new(orders_table()));
    ddb.batch_write(Vec::new()).await?;
    assert!(ddb.store().log().batch_writes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_batch_get_chunks_keys() -> Result<()> {
    let ddb = engine_with((0..250).map(|n| order(1, n)));

    let keys = (0..250).map(|n| order(1, n)).collect();
    let items = ddb.batch_get(keys).await?;

    assert_eq!(items.len(), 250);
    let unique: HashSet<String> = sort_keys(&items).into_iter().collect();
    assert_eq!(unique.len(), 250);

    let mut sizes = ddb.store().log().batch_gets;
    sizes.sort_unstable();
    assert_eq!(sizes, vec![50, 100, 100]);
    Ok(())
}

#[tokio::test]
async fn test_batch_get_missing_and_unprocessed_keys() -> Result<()> {
    let store = MemoryStore::with_items(orders_table(), (0..10).map(|n| order(1, n)));
    store.leave_unprocessed(2);
    let ddb = engine(store);

    let keys = (0..20).map(|n| order(1, n)).collect();
    let items = ddb.batch_get(keys).await?;

    assert_eq!(items.len(), 10);
    assert_eq!(ddb.store().log().batch_gets.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_batch_get_fails_after_all_chunks_ran() {
    let store = MemoryStore::with_items(orders_table(), (0..250).map(|n| order(1, n)));
    store.fail_next(1);
    let ddb = engine(store);

    let keys = (0..250).map(|n| order(1, n)).collect();
    let result = ddb.batch_get(keys).await;

    assert!(matches!(result, Err(Error::Request(_))));
    assert_eq!(ddb.store().log().batch_gets.len(), 2);
}

// --- Query ---

#[tokio::test]
async fn test_query_pagination_with_limit() -> Result<()> {
    let store = MemoryStore::with_items(
        orders_table(),
        (0..50).map(|n| order(1, n)).chain((0..5).map(|n| order(2, n))),
    )
    .with_page_size(4);
    let ddb = engine(store);

    let mut seen = Vec::new();
    let mut cursor = None;
    for _ in 0..3 {
        let options = QueryOptions::new().limit(10).start(cursor.take());
        let pages = query_pages(&ddb, "PK = \"USER#1\"", &options).await?;

        // Pages of 4, 4 and 2 items: the budget shrinks the last request
        assert_eq!(pages.iter().map(|p| p.0.len()).collect::<Vec<_>>(), vec![4, 4, 2]);
        for (items, _, _) in &pages {
            seen.extend(sort_keys(items));
        }
        cursor = pages.last().and_then(|p| p.2.clone());
        assert!(cursor.is_some());
    }

    let expected: Vec<String> = (0..30).map(|n| format!("ORDER#{n:04}")).collect();
    assert_eq!(seen, expected);

    let limits: Vec<Option<usize>> = ddb.store().log().queries.iter().map(|q| q.limit).collect();
    assert_eq!(&limits[..3], &[Some(10), Some(6), Some(2)]);
    Ok(())
}

#[tokio::test]
async fn test_query_backwards() -> Result<()> {
    let ddb = engine_with((0..50).map(|n| order(1, n)));

    let mut seen = Vec::new();
    let mut cursor = None;
    for _ in 0..3 {
        let options = QueryOptions::new()
            .scan_forward(false)
            .limit(10)
            .start(cursor.take());
        let pages = query_pages(&ddb, "PK = \"USER#1\"", &options).await?;
        for (items, _, _) in &pages {
            seen.extend(sort_keys(items));
        }
        cursor = pages.last().and_then(|p| p.2.clone());
    }

    let expected: Vec<String> = (20..50).rev().map(|n| format!("ORDER#{n:04}")).collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn test_query_runs_to_completion_without_limit() -> Result<()> {
    let store = MemoryStore::with_items(orders_table(), (0..23).map(|n| order(1, n)))
        .with_page_size(5);
    let ddb = engine(store);

    let pages = query_pages(&ddb, "PK = \"USER#1\"", &QueryOptions::new()).await?;

    assert_eq!(pages.len(), 5);
    assert_eq!(pages.iter().map(|p| p.0.len()).sum::<usize>(), 23);
    assert!(pages[..4].iter().all(|p| p.2.is_some()));
    assert_eq!(pages[4].2, None);
    Ok(())
}

#[tokio::test]
async fn test_query_cursors() -> Result<()> {
    let ddb = engine_with((0..20).map(|n| order(1, n)));

    // Without a start, prev is the key of the first item on the first page
    let options = QueryOptions::new().limit(5);
    let pages = query_pages(&ddb, "PK = \"USER#1\"", &options).await?;
    let (_, prev, next) = &pages[0];
    assert_eq!(
        prev.as_ref(),
        Some(&Item::new().set_string("PK", "USER#1").set_string("SK", "ORDER#0000"))
    );
    assert_eq!(
        next.as_ref(),
        Some(&Item::new().set_string("PK", "USER#1").set_string("SK", "ORDER#0004"))
    );

    // With a start, prev is its key projection and the start is sent as is
    let start = order(1, 9);
    let options = QueryOptions::new().limit(5).start(Some(start.clone()));
    let pages = query_pages(&ddb, "PK = \"USER#1\"", &options).await?;
    assert_eq!(
        pages[0].1,
        Some(Item::new().set_string("PK", "USER#1").set_string("SK", "ORDER#0009"))
    );
    assert_eq!(sort_keys(&pages[0].0)[0], "ORDER#0010");
    let last_query = ddb.store().log().queries.last().cloned();
    assert_eq!(last_query.and_then(|q| q.exclusive_start_key), Some(start));
    Ok(())
}

#[tokio::test]
async fn test_query_prev_stays_fixed_across_pages() -> Result<()> {
    let store = MemoryStore::with_items(orders_table(), (0..9).map(|n| order(1, n)))
        .with_page_size(3);
    let ddb = engine(store);

    let pages = query_pages(&ddb, "PK = \"USER#1\"", &QueryOptions::new()).await?;

    assert_eq!(pages.len(), 3);
    let first = Item::new().set_string("PK", "USER#1").set_string("SK", "ORDER#0000");
    assert!(pages.iter().all(|(_, prev, _)| prev.as_ref() == Some(&first)));
    Ok(())
}

#[tokio::test]
async fn test_query_empty_result() -> Result<()> {
    let ddb = engine_with((0..5).map(|n| order(1, n)));

    let pages = query_pages(&ddb, "PK = \"USER#9\"", &QueryOptions::new()).await?;

    assert_eq!(pages.len(), 1);
    assert!(pages[0].0.is_empty());
    assert_eq!(pages[0].1, None);
    assert_eq!(pages[0].2, None);
    Ok(())
}

#[tokio::test]
async fn test_query_key_condition_and_filter_share_placeholders() -> Result<()> {
    let ddb = engine_with((0..50).map(|n| order(1, n)));

    let options = QueryOptions::new().filter("total >= 40 or total = 3");
    let pages = query_pages(
        &ddb,
        "PK = \"USER#1\" and SK between \"ORDER#0000\" and \"ORDER#0044\"",
        &options,
    )
    .await?;

    let expected: Vec<String> = [3, 40, 41, 42, 43, 44]
        .iter()
        .map(|n| format!("ORDER#{n:04}"))
        .collect();
    assert_eq!(sort_keys(&pages[0].0), expected);

    let log = ddb.store().log();
    let request = &log.queries[0];
    assert_eq!(request.key_condition, "#PK = :1 and #SK between :2 and :3");
    assert_eq!(request.filter.as_deref(), Some("#total >= :4 or #total = :5"));
    assert_eq!(request.attributes.values.len(), 5);
    assert_eq!(request.attributes.names.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_query_index() -> Result<()> {
    // Orders without GSI1 attributes are not in the index
    let ddb = engine_with((0..20).map(|n| {
        if n < 16 {
            order(1, n)
        } else {
            Item::new()
                .set_string("PK", "USER#1")
                .set_string("SK", format!("ORDER#{n:04}"))
        }
    }));

    let options = QueryOptions::new().index("GSI1").limit(3);
    let pages = query_pages(&ddb, "GSI1PK = \"STATUS#open\"", &options).await?;

    let items: Vec<Item> = pages.iter().flat_map(|p| p.0.clone()).collect();
    assert_eq!(sort_keys(&items), vec!["ORDER#0000", "ORDER#0002", "ORDER#0004"]);

    // Index cursors carry the table key and the index key
    let next = pages.last().and_then(|p| p.2.clone());
    assert_eq!(
        next,
        Some(
            Item::new()
                .set_string("PK", "USER#1")
                .set_string("SK", "ORDER#0004")
                .set_string("GSI1PK", "STATUS#open")
                .set_string("GSI1SK", "0004")
        )
    );
    assert_eq!(pages[0].1.as_ref().map(Item::len), Some(4));

    let options = QueryOptions::new().index("GSI1").start(next);
    let pages = query_pages(&ddb, "GSI1PK = \"STATUS#open\"", &options).await?;
    let items: Vec<Item> = pages.iter().flat_map(|p| p.0.clone()).collect();
    assert_eq!(
        sort_keys(&items),
        vec!["ORDER#0006", "ORDER#0008", "ORDER#0010", "ORDER#0012", "ORDER#0014"]
    );
    Ok(())
}

#[tokio::test]
async fn test_query_validation() {
    let ddb = engine_with((0..5).map(|n| order(1, n)));

    let result = query_pages(&ddb, "   ", &QueryOptions::new()).await;
    assert!(matches!(
        result,
        Err(Error::Expression(ExpressionError::MissingExpression(_)))
    ));

    let result = query_pages(&ddb, "PK = ", &QueryOptions::new()).await;
    assert!(matches!(result, Err(Error::Expression(_))));

    let result = query_pages(&ddb, "PK = \"USER#1\"", &QueryOptions::new().limit(0)).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    assert!(ddb.store().log().queries.is_empty());
}

// --- Scan ---

#[tokio::test]
async fn test_scan_with_filter() -> Result<()> {
    let ddb = engine_with((0..10).map(|n| order(1, n)));

    let mut items = Vec::new();
    let mut cursors = Vec::new();
    ddb.scan(&ScanOptions::new().filter("total > 4"), None, |page, next| {
        items.extend(page);
        cursors.push(next);
    })
    .await?;

    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|i| i.get_number("total") > Some(4.0)));
    assert_eq!(cursors, vec![None]);

    let log = ddb.store().log();
    assert_eq!((log.scans[0].segment, log.scans[0].total_segments), (0, 1));
    Ok(())
}

#[tokio::test]
async fn test_scan_resumes_from_cursor() -> Result<()> {
    let ddb = engine_with((0..30).map(|n| order(1, n)));
    let options = ScanOptions::new().limit(12);

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut calls = 0;
    loop {
        let mut next_cursor = None;
        ddb.scan(&options, cursor.take(), |items, next| {
            seen.extend(sort_keys(&items));
            next_cursor = next;
        })
        .await?;
        calls += 1;
        match next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(calls, 3);
    let expected: Vec<String> = (0..30).map(|n| format!("ORDER#{n:04}")).collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_empty_table() -> Result<()> {
    let ddb = engine(MemoryStore::new(orders_table()));

    let mut pages = Vec::new();
    ddb.parallel_scan(4, &ScanOptions::new(), None, |items, segment, next| {
        pages.push((items, segment, next))
    })
    .await?;

    assert_eq!(pages.len(), 4);
    assert!(pages.iter().all(|(items, _, next)| items.is_empty() && next.is_none()));
    let mut segments: Vec<usize> = pages.iter().map(|p| p.1).collect();
    segments.sort_unstable();
    assert_eq!(segments, vec![0, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_resumes_every_segment() -> Result<()> {
    let ddb = engine_with((0..1000).map(|n| order(n % 37, n)));
    let total_segments = 4;
    let options = ScanOptions::new().limit(50);

    let mut seen = Vec::new();
    let mut start: Option<Vec<Option<Item>>> = None;
    let mut calls = 0;
    loop {
        let mut cursors = vec![None; total_segments];
        ddb.parallel_scan(total_segments, &options, start.take(), |items, segment, next| {
            seen.extend(sort_keys(&items));
            cursors[segment] = next;
        })
        .await?;
        calls += 1;

        if cursors.iter().all(Option::is_none) {
            break;
        }
        start = Some(cursors);
        assert!(calls < 100, "scan does not terminate");
    }

    assert_eq!(seen.len(), 1000);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 1000);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_skips_finished_segments() -> Result<()> {
    let ddb = engine_with((0..40).map(|n| order(1, n)));

    ddb.parallel_scan(3, &ScanOptions::new(), Some(vec![None, None, None]), |_, _, _| {})
        .await?;
    assert!(ddb.store().log().scans.is_empty());

    let mut segments = Vec::new();
    let start = Some(vec![None, Some(order(1, 0)), None]);
    ddb.parallel_scan(3, &ScanOptions::new(), start, |_, segment, _| {
        segments.push(segment)
    })
    .await?;
    assert_eq!(segments, vec![1]);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_validation() {
    let ddb = engine_with((0..5).map(|n| order(1, n)));

    let result = ddb
        .parallel_scan(3, &ScanOptions::new(), Some(vec![None, None]), |_, _, _| {})
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = ddb.parallel_scan(0, &ScanOptions::new(), None, |_, _, _| {}).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = ddb
        .parallel_scan(2, &ScanOptions::new().filter("total >"), None, |_, _, _| {})
        .await;
    assert!(matches!(result, Err(Error::Expression(_))));

    assert!(ddb.store().log().scans.is_empty());
}

#[tokio::test]
async fn test_scan_index_is_sparse() -> Result<()> {
    let ddb = engine_with((0..10).map(|n| {
        if n % 2 == 0 {
            order(1, n)
        } else {
            Item::new()
                .set_string("PK", "USER#1")
                .set_string("SK", format!("ORDER#{n:04}"))
        }
    }));

    let mut items = Vec::new();
    ddb.scan(&ScanOptions::new().index("GSI1"), None, |page, _| items.extend(page))
        .await?;

    assert_eq!(items.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_scan_index_resumes_from_cursor() -> Result<()> {
    let ddb = engine_with((0..30).map(|n| {
        if n < 20 {
            order(n % 3, n)
        } else {
            Item::new()
                .set_string("PK", "USER#9")
                .set_string("SK", format!("ORDER#{n:04}"))
        }
    }));
    let options = ScanOptions::new().index("GSI1").limit(4);

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut calls = 0;
    loop {
        let mut next_cursor = None;
        ddb.scan(&options, cursor.take(), |items, next| {
            seen.extend(sort_keys(&items));
            next_cursor = next;
        })
        .await?;
        calls += 1;
        match next_cursor {
            Some(next) => {
                // Index cursors carry the table key and the index key
                let mut names: Vec<&String> = next.attributes().keys().collect();
                names.sort_unstable();
                assert_eq!(names, vec!["GSI1PK", "GSI1SK", "PK", "SK"]);
                cursor = Some(next);
            }
            None => break,
        }
        assert!(calls < 20, "scan does not terminate");
    }

    assert_eq!(calls, 5);
    assert_eq!(seen.len(), 20);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 20);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_index_resumes_every_segment() -> Result<()> {
    let ddb = engine_with((0..60).map(|n| order(n % 7, n)));
    let total_segments = 3;
    let options = ScanOptions::new().index("GSI1").limit(5);

    let mut seen = Vec::new();
    let mut start: Option<Vec<Option<Item>>> = None;
    let mut calls = 0;
    loop {
        let mut cursors = vec![None; total_segments];
        ddb.parallel_scan(total_segments, &options, start.take(), |items, segment, next| {
            seen.extend(sort_keys(&items));
            cursors[segment] = next;
        })
        .await?;
        calls += 1;

        if cursors.iter().all(Option::is_none) {
            break;
        }
        assert!(cursors.iter().flatten().all(|cursor| cursor.len() == 4));
        start = Some(cursors);
        assert!(calls < 100, "scan does not terminate");
    }

    assert_eq!(seen.len(), 60);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 60);
    Ok(())
}

#[tokio::test]
async fn test_parallel_scan_fails_after_all_segments_ran() {
    let store = MemoryStore::with_items(orders_table(), (0..40).map(|n| order(1, n)));
    store.fail_next(1);
    let ddb = engine(store);

    let mut segments = Vec::new();
    let result = ddb
        .parallel_scan(4, &ScanOptions::new(), None, |_, segment, _| {
            segments.push(segment)
        })
        .await;

    assert!(matches!(result, Err(Error::Request(_))));
    // Only the first segment failed, the others were scanned to the end
    segments.sort_unstable();
    assert_eq!(segments, vec![1, 2, 3]);
    assert_eq!(ddb.store().log().scans.len(), 3);
}

// --- Throttling ---

#[tokio::test]
async fn test_throttled_requests_are_retried() -> Result<()> {
    let store = MemoryStore::new(orders_table());
    store.throttle_next(3);
    let ddb = engine(store);

    ddb.put_item(order(1, 1), None).await?;

    let log = ddb.store().log();
    assert_eq!(log.throttled, 3);
    assert_eq!(log.puts.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_throttling_gives_up_after_max_retries() {
    let store = MemoryStore::new(orders_table());
    store.throttle_next(5);
    let ddb = DynamoDb::with_store(store, orders_table()).with_retry_policy(no_sleep(2));

    let result = ddb.put_item(order(1, 1), None).await;

    assert!(matches!(result, Err(Error::Throttled(_))));
    assert_eq!(ddb.store().log().throttled, 3);
    assert_eq!(ddb.store().len(), 0);
}

#[tokio::test]
async fn test_each_page_retries_independently() -> Result<()> {
    let store = MemoryStore::with_items(orders_table(), (0..12).map(|n| order(1, n)))
        .with_page_size(4);
    let ddb = engine(store);

    let mut seen = Vec::new();
    let mut first_page = true;
    ddb.query("PK = \"USER#1\"", &QueryOptions::new(), |items, _, _| {
        if first_page {
            // Throttle the request for the second page
            ddb.store().throttle_next(2);
            first_page = false;
        }
        seen.extend(sort_keys(&items));
    })
    .await?;

    assert_eq!(seen.len(), 12);
    let log = ddb.store().log();
    assert_eq!(log.throttled, 2);
    assert_eq!(log.queries.len(), 3);
    Ok(())
}
