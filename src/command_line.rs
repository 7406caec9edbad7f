use anyhow::{anyhow, Context, Result};
use dynamodb_access::expression::{compile_filter, compile_key, CompiledExpression};
use dynamodb_access::{DynamoDb, Item, QueryOptions, ScanOptions, WriteRequest};
use std::io::{self, Write};
use tracing::{error, info};

/// Runs the command-line interface for the configured DynamoDB table.
///
/// This function enters a loop that prompts the user for commands and executes them.
/// The supported commands are:
/// - info: Print table information
/// - put: Add an item, given as JSON, optionally under a condition
/// - get: Retrieve an item by key
/// - delete: Delete an item by key
/// - batch_put: Add several items, given as a JSON array
/// - query: Query items page by page
/// - scan: Scan items page by page
/// - parallel_scan: Scan the table in segments, resuming with the segment cursors
/// - compile: Show how a condition compiles
/// - exit: Exit the program
///
/// A failed command is reported and the loop continues.
pub async fn run(ddb: &DynamoDb) -> Result<()> {
    loop {
        let command = prompt(
            "Enter command (info/put/get/delete/batch_put/query/scan/parallel_scan/compile/exit)",
            None,
        )?;
        let result = match command.as_str() {
            "info" => {
                print_info(ddb);
                Ok(())
            }
            "put" => put_item(ddb).await,
            "get" => get_item(ddb).await,
            "delete" => delete_item(ddb).await,
            "batch_put" => batch_put_items(ddb).await,
            "query" => query_items(ddb).await,
            "scan" => scan_items(ddb).await,
            "parallel_scan" => parallel_scan_items(ddb).await,
            "compile" => compile_expression(),
            "exit" => break,
            _ => {
                println!("Unknown command. Please try again.");
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("{command} failed: {e:#}");
        }
    }
    Ok(())
}

/// Prints the table name, its key schema and its indexes.
fn print_info(ddb: &DynamoDb) {
    let table = ddb.table();

    println!("\n--- Table Information ---");
    println!("Table Name: {}", table.name());
    println!("Partition Key: {}", table.primary_key().partition_key());
    if let Some(key) = table.primary_key().sort_key() {
        println!("Sort Key: {}", key);
    }
    if !table.indexes().is_empty() {
        println!("Indexes:");
        for (name, key) in table.indexes() {
            println!("  {}: {}", name, key.attribute_names().join(", "));
        }
    }
    println!("-------------------------\n");
}

async fn put_item(ddb: &DynamoDb) -> Result<()> {
    let item = parse_item(&prompt(
        "Enter item as JSON",
        Some(r#"{"category": "Books", "product_name": "Dune", "price": 9.99}"#),
    )?)?;
    let condition = prompt_optional(
        "Enter condition (or press Enter for none)",
        Some("attribute_not_exists(category)"),
    )?;

    ddb.put_item(item, condition.as_deref()).await?;
    info!("Item added successfully!");
    Ok(())
}

async fn get_item(ddb: &DynamoDb) -> Result<()> {
    let key = create_key_item(ddb)?;
    match ddb.get_item(&key).await? {
        Some(item) => println!("Item found: {}", format_item(&item)),
        None => println!("Item not found"),
    }
    Ok(())
}

async fn delete_item(ddb: &DynamoDb) -> Result<()> {
    let key = create_key_item(ddb)?;
    ddb.batch_write(vec![WriteRequest::delete(key)]).await?;
    println!("Item deleted successfully!");
    Ok(())
}

async fn batch_put_items(ddb: &DynamoDb) -> Result<()> {
    let input = prompt(
        "Enter items as a JSON array",
        Some(r#"[{"category": "Books", "product_name": "Dune"}]"#),
    )?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&input).context("expected a JSON array of objects")?;
    let requests = values
        .iter()
        .map(|value| Item::from_serialize(value).map(WriteRequest::put))
        .collect::<Result<Vec<_>, _>>()?;

    let count = requests.len();
    ddb.batch_write(requests).await?;
    println!("{} items written", count);
    Ok(())
}

async fn query_items(ddb: &DynamoDb) -> Result<()> {
    let key_expression = prompt("Enter key condition", Some(r#"category = "Books""#))?;
    let mut options = QueryOptions {
        index_name: prompt_optional("Enter index name (or press Enter for none)", Some("GSI1"))?,
        filter: prompt_optional("Enter filter (or press Enter for none)", Some("price > 10"))?,
        scan_forward: prompt_bool("Ascending sort key order?", true)?,
        start: None,
        limit: prompt_limit()?,
    };

    let mut page_num = 1;
    loop {
        let mut cursor = None;
        ddb.query(&key_expression, &options, |items, _prev, next| {
            print_items(&format!("Query Results (Page {})", page_num), &items);
            page_num += 1;
            cursor = next;
        })
        .await?;

        if cursor.is_none() || !prompt_bool("Continue to next page?", true)? {
            break;
        }
        options.start = cursor;
    }
    Ok(())
}

async fn scan_items(ddb: &DynamoDb) -> Result<()> {
    let options = prompt_scan_options()?;

    let mut start = None;
    let mut page_num = 1;
    loop {
        let mut cursor = None;
        ddb.scan(&options, start.take(), |items, next| {
            print_items(&format!("Scan Results (Page {})", page_num), &items);
            page_num += 1;
            cursor = next;
        })
        .await?;

        if cursor.is_none() || !prompt_bool("Continue to next page?", true)? {
            break;
        }
        start = cursor;
    }
    Ok(())
}

async fn parallel_scan_items(ddb: &DynamoDb) -> Result<()> {
    let total_segments: usize = prompt("Enter number of segments", Some("4"))?
        .parse()
        .context("number of segments must be a positive integer")?;
    let options = prompt_scan_options()?;

    let mut start = None;
    loop {
        let mut cursors: Vec<Option<Item>> = vec![None; total_segments];
        ddb.parallel_scan(total_segments, &options, start.take(), |items, segment, next| {
            print_items(&format!("Segment {} Results", segment), &items);
            if let Some(slot) = cursors.get_mut(segment) {
                *slot = next;
            }
        })
        .await?;

        let pending = cursors.iter().filter(|c| c.is_some()).count();
        if pending == 0 {
            println!("All segments finished");
            break;
        }
        if !prompt_bool(&format!("{} segments have more items. Continue?", pending), true)? {
            break;
        }
        start = Some(cursors);
    }
    Ok(())
}

fn compile_expression() -> Result<()> {
    let text = prompt("Enter expression", Some(r#"price > 10 and begins_with(name, "a")"#))?;
    let compiled = if prompt_bool("Is this a key condition?", false)? {
        compile_key(&text, None)?
    } else {
        compile_filter(Some(text.as_str()), None)?.ok_or_else(|| anyhow!("Empty expression"))?
    };
    print_compiled(&compiled);
    Ok(())
}

fn print_compiled(compiled: &CompiledExpression) {
    println!("\n--- Compiled Expression ---");
    println!("Expression: {}", compiled.expression);
    let mut names: Vec<_> = compiled.attribute_names.iter().collect();
    names.sort();
    for (placeholder, name) in names {
        println!("  {} => {}", placeholder, name);
    }
    let mut values: Vec<_> = compiled.attribute_values.iter().collect();
    values.sort_by(|a, b| a.0.cmp(b.0));
    for (placeholder, value) in values {
        println!("  {} => {:?}", placeholder, value);
    }
    println!("---------------------------\n");
}

fn prompt_scan_options() -> Result<ScanOptions> {
    Ok(ScanOptions {
        index_name: prompt_optional("Enter index name (or press Enter for none)", Some("GSI1"))?,
        filter: prompt_optional("Enter filter (or press Enter for none)", Some("price > 10"))?,
        limit: prompt_limit()?,
    })
}

fn prompt_limit() -> Result<Option<usize>> {
    prompt_optional("Enter limit (or press Enter for none)", Some("10"))?
        .map(|limit| limit.parse().context("limit must be a positive integer"))
        .transpose()
}

/// Prompts for the primary key values; keys are strings.
fn create_key_item(ddb: &DynamoDb) -> Result<Item> {
    let key_schema = ddb.table().primary_key();
    key_schema
        .attribute_names()
        .into_iter()
        .try_fold(Item::new(), |item, name| {
            let value = prompt(&format!("Enter {}", name), None)?;
            Ok(item.set_string(name, value))
        })
}

fn parse_item(input: &str) -> Result<Item> {
    let value: serde_json::Value =
        serde_json::from_str(input).context("expected a JSON object")?;
    if !value.is_object() {
        return Err(anyhow!("expected a JSON object"));
    }
    Ok(Item::from_serialize(&value)?)
}

fn format_item(item: &Item) -> String {
    item.deserialize::<serde_json::Value>()
        .map(|value| value.to_string())
        .unwrap_or_else(|_| format!("{:?}", item.attributes()))
}

fn prompt(message: &str, example: Option<&str>) -> Result<String> {
    let full_message = if let Some(ex) = example {
        format!("{} (e.g., {}): ", message, ex)
    } else {
        format!("{}: ", message)
    };
    print!("{}", full_message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn print_items(title: &str, items: &[Item]) {
    println!("\n--- {} ---", title);
    items.iter().for_each(|item| println!("{}", format_item(item)));
    println!("{}", "-".repeat(title.len() + 8));
}

fn prompt_optional(message: &str, example: Option<&str>) -> Result<Option<String>> {
    let input = prompt(message, example)?;
    Ok(if input.is_empty() { None } else { Some(input) })
}

fn prompt_bool(message: &str, default: bool) -> Result<bool> {
    let input = prompt(
        &format!("{} (y/n)", message),
        Some(if default { "y" } else { "n" }),
    )?;
    Ok(input.to_lowercase().starts_with('y') || (input.is_empty() && default))
}
