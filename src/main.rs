mod command_line;
mod logging;

use anyhow::Result;
use dynamodb_access::{config::TableConfig, DynamoDb};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging(logging::level_from_env())?;

    let config = TableConfig::from_env()?;
    let sdk_config = aws_config::load_from_env().await;

    info!(
        "Using table '{}' (partition key '{}', sort key {:?})",
        config.table.name(),
        config.table.primary_key().partition_key(),
        config.table.primary_key().sort_key()
    );

    let ddb = DynamoDb::new(&sdk_config, config.table).with_retry_policy(config.retry);

    command_line::run(&ddb).await
}
