/// SQL operations for the cache monitor
///
/// Every function takes any Postgres executor, so the same operation runs on
/// the pool (auto-commit) or inside a pipeline's transaction. Rows-affected
/// counts are returned where the caller's control flow depends on them.

use sqlx::{PgExecutor, Row};

use crate::types::{parse_hex_quantity, normalize_topics, ReceiptLog, RpcBlock, RpcTransaction};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Highest stored block number for the chain, None on an empty database
pub async fn get_latest_block(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
) -> Result<Option<i64>, BoxError> {
    let number = sqlx::query_scalar::<_, i64>(
        "SELECT number FROM block WHERE blockchain_id = $1 ORDER BY number DESC LIMIT 1",
    )
    .bind(blockchain_id)
    .fetch_optional(executor)
    .await?;
    Ok(number)
}

/// Stored transaction_count for a block hash, None when the hash is unknown
pub async fn get_block_by_hash(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    hash: &str,
) -> Result<Option<i64>, BoxError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT transaction_count FROM block WHERE blockchain_id = $1 AND hash = $2",
    )
    .bind(blockchain_id)
    .bind(hash)
    .fetch_optional(executor)
    .await?;
    Ok(count)
}

/// Transaction rows stored at a height, summed across all block rows there
pub async fn get_block_transaction_count(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
) -> Result<i64, BoxError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transaction t
         JOIN block b ON b.blockchain_id = t.blockchain_id AND b.hash = t.block_hash
         WHERE b.blockchain_id = $1 AND b.number = $2",
    )
    .bind(blockchain_id)
    .bind(number)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

pub async fn add_block(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
    block: &RpcBlock,
) -> Result<u64, BoxError> {
    let size = match &block.size {
        Some(s) => Some(parse_hex_quantity(s)?),
        None => None,
    };
    let result = sqlx::query(
        "INSERT INTO block (
            blockchain_id, number, hash, parent_hash, nonce,
            gas_limit, gas_used, timestamp, sha3_uncles, logs_bloom,
            transactions_root, receipts_root, state_root, mix_hash, miner,
            difficulty, extra_data, size, transaction_count
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                  $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(blockchain_id)
    .bind(number)
    .bind(&block.hash)
    .bind(&block.parent_hash)
    .bind(&block.nonce)
    .bind(parse_hex_quantity(&block.gas_limit)?)
    .bind(parse_hex_quantity(&block.gas_used)?)
    .bind(parse_hex_quantity(&block.timestamp)?)
    .bind(&block.sha3_uncles)
    .bind(&block.logs_bloom)
    .bind(&block.transactions_root)
    .bind(&block.receipts_root)
    .bind(&block.state_root)
    .bind(&block.mix_hash)
    .bind(&block.miner)
    .bind(&block.difficulty)
    .bind(&block.extra_data)
    .bind(size)
    .bind(block.transactions.len() as i64)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_block(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
) -> Result<u64, BoxError> {
    let result = sqlx::query("DELETE FROM block WHERE blockchain_id = $1 AND number = $2")
        .bind(blockchain_id)
        .bind(number)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn add_ommer(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    hash: &str,
    nibling_hash: &str,
) -> Result<u64, BoxError> {
    let result = sqlx::query(
        "INSERT INTO ommer (blockchain_id, hash, nibling_hash) VALUES ($1, $2, $3)
         ON CONFLICT (blockchain_id, hash, nibling_hash) DO NOTHING",
    )
    .bind(blockchain_id)
    .bind(hash)
    .bind(nibling_hash)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Delete ommers referenced by block rows at a height
pub async fn delete_ommers(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
) -> Result<u64, BoxError> {
    let result = sqlx::query(
        "DELETE FROM ommer o USING block b
         WHERE b.blockchain_id = $1 AND b.number = $2
           AND o.blockchain_id = b.blockchain_id AND o.nibling_hash = b.hash",
    )
    .bind(blockchain_id)
    .bind(number)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn add_transaction(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    block_hash: &str,
    tx: &RpcTransaction,
    status: Option<&str>,
    contract_address: Option<&str>,
) -> Result<u64, BoxError> {
    let transaction_index = match &tx.transaction_index {
        Some(i) => Some(parse_hex_quantity(i)?),
        None => None,
    };
    let result = sqlx::query(
        "INSERT INTO transaction (
            blockchain_id, block_hash, hash, nonce, transaction_index,
            from_address, to_address, value, gas_price, gas,
            input, status, contract_address, v, r, s
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                  $11, $12, $13, $14, $15, $16)",
    )
    .bind(blockchain_id)
    .bind(block_hash)
    .bind(&tx.hash)
    .bind(parse_hex_quantity(&tx.nonce)?)
    .bind(transaction_index)
    .bind(&tx.from)
    .bind(&tx.to)
    .bind(&tx.value)
    .bind(&tx.gas_price)
    .bind(parse_hex_quantity(&tx.gas)?)
    .bind(&tx.input)
    .bind(status)
    .bind(contract_address)
    .bind(&tx.v)
    .bind(&tx.r)
    .bind(&tx.s)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Delete transactions belonging to any block row at a height
pub async fn delete_transactions(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
) -> Result<u64, BoxError> {
    let result = sqlx::query(
        "DELETE FROM transaction t USING block b
         WHERE b.blockchain_id = $1 AND b.number = $2
           AND t.blockchain_id = b.blockchain_id AND t.block_hash = b.hash",
    )
    .bind(blockchain_id)
    .bind(number)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Insert a log row, returning the assigned log_id
///
/// Topics arrive as a 0-4 element list and are bound as a fixed 4-slot
/// vector so the statement shape never varies.
pub async fn add_log(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    transaction_hash: &str,
    log: &ReceiptLog,
) -> Result<Option<i64>, BoxError> {
    let topics = normalize_topics(&log.topics);
    let row = sqlx::query(
        "INSERT INTO log (
            blockchain_id, transaction_hash, block_number, log_index, address,
            data, topic_0, topic_1, topic_2, topic_3
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING log_id",
    )
    .bind(blockchain_id)
    .bind(transaction_hash)
    .bind(parse_hex_quantity(&log.block_number)?)
    .bind(parse_hex_quantity(&log.log_index)?)
    .bind(&log.address)
    .bind(&log.data)
    .bind(&topics[0])
    .bind(&topics[1])
    .bind(&topics[2])
    .bind(&topics[3])
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|r| r.get::<i64, _>("log_id")))
}

pub async fn delete_logs(
    executor: impl PgExecutor<'_>,
    blockchain_id: i64,
    number: i64,
) -> Result<u64, BoxError> {
    let result = sqlx::query("DELETE FROM log WHERE blockchain_id = $1 AND block_number = $2")
        .bind(blockchain_id)
        .bind(number)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_logs_by_transaction_hash(
    executor: impl PgExecutor<'_>,
    transaction_hash: &str,
) -> Result<u64, BoxError> {
    let result = sqlx::query("DELETE FROM log WHERE transaction_hash = $1")
        .bind(transaction_hash)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Insert a decoded event row for a log
pub async fn add_log_event(
    executor: impl PgExecutor<'_>,
    log_id: i64,
    name: &str,
    contract_address: &str,
    parameters: &str,
) -> Result<u64, BoxError> {
    let result = sqlx::query(
        "INSERT INTO log_event (log_id, name, contract_address, parameters)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(log_id)
    .bind(name)
    .bind(contract_address)
    .bind(parameters)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
