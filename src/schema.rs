/// Schema bootstrap
///
/// Idempotent DDL executed at startup so a fresh database needs no
/// out-of-band migration step. Block rows are unique by (blockchain_id, hash);
/// a height can carry several rows across reorg history and the most recently
/// written one is the de-facto block.

use sqlx::PgPool;

const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS block (
        block_id BIGSERIAL PRIMARY KEY,
        blockchain_id BIGINT NOT NULL,
        number BIGINT NOT NULL,
        hash TEXT NOT NULL,
        parent_hash TEXT NOT NULL,
        nonce TEXT,
        gas_limit BIGINT NOT NULL,
        gas_used BIGINT NOT NULL,
        timestamp BIGINT NOT NULL,
        sha3_uncles TEXT,
        logs_bloom TEXT,
        transactions_root TEXT,
        receipts_root TEXT,
        state_root TEXT,
        mix_hash TEXT,
        miner TEXT,
        difficulty TEXT,
        extra_data TEXT,
        size BIGINT,
        transaction_count BIGINT NOT NULL,
        UNIQUE (blockchain_id, hash)
    )",
    "CREATE INDEX IF NOT EXISTS block_chain_number_idx
        ON block (blockchain_id, number)",
    "CREATE TABLE IF NOT EXISTS ommer (
        ommer_id BIGSERIAL PRIMARY KEY,
        blockchain_id BIGINT NOT NULL,
        hash TEXT NOT NULL,
        nibling_hash TEXT NOT NULL,
        UNIQUE (blockchain_id, hash, nibling_hash)
    )",
    "CREATE INDEX IF NOT EXISTS ommer_nibling_idx
        ON ommer (blockchain_id, nibling_hash)",
    "CREATE TABLE IF NOT EXISTS transaction (
        transaction_id BIGSERIAL PRIMARY KEY,
        blockchain_id BIGINT NOT NULL,
        block_hash TEXT NOT NULL,
        hash TEXT NOT NULL,
        nonce BIGINT NOT NULL,
        transaction_index BIGINT,
        from_address TEXT NOT NULL,
        to_address TEXT,
        value TEXT NOT NULL,
        gas_price TEXT,
        gas BIGINT NOT NULL,
        input TEXT,
        status TEXT,
        contract_address TEXT,
        v TEXT,
        r TEXT,
        s TEXT
    )",
    "CREATE INDEX IF NOT EXISTS transaction_block_hash_idx
        ON transaction (blockchain_id, block_hash)",
    "CREATE INDEX IF NOT EXISTS transaction_hash_idx
        ON transaction (blockchain_id, hash)",
    "CREATE TABLE IF NOT EXISTS log (
        log_id BIGSERIAL PRIMARY KEY,
        blockchain_id BIGINT NOT NULL,
        transaction_hash TEXT NOT NULL,
        block_number BIGINT NOT NULL,
        log_index BIGINT NOT NULL,
        address TEXT NOT NULL,
        data TEXT,
        topic_0 TEXT,
        topic_1 TEXT,
        topic_2 TEXT,
        topic_3 TEXT
    )",
    "CREATE INDEX IF NOT EXISTS log_block_number_idx
        ON log (blockchain_id, block_number)",
    "CREATE INDEX IF NOT EXISTS log_transaction_hash_idx
        ON log (transaction_hash)",
    "CREATE TABLE IF NOT EXISTS log_event (
        log_event_id BIGSERIAL PRIMARY KEY,
        log_id BIGINT NOT NULL REFERENCES log (log_id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        contract_address TEXT,
        parameters TEXT
    )",
    "CREATE INDEX IF NOT EXISTS log_event_log_id_idx
        ON log_event (log_id)",
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
