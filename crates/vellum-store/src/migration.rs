//! SQLite schema versions.
//!
//! `vellum_schema` records each applied version. Opening a database runs
//! every step above the recorded version inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vellum_schema (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM vellum_schema",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO vellum_schema (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Run the step that produces `version`.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: blocks, signing keys, pointers.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Content-addressed blocks
        CREATE TABLE blocks (
            hash BLOB PRIMARY KEY,            -- multihash bytes
            data BLOB NOT NULL,
            owner BLOB NOT NULL,              -- first owner to write it
            created_at INTEGER NOT NULL
        );

        -- Registered public signing keys; the key block also lives in blocks
        CREATE TABLE signing_keys (
            key_hash BLOB PRIMARY KEY,        -- multihash of the key block
            public_key BLOB NOT NULL          -- 32 bytes, Ed25519
        );

        -- Mutable pointers, one per (owner, writer)
        CREATE TABLE pointers (
            owner BLOB NOT NULL,
            writer BLOB NOT NULL,
            target BLOB,                      -- multihash, NULL when absent
            payload BLOB NOT NULL,            -- latest accepted signed payload
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (owner, writer)
        );
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
