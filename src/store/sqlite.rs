// This file is part of Astarte.
//
// Copyright 2026 SECO Mind Srl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! A durable [`PropertyStore`] backed by an on-disk SQLite database.
//!
//! Values are stored as a BSON-encoded BLOB of the tagged [`AstarteData`], independent of the
//! BSON `{v, t}` framing used on the wire (§4.3).

use std::sync::{Arc, Mutex};

use astarte_interfaces::Ownership;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, trace};

use super::{PropertyStore, StoredProperty};
use crate::types::AstarteData;

const MIGRATION: &str = "
CREATE TABLE IF NOT EXISTS properties (
    interface TEXT NOT NULL,
    path TEXT NOT NULL,
    interface_major INTEGER NOT NULL,
    ownership INTEGER NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (interface, path)
);
";

/// Error returned by a [`SqliteStore`] operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
    /// The database connection couldn't be opened or migrated.
    #[error("could not open database at {uri}")]
    Open {
        /// The underlying rusqlite error.
        #[source]
        err: rusqlite::Error,
        /// The connection string that failed to open.
        uri: String,
    },
    /// A query failed.
    #[error("could not execute query")]
    Query(#[from] rusqlite::Error),
    /// A stored value couldn't be decoded back into an [`AstarteData`].
    #[error("could not decode stored property")]
    Decode(#[from] bson::de::Error),
    /// A stored value couldn't be re-encoded.
    #[error("could not encode property for storage")]
    Encode(#[from] bson::ser::Error),
    /// A stored `ownership` column held a value other than 0 or 1.
    #[error("corrupt ownership tag {0} in stored property")]
    StoreCorrupt(i64),
    /// The background database task panicked or was cancelled.
    #[error("database worker task failed")]
    Join(#[from] tokio::task::JoinError),
}

fn ownership_tag(ownership: Ownership) -> i64 {
    match ownership {
        Ownership::Device => 0,
        Ownership::Server => 1,
    }
}

fn ownership_from_tag(tag: i64) -> Result<Ownership, SqliteError> {
    match tag {
        0 => Ok(Ownership::Device),
        1 => Ok(Ownership::Server),
        other => Err(SqliteError::StoreCorrupt(other)),
    }
}

fn encode_value(value: &AstarteData) -> Result<Vec<u8>, SqliteError> {
    let doc = bson::to_document(value)?;
    let mut bytes = Vec::new();
    doc.to_writer(&mut bytes)?;
    Ok(bytes)
}

fn decode_value(bytes: &[u8]) -> Result<AstarteData, SqliteError> {
    let doc = bson::Document::from_reader(bytes)?;
    Ok(bson::from_document(doc)?)
}

/// An on-disk SQLite-backed [`PropertyStore`].
///
/// Every operation is dispatched via [`tokio::task::spawn_blocking`] onto the blocking thread
/// pool, since `rusqlite` is synchronous.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `uri` and runs the embedded migration.
    pub async fn new(uri: &str) -> Result<Self, SqliteError> {
        let uri = uri.to_string();
        let conn = tokio::task::spawn_blocking({
            let uri = uri.clone();
            move || -> Result<Connection, SqliteError> {
                let conn = Connection::open(&uri).map_err(|err| SqliteError::Open {
                    err,
                    uri: uri.clone(),
                })?;
                conn.execute_batch(MIGRATION)?;
                Ok(conn)
            }
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, SqliteError>
    where
        F: FnOnce(&Connection) -> Result<T, SqliteError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock().unwrap())).await?
    }
}

impl PropertyStore for SqliteStore {
    type Err = SqliteError;

    async fn store(
        &self,
        interface: &str,
        major: i32,
        path: &str,
        ownership: Ownership,
        value: &AstarteData,
    ) -> Result<(), Self::Err> {
        debug!(interface, path, "storing property");
        let bytes = encode_value(value)?;
        let interface = interface.to_string();
        let path = path.to_string();
        let tag = ownership_tag(ownership);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO properties (interface, path, interface_major, ownership, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(interface, path) DO UPDATE SET
                   interface_major = excluded.interface_major,
                   ownership = excluded.ownership,
                   value = excluded.value",
                params![interface, path, major, tag, bytes],
            )?;
            Ok(())
        })
        .await
    }

    async fn load(
        &self,
        interface: &str,
        major: i32,
        path: &str,
    ) -> Result<Option<AstarteData>, Self::Err> {
        let interface = interface.to_string();
        let path = path.to_string();

        self.with_conn(move |conn| {
            let row: Option<(i32, Vec<u8>)> = conn
                .query_row(
                    "SELECT interface_major, value FROM properties WHERE interface = ?1 AND path = ?2",
                    params![interface, path],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((stored_major, bytes)) = row else {
                return Ok(None);
            };

            if stored_major != major {
                error!(interface, path, stored_major, major, "major version mismatch, deleting");
                conn.execute(
                    "DELETE FROM properties WHERE interface = ?1 AND path = ?2",
                    params![interface, path],
                )?;
                return Ok(None);
            }

            trace!(interface, path, "loaded property");
            decode_value(&bytes).map(Some)
        })
        .await
    }

    async fn delete(&self, interface: &str, path: &str) -> Result<(), Self::Err> {
        let interface = interface.to_string();
        let path = path.to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM properties WHERE interface = ?1 AND path = ?2",
                params![interface, path],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_by_interface(&self, interface: &str) -> Result<(), Self::Err> {
        let interface = interface.to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM properties WHERE interface = ?1",
                params![interface],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), Self::Err> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM properties", [])?;
            Ok(())
        })
        .await
    }

    async fn load_all(&self) -> Result<Vec<StoredProperty>, Self::Err> {
        self.with_conn(|conn| load_rows(conn, None)).await
    }

    async fn load_by_ownership(&self, ownership: Ownership) -> Result<Vec<StoredProperty>, Self::Err> {
        let tag = ownership_tag(ownership);
        self.with_conn(move |conn| load_rows(conn, Some(("ownership = ?1", tag)))).await
    }

    async fn load_by_interface(&self, interface: &str) -> Result<Vec<StoredProperty>, Self::Err> {
        let interface = interface.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT interface, path, interface_major, ownership, value FROM properties WHERE interface = ?1",
            )?;
            let rows = stmt.query_map(params![interface], row_to_record)?;
            collect_rows(rows)
        })
        .await
    }
}

fn load_rows(conn: &Connection, filter: Option<(&str, i64)>) -> Result<Vec<StoredProperty>, SqliteError> {
    match filter {
        None => {
            let mut stmt =
                conn.prepare("SELECT interface, path, interface_major, ownership, value FROM properties")?;
            let rows = stmt.query_map([], row_to_record)?;
            collect_rows(rows)
        }
        Some((clause, value)) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT interface, path, interface_major, ownership, value FROM properties WHERE {clause}"
            ))?;
            let rows = stmt.query_map(params![value], row_to_record)?;
            collect_rows(rows)
        }
    }
}

type RawRow = (String, String, i32, i64, Vec<u8>);

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> Result<Vec<StoredProperty>, SqliteError> {
    rows.map(|row| {
        let (interface, path, major, tag, bytes) = row?;
        Ok(StoredProperty {
            interface,
            major,
            path,
            ownership: ownership_from_tag(tag)?,
            value: decode_value(&bytes)?,
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_property_store;

    #[tokio::test]
    async fn sqlite_store_conforms_to_property_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");

        let db = SqliteStore::new(path.to_str().unwrap()).await.unwrap();

        test_property_store(db).await;
    }
}
