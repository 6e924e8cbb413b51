//! Set up of the application's SQLite database.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{Error, provider::create_provider_table};

/// Create the application tables if they do not exist.
///
/// # Errors
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_provider_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Open the database at `path`, create missing tables and wrap the connection
/// for sharing between sessions.
///
/// # Errors
/// Returns an error if the file cannot be opened or the tables cannot be
/// created.
pub fn open_shared(path: &Path) -> Result<Arc<Mutex<Connection>>, Error> {
    let connection = Connection::open(path)?;
    initialize(&connection)?;

    tracing::info!("opened provider database at {}", path.display());

    Ok(Arc::new(Mutex::new(connection)))
}
