//! Database operations for the provider reference table.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    provider::{Provider, ProviderCode},
};

/// Insert a provider.
///
/// # Errors
/// Returns [Error::DuplicateProviderCode] if the code is already in use.
pub fn create_provider(provider: &Provider, connection: &Connection) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO provider (code, name, second_name, pt_name) VALUES (?1, ?2, ?3, ?4);",
            (
                provider.code.as_ref(),
                &provider.name,
                &provider.second_name,
                &provider.pt_name,
            ),
        )
        .map_err(|error| with_code(error, &provider.code))?;

    Ok(())
}

/// Retrieve a single provider by code.
pub fn get_provider(code: &ProviderCode, connection: &Connection) -> Result<Provider, Error> {
    connection
        .prepare("SELECT code, name, second_name, pt_name FROM provider WHERE code = :code;")?
        .query_row(&[(":code", code.as_ref())], map_row)
        .map_err(|error| error.into())
}

/// Retrieve all providers ordered by code.
pub fn get_all_providers(connection: &Connection) -> Result<Vec<Provider>, Error> {
    connection
        .prepare("SELECT code, name, second_name, pt_name FROM provider ORDER BY code ASC;")?
        .query_map([], map_row)?
        .map(|maybe_provider| maybe_provider.map_err(|error| error.into()))
        .collect()
}

/// Replace the provider stored under `code` with `provider`, which may carry a new code.
///
/// # Errors
/// Returns [Error::UpdateMissingProvider] if no provider has `code`, and
/// [Error::DuplicateProviderCode] if the new code belongs to another provider.
pub fn update_provider(
    code: &ProviderCode,
    provider: &Provider,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE provider SET code = ?1, name = ?2, second_name = ?3, pt_name = ?4
            WHERE code = ?5",
            (
                provider.code.as_ref(),
                &provider.name,
                &provider.second_name,
                &provider.pt_name,
                code.as_ref(),
            ),
        )
        .map_err(|error| with_code(error, &provider.code))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingProvider);
    }

    Ok(())
}

/// Delete a provider by code. Returns an error if the provider doesn't exist.
pub fn delete_provider(code: &ProviderCode, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM provider WHERE code = ?1", [code.as_ref()])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingProvider);
    }

    Ok(())
}

/// Initialize the provider table and indexes.
pub fn create_provider_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS provider (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            second_name TEXT,
            pt_name TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_provider_name ON provider(name);",
    )?;

    Ok(())
}

/// Fill in the offending code on duplicate-key errors.
fn with_code(error: rusqlite::Error, code: &ProviderCode) -> Error {
    match Error::from(error) {
        Error::DuplicateProviderCode(_) => Error::DuplicateProviderCode(code.to_string()),
        error => error,
    }
}

fn map_row(row: &Row) -> Result<Provider, rusqlite::Error> {
    let raw_code: String = row.get(0)?;

    Ok(Provider {
        code: ProviderCode::new_unchecked(&raw_code),
        name: row.get(1)?,
        second_name: row.get(2)?,
        pt_name: row.get(3)?,
    })
}
