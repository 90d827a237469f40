use diesel::pg::PgConnection;
use diesel::prelude::*;

/// Opens a fresh connection for the current request. Every multi-step
/// invariant runs inside a transaction on one of these connections.
pub fn connect(database_url: &str) -> Result<PgConnection, ConnectionError> {
    match PgConnection::establish(database_url) {
        Ok(conn) => Ok(conn),
        Err(e) => {
            log::error!("Failed to establish database connection: {}", e);
            Err(e)
        }
    }
}
