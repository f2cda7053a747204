//! Client library for CableDB.
//!
//! [`Transport`] speaks the frame protocol over TCP; [`DbAdapter`] is the
//! typed facade applications consume.

pub mod adapter;
pub mod transport;

pub use adapter::DbAdapter;
pub use transport::Transport;

use cabledb_error::Result;

/// Connect a transport and wrap it in an adapter for `database`.
pub async fn connect(addr: &str, database: &str) -> Result<DbAdapter> {
    let transport = Transport::connect(addr).await?;
    Ok(DbAdapter::new(transport, database))
}
