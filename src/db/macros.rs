//! Database dispatch macros for reducing code duplication.
//!
//! These expand into a `match` over the driver-specific connection held by a
//! backend, so per-driver code stays linear and readable.

/// Macro for generating connection dispatch match arms.
///
/// This macro generates match arms for `LiveConnection` variants, reducing the
/// need to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_conn_dispatch!(live, {
///     MySql(c) => do_mysql(c).await,
///     Postgres(c) => do_postgres(c).await,
///     SQLite(c) => do_sqlite(c).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_conn_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connection::LiveConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_conn_dispatch;
