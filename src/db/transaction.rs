/*!
 * Transaction Helper Utilities
 *
 * A `UnitOfWork` is passed explicitly down the call stack instead of asking the
 * driver whether a transaction is already open. A routine that receives one either
 * owns the transaction (and decides commit/rollback) or joins the caller's.
 */

use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub enum UnitOfWork<'c> {
    /// Opened by the current routine; committed or rolled back by it.
    Owned(DatabaseTransaction),
    /// Borrowed from a caller that already holds a transaction.
    Joined(&'c DatabaseTransaction),
}

impl UnitOfWork<'static> {
    /// Opens a new transaction owned by the returned unit of work.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        counter!("cafe_db.transaction.started", 1);
        Ok(UnitOfWork::Owned(txn))
    }
}

impl<'c> UnitOfWork<'c> {
    /// Participates in the caller's transaction.
    pub fn join(txn: &'c DatabaseTransaction) -> Self {
        UnitOfWork::Joined(txn)
    }

    pub fn txn(&self) -> &DatabaseTransaction {
        match self {
            UnitOfWork::Owned(txn) => txn,
            UnitOfWork::Joined(txn) => txn,
        }
    }

    pub fn owns_transaction(&self) -> bool {
        matches!(self, UnitOfWork::Owned(_))
    }

    /// Commits an owned transaction. A joined unit leaves the decision to its owner.
    pub async fn commit(self) -> Result<(), DbErr> {
        match self {
            UnitOfWork::Owned(txn) => {
                txn.commit().await?;
                counter!("cafe_db.transaction.committed", 1);
                Ok(())
            }
            UnitOfWork::Joined(_) => Ok(()),
        }
    }

    /// Rolls back an owned transaction. A joined unit is rolled back by its owner
    /// once the error propagates there.
    pub async fn rollback(self) -> Result<(), DbErr> {
        match self {
            UnitOfWork::Owned(txn) => {
                txn.rollback().await?;
                counter!("cafe_db.transaction.rolled_back", 1);
                Ok(())
            }
            UnitOfWork::Joined(_) => Ok(()),
        }
    }
}

/// Execute a function within a database transaction
///
/// Commits when the closure returns `Ok`, rolls back otherwise. The closure's
/// `ServiceError` is returned unchanged.
///
/// # Example
///
/// ```rust,ignore
/// let order = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let order = order.insert(txn).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let uow = UnitOfWork::begin(db).await.map_err(ServiceError::db_error)?;
    match f(uow.txn()).await {
        Ok(value) => {
            uow.commit().await.map_err(ServiceError::db_error)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback failed after {}", err);
            }
            Err(err)
        }
    }
}

/// Runs an audit write inside a savepoint. A failure rolls back only the savepoint,
/// is logged, and reported as `false`; the enclosing transaction stays usable.
pub async fn best_effort<F>(txn: &DatabaseTransaction, what: &'static str, f: F) -> bool
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<(), DbErr>>,
{
    let savepoint = match txn.begin().await {
        Ok(savepoint) => savepoint,
        Err(e) => {
            warn!(error = %e, write = what, "Could not open savepoint; skipping write");
            return false;
        }
    };

    match f(&savepoint).await {
        Ok(()) => match savepoint.commit().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, write = what, "Failed to release savepoint");
                false
            }
        },
        Err(e) => {
            warn!(error = %e, write = what, "Best-effort write failed; continuing");
            if let Err(rollback_err) = savepoint.rollback().await {
                debug!(error = %rollback_err, write = what, "Savepoint rollback failed");
            }
            false
        }
    }
}
