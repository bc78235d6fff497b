//! [`Handler`] abstractions.

use std::future::Future;

/// Executable handler.
///
/// Every seam of the system is a [`Handler`] of some operation: commands and
/// queries of a service, storage operations of a database, delivery of a
/// notification, publishing of a signal.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
