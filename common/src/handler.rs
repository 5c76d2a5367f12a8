//! [`Handler`] abstraction.

use std::future::Future;

/// Executable unit of behavior, parametrized by the operation it handles.
///
/// Database adapters, commands, queries, background tasks and notification
/// ports all speak this single interface.
pub trait Handler<Args = ()> {
    /// Value produced by a successful execution.
    type Ok;

    /// Error produced by a failed execution.
    type Err;

    /// Executes this [`Handler`] with the provided operation.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
