use std::future::Future;

use crate::error::RemoteError;

/// Optimistic update discipline shared by every mutating action.
///
/// `apply_local` runs synchronously before the remote call is awaited, so
/// the new state is observable while the request is in flight. Exactly one
/// of `on_success` / `on_failure` runs afterwards; the failure path is
/// expected to leave confirmed remote state or the empty state behind.
pub async fn perform_optimistic<T, R, Call, Success, Failure, FailureFut>(
    apply_local: impl FnOnce(),
    remote_call: Call,
    on_success: Success,
    on_failure: Failure,
) -> R
where
    Call: Future<Output = Result<T, RemoteError>>,
    Success: FnOnce(T) -> R,
    Failure: FnOnce(RemoteError) -> FailureFut,
    FailureFut: Future<Output = R>,
{
    apply_local();
    match remote_call.await {
        Ok(value) => on_success(value),
        Err(err) => on_failure(err).await,
    }
}
