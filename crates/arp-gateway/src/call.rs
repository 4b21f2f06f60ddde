use crate::error::{DownstreamError, ServiceTarget};
use arp_model::ServiceResult;
use std::future::Future;

/// Runs one downstream call on its own task and normalizes its failure.
///
/// The caller only awaits the join handle, so a slow downstream never holds
/// the caller's task and a panicking one surfaces as `<service>_unavailable`.
pub async fn call_downstream<T, Fut>(target: &ServiceTarget, call: Fut) -> ServiceResult<T>
where
    Fut: Future<Output = Result<T, DownstreamError>> + Send + 'static,
    T: Send + 'static,
{
    let outcome = match tokio::spawn(call).await {
        Ok(result) => result.map_err(|error| target.normalize(error)),
        Err(join_error) => Err(target.unavailable(join_error)),
    };

    if let Err(error) = &outcome {
        tracing::warn!(
            service = target.name(),
            base_url = target.base_url(),
            code = %error.code,
            status = error.status_code,
            "downstream call failed"
        );
    }
    outcome
}
