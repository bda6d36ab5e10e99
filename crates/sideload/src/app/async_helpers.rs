use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

pub(super) async fn run_with_timeout<T, E, F, M>(
    timeout: Duration,
    timeout_operation: &'static str,
    future: F,
    map_error: M,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    M: FnOnce(E) -> AppError,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(map_error(error)),
        Err(_) => Err(AppError::timeout(timeout_operation, timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::run_with_timeout;
    use crate::error::AppError;

    #[tokio::test]
    async fn run_with_timeout_returns_inner_success_value() {
        let result = run_with_timeout(
            Duration::from_secs(1),
            "Release check",
            async { Ok::<_, &'static str>(42) },
            |_| AppError::SessionClosed,
        )
        .await
        .expect("success result should pass through");

        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn run_with_timeout_maps_operation_error() {
        let result = run_with_timeout(
            Duration::from_secs(1),
            "Release check",
            async { Err::<(), _>("org.nope") },
            AppError::unknown_package,
        )
        .await;

        assert_eq!(result, Err(AppError::unknown_package("org.nope")));
    }

    #[tokio::test]
    async fn run_with_timeout_returns_timeout_error() {
        let result = run_with_timeout(
            Duration::from_millis(5),
            "Release check",
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, AppError>(())
            },
            |error| error,
        )
        .await;

        assert_eq!(
            result,
            Err(AppError::Timeout {
                operation: "Release check",
                seconds: 0,
            })
        );
    }
}
