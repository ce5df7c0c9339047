//! Bound port calls by a deadline. An elapsed deadline is a persistence failure.

use crate::domain::DomainError;
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`. `what` names the call in the error message.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(DomainError::Persistence(format!(
            "{} timed out after {} ms",
            what,
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let res = bounded(Duration::from_millis(50), "noop", async { Ok::<_, DomainError>(7) }).await;
        assert_eq!(res, Ok(7));
    }

    #[tokio::test]
    async fn test_elapsed_is_persistence_error() {
        let res: Result<(), DomainError> = bounded(Duration::from_millis(10), "slow insert", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        match res {
            Err(DomainError::Persistence(msg)) => {
                assert!(msg.contains("slow insert timed out after 10 ms"), "{msg}")
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
