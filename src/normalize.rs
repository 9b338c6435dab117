use tokio::sync::oneshot;

use crate::error::BackendError;
use crate::storage::Completion;

/// Issues `call` and waits for the completion it was handed.
///
/// The outcome passed to the completion is returned as-is: an error keeps its
/// code and message, a value is not copied or reshaped. An `Err` returned by
/// `call` itself becomes the output of the future. A completion that is
/// dropped without being invoked resolves to an error instead of hanging.
pub async fn from_callback<T, F>(call: F) -> Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce(Completion<T>) -> Result<(), BackendError>,
{
    let (tx, rx) = oneshot::channel();
    let done: Completion<T> = Box::new(move |outcome| {
        // Receiver gone means the caller stopped waiting.
        let _ = tx.send(outcome);
    });

    call(done)?;

    rx.await
        .map_err(|_| BackendError::new("Backend dropped the completion without reporting a result"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_inline_success() {
        let value = from_callback(|done: Completion<u32>| {
            done(Ok(7));
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_error_kept_intact() {
        let original = BackendError::new("delete failed")
            .with_code(403)
            .with_reason("AccessDenied");
        let sent = original.clone();

        let err = from_callback(move |done: Completion<()>| {
            done(Err(sent));
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err, original);
        assert_eq!(err.code(), Some(403));
    }

    #[tokio::test]
    async fn test_deferred_completion() {
        let value = from_callback(|done: Completion<String>| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done(Ok("later".to_string()));
            });
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(value, "later");
    }

    #[tokio::test]
    async fn test_synchronous_failure() {
        let err = from_callback(|_done: Completion<()>| {
            Err(BackendError::new("bad arguments").with_code(400))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some(400));
    }

    #[tokio::test]
    async fn test_dropped_completion() {
        let err = from_callback(|done: Completion<()>| {
            drop(done);
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.message().contains("dropped"));
    }
}
