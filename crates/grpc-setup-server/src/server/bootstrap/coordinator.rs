use futures::FutureExt;
use grpc_setup_core::{Error, Result, types::Component};
use std::{future::Future, panic::AssertUnwindSafe};
use tokio::{sync::mpsc, task::JoinSet};

/// Runs both servers and returns as soon as the first one finishes, or when
/// `shutdown` resolves.
///
/// Each server runs on its own task and reports its terminal outcome into a
/// channel with one slot per server, so neither send can block. Whichever
/// outcome arrives first decides the process's fate:
///
/// - `Err`: logged with the component and returned. The surviving server is
///   not kept alive; a half-running process is not a supported state.
/// - `Ok`: a server stopped without an error. Logged and returned as `Ok`.
///
/// A server task that panics reports [`Error::Panicked`]. Both tasks are
/// aborted when this function returns; nothing is drained.
pub async fn coordinate<G, R, S>(grpc: G, gateway: R, shutdown: S) -> Result<()>
where
    G: Future<Output = Result<()>> + Send + 'static,
    R: Future<Output = Result<()>> + Send + 'static,
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::channel::<(Component, Result<()>)>(2);
    let mut tasks = JoinSet::new();
    tasks.spawn(report(Component::Grpc, grpc, tx.clone()));
    tasks.spawn(report(Component::Gateway, gateway, tx));

    tracing::debug!("both servers started");

    tokio::select! {
        outcome = rx.recv() => match outcome {
            Some((component, Err(e))) => {
                tracing::error!(component = %component, error = %e, "server failed, terminating");
                Err(e)
            }
            Some((component, Ok(()))) => {
                tracing::warn!(component = %component, "server stopped, terminating");
                Ok(())
            }
            // Every sender reports before it is dropped.
            None => Ok(()),
        },
        () = shutdown => {
            tracing::info!("shutdown signal received, terminating");
            Ok(())
        }
    }
}

async fn report<F>(component: Component, server: F, tx: mpsc::Sender<(Component, Result<()>)>)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let outcome = AssertUnwindSafe(server)
        .catch_unwind()
        .await
        .unwrap_or(Err(Error::Panicked { component }));
    // The receiver is gone once the coordinator has decided; nothing to do.
    let _ = tx.send((component, outcome)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    async fn fail(component: Component) -> Result<()> {
        Err(Error::Serve {
            component,
            source: std::io::Error::other("listener closed"),
        })
    }

    async fn fail_after(component: Component, delay: Duration) -> Result<()> {
        tokio::time::sleep(delay).await;
        fail(component).await
    }

    async fn explode() -> Result<()> {
        panic!("boom")
    }

    async fn stop() -> Result<()> {
        Ok(())
    }

    fn serving() -> futures::future::Pending<Result<()>> {
        futures::future::pending()
    }

    fn no_signal() -> futures::future::Pending<()> {
        futures::future::pending()
    }

    #[tokio::test]
    async fn first_error_wins_from_grpc() {
        let result = coordinate(fail(Component::Grpc), serving(), no_signal()).await;
        assert!(matches!(
            result,
            Err(Error::Serve {
                component: Component::Grpc,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn first_error_wins_from_gateway() {
        let result = coordinate(serving(), fail(Component::Gateway), no_signal()).await;
        assert!(matches!(
            result,
            Err(Error::Serve {
                component: Component::Gateway,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn earlier_outcome_decides() {
        let result = coordinate(
            fail_after(Component::Grpc, Duration::from_millis(200)),
            fail(Component::Gateway),
            no_signal(),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::Serve {
                component: Component::Gateway,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn panicking_server_is_reported() {
        let result = coordinate(explode(), serving(), no_signal()).await;
        assert!(matches!(
            result,
            Err(Error::Panicked {
                component: Component::Grpc
            })
        ));
    }

    #[tokio::test]
    async fn clean_stop_ends_the_process_normally() {
        let result = coordinate(stop(), serving(), no_signal()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_signal_ends_the_wait() {
        let result = coordinate(serving(), serving(), async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn surviving_server_is_aborted() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(Arc::clone(&dropped));
        let survivor = async move {
            let _guard = guard;
            futures::future::pending::<Result<()>>().await
        };

        let result = coordinate(fail(Component::Grpc), survivor, no_signal()).await;
        assert!(result.is_err());

        tokio::time::timeout(Duration::from_secs(1), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("surviving server was not aborted");
    }
}
