//! Signal-driven shutdown.
//!
//! A dedicated thread waits for SIGINT or SIGTERM on a small current-thread
//! runtime. When one arrives it closes the [`BusySignal`], waits for any
//! running batch loop to finish, then quits.

use crate::busy::BusySignal;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Completes on Ctrl-C, or on SIGTERM where available.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Watches for OS signals and exits the process with status 0 once no
/// batch loop is running.
pub fn spawn_signal_watcher(busy: Arc<BusySignal>) -> io::Result<JoinHandle<()>> {
    spawn_watcher(busy, shutdown_signal(), || {
        println!(" Interrupt received... Quitting!");
        std::process::exit(0);
    })
}

/// Runs `on_quit` after `trigger` completes and `busy` has drained.
pub fn spawn_watcher<F, Q>(busy: Arc<BusySignal>, trigger: F, on_quit: Q) -> io::Result<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
    Q: FnOnce() + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("kvsync-signals".into())
        .spawn(move || {
            runtime.block_on(trigger);
            if busy.is_busy() {
                info!("waiting for the running transaction loop to finish");
            }
            busy.close_and_wait();
            on_quit();
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn quit_waits_for_busy_section() {
        let busy = Arc::new(BusySignal::new());
        let quit = Arc::new(AtomicBool::new(false));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let guard = busy.enter().unwrap();
        let watcher = {
            let quit = Arc::clone(&quit);
            spawn_watcher(
                Arc::clone(&busy),
                async move {
                    let _ = rx.await;
                },
                move || quit.store(true, Ordering::SeqCst),
            )
            .unwrap()
        };

        tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(!quit.load(Ordering::SeqCst));
        assert!(busy.is_closed());

        drop(guard);
        watcher.join().unwrap();
        assert!(quit.load(Ordering::SeqCst));
        assert!(busy.enter().is_err());
    }

    #[test]
    fn idle_signal_quits_immediately() {
        let busy = Arc::new(BusySignal::new());
        let quit = Arc::new(AtomicBool::new(false));
        let watcher = {
            let quit = Arc::clone(&quit);
            spawn_watcher(Arc::clone(&busy), async {}, move || {
                quit.store(true, Ordering::SeqCst)
            })
            .unwrap()
        };
        watcher.join().unwrap();
        assert!(quit.load(Ordering::SeqCst));
    }
}
