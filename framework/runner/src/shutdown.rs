use tokio::signal;

use crate::executor::Executor;

/// Listen for Ctrl-C and turn it into a sweep-wide shutdown.
pub fn start_shutdown_listener(executor: &Executor) {
    let handle = executor.shutdown_handle().clone();
    executor.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, stopping the sweep...");
                handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e:?}"),
        }
    });
}
