use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use sweep_core::prelude::{DelegatedShutdownListener, ShutdownHandle};

/// Shows how much of a measured run's planned duration has elapsed. Cleared when dropped.
pub struct RunProgress {
    stop: ShutdownHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RunProgress {
    pub fn start(label: String, planned_runtime: Duration) -> Self {
        let stop = ShutdownHandle::new();
        let thread = spawn_progress(label, planned_runtime, stop.new_listener());
        Self { stop, thread }
    }
}

impl Drop for RunProgress {
    fn drop(&mut self) {
        self.stop.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn spawn_progress(
    label: String,
    planned_runtime: Duration,
    mut stop_listener: DelegatedShutdownListener,
) -> Option<std::thread::JoinHandle<()>> {
    let result = std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            let style = match ProgressStyle::with_template(
                "{spinner:.green} {prefix} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
            ) {
                Ok(style) => style,
                Err(e) => {
                    log::warn!("Invalid progress template: {e}");
                    return;
                }
            };
            pb.set_style(
                style
                    .with_key("planned_runtime", {
                        let hours = planned_runtime.as_secs() / 3600;
                        let minutes = (planned_runtime.as_secs() % 3600) / 60;
                        let seconds = planned_runtime.as_secs() % 60;
                        move |_state: &ProgressState, w: &mut dyn Write| {
                            let _ = write!(w, "{hours:02}:{minutes:02}:{seconds:02}");
                        }
                    })
                    .progress_chars("#>-"),
            );
            pb.set_prefix(label);

            loop {
                if stop_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                std::thread::sleep(Duration::from_millis(250));
            }
        });

    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Failed to start progress thread: {e}");
            None
        }
    }
}
