use crate::resolver::{GraphStatus, ResolutionEvent};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// Drives a "Resolving graphs" bar from resolver events on a background thread.
pub struct ProgressManager {
    bar: ProgressBar,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ResolutionEvent>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ResolutionEvent>();

        let bar = if console::Term::stderr().is_term() {
            let bar = ProgressBar::new(0).with_message("Resolving graphs");
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}") {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let bar_clone = bar.clone();
        let handle = thread::spawn(move || {
            for event in rx {
                match event {
                    ResolutionEvent::Started { total } => {
                        bar_clone.set_length(total as u64);
                        bar_clone.enable_steady_tick(Duration::from_millis(100));
                    }
                    ResolutionEvent::LevelStarted { depth, graphs } => {
                        bar_clone.set_message(format!("Resolving graphs (depth {}, {} graph(s))", depth, graphs));
                    }
                    ResolutionEvent::GraphFinished { graph, status } => {
                        if status != GraphStatus::Resolved {
                            bar_clone.println(format!("{} {} {}", Icons::WARN, graph, status));
                        }
                        bar_clone.inc(1);
                    }
                    ResolutionEvent::Finished => {
                        bar_clone.finish_and_clear();
                    }
                }
            }
        });

        (
            Self {
                bar,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Waits for the event thread; every sender must be dropped first.
    pub fn finish_with_summary(mut self, duration: Duration, graphs: usize, bindings: usize, errors: usize) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Progress thread panicked");
            }
        }
        self.bar.finish_and_clear();

        let style = if errors == 0 {
            theme().success.clone()
        } else {
            theme().error.clone()
        };
        let icon = if errors == 0 { Icons::CHECK } else { Icons::CROSS };
        eprintln!();
        eprintln!(
            "{} {}",
            icon.style(style.clone()),
            format!("Resolved in {}", HumanDuration(duration)).style(style)
        );
        eprintln!(
            "  {} {} graph(s)  {} {} binding(s)  {} {} error(s)",
            Icons::PACKAGE.style(theme().info.clone()),
            graphs,
            Icons::LINK.style(theme().info.clone()),
            bindings,
            Icons::CROSS.style(theme().info.clone()),
            errors
        );
    }
}
