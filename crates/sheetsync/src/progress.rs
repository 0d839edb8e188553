//! 📊 progress.rs: "Are we there yet?", asked once per chunk.
//!
//! 🚀 The upsert engine emits a [`ProgressEvent`] after every committed chunk.
//! Whoever listens decides what that means: a terminal bar with a comfy table
//! under it, a `Vec` for tests to assert on, or nothing at all.
//!
//! ⚠️ Watching this progress bar will not make Firestore go faster.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;

/// 📡 Cumulative state of one import, after a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Records looked at so far.
    pub current: usize,
    /// Records in the whole import.
    pub total: usize,
    /// What is being imported, e.g. `helios products`.
    pub label: String,
    pub processed: usize,
    pub skipped: usize,
}

/// 👀 Somebody who wants to know how it is going.
pub trait ProgressObserver: std::fmt::Debug + Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
    /// ✅ The import labelled `label` is over, successfully or not.
    fn on_finish(&self, _label: &str) {}
}

/// 🔇 Listens politely, remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// 📼 Keeps every event, for tests that want to replay the import.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(_) => warn!("📼 progress recorder lock poisoned, event dropped"),
        }
    }
}

/// 🔢 Formats a number with commas. "1000000" → "1,000,000", you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🎨 One bar per import label.
struct ActiveBar {
    label: String,
    progress_bar: ProgressBar,
    /// 🔄 sliding window of (timestamp, records seen) for the rate
    rate_samples: VecDeque<(Instant, usize)>,
    start_time: Instant,
}

impl ActiveBar {
    fn new(label: &str, total: usize) -> Self {
        let progress_bar = ProgressBar::new(total as u64);
        match ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
            Ok(style) => progress_bar.set_style(style.progress_chars("=>-")),
            Err(err) => warn!("🎨 progress template rejected ({err}), using the default bar"),
        }
        let start_time = Instant::now();
        Self {
            label: label.to_string(),
            progress_bar,
            rate_samples: VecDeque::from([(start_time, 0)]),
            start_time,
        }
    }

    /// 📈 Records per second over a 5-second sliding window.
    fn records_per_sec(&mut self, current: usize) -> f64 {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, current));
        match self.rate_samples.front() {
            Some(&(oldest_time, oldest)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    current.saturating_sub(oldest) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// 🍽️ Layout:
    /// ```text
    /// import: <label>
    ///   <records/s>      <current / total>
    ///   <processed>      <skipped>
    ///   <elapsed>        <remaining>
    /// | [=====>----------]
    /// ```
    fn render(&mut self, event: &ProgressEvent) {
        let rate = self.records_per_sec(event.current);
        let elapsed = self.start_time.elapsed();
        let fraction = if event.total > 0 {
            event.current as f64 / event.total as f64
        } else {
            0.0
        };
        let remaining = if fraction > 0.0 && fraction < 1.0 {
            // 🔮 linear extrapolation, assumes the future looks like the past
            let remaining_secs = elapsed.as_secs_f64() / fraction - elapsed.as_secs_f64();
            format_duration(Duration::from_secs_f64(remaining_secs.max(0.0)))
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            right(format!("{} Records/s", format_number(rate as u64))),
            right(format!(
                "{} / {}",
                format_number(event.current as u64),
                format_number(event.total as u64)
            )),
        ]);
        table.add_row(vec![
            right(format!("{} written", format_number(event.processed as u64))),
            right(format!("{} skipped", format_number(event.skipped as u64))),
        ]);
        table.add_row(vec![
            right(format!("{} elapsed", format_duration(elapsed))),
            right(format!("{} remaining", remaining)),
        ]);

        self.progress_bar
            .set_message(format!("import: {}\n{}", self.label, table));
        self.progress_bar.set_position(event.current as u64);
    }
}

/// 🖥️ The terminal bar. A new bar starts whenever the label changes.
#[derive(Default)]
pub struct TerminalProgress {
    active: Mutex<Option<ActiveBar>>,
}

impl std::fmt::Debug for TerminalProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        let label = self
            .active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().map(|bar| bar.label.clone()));
        f.debug_struct("TerminalProgress")
            .field("label", &label)
            .finish()
    }
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let stale = active.as_ref().is_none_or(|bar| bar.label != event.label);
        if stale {
            if let Some(previous) = active.take() {
                previous.progress_bar.finish();
            }
            *active = Some(ActiveBar::new(&event.label, event.total));
        }
        if let Some(bar) = active.as_mut() {
            bar.render(event);
        }
    }

    fn on_finish(&self, label: &str) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        if active.as_ref().is_some_and(|bar| bar.label == label)
            && let Some(bar) = active.take()
        {
            bar.progress_bar.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(current: usize, label: &str) -> ProgressEvent {
        ProgressEvent {
            current,
            total: 10,
            label: label.into(),
            processed: current,
            skipped: 0,
        }
    }

    #[test]
    fn the_one_where_numbers_get_their_commas() {
        assert_eq!(format_number(1_200), "1,200");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_duration(Duration::from_secs(65)), "01:05");
    }

    #[test]
    fn the_one_where_the_recorder_remembers_everything() {
        let recorder = RecordingProgress::new();
        recorder.on_progress(&event(5, "a"));
        recorder.on_progress(&event(10, "a"));
        let currents: Vec<usize> = recorder.events().iter().map(|e| e.current).collect();
        assert_eq!(currents, vec![5, 10]);
    }

    #[test]
    fn the_one_where_a_new_label_gets_a_new_bar() {
        let terminal = TerminalProgress::new();
        terminal.on_progress(&event(5, "helios products"));
        terminal.on_progress(&event(3, "helios customers"));
        assert!(format!("{terminal:?}").contains("helios customers"));
        terminal.on_finish("helios customers");
        assert!(format!("{terminal:?}").contains("None"));
    }
}
