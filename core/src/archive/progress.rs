use std::fmt;

/// Stage of an archive copy.
///
/// Phases arrive in order: `Counting`, one `Category` per archived root,
/// `Metadata`, `Complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Counting,
    Category(String),
    Metadata,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Counting => f.write_str("counting"),
            Phase::Category(name) => write!(f, "category:{name}"),
            Phase::Metadata => f.write_str("metadata"),
            Phase::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Number of files the operation will copy; fixed after counting.
    pub total: u64,
    /// Files copied so far. Never decreases.
    pub processed: u64,
}

/// Receives progress events. Called only between completed file copies.
///
/// Any `FnMut(&ProgressEvent)` closure is an observer.
pub trait ProgressObserver {
    fn on_progress(&mut self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressEvent),
{
    fn on_progress(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Tracks counters and forwards events to an observer.
pub(crate) struct Reporter<'a> {
    observer: &'a mut dyn ProgressObserver,
    total: u64,
    processed: u64,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(observer: &'a mut dyn ProgressObserver) -> Self {
        Self {
            observer,
            total: 0,
            processed: 0,
        }
    }

    pub(crate) fn counted(&mut self, total: u64) {
        self.total = total;
        self.emit(Phase::Counting);
    }

    pub(crate) fn category(&mut self, name: &str) {
        self.emit(Phase::Category(name.to_string()));
    }

    pub(crate) fn file_done(&mut self, name: &str) {
        self.processed += 1;
        self.emit(Phase::Category(name.to_string()));
    }

    pub(crate) fn metadata(&mut self) {
        self.emit(Phase::Metadata);
    }

    pub(crate) fn complete(&mut self) {
        self.emit(Phase::Complete);
    }

    fn emit(&mut self, phase: Phase) {
        let event = ProgressEvent {
            phase,
            total: self.total,
            processed: self.processed,
        };
        self.observer.on_progress(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn closures_are_observers() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: &ProgressEvent| seen.push(event.phase.to_string());
            let mut reporter = Reporter::new(&mut observer);
            reporter.counted(1);
            reporter.category("memory");
            reporter.file_done("memory");
            reporter.metadata();
            reporter.complete();
        }
        assert_eq!(
            seen,
            vec![
                "counting",
                "category:memory",
                "category:memory",
                "metadata",
                "complete"
            ]
        );
    }

    #[test]
    fn no_progress_accepts_events() {
        let mut observer = NoProgress;
        let mut reporter = Reporter::new(&mut observer);
        reporter.counted(0);
        reporter.complete();
    }
}
