use instant::Instant;

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;

pub fn elapsed_seconds(since: Instant) -> f64 {
    let dt = since.elapsed();
    (dt.as_secs() as f64) + (f64::from(dt.subsec_nanos()) * 1e-9)
}

pub fn prettyprint_time(seconds: f64) -> String {
    format!("{:.4}s", seconds)
}

struct Progress {
    label: String,
    processed_items: usize,
    total_items: usize,
    started_at: Instant,
    last_printed_at: Instant,
}

impl Progress {
    fn new(label: &str, total_items: usize) -> Progress {
        Progress {
            label: label.to_string(),
            processed_items: 0,
            total_items,
            started_at: Instant::now(),
            last_printed_at: Instant::now(),
        }
    }

    // Returns when done
    fn next(&mut self) -> Option<(f64, String)> {
        self.processed_items += 1;
        if self.processed_items > self.total_items {
            panic!(
                "{} is too few items for {} progress",
                self.total_items, self.label
            );
        }

        if self.processed_items == self.total_items {
            let elapsed = elapsed_seconds(self.started_at);
            let line = format!(
                "{} ({})... {}",
                self.label,
                self.total_items,
                prettyprint_time(elapsed)
            );
            debug!("{}", line);
            return Some((elapsed, line));
        } else if elapsed_seconds(self.last_printed_at) >= PROGRESS_FREQUENCY_SECONDS {
            self.last_printed_at = Instant::now();
            debug!(
                "{}: {}/{}... {}",
                self.label,
                self.processed_items,
                self.total_items,
                prettyprint_time(elapsed_seconds(self.started_at))
            );
        }
        None
    }
}

struct TimerSpan {
    name: String,
    started_at: Instant,
    nested_results: Vec<String>,
    nested_time: f64,
}

enum StackEntry {
    TimerSpan(TimerSpan),
    Progress(Progress),
}

/// Hierarchial magic. Records nested spans of work and per-item progress, and collects warnings
/// so callers can inspect them after the work is done. Everything is also sent through `log`.
pub struct Timer {
    results: Vec<String>,
    stack: Vec<StackEntry>,
    outermost_name: String,

    warnings: Vec<String>,
}

impl Timer {
    pub fn new<S: Into<String>>(name: S) -> Timer {
        let name = name.into();
        let mut t = Timer {
            results: Vec::new(),
            stack: Vec::new(),
            outermost_name: name.clone(),
            warnings: Vec::new(),
        };
        t.start(name);
        t
    }

    // TODO Shouldn't use this much.
    pub fn throwaway() -> Timer {
        Timer::new("throwaway")
    }

    pub fn warn(&mut self, line: String) {
        warn!("{}", line);
        self.warnings.push(line);
    }

    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    /// Hands over all warnings collected so far.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    // Used to end the scope of a timer early.
    pub fn done(self) {}

    pub fn start<S: Into<String>>(&mut self, name: S) {
        let name = name.into();
        debug!("{}...", name);
        self.stack.push(StackEntry::TimerSpan(TimerSpan {
            name,
            started_at: Instant::now(),
            nested_results: Vec::new(),
            nested_time: 0.0,
        }));
    }

    pub fn stop<S: Into<String>>(&mut self, name: S) {
        let name = name.into();
        let span = match self.stack.pop() {
            Some(StackEntry::TimerSpan(s)) => s,
            Some(StackEntry::Progress(p)) => {
                panic!("stop({}) while Progress({}) is top of the stack", name, p.label)
            }
            None => panic!("stop({}) with nothing started", name),
        };
        assert_eq!(span.name, name);
        let elapsed = elapsed_seconds(span.started_at);
        let line = format!("{} took {}", name, prettyprint_time(elapsed));

        let padding = "  ".repeat(self.stack.len());
        match self.stack.last_mut() {
            Some(StackEntry::TimerSpan(ref mut s)) => {
                s.nested_results.push(format!("{}- {}", padding, line));
                s.nested_results.extend(span.nested_results);
                s.nested_time += elapsed;
            }
            Some(StackEntry::Progress(_)) => unreachable!(),
            None => {
                self.results.push(format!("{}- {}", padding, line));
                self.results.extend(span.nested_results);
            }
        }
        debug!("{}", line);
    }

    pub fn start_iter(&mut self, name: &str, total_items: usize) {
        if total_items == 0 {
            return;
        }
        if let Some(StackEntry::Progress(p)) = self.stack.last() {
            panic!(
                "Can't start_iter({}) while Progress({}) is top of the stack",
                name, p.label
            );
        }
        self.stack
            .push(StackEntry::Progress(Progress::new(name, total_items)));
    }

    pub fn next(&mut self) {
        let maybe_result = if let Some(StackEntry::Progress(ref mut progress)) = self.stack.last_mut()
        {
            progress.next()
        } else {
            panic!("Can't next() while a TimerSpan is top of the stack");
        };
        if let Some((elapsed, line)) = maybe_result {
            self.stack.pop();
            let padding = "  ".repeat(self.stack.len());
            if let Some(StackEntry::TimerSpan(ref mut s)) = self.stack.last_mut() {
                s.nested_results.push(format!("{}- {}", padding, line));
                s.nested_time += elapsed;
            } else {
                self.results.push(format!("{}- {}", padding, line));
            }
        }
    }

    /// Abandon an iteration partway, when the work is suspended before every item is handled.
    pub fn cancel_iter(&mut self) {
        if let Some(StackEntry::Progress(_)) = self.stack.last() {
            self.stack.pop();
        }
    }
}

impl std::ops::Drop for Timer {
    fn drop(&mut self) {
        let stop_name = self.outermost_name.clone();

        // If we're in the middle of unwinding a panic, don't further blow up.
        match self.stack.last() {
            Some(StackEntry::TimerSpan(ref s)) if s.name == stop_name => {}
            _ => {
                if std::thread::panicking() {
                    return;
                }
                // Unbalanced start/stop; just unwind what's left.
                while self.stack.len() > 1 {
                    self.stack.pop();
                }
            }
        }

        if self.stack.is_empty() {
            return;
        }
        self.stop(stop_name);
        for line in &self.results {
            debug!("{}", line);
        }
        if !self.warnings.is_empty() {
            debug!("{} warnings", self.warnings.len());
        }
    }
}
