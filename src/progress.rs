// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Progress reporting boundary.

The core reports progress through two independent sinks: a numeric
percentage in `0..=100` and free-text status lines. Both are optional;
an absent sink makes reporting a no-op. What the embedding application
does with the events is its own business.
*/

use std::fmt::Formatter;

type PercentSink = Box<dyn Fn(u8) + Send + Sync>;
type StatusSink = Box<dyn Fn(&str) + Send + Sync>;

/// Forwards progress events to caller-supplied sinks.
#[derive(Default)]
pub struct ProgressReporter {
    percent: Option<PercentSink>,
    status: Option<StatusSink>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("percent", &self.percent.is_some())
            .field("status", &self.status.is_some())
            .finish()
    }
}

impl ProgressReporter {
    /// Construct a reporter with no sinks attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink receiving percentage values.
    pub fn with_percent_sink(mut self, sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.percent = Some(Box::new(sink));
        self
    }

    /// Attach a sink receiving status messages.
    pub fn with_status_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.status = Some(Box::new(sink));
        self
    }

    /// Report a completion percentage, clamped to 100.
    pub fn percent(&self, value: u8) {
        if let Some(sink) = &self.percent {
            sink(value.min(100));
        }
    }

    /// Report a free-text status message.
    pub fn status(&self, message: &str) {
        if let Some(sink) = &self.status {
            sink(message);
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        std::sync::{Arc, Mutex},
    };

    #[test]
    fn sinks_receive_events() {
        let percents = Arc::new(Mutex::new(vec![]));
        let statuses = Arc::new(Mutex::new(vec![]));

        let percents_sink = Arc::clone(&percents);
        let statuses_sink = Arc::clone(&statuses);

        let reporter = ProgressReporter::new()
            .with_percent_sink(move |value| percents_sink.lock().unwrap().push(value))
            .with_status_sink(move |message| {
                statuses_sink.lock().unwrap().push(message.to_string())
            });

        reporter.percent(50);
        reporter.percent(200);
        reporter.status("fetching");

        assert_eq!(*percents.lock().unwrap(), vec![50, 100]);
        assert_eq!(*statuses.lock().unwrap(), vec!["fetching".to_string()]);
    }

    #[test]
    fn absent_sinks_are_noops() {
        let reporter = ProgressReporter::new();
        reporter.percent(10);
        reporter.status("quiet");
    }
}
