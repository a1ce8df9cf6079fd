/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Cheap wall-clock metrics for the hot paths of the engine.
//!
//! A metric is registered lazily the first time its `scoped_metric!` call site runs while metrics
//! are enabled. Every call site with the same name shares one row in the report, so the
//! expression compiler can be timed from several places and still show up as a single line.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread_local,
    time::{Duration, Instant},
};

#[derive(Debug, Default, Clone)]
struct Metric {
    name: &'static str,
    count: usize,
    total: Duration,
    max: Duration,
}

impl Metric {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
    }

    fn average_micros(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total.as_micros() as f64 / self.count as f64
        }
    }
}

/// Records the time between its creation and its drop into the metric it was created for.
pub struct ScopedMetric {
    metric_index: usize,
    start: Instant,
}

impl ScopedMetric {
    pub fn new(metric_index: usize) -> Self {
        ScopedMetric {
            metric_index,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedMetric {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        REGISTRY.with(|r| r.borrow_mut().record(self.metric_index, elapsed));
    }
}

#[derive(Debug, Default)]
struct Registry {
    metrics: Vec<Metric>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    fn register(&mut self, name: &'static str) -> usize {
        if let Some(index) = self.by_name.get(name) {
            return *index;
        }
        self.metrics.push(Metric {
            name,
            ..Default::default()
        });
        let index = self.metrics.len() - 1;
        self.by_name.insert(name, index);
        index
    }

    fn record(&mut self, index: usize, elapsed: Duration) {
        self.metrics[index].record(elapsed);
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "metric " is the narrowest the first column gets.
        let name_width = self
            .metrics
            .iter()
            .map(|m| m.name.len())
            .fold(7, std::cmp::max);
        writeln!(
            f,
            "{:name_width$} {:>6} {:>9} {:>9} {:>11}",
            "metric",
            "count",
            "avg (us)",
            "max (us)",
            "total (us)",
            name_width = name_width
        )?;
        writeln!(
            f,
            "{:-<name_width$} {:-^6} {:-^9} {:-^9} {:-^11}",
            "",
            "",
            "",
            "",
            "",
            name_width = name_width
        )?;
        for metric in &self.metrics {
            writeln!(
                f,
                "{:name_width$} {:>6} {:>9.1} {:>9} {:>11}",
                metric.name,
                metric.count,
                metric.average_micros(),
                metric.max.as_micros(),
                metric.total.as_micros(),
                name_width = name_width
            )?;
        }
        Ok(())
    }
}

/// Times the rest of the enclosing block under `$name` when metrics are enabled.
#[macro_export]
macro_rules! scoped_metric {
    ($name:literal) => {
        let _scoped_metric = if $crate::is_enabled() {
            thread_local! {
                static METRIC_INDEX: usize = $crate::new_metric($name);
            }
            ::core::option::Option::Some($crate::ScopedMetric::new(METRIC_INDEX.with(|m| *m)))
        } else {
            ::core::option::Option::None
        };
    };
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}
static ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn new_metric(name: &'static str) -> usize {
    REGISTRY.with(|r| r.borrow_mut().register(name))
}

/// Number of samples recorded so far for `name` on this thread.
pub fn count(name: &str) -> usize {
    REGISTRY.with(|r| {
        let r = r.borrow();
        r.by_name.get(name).map_or(0, |i| r.metrics[*i].count)
    })
}

/// The metrics table for this thread.
pub fn report() -> String {
    REGISTRY.with(|r| r.borrow().to_string())
}

pub fn dump() {
    let report = report();
    tracing::debug!(rows = REGISTRY.with(|r| r.borrow().metrics.len()), "dumping metrics");
    eprint!("{}", report);
}
