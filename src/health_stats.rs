//! Running statistics about the poller, rendered on `/health`.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (current, average, max, min, count)
    fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

pub struct HealthStats {
    started: Instant,
    poll_duration_seconds: Stat,
    cpu_percent: Stat,
    gpu_percent: Stat,
    total_polls: AtomicU64,
    failed_polls: AtomicU64,
    http_requests: AtomicU64,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            poll_duration_seconds: Stat::default(),
            cpu_percent: Stat::default(),
            gpu_percent: Stat::default(),
            total_polls: AtomicU64::new(0),
            failed_polls: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_poll(&self, duration_seconds: f64, cpu: Option<u8>, gpu: Option<u8>) {
        self.poll_duration_seconds.add_sample(duration_seconds);
        if let Some(cpu) = cpu {
            self.cpu_percent.add_sample(cpu as f64);
        }
        if let Some(gpu) = gpu {
            self.gpu_percent.add_sample(gpu as f64);
        }
        self.total_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_poll(&self) {
        self.failed_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_polls(&self) -> u64 {
        self.total_polls.load(Ordering::Relaxed)
    }

    pub fn failed_polls(&self) -> u64 {
        self.failed_polls.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let left_col = 22usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        let rows: [(&str, &Stat, usize); 3] = [
            ("poll duration (s)", &self.poll_duration_seconds, 3),
            ("cpu usage (%)", &self.cpu_percent, 1),
            ("gpu usage (%)", &self.gpu_percent, 1),
        ];
        for (label, stat, precision) in rows {
            let (cur, avg, max, min, _count) = stat.snapshot();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.prec$}", cur, prec = precision),
                format!("{:.prec$}", avg, prec = precision),
                format!("{:.prec$}", max, prec = precision),
                format!("{:.prec$}", min, prec = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of done polls: {}", self.total_polls()).ok();
        writeln!(out, "number of failed polls: {}", self.failed_polls()).ok();
        writeln!(
            out,
            "http requests: {}",
            self.http_requests.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(out, "uptime (s): {}", self.uptime_seconds()).ok();

        out
    }
}
