use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;

/// How often the background thread samples the current process.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Aggregated resource usage of one monitored run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceStats {
    /// Average CPU usage in percent, ignoring warm-up zero samples.
    pub avg_cpu_pct: f64,
    /// Peak CPU usage in percent.
    pub peak_cpu_pct: f64,
    /// Average resident memory in megabytes.
    pub avg_mem_mb: f64,
    /// Peak resident memory in megabytes.
    pub peak_mem_mb: f64,
}

impl ResourceStats {
    /// Aggregates raw samples into stats.
    ///
    /// The first CPU sample of a run is usually 0.0 because usage is measured
    /// against the previous refresh, so the CPU average is taken over non-zero
    /// samples only. Empty sample sets yield all zeros.
    pub(crate) fn from_samples(cpu_samples: &[f64], mem_samples: &[f64]) -> ResourceStats {
        let mut stats = ResourceStats::default();

        let valid_cpu: Vec<f64> = cpu_samples.iter().copied().filter(|s| *s > 0.0).collect();
        if !valid_cpu.is_empty() {
            stats.avg_cpu_pct = valid_cpu.iter().sum::<f64>() / valid_cpu.len() as f64;
        }
        stats.peak_cpu_pct = cpu_samples.iter().copied().fold(0.0, f64::max);

        if !mem_samples.is_empty() {
            stats.avg_mem_mb = mem_samples.iter().sum::<f64>() / mem_samples.len() as f64;
            stats.peak_mem_mb = mem_samples.iter().copied().fold(0.0, f64::max);
        }

        stats
    }
}

/// Samples CPU and resident memory of the current process on a background
/// thread while a monitored call runs.
pub struct ResourceSampler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<(Vec<f64>, Vec<f64>)>>,
}

impl ResourceSampler {
    /// Starts the sampling thread.
    pub fn start() -> ResourceSampler {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::spawn(move || sample_loop(&flag));

        ResourceSampler {
            running,
            handle: Some(handle),
        }
    }

    /// Stops the sampling thread and aggregates its samples.
    pub fn stop(mut self) -> ResourceStats {
        self.running.store(false, Ordering::Relaxed);

        let Some(handle) = self.handle.take() else {
            return ResourceStats::default();
        };

        match handle.join() {
            Ok((cpu_samples, mem_samples)) => {
                ResourceStats::from_samples(&cpu_samples, &mem_samples)
            }
            Err(_) => {
                warn!("resource sampling thread panicked, reporting empty stats");
                ResourceStats::default()
            }
        }
    }
}

impl Drop for ResourceSampler {
    fn drop(&mut self) {
        // Lets the thread wind down even when `stop` was never called.
        self.running.store(false, Ordering::Relaxed);
    }
}

fn sample_loop(running: &AtomicBool) -> (Vec<f64>, Vec<f64>) {
    let mut cpu_samples = Vec::new();
    let mut mem_samples = Vec::new();

    let Ok(pid) = sysinfo::get_current_pid() else {
        warn!("could not determine the current pid, resource sampling disabled");
        return (cpu_samples, mem_samples);
    };

    let mut system = System::new();

    while running.load(Ordering::Relaxed) {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let Some(process) = system.process(pid) else {
            break;
        };

        cpu_samples.push(process.cpu_usage() as f64);
        mem_samples.push(process.memory() as f64 / BYTES_PER_MB);

        std::thread::sleep(SAMPLE_INTERVAL);
    }

    (cpu_samples, mem_samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_yield_zeros() {
        assert_eq!(ResourceStats::from_samples(&[], &[]), ResourceStats::default());
    }

    #[test]
    fn cpu_average_ignores_warmup_zeros() {
        let stats = ResourceStats::from_samples(&[0.0, 10.0, 20.0], &[]);
        assert_eq!(stats.avg_cpu_pct, 15.0);
        assert_eq!(stats.peak_cpu_pct, 20.0);
    }

    #[test]
    fn all_zero_cpu_samples_yield_zero_average() {
        let stats = ResourceStats::from_samples(&[0.0, 0.0], &[]);
        assert_eq!(stats.avg_cpu_pct, 0.0);
        assert_eq!(stats.peak_cpu_pct, 0.0);
    }

    #[test]
    fn memory_average_uses_all_samples() {
        let stats = ResourceStats::from_samples(&[], &[100.0, 200.0, 300.0]);
        assert_eq!(stats.avg_mem_mb, 200.0);
        assert_eq!(stats.peak_mem_mb, 300.0);
    }

    #[test]
    fn sampler_stops_cleanly_without_samples() {
        // Stopped immediately: the thread may not have sampled yet, which must
        // still produce a well-formed (possibly zeroed) result.
        let sampler = ResourceSampler::start();
        let stats = sampler.stop();
        assert!(stats.peak_mem_mb >= 0.0);
    }
}
