use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::profiles::Timeouts;

use super::process::DriverError;

/// The file the engine appends result sets to.
#[derive(Debug, Clone)]
pub struct OutputSink {
    path: PathBuf,
}

impl OutputSink {
    pub fn new(db: &Path, file_name: &str) -> Self {
        Self {
            path: db.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empties the sink so the next read only sees the next round's output.
    pub fn truncate(&self) -> Result<(), DriverError> {
        std::fs::File::create(&self.path)?;
        Ok(())
    }

    pub fn read_lines(&self) -> Result<Vec<String>, DriverError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(err) => Err(err.into()),
        }
    }

    fn len(&self) -> Result<u64, DriverError> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Waits until the sink holds at least `expected` lines and has not
    /// changed for the quiet period.
    ///
    /// When the timeout expires on a sink that is stable but short, its lines
    /// are returned anyway: a missing row is the comparator's to report. A
    /// sink that stayed empty, or is still being written at the deadline, is
    /// a timeout.
    pub fn wait_for_lines(
        &self,
        expected: usize,
        timeouts: &Timeouts,
    ) -> Result<Vec<String>, DriverError> {
        let start = Instant::now();
        let mut last_len = self.len()?;
        let mut stable_since = Instant::now();
        loop {
            std::thread::sleep(timeouts.poll_interval());
            let len = self.len()?;
            if len != last_len {
                last_len = len;
                stable_since = Instant::now();
            } else if stable_since.elapsed() >= timeouts.sink_quiet() {
                let lines = self.read_lines()?;
                if lines.len() >= expected {
                    return Ok(lines);
                }
            }

            if start.elapsed() >= timeouts.sink_timeout() {
                let lines = self.read_lines()?;
                let settled = stable_since.elapsed() >= timeouts.sink_quiet();
                if lines.is_empty() || !settled {
                    return Err(DriverError::SinkTimeout {
                        expected,
                        actual: lines.len(),
                        timeout: timeouts.sink_timeout(),
                    });
                }
                tracing::warn!(
                    expected,
                    actual = lines.len(),
                    "output sink is short, comparing what the engine wrote"
                );
                return Ok(lines);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn timeouts() -> Timeouts {
        Timeouts {
            poll_interval_ms: 5,
            sink_timeout_ms: 200,
            sink_quiet_ms: 20,
            ..Timeouts::default()
        }
    }

    #[test]
    fn truncate_clears_previous_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), "output.txt");
        assert!(sink.read_lines().unwrap().is_empty());

        std::fs::write(sink.path(), "| i0 |\n| 1 |\n").unwrap();
        assert_eq!(sink.read_lines().unwrap(), vec!["| i0 |", "| 1 |"]);

        sink.truncate().unwrap();
        assert!(sink.read_lines().unwrap().is_empty());
    }

    #[test]
    fn waits_for_late_writes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), "output.txt");
        sink.truncate().unwrap();

        let path = sink.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
            for line in ["| i0 |", "| 1 |", "| 2 |"] {
                std::thread::sleep(std::time::Duration::from_millis(10));
                writeln!(file, "{line}").unwrap();
            }
        });

        let lines = sink.wait_for_lines(3, &timeouts()).unwrap();
        writer.join().unwrap();
        assert_eq!(lines, vec!["| i0 |", "| 1 |", "| 2 |"]);
    }

    #[test]
    fn short_sink_is_returned_after_the_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), "output.txt");
        std::fs::write(sink.path(), "| i0 |\n").unwrap();
        assert_eq!(sink.wait_for_lines(5, &timeouts()).unwrap(), vec!["| i0 |"]);
    }

    #[test]
    fn empty_sink_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), "output.txt");
        assert!(matches!(
            sink.wait_for_lines(1, &timeouts()),
            Err(DriverError::SinkTimeout { expected: 1, .. })
        ));
    }

    #[test]
    fn growing_sink_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), "output.txt");
        sink.truncate().unwrap();

        let path = sink.path().to_path_buf();
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writer = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    writeln!(file, "| 1 |").unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            })
        };

        let start = Instant::now();
        let result = sink.wait_for_lines(1_000_000, &timeouts());
        let elapsed = start.elapsed();
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        writer.join().unwrap();

        assert!(
            elapsed < std::time::Duration::from_secs(1),
            "waited {elapsed:?} on a 200ms sink timeout"
        );
        assert!(
            matches!(result, Err(DriverError::SinkTimeout { actual, .. }) if actual > 0),
            "{result:?}"
        );
    }
}
