//! Lifecycle of the engine processes: one long-lived server per scenario and a
//! short-lived client per batch of statements.
//!
//! Both handles kill their process when dropped, so every exit path of a
//! scenario, including `?` returns and panics, tears the engine down.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use crate::profiles::{CommandSpec, EngineProfile, Readiness, Timeouts};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("server exited with {status} before becoming ready")]
    ServerExited { status: ExitStatus },
    #[error("server was not ready after {timeout:?} ({probe})")]
    StartupTimeout { timeout: Duration, probe: String },
    #[error("client did not exit within {0:?}")]
    ClientTimeout(Duration),
    #[error("client stdin is already closed")]
    ClientClosed,
    #[error("output sink held {actual} lines after {timeout:?}, expected at least {expected}")]
    SinkTimeout {
        expected: usize,
        actual: usize,
        timeout: Duration,
    },
}

fn spawn(spec: &CommandSpec, db: &Path, stdin: Stdio) -> Result<Child, DriverError> {
    let mut command = spec.command(db);
    command
        .stdin(stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // keeps terminal signals aimed at the simulator away from the engine
        command.process_group(0);
    }
    tracing::trace!(?command, "spawning");
    command.spawn().map_err(|source| DriverError::Spawn {
        program: spec.program.clone(),
        source,
    })
}

fn kill(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        if let Err(err) = child.kill() {
            tracing::warn!(pid = child.id(), %err, "failed to kill process");
        }
    }
    let _ = child.wait();
}

/// Polls `done` every `poll` until it yields a value or `timeout` elapses.
fn poll_until<T>(
    timeout: Duration,
    poll: Duration,
    mut done: impl FnMut() -> Result<Option<T>, DriverError>,
) -> Result<Option<T>, DriverError> {
    let start = Instant::now();
    loop {
        if let Some(value) = done()? {
            return Ok(Some(value));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(poll);
    }
}

pub struct Server {
    child: Child,
    db: PathBuf,
    engine: EngineProfile,
}

impl Server {
    /// Starts the server on a fresh database directory and blocks until the
    /// readiness probe succeeds.
    pub fn start(engine: &EngineProfile, db: &Path) -> Result<Self, DriverError> {
        if db.exists() {
            tracing::debug!(db = %db.display(), "removing stale database directory");
            std::fs::remove_dir_all(db)?;
        }
        if let Some(parent) = db.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let child = spawn(&engine.server, db, Stdio::null())?;
        let mut server = Server {
            child,
            db: db.to_path_buf(),
            engine: engine.clone(),
        };
        server.wait_ready(&engine.readiness, &engine.timeouts)?;
        Ok(server)
    }

    fn wait_ready(&mut self, readiness: &Readiness, timeouts: &Timeouts) -> Result<(), DriverError> {
        let start = Instant::now();
        let ready = poll_until(timeouts.startup_timeout(), timeouts.poll_interval(), || {
            if let Some(status) = self.child.try_wait()? {
                return Err(DriverError::ServerExited { status });
            }
            Ok(readiness.probe(&self.db).then_some(()))
        })?;
        match ready {
            Some(()) => {
                tracing::debug!(elapsed = ?start.elapsed(), pid = self.child.id(), "server ready");
                Ok(())
            }
            None => Err(DriverError::StartupTimeout {
                timeout: timeouts.startup_timeout(),
                probe: readiness.to_string(),
            }),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db
    }

    /// A fresh client connected to this server.
    pub fn new_client(&self) -> Result<Client, DriverError> {
        let mut child = spawn(&self.engine.client, &self.db, Stdio::piped())?;
        let stdin = child.stdin.take();
        Ok(Client {
            child,
            stdin,
            timeouts: self.engine.timeouts.clone(),
        })
    }

    pub fn stop(mut self) {
        tracing::debug!(pid = self.child.id(), "stopping server");
        kill(&mut self.child);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        kill(&mut self.child);
    }
}

pub struct Client {
    child: Child,
    stdin: Option<ChildStdin>,
    timeouts: Timeouts,
}

impl Client {
    /// Writes one `;`-terminated statement line. Nothing is read back.
    pub fn send(&mut self, statement: &str) -> Result<(), DriverError> {
        let stdin = self.stdin.as_mut().ok_or(DriverError::ClientClosed)?;
        writeln!(stdin, "{statement};")?;
        Ok(())
    }

    /// Closes stdin and waits for the client to exit, which it does once the
    /// engine answered every statement sent so far. The client is killed if it
    /// outlives the client timeout.
    pub fn close_and_flush(mut self) -> Result<ExitStatus, DriverError> {
        drop(self.stdin.take());
        let timeout = self.timeouts.client_timeout();
        let status = poll_until(timeout, self.timeouts.poll_interval(), || {
            Ok(self.child.try_wait()?)
        })?;
        match status {
            Some(status) => {
                if !status.success() {
                    tracing::warn!(%status, "client exited unsuccessfully");
                }
                Ok(status)
            }
            None => Err(DriverError::ClientTimeout(timeout)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        drop(self.stdin.take());
        kill(&mut self.child);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn engine(server: CommandSpec, client: CommandSpec) -> EngineProfile {
        EngineProfile {
            server,
            client,
            readiness: Readiness::MarkerFile {
                path: "ready".to_string(),
            },
            timeouts: Timeouts {
                poll_interval_ms: 10,
                startup_timeout_ms: 300,
                client_timeout_ms: 300,
                sink_timeout_ms: 300,
                sink_quiet_ms: 20,
            },
            ..EngineProfile::default()
        }
    }

    #[test]
    fn server_that_never_becomes_ready_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(
            CommandSpec::new("sleep").arg("5"),
            CommandSpec::new("cat"),
        );
        let err = Server::start(&engine, &dir.path().join("db")).err().unwrap();
        assert!(matches!(err, DriverError::StartupTimeout { .. }), "{err}");
    }

    #[test]
    fn server_exiting_early_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(CommandSpec::new("false"), CommandSpec::new("cat"));
        let err = Server::start(&engine, &dir.path().join("db")).err().unwrap();
        assert!(matches!(err, DriverError::ServerExited { .. }), "{err}");
    }

    #[test]
    fn stale_database_directory_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        std::fs::create_dir_all(&db).unwrap();
        std::fs::write(db.join("ready"), b"").unwrap();

        let engine = engine(
            CommandSpec::new("sleep").arg("5"),
            CommandSpec::new("cat"),
        );
        // the stale marker must not count as readiness
        let err = Server::start(&engine, &db).err().unwrap();
        assert!(matches!(err, DriverError::StartupTimeout { .. }), "{err}");
        assert!(!db.exists());
    }

    #[test]
    fn client_outliving_its_timeout_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        let engine = engine(
            CommandSpec::new("sh")
                .arg("-c")
                .arg("mkdir -p {db} && touch {db}/ready && sleep 5"),
            CommandSpec::new("sleep").arg("5"),
        );
        let server = Server::start(&engine, &db).unwrap();
        let client = server.new_client().unwrap();
        let err = client.close_and_flush().err().unwrap();
        assert!(matches!(err, DriverError::ClientTimeout(_)), "{err}");
        server.stop();
    }

    #[test]
    fn client_drains_stdin_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        let engine = engine(
            CommandSpec::new("sh")
                .arg("-c")
                .arg("mkdir -p {db} && touch {db}/ready && sleep 5"),
            CommandSpec::new("sh").arg("-c").arg("cat > {db}/output.txt"),
        );
        let server = Server::start(&engine, &db).unwrap();
        let mut client = server.new_client().unwrap();
        client.send("SELECT * FROM t").unwrap();
        assert!(client.close_and_flush().unwrap().success());
        assert_eq!(
            std::fs::read_to_string(db.join("output.txt")).unwrap(),
            "SELECT * FROM t;\n"
        );
    }
}
