use super::launcher::{
    Completion, LaunchSpec, LaunchTag, ProcessLauncher, ProcessOutcome, RunningProcess,
};
use crate::error::LaunchError;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Launches real child processes. Each one gets a waiter thread that posts a
/// [`Completion`] into `sink` when the process exits.
pub struct SystemLauncher<E> {
    sink: Sender<E>,
}

impl<E> SystemLauncher<E> {
    pub fn new(sink: Sender<E>) -> Self {
        Self { sink }
    }
}

/// Handle shared between the scheduler (for kill) and the waiter thread.
pub struct SystemProcess {
    child: Arc<Mutex<Child>>,
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunningProcess for SystemProcess {
    fn kill(&mut self) -> io::Result<()> {
        let mut child = lock(&self.child);
        if let Ok(None) = child.try_wait() {
            let pid = child.id();
            child
                .kill()
                .map_err(|e| io::Error::new(e.kind(), format!("killing pid {}: {}", pid, e)))?;
            debug!(pid, "process killed");
        }
        Ok(())
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = source.read_to_end(&mut buf) {
            warn!(error = %e, read = buf.len(), "process output truncated");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

fn wait_for_exit(
    child: &Mutex<Child>,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
) -> ProcessOutcome {
    let status = loop {
        let polled = lock(child).try_wait();
        match polled {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return ProcessOutcome::Failed(format!("waiting for process failed: {}", e)),
        }
    };

    ProcessOutcome::Exited {
        code: status.code(),
        stdout: join_output(stdout),
        stderr: join_output(stderr),
    }
}

impl<E: From<Completion> + Send + 'static> ProcessLauncher for SystemLauncher<E> {
    fn launch(
        &mut self,
        spec: LaunchSpec,
        tag: LaunchTag,
    ) -> Result<Box<dyn RunningProcess>, LaunchError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: spec.program.display().to_string(),
            source,
        })?;
        debug!(program = %spec.program.display(), pid = child.id(), "process started");

        if let (Some(text), Some(mut stdin)) = (spec.stdin, child.stdin.take()) {
            // dropping stdin at the end of the thread closes the pipe
            thread::spawn(move || {
                let _ = stdin.write_all(text.as_bytes());
            });
        }
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let child = Arc::new(Mutex::new(child));
        let waiter = Arc::clone(&child);
        let sink = self.sink.clone();
        thread::spawn(move || {
            let outcome = wait_for_exit(&waiter, stdout, stderr);
            let _ = sink.send(E::from(Completion { tag, outcome }));
        });

        Ok(Box::new(SystemProcess { child }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::scheduler::DocumentId;
    use std::sync::mpsc::channel;

    fn spec(program: &str, args: &[&str], stdin: Option<&str>) -> LaunchSpec {
        LaunchSpec {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            stdin: stdin.map(str::to_string),
        }
    }

    fn probe_tag() -> LaunchTag {
        LaunchTag::Probe {
            interpreter: "sh".into(),
        }
    }

    #[test]
    fn stdin_is_echoed_back() {
        let (tx, rx) = channel::<Completion>();
        let mut launcher = SystemLauncher::new(tx);
        launcher
            .launch(spec("cat", &[], Some("hello\n")), probe_tag())
            .expect("spawn cat");

        let done = rx.recv_timeout(Duration::from_secs(10)).expect("completion");
        assert_eq!(
            done.outcome,
            ProcessOutcome::Exited {
                code: Some(0),
                stdout: "hello\n".to_string(),
                stderr: String::new(),
            }
        );
    }

    #[test]
    fn kill_is_idempotent() {
        let (tx, rx) = channel::<Completion>();
        let mut launcher = SystemLauncher::new(tx);
        let tag = LaunchTag::Trace {
            document: DocumentId::from("doc"),
            token: crate::scheduler::RunToken(1),
        };
        let mut process = launcher
            .launch(spec("sleep", &["30"], None), tag.clone())
            .expect("spawn sleep");

        process.kill().expect("first kill");
        process.kill().expect("second kill");
        let done = rx.recv_timeout(Duration::from_secs(10)).expect("completion");
        assert_eq!(done.tag, tag);
        assert!(!done.outcome.success());
        process.kill().expect("kill after exit");
    }

    struct BreaksAfterFirstRead {
        sent: bool,
    }

    impl Read for BreaksAfterFirstRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.sent = true;
            let n = buf.len().min(3);
            buf[..n].copy_from_slice(&b"1 |"[..n]);
            Ok(n)
        }
    }

    #[test]
    fn read_error_keeps_what_arrived() {
        let text = spawn_reader(BreaksAfterFirstRead { sent: false })
            .join()
            .expect("reader thread");
        assert_eq!(text, "1 |");
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let (tx, _rx) = channel::<Completion>();
        let mut launcher = SystemLauncher::new(tx);
        let err = launcher
            .launch(spec("/definitely/not/here", &[], None), probe_tag())
            .err()
            .expect("spawn should fail");
        assert!(err.is_not_found());
    }
}
