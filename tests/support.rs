use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Behavior of the stub HTTP server: one canned response for every
/// request, optionally delayed, optionally echoing the raw request head
/// back in the body so tests can assert on what was sent.
#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
    pub set_cookie: Option<String>,
    pub echo_request: bool,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: "OK".to_owned(),
            delay: Duration::ZERO,
            set_cookie: None,
            echo_request: false,
        }
    }
}

pub struct StubServer {
    pub url: String,
    hits: Arc<AtomicU64>,
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a lightweight HTTP server for tests.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_stub(response: StubResponse) -> Result<StubServer, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let hits = Arc::new(AtomicU64::new(0));
    let hits_inner = Arc::clone(&hits);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    hits_inner.fetch_add(1, Ordering::SeqCst);
                    let response = response.clone();
                    thread::spawn(move || handle_client(stream, &response));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok(StubServer {
        url: format!("http://{}", addr),
        hits,
        shutdown: shutdown_tx,
        thread: Some(handle),
    })
}

/// Spawn the stub or skip when socket permissions are unavailable.
///
/// # Errors
///
/// Returns an error if the server fails for reasons other than
/// insufficient socket permissions.
pub fn spawn_stub_or_skip(response: StubResponse) -> Result<Option<StubServer>, String> {
    match spawn_stub(response) {
        Ok(server) => Ok(Some(server)),
        Err(err) if err.contains("Operation not permitted") => {
            eprintln!("Skipping e2e test: {}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn handle_client(mut stream: TcpStream, response: &StubResponse) {
    let mut buffer = [0u8; 4096];
    let read = match stream.read(&mut buffer) {
        Ok(read) => read,
        Err(_) => return,
    };
    if response.delay > Duration::ZERO {
        thread::sleep(response.delay);
    }
    let body = if response.echo_request {
        String::from_utf8_lossy(buffer.get(..read).unwrap_or_default()).into_owned()
    } else {
        response.body.clone()
    };
    let cookie_line = response
        .set_cookie
        .as_deref()
        .map(|cookie| format!("Set-Cookie: {}\r\n", cookie))
        .unwrap_or_default();
    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        response.status,
        body.len(),
        cookie_line
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    if stream.write_all(body.as_bytes()).is_err() {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Run the `httest` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_httest<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = httest_bin()?;
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .map_err(|err| format!("run httest failed: {}", err))
}

fn httest_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_httest").map_or_else(
        || Err("CARGO_BIN_EXE_httest missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
