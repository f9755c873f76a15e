//! Attaching consoles to a scheduler: the process terminal, or a TCP port
//! that accepts any number of concurrent sessions.

use std::io::{self, BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use des_sched::Scheduler;
use tracing::{debug, info, warn};

use crate::{MonitorResult, Session};

/// How often the accept loop checks whether the scheduler has terminated.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Run a console session over stdin/stdout on a new thread.
pub fn spawn_terminal_monitor(scheduler: Scheduler) -> io::Result<JoinHandle<MonitorResult<()>>> {
    thread::Builder::new()
        .name(format!("monitor-{}", scheduler.name()))
        .spawn(move || Session::new(scheduler, io::stdin().lock(), io::stdout()).run())
}

/// A running socket console.
#[derive(Debug)]
pub struct SocketMonitor {
    local_addr: SocketAddr,
    handle:     JoinHandle<()>,
}

impl SocketMonitor {
    /// The bound address; useful after binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept loop to stop.  It stops once the scheduler has
    /// terminated; sessions already open run on until their peers leave.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Bind `addr` and serve one console session per connection, each on its own
/// thread.  Binding happens before this returns, so address errors surface
/// here.
pub fn spawn_socket_monitor(scheduler: Scheduler, addr: impl ToSocketAddrs) -> MonitorResult<SocketMonitor> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;
    info!(scheduler = %scheduler, %local_addr, "console listening");

    let handle = thread::Builder::new()
        .name(format!("socket-monitor-{}", scheduler.name()))
        .spawn(move || accept_loop(&listener, &scheduler))?;
    Ok(SocketMonitor { local_addr, handle })
}

fn accept_loop(listener: &TcpListener, scheduler: &Scheduler) {
    while !scheduler.is_terminated() {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = start_session(stream, peer, scheduler) {
                    warn!(scheduler = %scheduler, %peer, error = %e, "console session could not start");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!(scheduler = %scheduler, error = %e, "console accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!(scheduler = %scheduler, "console listener closed");
}

fn start_session(stream: TcpStream, peer: SocketAddr, scheduler: &Scheduler) -> io::Result<()> {
    // Accepted sockets inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    let input = BufReader::new(stream.try_clone()?);
    let scheduler = scheduler.clone();
    debug!(scheduler = %scheduler, %peer, "console connection accepted");
    thread::Builder::new()
        .name(format!("console-{peer}"))
        .spawn(move || {
            if let Err(e) = Session::new(scheduler, input, stream).run() {
                debug!(%peer, error = %e, "console session ended with an error");
            }
        })?;
    Ok(())
}
