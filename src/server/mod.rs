//! Top-level server orchestration: load the catalogue, open the listening
//! socket, register with the federation, run the worker pool and acceptor
//! loop, and tear everything down cleanly on `SIGINT`/`SIGTERM`.

pub mod acceptor;
pub mod log;
pub mod worker;

use crate::catalogue::Catalogue;
use crate::queue::{DispatchItem, DispatchQueue};
use crate::registry;
use crate::server::log::OperationLog;
use nix::sys::socket::{self, AddressFamily, SockAddr, SockFlag, SockType, UnixAddr};
use std::os::unix::io::FromRawFd;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const DISPATCH_QUEUE_CAPACITY: usize = 20;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Binds and listens on `path` with an explicit backlog of
/// [`crate::paths::MAX_CLIENTS`], bypassing `UnixListener::bind`'s
/// undocumented default backlog.
fn bind_listener(path: &str) -> std::io::Result<UnixListener> {
    std::fs::remove_file(path).ok();

    let fd = socket::socket(AddressFamily::Unix, SockType::Stream, SockFlag::empty(), None)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let addr = UnixAddr::new(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    socket::bind(fd, &SockAddr::Unix(addr)).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    socket::listen(fd, crate::paths::MAX_CLIENTS)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(unsafe { UnixListener::from_raw_fd(fd) })
}

fn install_signal_handlers() -> std::io::Result<()> {
    let handler = nix::sys::signal::SigHandler::Handler(request_shutdown);
    let action = nix::sys::signal::SigAction::new(
        handler,
        nix::sys::signal::SaFlags::empty(),
        nix::sys::signal::SigSet::empty(),
    );
    unsafe {
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGINT, &action)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGTERM, &action)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    }
    Ok(())
}

pub struct ServerConfig {
    pub library_name: String,
    pub record_path: PathBuf,
    pub worker_count: usize,
    pub bib_conf_path: PathBuf,
    pub build_dir: PathBuf,
}

/// Runs a library server to completion: blocks until a shutdown signal
/// arrives, then returns after every resource has been released.
pub fn run(config: ServerConfig) -> anyhow::Result<()> {
    let log_path = crate::paths::log_path(&config.library_name);
    let log = Arc::new(OperationLog::create(&log_path)?);

    let catalogue = Arc::new(Catalogue::load(&config.record_path)?);

    let queue = Arc::new(DispatchQueue::new(DISPATCH_QUEUE_CAPACITY));

    let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(config.worker_count);
    for _ in 0..config.worker_count {
        let queue = Arc::clone(&queue);
        let catalogue = Arc::clone(&catalogue);
        let log = Arc::clone(&log);
        workers.push(std::thread::spawn(move || worker::run(queue, catalogue, log)));
    }

    let pid = std::process::id();
    let socket_path = crate::paths::socket_path(pid);
    let listener = bind_listener(&socket_path)?;

    registry::add(&config.bib_conf_path, &socket_path, &config.library_name)?;

    install_signal_handlers()?;

    let result = acceptor::run(listener, Arc::clone(&queue), &SHUTDOWN_REQUESTED);

    shutdown(&config, &catalogue, &queue, workers, &socket_path);

    result.map_err(Into::into)
}

fn shutdown(
    config: &ServerConfig,
    catalogue: &Catalogue,
    queue: &Arc<DispatchQueue>,
    workers: Vec<JoinHandle<()>>,
    socket_path: &str,
) {
    if let Err(err) = catalogue.persist(&config.record_path, &config.build_dir) {
        ::log::error!("failed to persist catalogue on shutdown: {}", err);
    }

    if let Err(err) = registry::remove(&config.bib_conf_path, socket_path, &config.build_dir) {
        ::log::error!("failed to remove this server from the registry: {}", err);
    }

    for _ in &workers {
        let _ = queue.put(DispatchItem::stop_sentinel());
    }
    for worker in workers {
        let _ = worker.join();
    }

    std::fs::remove_file(socket_path).ok();
}

pub fn default_bib_conf_path() -> PathBuf {
    Path::new(crate::paths::BIB_CONF_PATH).to_path_buf()
}

pub fn default_build_dir() -> PathBuf {
    Path::new(crate::paths::BUILD_DIR).to_path_buf()
}
