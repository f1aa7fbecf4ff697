//! The association-acceptor side of a PACS node: an accept loop that
//! negotiates one association per incoming connection (subject to an AE
//! title whitelist and a concurrency cap) and hands each to a
//! [`Dispatcher`] running on its own worker thread.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use snafu::{ResultExt, Snafu};

use dicom_dimse::Dispatcher;
use dicom_ul::association::server::{AccessControl, ServerAssociationOptions};
use dicom_ul::pdu::{
    AssociationRJResult, AssociationRJServiceUserReason, AssociationRJSource, Pdu,
};
use dicom_ul::pdu::{read_pdu, write_pdu};
use dicom_ul::pdu::DEFAULT_MAX_PDU;
use dicom_ul::pdu::UserIdentity;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not bind to {}", address))]
    Bind { address: String, source: std::io::Error },
    #[snafu(display("could not accept incoming connection"))]
    Accept { source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Upper bound on how long a worker's blocking read can run before
/// waking up to recheck the shutdown flag, independent of the
/// configured idle timeout.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Every configurable parameter of a PACS node's acceptor side.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// This node's own AE title (16 chars max per PS3.8, not enforced here).
    pub ae_title: String,
    pub port: u16,
    /// Maximum concurrent associations. `0` means unlimited.
    pub max_associations: usize,
    pub max_pdu_length: u32,
    /// An idle association (no PDU received within this window) is
    /// dropped. `None` disables the timeout.
    pub idle_timeout: Option<Duration>,
    /// Hard ceiling on an association's total lifetime, regardless of
    /// activity. `None` disables the timeout.
    pub association_timeout: Option<Duration>,
    /// How long a worker waits for the peer's A-RELEASE-RP after it
    /// initiates a graceful release on shutdown, before giving up and
    /// sending an A-ABORT instead.
    pub release_deadline: Duration,
    /// Calling AE titles allowed to associate. Empty means accept any.
    pub allowed_ae_titles: Vec<String>,
    pub implementation_class_uid: String,
    pub implementation_version_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            ae_title: "MY_PACS".to_string(),
            port: 11112,
            max_associations: 50,
            max_pdu_length: DEFAULT_MAX_PDU,
            idle_timeout: Some(Duration::from_secs(300)),
            association_timeout: Some(Duration::from_secs(30 * 60)),
            release_deadline: Duration::from_secs(5),
            allowed_ae_titles: Vec::new(),
            implementation_class_uid: dicom_ul::IMPLEMENTATION_CLASS_UID.to_string(),
            implementation_version_name: dicom_ul::IMPLEMENTATION_VERSION_NAME.to_string(),
        }
    }
}

/// A point-in-time read of a running [`Server`]'s counters.
#[derive(Debug, Clone, Copy)]
pub struct ServerStatsSnapshot {
    pub total_associations: u64,
    pub active_associations: u64,
    pub rejected_associations: u64,
    pub messages_processed: u64,
    pub uptime: Duration,
}

/// Shared, thread-safe counters updated by every association worker.
#[derive(Debug)]
pub struct ServerStats {
    total_associations: AtomicU64,
    active_associations: AtomicU64,
    rejected_associations: AtomicU64,
    started_at: Instant,
}

impl ServerStats {
    fn new() -> Self {
        ServerStats {
            total_associations: AtomicU64::new(0),
            active_associations: AtomicU64::new(0),
            rejected_associations: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    fn snapshot(&self, messages_processed: u64) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            total_associations: self.total_associations.load(Ordering::Relaxed),
            active_associations: self.active_associations.load(Ordering::Relaxed),
            rejected_associations: self.rejected_associations.load(Ordering::Relaxed),
            messages_processed,
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Rejects a calling AE title not on the configured whitelist. An empty
/// whitelist accepts every calling AE title.
#[derive(Debug, Clone)]
struct AeWhitelist(Vec<String>);

impl AccessControl for AeWhitelist {
    fn check_access(
        &self,
        _this_ae_title: &str,
        calling_ae_title: &str,
        _called_ae_title: &str,
        _user_identity: Option<&UserIdentity>,
    ) -> std::result::Result<(), AssociationRJServiceUserReason> {
        if self.0.is_empty() || self.0.iter().any(|ae| ae == calling_ae_title.trim_end()) {
            Ok(())
        } else {
            Err(AssociationRJServiceUserReason::CallingAETitleNotRecognized)
        }
    }
}

/// A listening PACS node: accepts TCP connections, negotiates an
/// association per connection, and runs the shared [`Dispatcher`] against
/// it on its own thread.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    options: ServerAssociationOptions<'static, AeWhitelist>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind a listening socket and prepare the association options used
    /// for every subsequent connection. `abstract_syntaxes` and
    /// `transfer_syntaxes` are the ones this node is willing to accept;
    /// an empty `transfer_syntaxes` accepts whatever this node's registry
    /// knows.
    pub fn bind(
        config: ServerConfig,
        dispatcher: Dispatcher,
        abstract_syntaxes: &[&str],
        transfer_syntaxes: &[&str],
    ) -> Result<Self> {
        let address = format!("0.0.0.0:{}", config.port);
        let listener = TcpListener::bind(&address).context(BindSnafu { address })?;

        let mut options = ServerAssociationOptions::new()
            .ae_access_control(AeWhitelist(config.allowed_ae_titles.clone()))
            .ae_title(config.ae_title.clone())
            .max_pdu_length(config.max_pdu_length);
        for uid in abstract_syntaxes {
            options = options.with_abstract_syntax(uid.to_string());
        }
        for ts in transfer_syntaxes {
            options = options.with_transfer_syntax(ts.to_string());
        }

        Ok(Server {
            listener,
            config,
            options,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot(self.dispatcher.messages_processed())
    }

    /// Stop accepting new connections. Associations already in progress
    /// run to completion; see [`Server::run`]'s polling interval.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Accept connections until [`Server::request_shutdown`] is called,
    /// spawning one worker thread per negotiated association. Returns once
    /// no more connections are being accepted; in-flight associations may
    /// still be running on their own threads when this returns.
    pub fn run(&self) -> Result<()> {
        self.listener
            .set_nonblocking(true)
            .context(AcceptSnafu)?;

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "accepted connection");
                    self.handle_connection(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(e).context(AcceptSnafu),
            }
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream) {
        if self.config.max_associations != 0
            && self.stats.active_associations.load(Ordering::SeqCst) as usize
                >= self.config.max_associations
        {
            self.stats.rejected_associations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("rejecting association: local limit exceeded");
            reject_local_limit_exceeded(stream);
            return;
        }

        let options = self.options.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let stats = Arc::clone(&self.stats);
        let shutdown = Arc::clone(&self.shutdown);
        let idle_timeout = self.config.idle_timeout;
        let association_timeout = self.config.association_timeout;
        let release_deadline = self.config.release_deadline;

        // A bounded read timeout is always set, even with no configured
        // idle timeout, so the worker wakes periodically to observe the
        // shutdown flag instead of blocking on `receive` indefinitely.
        let read_timeout = idle_timeout
            .map(|t| t.min(SHUTDOWN_POLL_INTERVAL))
            .unwrap_or(SHUTDOWN_POLL_INTERVAL);
        let _ = stream.set_read_timeout(Some(read_timeout));
        let watchdog_stream = stream.try_clone().ok();

        thread::spawn(move || {
            if let (Some(timeout), Some(mut watchdog_stream)) = (association_timeout, watchdog_stream) {
                thread::spawn(move || {
                    thread::sleep(timeout);
                    tracing::warn!("association lifetime exceeded, sending A-ABORT");
                    send_abort(&mut watchdog_stream);
                    let _ = watchdog_stream.shutdown(std::net::Shutdown::Both);
                });
            }

            let mut association = match options.establish(stream) {
                Ok(association) => association,
                Err(e) => {
                    tracing::warn!(error = %e, "association negotiation failed");
                    return;
                }
            };

            stats.total_associations.fetch_add(1, Ordering::Relaxed);
            stats.active_associations.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                calling_ae_title = %association.calling_ae_title(),
                "association established"
            );

            if let Err(e) = dispatcher.run(&mut association, &shutdown, idle_timeout, release_deadline) {
                tracing::warn!(error = %e, "association worker ended with an error");
            }

            stats.active_associations.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(
                calling_ae_title = %association.calling_ae_title(),
                "association ended"
            );
        });
    }
}

/// Write an A-ABORT PDU (source: service-provider) directly to the raw
/// socket, for the association-lifetime watchdog, which only holds a
/// cloned [`TcpStream`] and runs independently of the worker thread's
/// [`ServerAssociation`].
fn send_abort(stream: &mut TcpStream) {
    let mut buffer = Vec::new();
    let abort = Pdu::AbortRQ {
        source: dicom_ul::pdu::AbortRQSource::ServiceProvider(
            dicom_ul::pdu::AbortRQServiceProviderReason::ReasonNotSpecifiedUnrecognizedPdu,
        ),
    };
    if write_pdu(&mut buffer, &abort).is_ok() {
        use std::io::Write;
        let _ = stream.write_all(&buffer);
    }
}

/// Reject an association before full negotiation, for connections refused
/// purely due to capacity -- the accept loop never hands these to
/// [`ServerAssociationOptions::establish`].
fn reject_local_limit_exceeded(mut stream: TcpStream) {
    let _ = stream.set_nonblocking(false);
    let max_pdu_length = DEFAULT_MAX_PDU;
    let pdu = match read_pdu(&mut stream, max_pdu_length) {
        Ok(pdu) => pdu,
        Err(_) => return,
    };
    if !matches!(pdu, Pdu::AssociationRQ { .. }) {
        return;
    }
    let mut buffer = Vec::new();
    let rejection = Pdu::AssociationRJ {
        result: AssociationRJResult::Transient,
        source: AssociationRJSource::ServiceProviderASCE(
            dicom_ul::pdu::AssociationRJServiceProviderASCEReason::NoReasonGiven,
        ),
    };
    if write_pdu(&mut buffer, &rejection).is_ok() {
        use std::io::Write;
        let _ = stream.write_all(&buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.ae_title, "MY_PACS");
        assert_eq!(config.port, 11112);
        assert_eq!(config.max_associations, 50);
    }

    #[test]
    fn whitelist_rejects_unknown_calling_ae_title() {
        let whitelist = AeWhitelist(vec!["MODALITY1".to_string()]);
        assert!(whitelist.check_access("MY_PACS", "MODALITY1", "MY_PACS", None).is_ok());
        assert!(whitelist.check_access("MY_PACS", "INTRUDER", "MY_PACS", None).is_err());
    }

    #[test]
    fn empty_whitelist_accepts_any_calling_ae_title() {
        let whitelist = AeWhitelist(Vec::new());
        assert!(whitelist.check_access("MY_PACS", "ANYONE", "MY_PACS", None).is_ok());
    }

    #[test]
    fn server_binds_to_an_ephemeral_port() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let dispatcher = Dispatcher::new(Vec::new());
        let server = Server::bind(config, dispatcher, &["1.2.840.10008.1.1"], &[]).unwrap();
        let stats = server.stats();
        assert_eq!(stats.total_associations, 0);
        assert_eq!(stats.active_associations, 0);
    }
}
