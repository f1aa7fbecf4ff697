use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dicom_dictionary_std::uids;
use dicom_dimse::{Dispatcher, ServiceHandler};
use dicom_pacs::archive::{Archive, DuplicatePolicy, NamingScheme};
use dicom_pacs::index::Index;
use dicom_pacs::qr::{FindHandler, GetHandler, MoveHandler, StorageHandler};
use dicom_pacs::runtime::{Server, ServerConfig};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::{whatever, OptionExt, Report, ResultExt, Whatever};
use tracing::{info, warn, Level};
use walkdir::WalkDir;

/// Storage SOP classes this node accepts for C-STORE, beyond Verification
/// and the Query/Retrieve Information Models.
const STORAGE_SOP_CLASSES: &[&str] = &[
    uids::CT_IMAGE_STORAGE,
    uids::MR_IMAGE_STORAGE,
    uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
];

/// A complete DICOM PACS node
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Port to listen on
    #[arg(long, default_value_t = 11112)]
    port: u16,
    /// This node's own Application Entity Title
    #[arg(long = "ae-title", default_value = "MY_PACS")]
    ae_title: String,
    /// Root directory for DICOM file storage
    #[arg(long = "storage-dir", default_value = "./archive")]
    storage_dir: String,
    /// Log level: trace, debug, info, warn or error
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
    /// Maximum concurrent associations (0 = unlimited)
    #[arg(long = "max-associations", default_value_t = 50)]
    max_associations: usize,
    /// File naming scheme: hierarchical or flat
    #[arg(long, default_value = "hierarchical")]
    naming: String,
    /// Duplicate handling policy: reject, replace or ignore
    #[arg(long = "duplicate-policy", default_value = "reject")]
    duplicate_policy: String,
    /// Calling AE titles allowed to associate (repeatable, empty = accept all)
    #[arg(long = "allow-ae-title")]
    allowed_ae_titles: Vec<String>,
    /// A C-MOVE destination in `AE_TITLE=HOST:PORT` form (repeatable)
    #[arg(long = "destination")]
    destinations: Vec<String>,
}

fn parse_naming(value: &str) -> Result<NamingScheme, Whatever> {
    match value {
        "hierarchical" => Ok(NamingScheme::UidHierarchical),
        "dated" => Ok(NamingScheme::DateHierarchical),
        "flat" => Ok(NamingScheme::Flat),
        other => whatever!("unrecognized naming scheme `{}`", other),
    }
}

fn parse_duplicate_policy(value: &str) -> Result<DuplicatePolicy, Whatever> {
    match value {
        "reject" => Ok(DuplicatePolicy::Reject),
        "replace" => Ok(DuplicatePolicy::Replace),
        "ignore" => Ok(DuplicatePolicy::Ignore),
        other => whatever!("unrecognized duplicate policy `{}`", other),
    }
}

fn parse_destinations(values: &[String]) -> Result<HashMap<String, (String, u16)>, Whatever> {
    let mut destinations = HashMap::new();
    for value in values {
        let (ae_title, address) = value
            .split_once('=')
            .whatever_context(format!("destination `{}` is not of the form AE_TITLE=HOST:PORT", value))?;
        let (host, port) = address
            .rsplit_once(':')
            .whatever_context(format!("destination `{}` is not of the form AE_TITLE=HOST:PORT", value))?;
        let port: u16 = port
            .parse()
            .whatever_context(format!("destination `{}` has an invalid port", value))?;
        destinations.insert(ae_title.to_string(), (host.to_string(), port));
    }
    Ok(destinations)
}

/// Walk `storage_dir`, re-reading every Part-10 file already on disk into
/// the metadata index, so that restarts don't lose query/retrieve coverage
/// over instances stored in a previous run.
fn populate_index(index: &Index, storage_dir: &str) -> usize {
    let mut count = 0;
    for entry in WalkDir::new(storage_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("dcm") {
            continue;
        }
        match dicom_object::DefaultDicomObject::open_file(entry.path()) {
            Ok(obj) => {
                index.index_object(&obj);
                count += 1;
            }
            Err(source) => {
                warn!(path = %entry.path().display(), %source, "skipping unparsable file while populating index");
            }
        }
    }
    count
}

fn run(args: &App) -> Result<(), Whatever> {
    let naming = parse_naming(&args.naming)?;
    let duplicate_policy = parse_duplicate_policy(&args.duplicate_policy)?;
    let destinations = parse_destinations(&args.destinations)?;

    std::fs::create_dir_all(&args.storage_dir).whatever_context("could not create storage directory")?;

    let archive = Arc::new(Archive::new(&args.storage_dir, naming, duplicate_policy));
    let rebuilt = archive.rebuild_index().whatever_context("could not rebuild archive index")?;
    info!("archive index rebuilt: {} instance(s) on disk", rebuilt);

    let index = Arc::new(Index::new());
    let indexed = populate_index(&index, &args.storage_dir);
    info!("metadata index populated: {} instance(s)", indexed);

    let storage_abstract_syntaxes: Vec<String> =
        STORAGE_SOP_CLASSES.iter().map(|s| s.to_string()).collect();

    let handlers: Vec<Box<dyn ServiceHandler>> = vec![
        Box::new(StorageHandler::new(storage_abstract_syntaxes.clone(), archive.clone(), index.clone())),
        Box::new(FindHandler::new(
            vec![uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND.to_string()],
            index.clone(),
        )),
        Box::new(MoveHandler::new(
            vec![uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE.to_string()],
            index.clone(),
            archive.clone(),
            args.ae_title.clone(),
            destinations,
        )),
        Box::new(GetHandler::new(
            vec![uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET.to_string()],
            index.clone(),
            archive.clone(),
        )),
    ];

    let mut abstract_syntaxes: Vec<&str> = vec![
        uids::VERIFICATION,
        uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
        uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
        uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET,
    ];
    abstract_syntaxes.extend(STORAGE_SOP_CLASSES.iter().copied());

    let transfer_syntaxes: Vec<&str> = TransferSyntaxRegistry.iter().map(|ts| ts.uid()).collect();

    let config = ServerConfig {
        ae_title: args.ae_title.clone(),
        port: args.port,
        max_associations: args.max_associations,
        allowed_ae_titles: args.allowed_ae_titles.clone(),
        idle_timeout: Some(Duration::from_secs(300)),
        ..ServerConfig::default()
    };

    let dispatcher = Dispatcher::new(handlers);
    let server = Server::bind(config, dispatcher, &abstract_syntaxes, &transfer_syntaxes)
        .whatever_context("could not bind server")?;

    info!("{} listening on port {}", args.ae_title, args.port);
    server.run().whatever_context("server loop failed")
}

fn level_from_str(value: &str) -> Level {
    match value {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() {
    let args = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level_from_str(&args.log_level))
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Could not set up global logger: {}", e);
    });

    if let Err(e) = run(&args) {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn parses_a_destination() {
        let destinations = parse_destinations(&["REMOTE=192.168.1.10:104".to_string()]).unwrap();
        assert_eq!(destinations.get("REMOTE"), Some(&("192.168.1.10".to_string(), 104)));
    }

    #[test]
    fn rejects_a_malformed_destination() {
        assert!(parse_destinations(&["not-a-destination".to_string()]).is_err());
    }
}
