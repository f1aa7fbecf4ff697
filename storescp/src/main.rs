use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dicom_dictionary_std::uids;
use dicom_dimse::{Dispatcher, ServiceHandler};
use dicom_pacs::archive::{Archive, DuplicatePolicy, NamingScheme};
use dicom_pacs::index::Index;
use dicom_pacs::qr::StorageHandler;
use dicom_pacs::runtime::{Server, ServerConfig};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, info, Level};

/// SOP classes this node accepts for C-STORE.
const STORAGE_SOP_CLASSES: &[&str] = &[
    uids::CT_IMAGE_STORAGE,
    uids::MR_IMAGE_STORAGE,
    uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
];

/// DICOM C-STORE SCP
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    /// the calling Application Entity title
    #[arg(long = "calling-ae-title", default_value = "STORE-SCP")]
    calling_ae_title: String,
    /// Only accept native/uncompressed transfer syntaxes
    #[arg(long)]
    uncompressed_only: bool,
    /// max pdu length
    #[arg(short = 'm', long = "max-pdu-length", default_value_t = 16384)]
    max_pdu_length: u32,
    /// output directory for incoming objects
    #[arg(short = 'o', default_value = ".")]
    out_dir: PathBuf,
    /// Which port to listen on
    #[arg(short, default_value_t = 11111)]
    port: u16,
}

fn run(args: &App) -> Result<(), Whatever> {
    std::fs::create_dir_all(&args.out_dir).whatever_context("could not create output directory")?;

    let archive = Arc::new(Archive::new(&args.out_dir, NamingScheme::Flat, DuplicatePolicy::Replace));
    let index = Arc::new(Index::new());

    let abstract_syntaxes: Vec<String> = STORAGE_SOP_CLASSES.iter().map(|s| s.to_string()).collect();
    let handler = StorageHandler::new(abstract_syntaxes, archive, index);
    let handlers: Vec<Box<dyn ServiceHandler>> = vec![Box::new(handler)];

    let transfer_syntaxes: Vec<&str> = if args.uncompressed_only {
        vec![uids::IMPLICIT_VR_LITTLE_ENDIAN, uids::EXPLICIT_VR_LITTLE_ENDIAN]
    } else {
        TransferSyntaxRegistry.iter().map(|ts| ts.uid()).collect()
    };

    let abstract_syntaxes_refs: Vec<&str> = STORAGE_SOP_CLASSES.to_vec();

    let config = ServerConfig {
        ae_title: args.calling_ae_title.clone(),
        port: args.port,
        max_pdu_length: args.max_pdu_length,
        ..ServerConfig::default()
    };

    let dispatcher = Dispatcher::new(handlers);
    let server = Server::bind(config, dispatcher, &abstract_syntaxes_refs, &transfer_syntaxes)
        .whatever_context("could not bind server")?;

    info!("{} listening on port {}", args.calling_ae_title, args.port);
    server.run().whatever_context("server loop failed")
}

fn main() {
    let args = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Could not set up global logger: {}", e);
    });

    if let Err(e) = run(&args) {
        error!("{}", Report::from_error(e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
