use clap::Parser;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dicom_pacs::{PacsClient, QueryLevel};
use snafu::{whatever, Report, ResultExt, Whatever};
use tracing::{info, Level};

/// DICOM C-MOVE SCU
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// the address of the peer (e.g. 127.0.0.1:11112)
    address: String,
    /// the AE title the peer should send the matching instances to
    destination_ae_title: String,
    /// the query/retrieve level to search at: PATIENT, STUDY, SERIES or IMAGE
    #[arg(short = 'l', long = "level", default_value = "STUDY")]
    level: String,
    /// verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    /// the calling Application Entity title
    #[arg(long = "calling-ae-title", default_value = "MOVE-SCU")]
    calling_ae_title: String,
    /// the called Application Entity title
    #[arg(long = "called-ae-title", default_value = "ANY-SCP")]
    called_ae_title: String,
    /// match on Patient ID
    #[arg(long = "patient-id")]
    patient_id: Option<String>,
    /// match on Study Instance UID
    #[arg(long = "study-instance-uid")]
    study_instance_uid: Option<String>,
    /// match on Series Instance UID
    #[arg(long = "series-instance-uid")]
    series_instance_uid: Option<String>,
}

fn put_cs_or_empty(identifier: &mut InMemDicomObject, tag: Tag, vr: VR, value: &Option<String>) {
    let value = value.clone().unwrap_or_default();
    identifier.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn build_identifier(args: &App, level: QueryLevel) -> InMemDicomObject {
    let mut identifier = InMemDicomObject::new_empty();
    put_cs_or_empty(&mut identifier, tags::PATIENT_ID, VR::LO, &args.patient_id);
    put_cs_or_empty(&mut identifier, tags::STUDY_INSTANCE_UID, VR::UI, &args.study_instance_uid);
    if matches!(level, QueryLevel::Series | QueryLevel::Image) {
        put_cs_or_empty(&mut identifier, tags::SERIES_INSTANCE_UID, VR::UI, &args.series_instance_uid);
    }
    identifier
}

fn run(args: &App) -> Result<(), Whatever> {
    let level = match QueryLevel::from_str(&args.level) {
        Some(level) => level,
        None => whatever!("unrecognized query/retrieve level `{}`", args.level),
    };

    let mut client = PacsClient::connect(
        args.address.as_str(),
        &args.calling_ae_title,
        &args.called_ae_title,
        uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
        &[],
    )
    .whatever_context("could not establish association")?;

    let identifier = build_identifier(args, level);
    let (status, counters) = client
        .move_to(
            uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
            level,
            identifier,
            &args.destination_ae_title,
            |counters| {
                info!(
                    "progress: {} completed, {} failed, {} warning, {} remaining",
                    counters.completed, counters.failed, counters.warning, counters.remaining
                );
            },
        )
        .whatever_context("C-MOVE failed")?;

    info!(
        "final status 0x{:04X}: {} completed, {} failed, {} warning",
        status.0, counters.completed, counters.failed, counters.warning
    );

    client.release().whatever_context("could not release association")?;

    if !status.is_success() {
        whatever!("C-MOVE did not complete successfully (status 0x{:04X})", status.0);
    }
    Ok(())
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
        eprintln!("{}", Report::from_error(e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
