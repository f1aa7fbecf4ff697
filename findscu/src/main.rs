use clap::Parser;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dicom_pacs::{PacsClient, QueryLevel};
use snafu::{whatever, Report, ResultExt, Whatever};
use tracing::{info, Level};

/// DICOM C-FIND SCU
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// the address of the peer (e.g. 127.0.0.1:11112)
    address: String,
    /// the query/retrieve level to search at: PATIENT, STUDY, SERIES or IMAGE
    #[arg(short = 'l', long = "level", default_value = "STUDY")]
    level: String,
    /// verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    /// the calling Application Entity title
    #[arg(long = "calling-ae-title", default_value = "FIND-SCU")]
    calling_ae_title: String,
    /// the called Application Entity title
    #[arg(long = "called-ae-title", default_value = "ANY-SCP")]
    called_ae_title: String,
    /// match on Patient ID
    #[arg(long = "patient-id")]
    patient_id: Option<String>,
    /// match on Patient's Name
    #[arg(long = "patient-name")]
    patient_name: Option<String>,
    /// match on Study Instance UID
    #[arg(long = "study-instance-uid")]
    study_instance_uid: Option<String>,
    /// match on Series Instance UID
    #[arg(long = "series-instance-uid")]
    series_instance_uid: Option<String>,
    /// match on Accession Number
    #[arg(long = "accession-number")]
    accession_number: Option<String>,
    /// match on Modality
    #[arg(long = "modality")]
    modality: Option<String>,
}

fn put_cs_or_empty(identifier: &mut InMemDicomObject, tag: Tag, vr: VR, value: &Option<String>) {
    let value = value.clone().unwrap_or_default();
    identifier.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn build_identifier(args: &App, level: QueryLevel) -> InMemDicomObject {
    let mut identifier = InMemDicomObject::new_empty();
    put_cs_or_empty(&mut identifier, tags::PATIENT_ID, VR::LO, &args.patient_id);
    put_cs_or_empty(&mut identifier, tags::PATIENT_NAME, VR::PN, &args.patient_name);
    put_cs_or_empty(&mut identifier, tags::STUDY_INSTANCE_UID, VR::UI, &args.study_instance_uid);
    put_cs_or_empty(&mut identifier, tags::ACCESSION_NUMBER, VR::SH, &args.accession_number);
    put_cs_or_empty(&mut identifier, tags::MODALITY, VR::CS, &args.modality);
    if matches!(level, QueryLevel::Series | QueryLevel::Image) {
        put_cs_or_empty(&mut identifier, tags::SERIES_INSTANCE_UID, VR::UI, &args.series_instance_uid);
    }
    if matches!(level, QueryLevel::Image) {
        identifier.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("")));
    }
    identifier
}

fn print_match(identifier: &InMemDicomObject) {
    for tag in [
        tags::PATIENT_ID,
        tags::PATIENT_NAME,
        tags::STUDY_INSTANCE_UID,
        tags::SERIES_INSTANCE_UID,
        tags::SOP_INSTANCE_UID,
        tags::MODALITY,
    ] {
        if let Ok(element) = identifier.element(tag) {
            if let Ok(value) = element.to_str() {
                let value = value.trim_end_matches('\0');
                if !value.is_empty() {
                    println!("({:04X},{:04X}) {}", tag.0, tag.1, value);
                }
            }
        }
    }
    println!("---");
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
        uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
        &[],
    )
    .whatever_context("could not establish association")?;

    let identifier = build_identifier(args, level);
    let mut count = 0usize;
    let status = client
        .find_each(
            uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
            level,
            identifier,
            |matched| {
                count += 1;
                print_match(&matched);
            },
        )
        .whatever_context("C-FIND failed")?;

    info!("{} match(es), final status 0x{:04X}", count, status.0);
    client.release().whatever_context("could not release association")?;
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
