use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use dicom_object::DefaultDicomObject;
use dicom_pacs::PacsClient;
use indicatif::{ProgressBar, ProgressStyle};
use snafu::{whatever, Report, ResultExt, Snafu, Whatever};
use tracing::{debug, error, info, warn, Level};
use walkdir::WalkDir;

/// DICOM C-STORE SCU
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// the address of the peer (e.g. 127.0.0.1:11112)
    address: String,
    /// the file(s) or directories to send
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    /// the calling Application Entity title
    #[arg(long = "calling-ae-title", default_value = "STORE-SCU")]
    calling_ae_title: String,
    /// the called Application Entity title
    #[arg(long = "called-ae-title", default_value = "ANY-SCP")]
    called_ae_title: String,
    /// give up the whole run on the first failed C-STORE, instead of
    /// continuing with the remaining files
    #[arg(long = "fail-first")]
    fail_first: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("could not read DICOM file {}", path.display()))]
    ReadFile { path: PathBuf, source: dicom_object::ReadError },
    #[snafu(display("{} is missing a SOP Class UID", path.display()))]
    MissingSopClass { path: PathBuf },
}

/// One file queued for sending, grouped by the abstract syntax its SOP
/// Class UID implies, since a single association negotiates only one.
struct DicomFile {
    path: PathBuf,
    object: DefaultDicomObject,
    sop_class_uid: String,
    sop_instance_uid: String,
}

fn check_files(paths: &[PathBuf]) -> Vec<DicomFile> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    check_file(entry.path(), &mut files);
                }
            }
        } else {
            check_file(path, &mut files);
        }
    }
    files
}

fn check_file(path: &Path, out: &mut Vec<DicomFile>) {
    match open_file(path) {
        Ok(file) => out.push(file),
        Err(e) => warn!("skipping {}: {}", path.display(), Report::from_error(e)),
    }
}

fn open_file(path: &Path) -> Result<DicomFile, Error> {
    let object = DefaultDicomObject::open_file(path).context(ReadFileSnafu { path })?;
    let sop_class_uid = object.meta().media_storage_sop_class_uid.trim_end_matches('\0').to_string();
    let sop_instance_uid = object.meta().media_storage_sop_instance_uid.trim_end_matches('\0').to_string();
    if sop_class_uid.is_empty() {
        return MissingSopClassSnafu { path }.fail();
    }
    Ok(DicomFile { path: path.to_path_buf(), object, sop_class_uid, sop_instance_uid })
}

fn run(args: &App) -> Result<(), Whatever> {
    let files = check_files(&args.files);
    if files.is_empty() {
        whatever!("no readable DICOM files were found among the given paths");
    }
    info!("{} file(s) found", files.len());

    let mut by_sop_class: HashMap<String, Vec<DicomFile>> = HashMap::new();
    for file in files {
        by_sop_class.entry(file.sop_class_uid.clone()).or_default().push(file);
    }

    let progress = if args.verbose {
        None
    } else {
        let total: u64 = by_sop_class.values().map(|v| v.len() as u64).sum();
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
                .whatever_context("invalid progress bar template")?,
        );
        Some(bar)
    };

    let mut failures = 0usize;
    for (sop_class_uid, group) in by_sop_class {
        let mut client = PacsClient::connect(
            args.address.as_str(),
            &args.calling_ae_title,
            &args.called_ae_title,
            &sop_class_uid,
            &[],
        )
        .whatever_context("could not establish association")?;

        for file in group {
            debug!("sending {}", file.path.display());
            let result = client.store(&file.sop_class_uid, &file.sop_instance_uid, file.object.into_inner());
            match result {
                Ok(status) if status.is_success() => {}
                Ok(status) => {
                    failures += 1;
                    error!("{}: peer returned status 0x{:04X}", file.path.display(), status.0);
                    if args.fail_first {
                        whatever!("aborting after first failure");
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!("{}: {}", file.path.display(), e);
                    if args.fail_first {
                        whatever!("aborting after first failure");
                    }
                }
            }
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        client.release().whatever_context("could not release association")?;
    }

    if let Some(bar) = progress {
        bar.finish();
    }

    if failures > 0 {
        whatever!("{} file(s) failed to store", failures);
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
