use clap::Parser;
use dicom_dictionary_std::uids;
use dicom_pacs::PacsClient;
use snafu::{Report, ResultExt, Whatever};
use tracing::{info, Level};

/// DICOM C-ECHO SCU
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// the address of the peer (e.g. 127.0.0.1:11112)
    address: String,
    /// verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    /// the calling Application Entity title
    #[arg(long = "calling-ae-title", default_value = "ECHO-SCU")]
    calling_ae_title: String,
    /// the called Application Entity title
    #[arg(long = "called-ae-title", default_value = "ANY-SCP")]
    called_ae_title: String,
}

fn run(args: &App) -> Result<(), Whatever> {
    let mut client = PacsClient::connect(
        args.address.as_str(),
        &args.calling_ae_title,
        &args.called_ae_title,
        uids::VERIFICATION,
        &[],
    )
    .whatever_context("could not establish association")?;

    let status = client
        .echo(uids::VERIFICATION)
        .whatever_context("C-ECHO failed")?;

    if status.is_success() {
        info!("Echo successful (status 0x{:04X})", status.0);
    } else {
        info!("Echo returned non-success status 0x{:04X}", status.0);
    }

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
