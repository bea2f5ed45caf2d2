use libprotocol::ProtocolError;
use libruntime::{ReportError, RunError};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    if let Err(err) = libcli::run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

/// Logs go to stderr so that JSON and CSV printed on stdout stay clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(pe) = cause.downcast_ref::<ProtocolError>() {
            return match pe {
                ProtocolError::Json(_) => 3,
                ProtocolError::Validation(_) => 3,
                ProtocolError::Io(_) => 2,
            };
        }
        if cause.downcast_ref::<RunError>().is_some() {
            return 4;
        }
        if let Some(re) = cause.downcast_ref::<ReportError>() {
            return match re {
                ReportError::Json(_) => 3,
                ReportError::Io(_) => 2,
            };
        }
    }
    2
}
