pub mod dialects;
pub mod generate;
pub mod init;
pub mod prompt;

use std::error::Error;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub(crate) fn init_tracing(debug: bool) -> Result<(), Box<dyn Error>> {
    let level = match debug {
        true => Level::DEBUG,
        false => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
