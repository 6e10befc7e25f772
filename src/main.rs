//! webbook - EPUB3 to WebBook converter

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{Event, Level, Subscriber, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use webbook::{Config, Outcome};

#[derive(Parser)]
#[command(name = "webbook")]
#[command(version, about = "Turn an EPUB3 package into an EPUB3-compatible WebBook", long_about = None)]
#[command(after_help = "EXAMPLES:
    webbook mybook.epub    Extract into ./extracted and add ./extracted/index.xhtml")]
struct Cli {
    /// EPUB3 archive to convert
    #[arg(value_name = "ARCHIVE")]
    input: PathBuf,
}

/// Plain console lines, with `[ERROR]` / `[WARNING]` in front of problems.
struct ConsoleFormat;

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        match *event.metadata().level() {
            Level::ERROR => write!(writer, "[ERROR] ")?,
            Level::WARN => write!(writer, "[WARNING] ")?,
            _ => {}
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .event_format(ConsoleFormat)
        .init();

    info!("EPUB3 to EPUB3-compatible WebBook");

    match webbook::convert(&cli.input, &Config::default()) {
        Ok(Outcome::Converted(conversion)) => {
            info!("WebBook entry point: {}", conversion.to);
            ExitCode::SUCCESS
        }
        Ok(Outcome::AlreadyWebBook { .. }) => ExitCode::SUCCESS,
        Ok(Outcome::NoRendition) => {
            info!("No EPUB rendition declared, nothing to do");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
