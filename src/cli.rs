use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable, compact lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Look up pokemon through an expiring, deduplicating resource cache.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,

    /// Names to look up. Reads one name per line from stdin when omitted.
    pub names: Vec<String>,
}
