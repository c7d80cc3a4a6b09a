use crate::Result;

/// Initialize logging/tracing for the relay.
///
/// Calling it twice is harmless; the second subscriber is simply not installed.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates and for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_directives(service_name))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}

fn default_directives(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    format!("info,kwrelay=info,kwrelay_core=info,kwrelay_telegram=info,{service}=info")
}
