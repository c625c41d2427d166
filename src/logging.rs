use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Level for a run: warnings about replaced or clamped style values always
/// reach stderr, `verbose` adds layout, font and render detail.
pub fn max_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::WARN }
}

/// Installs the stderr subscriber. Stdout stays reserved for command output
/// such as the layout JSON. A second call keeps the first subscriber.
pub fn init(verbose: bool) -> Result<()> {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(verbose))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .without_time()
        .try_init();
    Ok(())
}
