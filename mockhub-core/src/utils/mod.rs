pub mod time;

/// Logs one hub step: at `info` when the hub runs verbose, at `debug` otherwise.
macro_rules! hub_step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

pub(crate) use hub_step;
