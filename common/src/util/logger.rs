use env_logger::Env;

/// Installs the process logger. `RUST_LOG` overrides the default `info`
/// filter; calling it twice is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
