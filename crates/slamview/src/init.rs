//! Process-wide setup.

/// Installs the `env_logger` backend for the `log` macros.
///
/// `RUST_LOG` overrides the default `info` level. Calling this more than once
/// (or after another logger was installed) is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::debug!("logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("still logging");
    }
}
