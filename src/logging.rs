/// Install the global fmt subscriber. Filter from `BUSCADOR_LOG`, then `RUST_LOG`, default `info`.
/// Output goes to stderr so command output on stdout stays machine-readable.
pub fn init_tracing_from_env() {
    let env_filter = std::env::var("BUSCADOR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
