use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout may carry PDF bytes
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certgen=info,certificate=info".into()),
        )
        .init();

    if let Err(err) = certgen::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
