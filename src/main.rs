use clap::Parser;
use reverb::cli::{
    Args, build_config, build_mailer, init_logging, load_secrets, open_cache, open_user_store,
};
use reverb::{create_app, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(secrets) = load_secrets() else {
        std::process::exit(1);
    };

    let mailer = match build_mailer(&args) {
        Ok(mailer) => mailer,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let Some(users) = open_user_store(args.database_url.as_deref()).await else {
        std::process::exit(1);
    };

    let Some(cache) = open_cache(args.redis_url.as_deref()).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, secrets);
    let app = create_app(users, cache, mailer, &config);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });
    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(app, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
