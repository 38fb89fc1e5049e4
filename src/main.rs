//! SIWE auth server entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Build the auth service (system clock, OS randomness, EIP-191 recovery)
//! 3. Spawn the expired-state cleanup job
//! 4. Build router with API routes, CORS and security headers
//! 5. Start Axum server
//!
//! Also supports `keygen` and `login` subcommands for local testing.

use siwe_auth::{
    auth::{middleware::AppState, AuthService, Eip191Recovery, LocalSigner, OsRandom},
    cleanup,
    client::{SignInOptions, SiweClient},
    clock::SystemClock,
    config::Config,
    routes,
};
use std::sync::Arc;

fn print_keygen_usage() {
    eprintln!("Usage: siwe-auth keygen");
    eprintln!();
    eprintln!("Generate a random secp256k1 key and print it with its address.");
}

fn print_login_usage() {
    eprintln!("Usage: siwe-auth login <api-base> <private-key-hex> [domain]");
    eprintln!();
    eprintln!("Sign in to a running server and fetch the protected resource.");
    eprintln!("The domain defaults to the host of <api-base>.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  siwe-auth login http://localhost:8787 0x<64 hex chars>");
}

fn keygen() -> Result<(), String> {
    let signer = LocalSigner::random().map_err(|e| e.to_string())?;
    println!("private_key: {}", signer.to_hex().as_str());
    println!("address:     {}", signer.address().to_checksum());
    Ok(())
}

async fn login(api_base: &str, private_key: &str, domain: Option<&str>) -> Result<(), String> {
    let signer = LocalSigner::from_hex(private_key).map_err(|e| e.to_string())?;
    let mut options = SignInOptions::for_api(api_base).map_err(|e| e.to_string())?;
    if let Some(domain) = domain {
        options.domain = domain.to_string();
    }

    let client = SiweClient::new(api_base).map_err(|e| e.to_string())?;
    let address = client
        .sign_in(&signer, &options)
        .await
        .map_err(|e| e.to_string())?;
    println!("signed in as {}", address);

    let me = client.me().await.map_err(|e| e.to_string())?;
    println!("me:     {}", me);

    let secret = client.secret().await.map_err(|e| e.to_string())?;
    println!("secret: {}", secret);

    client.logout().await.map_err(|e| e.to_string())?;
    println!("logged out");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && args[1] == "keygen" {
        if args.len() != 2 {
            print_keygen_usage();
            std::process::exit(1);
        }
        if let Err(e) = keygen() {
            eprintln!("Error generating key: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if args.len() >= 2 && args[1] == "login" {
        if args.len() != 4 && args.len() != 5 {
            print_login_usage();
            std::process::exit(1);
        }
        if let Err(e) = login(&args[2], &args[3], args.get(4).map(String::as_str)).await {
            eprintln!("Login failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting siwe-auth on {}", config.bind_addr);
    if config.strict_domain {
        tracing::info!(
            expected_domain = config.expected_domain.as_deref().unwrap_or("<Host header>"),
            "Domain enforcement enabled"
        );
    }

    let auth = Arc::new(AuthService::new(
        config.auth_settings(),
        Arc::new(SystemClock),
        Arc::new(OsRandom),
        Arc::new(Eip191Recovery),
    ));

    tokio::spawn(cleanup::run_cleanup_loop(
        auth.clone(),
        config.cleanup_interval(),
    ));

    let bind_addr = config.bind_addr;
    let state = AppState {
        auth,
        config: Arc::new(config),
    };

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
