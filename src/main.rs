//! flashcached - An In-Memory Cache Server Speaking the Memcached Protocol
//!
//! This is the main entry point. It parses the command line, sets up logging,
//! starts the server and stops it on Ctrl+C.

use flashcached::config::{CacheConfig, ServerConfig};
use flashcached::server::Server;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parse configuration from command-line arguments
fn config_from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let mut capacity = config.cache.capacity();
    let mut max_value_size: Option<usize> = None;
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                config.host = value_of(&args, i).to_string();
                i += 2;
            }
            "--port" | "-p" => {
                config.port = parse_or_exit(value_of(&args, i), "port number");
                i += 2;
            }
            "--capacity" | "-m" => {
                capacity = parse_or_exit(value_of(&args, i), "capacity");
                i += 2;
            }
            "--max-value-size" | "-I" => {
                max_value_size = Some(parse_or_exit(value_of(&args, i), "max value size"));
                i += 2;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("flashcached version {}", flashcached::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config.cache = CacheConfig::new(capacity, max_value_size.unwrap_or(capacity));
    config
}

/// The value following the flag at `i`, or exit.
fn value_of(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            std::process::exit(1);
        }
    }
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, what: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid {}: {}", what, value);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
flashcached - An In-Memory Cache Server Speaking the Memcached Protocol

USAGE:
    flashcached [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on, 0 for any (default: 11211)
    -m, --capacity <BYTES>         Cache capacity in bytes (default: 536870912)
    -I, --max-value-size <BYTES>   Largest single value (default: capacity)
    -v, --version                  Print version information
        --help                     Print this help message

ENVIRONMENT:
    RUST_LOG                       Log filter (default: info)

EXAMPLES:
    flashcached                        # Start on 127.0.0.1:11211
    flashcached --port 11212           # Start on port 11212
    flashcached -m 67108864 -I 1048576 # 64 MiB cache, 1 MiB values

CONNECTING:
    $ telnet 127.0.0.1 11211
    set name 0 0 4
    Ariz
    STORED
    get name
    VALUE name 0 4
    Ariz
    END
"#
    );
}

fn print_banner(config: &ServerConfig, port: u16) {
    println!(
        r#"
flashcached v{} - In-Memory Cache Server
──────────────────────────────────────────────────────────────
Listening on {}:{}
Capacity {} bytes, max value {} bytes
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        flashcached::VERSION,
        config.host,
        port,
        config.cache.capacity(),
        config.cache.max_value_size(),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config_from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let mut server = Server::new(config.clone());
    let addr = server.start().await?;
    print_banner(&config, addr.port());

    signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping server...");

    server.stop().await;
    info!("Server shutdown complete");
    Ok(())
}
