//! idempotency-cache: 幂等缓存文件的检查与清理工具
//!
//! Usage:
//!   idempotency-cache stats   [--path <file>]    Count live and expired records
//!   idempotency-cache verify  [--path <file>]    Fail if the file is not a valid store
//!   idempotency-cache cleanup [--path <file>]    Remove expired records in place

use resilient_http::IdempotencyStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let code = match args[1].as_str() {
        "stats" => cmd_stats(&args[2..]),
        "verify" => cmd_verify(&args[2..]),
        "cleanup" => cmd_cleanup(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("idempotency-cache {}", env!("CARGO_PKG_VERSION"));
            0
        }
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            1
        }
    };
    std::process::exit(code);
}

fn print_usage() {
    println!(
        r#"idempotency-cache: inspect and maintain an idempotency store file

USAGE:
    idempotency-cache <COMMAND> [--path <file>]

COMMANDS:
    stats       Count live and expired records in the store
    verify      Strictly parse the store; exit 2 when it is corrupt
    cleanup     Remove expired records and rewrite the file atomically
    version     Show version information
    help        Show this help message

ENVIRONMENT:
    RESILIENT_HTTP_IDEMPOTENCY_PATH       Store file (default idempotency_cache.json)
    RESILIENT_HTTP_IDEMPOTENCY_TTL_SECS   TTL for records written without one"#
    );
}

fn open_store(args: &[String]) -> IdempotencyStore {
    let store = IdempotencyStore::from_env();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--path" {
            if let Some(path) = args.get(i + 1) {
                return IdempotencyStore::new(PathBuf::from(path))
                    .with_default_ttl(store.default_ttl());
            }
        }
    }
    store
}

fn cmd_stats(args: &[String]) -> i32 {
    let store = open_store(args);
    println!("path:        {}", store.path().display());
    let total = store.len();
    let expired = store.expired_count();
    println!("records:     {}", total);
    println!("live:        {}", total.saturating_sub(expired));
    println!("expired:     {}", expired);
    println!("default ttl: {}s", store.default_ttl().as_secs());
    0
}

fn cmd_verify(args: &[String]) -> i32 {
    let store = open_store(args);
    match store.verify() {
        Ok(n) => {
            println!("✓ {} ({} records)", store.path().display(), n);
            0
        }
        Err(e) => {
            eprintln!("✗ {e}");
            2
        }
    }
}

fn cmd_cleanup(args: &[String]) -> i32 {
    let store = open_store(args);
    match store.cleanup() {
        Ok(removed) => {
            println!(
                "removed {} expired record(s), {} remaining",
                removed,
                store.len()
            );
            0
        }
        Err(e) => {
            eprintln!("cleanup failed: {e}");
            1
        }
    }
}
