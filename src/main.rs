//! RAX FXP Client - Entry Point
//!
//! Drives the FXP engine from the command line: print the site catalog,
//! list a directory on one site, or run a server-to-server transfer
//! between two of them.

use std::env;
use std::process;

use log::error;

use rax_fxp_client::client::ControlChannel;
use rax_fxp_client::config::{ClientConfig, SiteRecord};
use rax_fxp_client::error::ClientResult;
use rax_fxp_client::{listing, transfer};

const USAGE: &str = "usage: rax-fxp-client sites\n       rax-fxp-client list <site> [path]\n       rax-fxp-client fxp <src-site> <dst-site> <src-path> <dst-path> <file> <size-hint>";

#[tokio::main]
async fn main() {
    // env_logger picks up the RUST_LOG environment variable.
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match args.first().map(String::as_str) {
        Some("sites") => {
            print_sites(&config);
            Ok(())
        }
        Some("list") if args.len() >= 2 => {
            list_site(&config, &args[1], args.get(2).map(String::as_str)).await
        }
        Some("fxp") if args.len() == 7 => run_fxp(&config, &args[1..]).await,
        _ => {
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn find_site<'a>(config: &'a ClientConfig, name: &str) -> &'a SiteRecord {
    match config.catalog.find_site(name) {
        Some(site) => site,
        None => {
            error!("No site named '{}' in the catalog", name);
            process::exit(1);
        }
    }
}

fn open_channel(config: &ClientConfig, site: &SiteRecord) -> ControlChannel {
    ControlChannel::with_options(
        site.address(),
        site.credentials(),
        site.encryption(),
        config.timeouts.channel_options(),
    )
}

fn print_sites(config: &ClientConfig) {
    for site in config.catalog.sites() {
        println!(
            "{:>3}  {:<20} {}:{} tls={} user={}",
            site.id, site.name, site.hostname, site.port, site.tls, site.username
        );
    }
    for section in config.catalog.sections() {
        println!("{:>3}  [section] {}", section.id, section.name);
    }
}

async fn list_site(config: &ClientConfig, name: &str, path: Option<&str>) -> ClientResult<()> {
    let site = find_site(config, name);
    let mut channel = open_channel(config, site);

    channel.connect().await?;
    if let Some(path) = path {
        channel.change_directory(path).await?;
    }
    let entries = listing::list(&mut channel).await?;
    channel.close().await;

    for entry in &entries {
        println!(
            "{} {:>12} {} {}",
            entry.permission, entry.size, entry.date, entry.name
        );
    }
    Ok(())
}

async fn run_fxp(config: &ClientConfig, args: &[String]) -> ClientResult<()> {
    let src = find_site(config, &args[0]);
    let dst = find_site(config, &args[1]);
    let file_name = &args[4];
    let size_hint: u64 = match args[5].parse() {
        Ok(n) => n,
        Err(_) => {
            error!("Size hint must be a byte count, got '{}'", args[5]);
            process::exit(2);
        }
    };
    // Either end requiring TLS makes the data rendezvous secure too.
    let secure = src.tls || dst.tls;

    let mut source = open_channel(config, src);
    let mut destination = open_channel(config, dst);
    source.connect().await?;
    destination.connect().await?;

    let result = transfer::transfer(
        &mut source,
        &mut destination,
        &args[2],
        &args[3],
        file_name,
        size_hint,
        secure,
    )
    .await;

    // Release both sessions whether or not the sequence completed.
    source.close().await;
    destination.close().await;

    let outcome = result?;
    println!(
        "{}: {} B/s over {}s",
        file_name, outcome.bytes_per_second, outcome.elapsed_secs
    );
    Ok(())
}
