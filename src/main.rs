use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;

use espace_scan::{
    accounts::AccountStore,
    config::{AddressRange, FileDefaults, ScanConfig},
    negotiation::PasswordEncoding,
    output::print_summary,
    probe::SystemProbe,
    protocol::{ConnectionScheme, EspaceFactory},
    scanner::engine::ScanOrchestrator,
};

fn print_banner() {
    println!("{}", "┌──────────────────────────────────────────┐".bright_blue());
    println!("{}", "│  espace-scan - eSpace device discovery   │".bright_blue());
    println!("{}", "│  scheme x account x encoding negotiation │".bright_blue());
    println!("{}", "└──────────────────────────────────────────┘".bright_blue());
    println!();
}

fn build_cli() -> Command {
    Command::new("espace-scan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scan an IP range for eSpace devices and return the IP if detected")
        .arg(
            Arg::new("start-ip")
                .value_name("START_IP")
                .help("Starting IP")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("end-ip")
                .value_name("END_IP")
                .help("Ending IP")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("write")
                .short('w')
                .long("write")
                .value_name("FILE")
                .help("Write the IP addresses of detected eSpace devices to this file"),
        )
        .arg(
            Arg::new("insecure")
                .short('i')
                .long("insecure")
                .help("Force non-https connections")
                .action(ArgAction::SetTrue)
                .conflicts_with("secure"),
        )
        .arg(
            Arg::new("secure")
                .short('s')
                .long("secure")
                .help("Force https connections")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("hash-password")
                .short('H')
                .long("hash-password")
                .value_name("MODE")
                .help("Use a single password mode instead of trying all of them")
                .value_parser(["base64alt", "base64", "md5"]),
        )
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .value_name("USERNAME")
                .help("Default username to connect to the device")
                .conflicts_with("accounts-list"),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .value_name("PASSWORD")
                .help("Default password to connect to the device")
                .conflicts_with("accounts-list"),
        )
        .arg(
            Arg::new("accounts-list")
                .short('a')
                .long("accounts-list")
                .value_name("FILE")
                .help("CSV file containing the list of default username and password"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Ping timeout in seconds. Set to 0 to disable the ping check before connection")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("download")
                .short('d')
                .long("download")
                .help("Download the xml configuration file from every discovered device")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("export-dir")
                .long("export-dir")
                .value_name("DIR")
                .help("Destination directory for downloaded configuration files"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML file with default option values"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Hide the banner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let verbose = matches.get_flag("verbose");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }),
    )
    .init();

    if matches.get_flag("no-color") {
        colored::control::set_override(false);
    }
    if !matches.get_flag("no-banner") {
        print_banner();
    }

    if let Err(e) = run(&matches).await {
        log::error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    // CLI arguments win over file defaults.
    let defaults = match matches.get_one::<String>("config") {
        Some(path) => FileDefaults::from_toml_file(path)?,
        None => FileDefaults::load_default_config(),
    };

    let start_ip: Ipv4Addr = matches
        .get_one::<String>("start-ip")
        .unwrap()
        .parse()
        .context("starting IP is not a valid IPv4 address")?;
    let end_ip: Ipv4Addr = matches
        .get_one::<String>("end-ip")
        .unwrap()
        .parse()
        .context("ending IP is not a valid IPv4 address")?;
    let range = AddressRange::new(start_ip, end_ip)?;

    let schemes = if matches.get_flag("insecure") {
        vec![ConnectionScheme::Insecure]
    } else if matches.get_flag("secure") {
        vec![ConnectionScheme::Secure]
    } else {
        ConnectionScheme::fallback_order()
    };

    let forced_mode = matches
        .get_one::<String>("hash-password")
        .cloned()
        .or(defaults.hash_password.clone());
    let encodings = match forced_mode {
        Some(mode) => vec![mode.parse::<PasswordEncoding>()?],
        None => PasswordEncoding::default_order(),
    };

    let ping_timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .or(defaults.timeout)
        .unwrap_or(1);

    let username = matches
        .get_one::<String>("username")
        .cloned()
        .or(defaults.username.clone());
    let password = matches
        .get_one::<String>("password")
        .cloned()
        .or(defaults.password.clone());
    let accounts_list = matches
        .get_one::<String>("accounts-list")
        .cloned()
        .or(defaults.accounts_list.clone());

    let accounts = if username.is_some() || password.is_some() {
        // A partial override keeps the bundled value for the missing half.
        let bundled = AccountStore::bundled()?;
        let first = bundled.accounts()[0].clone();
        AccountStore::single(
            username.unwrap_or(first.username),
            password.unwrap_or(first.password),
        )
    } else {
        match accounts_list {
            Some(path) => AccountStore::from_file(path)?,
            None => AccountStore::bundled()?,
        }
    };

    let export_dir = matches
        .get_one::<String>("export-dir")
        .cloned()
        .or(defaults.export_dir.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));

    let config = ScanConfig {
        range,
        schemes,
        encodings,
        ping_timeout,
        export_config: matches.get_flag("download"),
        export_dir,
        output_file: matches.get_one::<String>("write").map(PathBuf::from),
    };

    // The raw socket is only opened when probing is actually enabled.
    let probe = if config.ping_timeout == 0 {
        SystemProbe::tcp()
    } else {
        SystemProbe::detect()
    };

    let orchestrator =
        ScanOrchestrator::new(config, accounts, EspaceFactory::default(), probe)?;

    let cancel_flag = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current address.");
            cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let report = orchestrator.scan().await?;
    print_summary(&report, !matches.get_flag("no-color"));

    Ok(())
}
