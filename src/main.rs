use clap::{Parser, ValueEnum};
use mcq::{Conf, QueryErr, SocketConf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Simple,
    Full,
    Both,
}

/// Query a Minecraft server over the UDP Query protocol.
#[derive(Parser, Debug)]
#[command(name = "mcq", version, about)]
struct Cli {
    /// Server address, `host` or `host:port` (default port 25565).
    address: String,

    /// Which stat to request.
    #[arg(short, long, value_enum, default_value_t = Mode::Both)]
    mode: Mode,

    /// Read timeout in milliseconds.
    #[arg(short, long, default_value_t = 5000)]
    timeout_ms: u64,
}

fn main() -> Result<(), QueryErr> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut conf = match cli.address.contains(':') {
        true => Conf::create_from_str(&cli.address)?,
        false => Conf::create(&cli.address),
    };

    conf.socket_conf = SocketConf {
        read_time_out: Some(Duration::from_millis(cli.timeout_ms)),
        ..SocketConf::default()
    };

    // One client for both stats, the second reuses the challenge token.
    let mut client = conf.connect()?;

    if cli.mode != Mode::Full {
        let response = client.simple()?;

        info!("=== SIMPLE QUERY ===");
        println!("{}", response);
    }

    if cli.mode != Mode::Simple {
        let response = client.full()?;

        info!("==== FULL QUERY ====");
        println!("{}", response);
    }

    Ok(())
}
