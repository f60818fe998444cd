//! Command-line configuration, parsed with `clap`'s derive API the same way
//! a `tokio`-based server in this ecosystem typically does.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Authoritative room server")]
pub struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Simulation tick rate, in updates per second
    #[clap(short, long, default_value_t = 60)]
    pub tick_rate: u32,

    /// Maximum clients per room
    #[clap(long, default_value_t = 16)]
    pub max_clients: usize,

    /// Maximum number of concurrently open rooms
    #[clap(long, default_value_t = 64)]
    pub max_rooms: usize,

    /// Client timeout, in seconds, before a connection is considered dead
    #[clap(long, default_value_t = 10)]
    pub client_timeout_secs: u64,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}
