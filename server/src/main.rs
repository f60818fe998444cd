use clap::Parser;
use log::info;
use server::config::Args;
use server::network::Server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("RUST_LOG not set; try RUST_LOG=info cargo run");
    }

    let args = Args::parse();
    info!(
        "starting server on {} at {}Hz (max {} clients/room, {} rooms)",
        args.bind_addr(),
        args.tick_rate,
        args.max_clients,
        args.max_rooms
    );

    let server = Server::bind(args).await?;
    server.run().await
}
