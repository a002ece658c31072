use clap::Parser;
use client::network::{Client, ClientResult};
use log::info;
use shared::PlayerId;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, env = "SKETCH_SERVER", default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown to other players
    #[arg(short = 'n', long, env = "SKETCH_NAME", default_value = "Player")]
    name: String,

    /// Player id from an earlier session, to rejoin its room
    #[arg(short = 'r', long)]
    resume: Option<PlayerId>,
}

#[tokio::main]
async fn main() -> ClientResult<()> {
    env_logger::init();

    let args = Args::parse();
    info!("Connecting to {} as {}", args.server, args.name);

    let mut client = Client::new(&args.server, &args.name, args.resume).await?;
    client.run().await
}
