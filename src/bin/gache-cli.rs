//! gache CLI Client
//!
//! Sends one request line to a gache server and prints the response.
//!
//! ```text
//! $ gache-cli SET name Ariz 60
//! [201]
//! $ gache-cli GET name
//! Ariz
//! ```

use clap::Parser;
use gache::Client;

/// gache CLI
#[derive(Parser, Debug)]
#[command(name = "gache-cli")]
#[command(about = "Send one request to a gache server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = gache::DEFAULT_ADDR)]
    server: String,

    /// The request, e.g. `SET key value 60`
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    request: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut client = Client::new(args.server);
    let response = client.send(&args.request.join(" ")).await?;
    println!("{}", response);

    Ok(())
}
