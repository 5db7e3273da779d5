//! newsreel CLI entrypoint

use clap::Parser;

use newsreel::cli::Cli;

#[tokio::main]
async fn main() {
    // Run log initialization happens inside the command, once the log
    // path is known
    let cli = Cli::parse();
    let code = cli.execute().await;
    std::process::exit(code);
}
