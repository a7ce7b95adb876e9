use clap::Parser;
use color_eyre::eyre::Result;

use play_publish::{PublishError, cli};

fn initialize_logger(debug: bool) -> std::result::Result<(), PublishError> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("play_publish")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli_args = cli::Args::parse();

    initialize_logger(cli_args.debug)?;

    let config = cli_args.publisher_config()?;
    let request = cli_args.upload_request();

    let outcome = play_publish::upload(&config, &request).await?;

    println!("{outcome}");

    Ok(())
}
