// bases/provision_cli/src/main.rs
mod app;
mod args;
mod output;

use app::App;
use args::{usage_exit_code, Args};
use clap::Parser;
use color_eyre::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => match usage_exit_code(&error) {
            None => error.exit(),
            Some(code) => {
                error.print()?;
                std::process::exit(code);
            }
        },
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.default_filter().into()),
        )
        .init();

    let app = App::new(args);

    if let Err(error) = app.run().await {
        app.print_error(&error);
        std::process::exit(error.exit_code());
    }
    Ok(())
}
