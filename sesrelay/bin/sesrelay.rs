use clap::Parser;
use sesrelay::{Args, Controller, cli};
use sesrelay_common::{internal, logging};

#[cfg(not(unix))]
compile_error!("Only unix platforms are currently supported");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{}", cli::version_line());
        return Ok(());
    }

    logging::init();

    Controller::new(args)
        .run()
        .await
        .inspect_err(|err| internal!(level = ERROR, "{err}"))?;

    Ok(())
}
