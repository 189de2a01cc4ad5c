use clap::Parser;

use crud_gateway::{
    adapters,
    cli::Args,
    error::{AppError, AppResult},
    logging, Gateway, GatewayConfig,
};

fn main() -> AppResult<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    rt.block_on(async move {
        let gateway = Gateway::new(GatewayConfig::from(&args))?;
        if args.mcp {
            adapters::mcp::run(gateway).await
        } else {
            adapters::bridge::run(gateway).await
        }
    })
}
