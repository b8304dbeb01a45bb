//! `kubelogin` binary.

// std
use std::{error::Error as StdError, io, process::ExitCode, sync::Arc};
// crates.io
use clap::Parser;
use kubelogin::{
	cli::{Cli, Command, GetTokenArgs},
	exec::{ExecApiVersion, ExecCredentialWriter, KUBERNETES_EXEC_INFO},
	http::ReqwestHttpClient,
	oauth::{AadFacade, ReqwestTransportErrorMapper},
	obs,
	orchestrator::CredentialOrchestrator,
};

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(e) = obs::init_logging(cli.verbosity) {
		eprintln!("{e}");
	}

	let result = match &cli.command {
		Command::GetToken(args) => get_token(args, cli.verbosity).await,
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			report(e.as_ref());

			ExitCode::FAILURE
		},
	}
}

async fn get_token(args: &GetTokenArgs, verbosity: u8) -> Result<(), Box<dyn StdError>> {
	let exec_info = std::env::var(KUBERNETES_EXEC_INFO).ok();
	let api_version = ExecApiVersion::from_exec_info(exec_info.as_deref())?;
	let options = args.options()?;
	let settings = args.settings(verbosity);
	let facade: Arc<AadFacade> =
		Arc::new(AadFacade::new(ReqwestHttpClient::default(), ReqwestTransportErrorMapper));
	let orchestrator = CredentialOrchestrator::from_options(options, facade)?
		.with_settings(settings)
		.with_writer(Arc::new(ExecCredentialWriter::new(api_version)));

	orchestrator.run(&mut io::stdout().lock()).await?;

	Ok(())
}

fn report(e: &dyn StdError) {
	eprintln!("Error: {e}");

	let mut source = e.source();

	while let Some(cause) = source {
		eprintln!("  caused by: {cause}");

		source = cause.source();
	}
}
