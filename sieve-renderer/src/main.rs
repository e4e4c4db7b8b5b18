use clap::Parser;
use sieve_renderer::cli_args::CliArgs;
use sieve_renderer::main_loop::main_loop;
use std::process::ExitCode;

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	#[cfg(feature = "profile-with-puffin")]
	let _puffin_server = {
		profiling::puffin::set_scopes_on(true);
		let server_addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
		match puffin_http::Server::new(&server_addr) {
			Ok(server) => Some(server),
			Err(e) => {
				log::warn!("puffin server unavailable: {e}");
				None
			}
		}
	};

	match main_loop(CliArgs::parse()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			log::error!("{e:?}");
			ExitCode::FAILURE
		}
	}
}
