mod commands;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;

use commands::{CommandLine, Commands, discover, order, relocate, show};
use portall_common::model::host::HostId;
use portall_core::{Engine, HttpAuthority, RelocateRequest};
use terminal::notifier::TerminalNotifier;
use terminal::{logging, print, spinner};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let commands = CommandLine::parse_args();

    logging::init();

    let authority = HttpAuthority::new(commands.authority_config())?;
    let engine = Engine::new(
        Arc::new(authority),
        Arc::new(TerminalNotifier),
        commands.engine_config(),
    );

    let loaded = {
        let _spinner = spinner::busy(&format!("Loading hosts from {}...", commands.url));
        engine.reload().await
    };
    if loaded.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let code = match commands.command {
        Commands::Show => {
            show::show(&engine);
            ExitCode::SUCCESS
        }
        Commands::Move {
            port,
            source,
            target,
            position,
        } => {
            print::header("moving port");
            let mut request = RelocateRequest::new(port, source, target);
            request.position = position;
            relocate::relocate(&engine, request).await?
        }
        Commands::Order { host, ports } => {
            print::header("reordering ports");
            order::order(&engine, HostId::new(host), ports).await?
        }
        Commands::Discover { from } => {
            print::header("getting ready for discovery");
            discover::discover(&engine, from).await?
        }
    };

    print::end_of_program();
    Ok(code)
}
