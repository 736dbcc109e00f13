use clap::Parser;
use floe::cli::{
    handle_completions, handle_config_init, load_config, read_input, route, stability,
    sync, transpile, Cli, Commands, ConfigCommands, StabilityCommands,
};

fn main() {
    let cli = Cli::parse();

    let result = run(cli);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Config(ConfigCommands::Init(args)) => {
            println!("{}", handle_config_init(args)?);
            return Ok(());
        }
        Commands::Completions(args) => {
            handle_completions(args);
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli.config, cli.log_level.as_deref())?;
    if let Err(e) = floe::logging::init_tracing(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let output = match &cli.command {
        Commands::Transpile(args) => {
            let sql = read_input(args.input.as_deref())?;
            transpile::handle_transpile(args, &config, &sql)?
        }
        Commands::Blacklist(args) => {
            let sql = read_input(args.input.as_deref())?;
            transpile::handle_blacklist(args, &config, &sql)?
        }
        Commands::Route(args) => {
            let sql = read_input(args.input.as_deref())?;
            route::handle_route(args, &config, &sql)?
        }
        Commands::Stability(cmd) => match cmd {
            StabilityCommands::Status(args) => stability::handle_stability_status(args, &config)?,
            StabilityCommands::Clear(args) => stability::handle_stability_clear(args, &config)?,
            StabilityCommands::ClearRunning => {
                stability::handle_stability_clear_running(&config)?
            }
        },
        Commands::SyncHealth(args) => sync::handle_sync_health(args, &config)?,
        Commands::Config(_) | Commands::Completions(_) => return Ok(()),
    };

    println!("{}", output);
    Ok(())
}
