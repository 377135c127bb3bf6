mod commands;

use clap::{Parser, Subcommand};
use kupak_core::{CoreError, KubectlRunner, Manager};
use kupak_remote::{ClientConfig, UrlFetcher};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kupak",
    version,
    about = "Package manager for parameterized cluster manifests"
)]
struct Cli {
    /// Address of the repository index used to resolve bare pak names.
    #[arg(short, long, env = "KUPAK_REPO", global = true)]
    repo: Option<String>,

    /// Namespace to install into and list from (default: "default").
    #[arg(short, long, env = "KUPAK_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// kubectl binary used to talk to the cluster.
    #[arg(long, env = "KUPAK_KUBECTL", global = true)]
    kubectl: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the paks offered by the repository.
    #[command(alias = "p")]
    Paks,
    /// Show a pak's description, properties and resources.
    #[command(alias = "s")]
    Spec {
        /// Pak name (`name` or `name@version`) or address.
        pak: String,
    },
    /// Render a pak and create its objects in the cluster.
    #[command(alias = "i")]
    Install {
        /// Pak name (`name` or `name@version`) or address.
        pak: String,
        /// YAML file with property values. Read from stdin when omitted and
        /// stdin is not a terminal.
        values: Option<PathBuf>,
        /// Set a property value (repeatable, wins over the values file).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Print the labeled manifests instead of creating them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Fail when a pod template's labels cannot be merged.
        #[arg(long, default_value_t = false)]
        strict_templates: bool,
    },
    /// List installed paks, or the installations of one pak.
    #[command(alias = "l")]
    List {
        /// Only show installations of this pak.
        pak: Option<String>,
    },
    /// Show the objects and status of one installation group.
    Status {
        /// Installation group id.
        group: String,
    },
    /// Delete every object of an installation group.
    Delete {
        /// Installation group id.
        group: String,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KUPAK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(failure) => {
            eprintln!("error: {failure}");
            ExitCode::from(failure.code)
        }
    }
}

fn run(cli: Cli) -> commands::CmdResult {
    let config = ClientConfig::load_default()
        .map_err(CoreError::from)?
        .with_overrides(cli.repo, cli.namespace, cli.kubectl);
    let manager = Manager::new(
        Box::new(UrlFetcher::new()),
        Box::new(KubectlRunner::new(&config.kubectl)),
    )
    .with_repo(config.repo.clone());
    let namespace = config.namespace.as_str();
    let json_output = cli.json;

    match cli.command {
        Commands::Paks => commands::paks::run(&manager, json_output),
        Commands::Spec { pak } => commands::spec::run(&manager, &pak, json_output),
        Commands::Install {
            pak,
            values,
            set,
            dry_run,
            strict_templates,
        } => commands::install::run(
            manager,
            &commands::install::InstallArgs {
                pak: &pak,
                namespace,
                values: values.as_deref(),
                set: &set,
                dry_run,
                strict_templates,
            },
            json_output,
        ),
        Commands::List { pak } => {
            commands::list::run(&manager, namespace, pak.as_deref(), json_output)
        }
        Commands::Status { group } => {
            commands::status::run(&manager, namespace, &group, json_output)
        }
        Commands::Delete { group } => {
            commands::delete::run(&manager, namespace, &group, json_output)
        }
    }
}
