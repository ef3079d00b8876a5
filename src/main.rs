use std::path::PathBuf;

use clap::{Parser, Subcommand};

use prereq::cli::commands::{self, GlobalOptions};
use prereq::logging::init_logging;

#[derive(Parser)]
#[command(
    name = "prereq",
    about = "Prerequisite dependency resolution and execution planning for test suites",
    version
)]
struct Cli {
    /// Workspace file holding suites, test cases and setup profiles
    #[arg(short, long, global = true, default_value = "workspace.yaml")]
    workspace: PathBuf,

    /// Engine config file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a suite's prerequisites and dependencies
    Validate {
        suite: String,

        /// Output format: text, yaml, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate a single test case's prerequisites
    ValidateTest {
        test_case: String,

        /// Output format: text, yaml, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Render a suite's dependency graph
    Graph {
        suite: String,

        /// Output format: json, yaml, dot, mermaid
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a suite's execution order
    Order { suite: String },

    /// Compile a suite into an execution plan
    Plan {
        suite: String,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply an auto-fix to a suite and save the workspace
    Fix {
        suite: String,

        /// Fix type: add-missing, reorder
        #[arg(short = 't', long = "type")]
        fix_type: String,

        /// Report the change without writing the workspace
        #[arg(long)]
        dry_run: bool,
    },

    /// List suites, tests or profiles
    List {
        /// What to list: suites, tests, profiles
        what: String,
    },
}

fn fail(e: &str) -> ! {
    eprintln!("error: {e}");
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = GlobalOptions {
        workspace: cli.workspace,
        config: cli.config,
    };

    match cli.command {
        Some(Commands::Validate { suite, format }) => {
            match commands::run_validate(&options, &suite, &format) {
                Ok((report, valid)) => {
                    print!("{report}");
                    if !valid {
                        std::process::exit(1);
                    }
                }
                Err(e) => fail(&e),
            }
        }
        Some(Commands::ValidateTest { test_case, format }) => {
            match commands::run_validate_test(&options, &test_case, &format) {
                Ok((report, valid)) => {
                    print!("{report}");
                    if !valid {
                        std::process::exit(1);
                    }
                }
                Err(e) => fail(&e),
            }
        }
        Some(Commands::Graph {
            suite,
            format,
            output,
        }) => match commands::run_graph(&options, &suite, &format, output.as_ref()) {
            Ok(result) => print!("{result}"),
            Err(e) => fail(&e),
        },
        Some(Commands::Order { suite }) => match commands::run_order(&options, &suite) {
            Ok(result) => print!("{result}"),
            Err(e) => fail(&e),
        },
        Some(Commands::Plan {
            suite,
            format,
            output,
        }) => match commands::run_plan(&options, &suite, &format, output.as_ref()) {
            Ok(result) => print!("{result}"),
            Err(e) => fail(&e),
        },
        Some(Commands::Fix {
            suite,
            fix_type,
            dry_run,
        }) => match commands::run_fix(&options, &suite, &fix_type, dry_run) {
            Ok(result) => print!("{result}"),
            Err(e) => fail(&e),
        },
        Some(Commands::List { what }) => match commands::run_list(&options, &what) {
            Ok(result) => print!("{result}"),
            Err(e) => fail(&e),
        },
        None => {
            // No subcommand: clap prints help and exits
            Cli::parse_from(["prereq", "--help"]);
        }
    }
}
