use std::process::ExitCode;

use clap::Parser;
use db_backup_lib::backends::{MailCommand, MySqlClient};
use db_backup_lib::cli::{Action, Cli};
use db_backup_lib::config::JobConfig;
use db_backup_lib::orchestrator::{JobResult, Orchestrator, Outcome};
use db_backup_lib::util::retention;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let mut config = match JobConfig::load_or_init(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(password) = cli.db_password {
        config.database.password = password;
    }

    let client = MySqlClient::new(&config.dump_tool_path, &config.load_tool_path);
    let mailer = MailCommand::from_config(&config.notification);
    let orchestrator = Orchestrator::new(&config, &client, &client, mailer);

    let result = match cli.action {
        Action::Backup(args) => {
            if !cli.json {
                println!("Starting database backup...");
            }
            orchestrator.run_backup(args.into())
        }
        Action::Restore(args) => {
            if !cli.json {
                println!("Starting database restore...");
            }
            orchestrator.run_restore(&args.into())
        }
        Action::List => return list(&config, cli.json),
    };

    if cli.json {
        println!("{}", result_json(&result));
    } else {
        match &result.outcome {
            Outcome::BackedUp { artifact } => {
                println!("✔ Backup completed successfully!");
                println!("File saved at: {}", artifact.display());
            }
            Outcome::Restored { from } => {
                println!("✔ Restore completed successfully!");
                println!("Restored from: {}", from.display());
            }
            Outcome::Failed(e) => {
                eprintln!("✘ Job failed!");
                eprintln!("{e}");
            }
        }
    }

    if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn list(config: &JobConfig, json: bool) -> ExitCode {
    let artifacts = match retention::list(&config.backup_directory) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            log::error!(
                "Listing {} failed: {e}",
                config.backup_directory.display()
            );
            return ExitCode::FAILURE;
        }
    };

    for artifact in artifacts {
        let modified = chrono::DateTime::<chrono::Local>::from(artifact.modified);
        if json {
            let entry = serde_json::json!({
                "path": artifact.path,
                "modified": modified.to_rfc3339(),
            });
            println!("{entry}");
        } else {
            println!(
                "{}  {}",
                modified.format("%Y-%m-%d %H:%M:%S"),
                artifact.path.display()
            );
        }
    }

    ExitCode::SUCCESS
}

fn result_json(result: &JobResult) -> serde_json::Value {
    let notes: Vec<_> = result
        .notes
        .iter()
        .map(|note| {
            serde_json::json!({
                "step": note.step.to_string(),
                "level": note.level.as_str(),
                "message": note.message,
            })
        })
        .collect();

    serde_json::json!({
        "succeeded": result.succeeded(),
        "artifact": result.artifact(),
        "failure": result.failure().map(ToString::to_string),
        "notes": notes,
    })
}
