use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::notifications::dispatch::Channels;
use crate::notifications::email::MailgunChannel;
use crate::notifications::push::WebhookPushChannel;
use crate::notifications::sms::TwilioChannel;
use crate::parsers::fetch::HttpTransport;
use crate::run::RunOptions;
use std::collections::HashMap;
use std::path::PathBuf;

mod config;
mod criteria;
mod db;
mod domain;
mod errors;
mod health;
mod notifications;
mod parsers;
mod run;

#[cfg(test)]
mod tests;

enum Command {
    Update,
    ErrorReport,
    ResetErrors,
}

struct CliArgs {
    command: Command,
    local_payloads: HashMap<String, PathBuf>,
    no_notifications: bool,
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!(
                "Usage: specials_tracker [update|error-report|reset-errors] \
                 [--local <source>=<file>]... [--no-email]"
            );
            std::process::exit(2);
        }
    };

    let config = Config::from_env();
    let db = Database::new(config.database_path.clone());

    if let Err(e) = init_db(&db, &config.schema_path) {
        eprintln!("Database initialization failed: {e}");
        std::process::exit(1);
    }

    let email = MailgunChannel::new(&config, MailgunChannel::default_client());
    let sms = TwilioChannel::new(&config, TwilioChannel::default_client());
    let push = WebhookPushChannel::new(&config, WebhookPushChannel::default_client());
    let channels = Channels {
        email: &email,
        sms: &sms,
        push: &push,
    };
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let options = RunOptions {
        local_payloads: args.local_payloads,
        no_notifications: args.no_notifications,
    };

    let result = match args.command {
        Command::Update => {
            run::run_update(&config, &db, &transport, &channels, &options).map(|_| ())
        }
        Command::ErrorReport => {
            run::run_error_report(&config, &db, &transport, &channels, &options)
        }
        Command::ResetErrors => run::reset_errors(&db),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<CliArgs, String> {
    let mut command = Command::Update;
    let mut local_payloads = HashMap::new();
    let mut no_notifications = false;

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "update" => command = Command::Update,
            "error-report" => command = Command::ErrorReport,
            "reset-errors" => command = Command::ResetErrors,
            "--no-email" => no_notifications = true,
            "--local" => {
                let value = argv
                    .next()
                    .ok_or_else(|| "--local needs a <source>=<file> value".to_string())?;
                let (source, path) = value
                    .split_once('=')
                    .ok_or_else(|| format!("Bad --local value '{value}', want <source>=<file>"))?;
                local_payloads.insert(source.to_string(), PathBuf::from(path));
            }
            other => return Err(format!("Unknown argument '{other}'")),
        }
    }

    Ok(CliArgs {
        command,
        local_payloads,
        no_notifications,
    })
}
