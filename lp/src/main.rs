//! Life Planner CLI
//!
//! Runs one command against the planner: hydrates the signed-in user's state,
//! applies the command locally, then waits for remote writes to settle.

use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio::sync::broadcast;
use tracing::{debug, info};

use lifeplanner::cli::{Cli, Command, FlowCommand, GoalsCommand, OutputFormat, WeeklyCommand, get_log_path};
use lifeplanner::config::Config;
use lifeplanner::dashboard::StepStatus;
use lifeplanner::domain::PlannerEntry;
use lifeplanner::{
    Authenticator, Credentials, Notice, NoticeTone, Planner, PlannerOptions, RemoteStore, SessionFile, SignUp,
    SqliteRemote, StepCatalog, Transition, WeeklyError, WeeklyPlan, WeeklyPlanForm,
};
use lifeplanner::sync::drain_notices;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn load_catalog(config: &Config) -> Result<StepCatalog> {
    match &config.flow.catalog_path {
        Some(path) => StepCatalog::load_yaml(path).context(format!("Failed to load step catalog from {}", path)),
        None => Ok(StepCatalog::builtin()),
    }
}

fn build_planner(config: &Config) -> Result<Planner> {
    debug!(remote_enabled = config.storage.remote_enabled, "build_planner: called");
    let catalog = load_catalog(config)?;
    let options = PlannerOptions::from_config(config);

    if !config.storage.remote_enabled {
        info!("Remote store disabled; running local-only");
        return Ok(Planner::new(catalog, None, None, options));
    }

    let sqlite = Arc::new(
        SqliteRemote::open(&config.storage.database_path)
            .context(format!("Failed to open database {}", config.storage.database_path))?,
    );
    let remote: Arc<dyn RemoteStore> = sqlite.clone();
    let auth: Arc<dyn Authenticator> = sqlite;
    Ok(Planner::new(catalog, Some(remote), Some(auth), options))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(format!("Logs are written to: {}", get_log_path().display()));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let session_file = SessionFile::new(&config.storage.session_path);

    let planner = build_planner(&config)?;
    let mut notices = planner.subscribe_notices();

    match session_file.load() {
        Ok(Some(user)) => planner.restore(user).await,
        Ok(None) => planner.ready().await,
        Err(e) => {
            eprintln!("{} {:#}", "warning:".yellow(), e);
            planner.ready().await;
        }
    }

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        Some(Command::Signup {
            email,
            password,
            confirm,
        }) => cmd_signup(&planner, &session_file, SignUp::new(email, password, confirm)).await,
        Some(Command::Signin { email, password }) => {
            cmd_signin(&planner, &session_file, Credentials::new(email, password)).await
        }
        Some(Command::Signout) => cmd_signout(&planner, &session_file).await,
        Some(Command::Whoami) => cmd_whoami(&planner),
        Some(Command::Flow { command }) => cmd_flow(&planner, command).await,
        Some(Command::Weekly { command }) => cmd_weekly(&planner, command).await,
        Some(Command::Goals { command }) => cmd_goals(&planner, command).await,
        Some(Command::Dashboard { format }) => cmd_dashboard(&planner, format),
        None => cmd_dashboard(&planner, OutputFormat::Text),
    };

    planner.shutdown().await;
    print_notices(&mut notices);
    result
}

fn print_notices(notices: &mut broadcast::Receiver<Notice>) {
    for notice in drain_notices(notices) {
        match notice.tone {
            NoticeTone::Success => println!("{} {}", "✓".green(), notice.message),
            NoticeTone::Error => eprintln!("{} {}", "✗".red(), notice.message),
        }
    }
}

async fn cmd_signup(planner: &Planner, session_file: &SessionFile, form: SignUp) -> Result<()> {
    debug!(email = %form.credentials.email, "cmd_signup: called");
    let user = planner.sign_up(&form).await?;
    session_file.save(&user)?;
    println!("Account created. Signed in as {}", form.credentials.email.bold());
    Ok(())
}

async fn cmd_signin(planner: &Planner, session_file: &SessionFile, credentials: Credentials) -> Result<()> {
    debug!(email = %credentials.email, "cmd_signin: called");
    let user = planner.sign_in(&credentials).await?;
    session_file.save(&user)?;
    let state = planner.state().snapshot();
    println!(
        "Signed in as {} ({} steps captured, {} weekly plans)",
        credentials.email.bold(),
        state.entries.len(),
        state.weekly_plans.len()
    );
    Ok(())
}

async fn cmd_signout(planner: &Planner, session_file: &SessionFile) -> Result<()> {
    debug!("cmd_signout: called");
    planner.sign_out().await;
    session_file.clear()?;
    println!("Signed out");
    Ok(())
}

fn cmd_whoami(planner: &Planner) -> Result<()> {
    match planner.session().current_user() {
        Some(user) => println!("{}", user),
        None => println!("{}", "Not signed in (local-only)".dimmed()),
    }
    Ok(())
}

async fn cmd_flow(planner: &Planner, command: FlowCommand) -> Result<()> {
    debug!(?command, "cmd_flow: called");
    let flow = planner.flow();
    match command {
        FlowCommand::Status => {
            let progress = flow.progress();
            for (index, step) in flow.catalog().steps().iter().enumerate() {
                let marker = if index == progress.current_index {
                    "→".cyan().bold()
                } else if progress.is_completed(index) {
                    "✓".green()
                } else if progress.can_navigate_to(index) {
                    "·".normal()
                } else {
                    "🔒".dimmed()
                };
                let title = if progress.can_navigate_to(index) {
                    step.title.normal()
                } else {
                    step.title.dimmed()
                };
                println!(" {} {}. {}", marker, index + 1, title);
            }
            println!(
                "\n{} of {} steps captured",
                progress.completed.len(),
                progress.step_count
            );
        }
        FlowCommand::Show => {
            let progress = flow.progress();
            let step = flow.current_step();
            let values = flow.form_values(step);
            println!(
                "{} {}",
                format!("Step {} of {}:", progress.current_index + 1, progress.step_count).dimmed(),
                step.title.bold()
            );
            if !step.description.is_empty() {
                println!("{}", step.description);
            }
            for field in &step.fields {
                let value = values.get(&field.id).map(String::as_str).unwrap_or_default();
                println!("  {:24} {} = {}", field.label, format!("({})", field.id).dimmed(), value);
            }
        }
        FlowCommand::Submit { set } => {
            let step = flow.current_step();
            let mut values: PlannerEntry = flow.form_values(step);
            for (key, value) in set {
                if step.find_field(&key).is_none() {
                    return Err(eyre!("Unknown field '{}' for step '{}'", key, step.id));
                }
                values.insert(key, value);
            }
            let outcome = flow.submit(values);
            let transition = outcome.transition;
            let _ = outcome.ticket.settled().await;
            match transition {
                Transition::Advance(next) => {
                    let title = flow.catalog().get(next).map(|s| s.title.as_str()).unwrap_or_default();
                    println!("Saved {}. Next: {}", outcome.step_id.bold(), title);
                }
                Transition::Complete => {
                    println!("{}", "Planner complete! Your year is mapped out.".green().bold());
                }
            }
        }
        FlowCommand::Back => {
            let index = flow.back();
            println!("Now on step {}: {}", index + 1, flow.current_step().title);
        }
        FlowCommand::Goto { step } => {
            let index = step.checked_sub(1).ok_or_else(|| eyre!("Steps are numbered from 1"))?;
            flow.navigate(index)?;
            println!("Now on step {}: {}", step, flow.current_step().title);
        }
    }
    Ok(())
}

fn print_plan(plan: &WeeklyPlan) {
    println!(
        "{} {}",
        plan.id.cyan(),
        format!("Week {}, {}/{}", plan.week_of_month, plan.month, plan.year).dimmed()
    );
    println!("  {}", plan.focus.bold());
    for win in &plan.wins {
        println!("  - {}", win);
    }
    if let Some(notes) = &plan.schedule_notes {
        println!("  Notes: {}", notes);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn cmd_weekly(planner: &Planner, command: WeeklyCommand) -> Result<()> {
    debug!(?command, "cmd_weekly: called");
    let weekly = planner.weekly();
    match command {
        WeeklyCommand::Save {
            year,
            month,
            week,
            focus,
            wins,
            notes,
        } => {
            let mut form = WeeklyPlanForm::for_today();
            if let Some(year) = year {
                form.year = year;
            }
            if let Some(month) = month {
                form.month = month;
            }
            form.week_of_month = week;
            form.focus = focus;
            form.wins = wins.join("\n");
            form.schedule_notes = notes.unwrap_or_default();

            let saved = weekly.save(&form)?;
            let _ = saved.ticket.settled().await;
            print_plan(&saved.plan);
        }
        WeeklyCommand::List { format } => {
            let plans = weekly.list();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
                OutputFormat::Text if plans.is_empty() => {
                    println!("{}", "No weekly plans yet".dimmed());
                }
                OutputFormat::Text => plans.iter().for_each(print_plan),
            }
        }
        WeeklyCommand::Edit { id, focus, wins, notes } => {
            let mut form = weekly.edit(&id)?;
            if let Some(focus) = focus {
                form.focus = focus;
            }
            if !wins.is_empty() {
                form.wins = wins.join("\n");
            }
            if let Some(notes) = notes {
                form.schedule_notes = notes;
            }
            let saved = weekly.save(&form)?;
            let _ = saved.ticket.settled().await;
            print_plan(&saved.plan);
        }
        WeeklyCommand::Delete { id, yes } => {
            weekly.request_delete(&id)?;
            if !yes && !confirm(&format!("Delete weekly plan {}?", id))? {
                weekly.cancel_delete();
                println!("Cancelled");
                return Ok(());
            }
            if let Some(plan) = deleted_plan(weekly.confirm_delete().await)? {
                debug!(plan_id = %plan.id, "cmd_weekly: plan deleted");
            }
        }
    }
    Ok(())
}

async fn cmd_goals(planner: &Planner, command: GoalsCommand) -> Result<()> {
    debug!(?command, "cmd_goals: called");
    let goals = planner.goals();
    match command {
        GoalsCommand::List => {
            for rating in goals.ratings() {
                println!("  {:20} {}/10", rating.goal_id, rating.score.to_string().bold());
            }
        }
        GoalsCommand::Set { id, score } => {
            let ticket = goals.set(&id, score)?;
            let _ = ticket.settled().await;
            println!("{} rated {}/10", id, score);
        }
    }
    Ok(())
}

fn cmd_dashboard(planner: &Planner, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_dashboard: called");
    let summary = planner.dashboard();
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let headline = format!("{}% complete", summary.progress_percent);
    if summary.is_complete {
        println!("{}", headline.green().bold());
    } else {
        println!("{}", headline.bold());
    }
    for bucket in &summary.buckets {
        println!("  {:12} {}", bucket.title, bucket.status());
    }

    println!();
    for step in &summary.steps {
        let status = match step.status {
            StepStatus::Captured => "Captured".green(),
            StepStatus::Pending => "Pending".dimmed(),
        };
        println!("  {}. {:28} {}", step.index + 1, step.title, status);
    }

    println!();
    match &summary.latest_weekly_plan {
        Some(plan) => {
            println!("{}", "Latest weekly plan".bold());
            print_plan(plan);
        }
        None => println!("{}", "No weekly plan yet".dimmed()),
    }

    if !summary.spotlight.is_empty() {
        println!("\n{}", "Goal spotlight".bold());
        for goal in &summary.spotlight {
            println!("  {} {}/10", goal.label.bold(), goal.score);
            println!("    {}", goal.summary);
        }
    }
    Ok(())
}

/// Remote failures are reported by the queue's notice and leave the plan in place
fn deleted_plan(result: Result<WeeklyPlan, WeeklyError>) -> Result<Option<WeeklyPlan>> {
    match result {
        Ok(plan) => Ok(Some(plan)),
        Err(WeeklyError::Remote(e)) => {
            debug!(error = %e, "deleted_plan: remote delete failed");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
