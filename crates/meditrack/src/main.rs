//! `meditrack` - CLI for the clinical practice journal
//!
//! This binary wires configuration, the SQLite store, and the session identity
//! into the journal views, one command per view operation.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::Local;
use clap::Parser;
use tokio::sync::mpsc;

use meditrack::cli::{
    render, Cli, Command, ConfigCommand, DashboardCommand, GoalsCommand, OutputFormat,
    PatientsCommand, ReflectionsCommand,
};
use meditrack::journal::{Confirm, Dashboard, GoalsView, Notice, NoticeLevel, PatientsView, ReflectionsView};
use meditrack::model::{
    FormRules, GoalForm, PatientConsultation, PatientForm, PatientPatch, ProfessionalGoal, RecordId,
    Reflection, ReflectionForm, UserIdentity,
};
use meditrack::store::{decode_all, Document};
use meditrack::{
    init_logging, Collection, Config, IdentityProvider, Page, RecordStore, SessionIdentityProvider,
    Shell, SqliteStore,
};

/// Everything a journal command needs.
struct Context {
    config: Config,
    store: Arc<dyn RecordStore>,
    user: UserIdentity,
    format: OutputFormat,
    quiet: bool,
}

/// Asks on the terminal unless `--yes` was given.
struct StdinConfirm {
    assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // These work on the file itself, so a broken config must not stop them
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", cli.config.clone().unwrap_or_else(Config::default_config_path).display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            let path = file
                .clone()
                .or_else(|| cli.config.clone())
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let provider: Arc<dyn IdentityProvider> = Arc::new(SessionIdentityProvider::from_config(&config));
    let quiet = cli.quiet;
    let format = cli.format;

    match cli.command {
        Command::Login => handle_login(provider.as_ref()),
        Command::Logout => {
            provider.sign_out();
            if provider.current_identity().is_some() {
                bail!("sign-out failed; see the log for details");
            }
            if !quiet {
                println!("Signed out.");
            }
            Ok(())
        }
        Command::Whoami => handle_whoami(provider, format),
        Command::Status(status_cmd) => handle_status(&config, provider.as_ref(), status_cmd.json),
        Command::Config(ConfigCommand::Show { json }) => handle_config_show(&config, json),
        Command::Config(_) => Ok(()),
        command => {
            let ctx = Context::open(config, provider.as_ref(), format, quiet)?;
            match command {
                Command::Open { page } => handle_open(&ctx, provider, page.into()).await,
                Command::Patients(cmd) => handle_patients(&ctx, cmd).await,
                Command::Goals(cmd) => handle_goals(&ctx, cmd).await,
                Command::Reflections(cmd) => handle_reflections(&ctx, cmd).await,
                Command::Dashboard(cmd) => handle_dashboard(&ctx, &cmd).await,
                Command::Watch { collection } => handle_watch(&ctx, collection.into()).await,
                _ => Ok(()),
            }
        }
    }
}

impl Context {
    fn open(
        config: Config,
        provider: &dyn IdentityProvider,
        format: OutputFormat,
        quiet: bool,
    ) -> anyhow::Result<Self> {
        let Some(user) = provider.current_identity() else {
            bail!("not signed in; run `meditrack login` first");
        };
        let store = SqliteStore::from_config(&config).context("failed to open the journal database")?;
        Ok(Self {
            config,
            store: Arc::new(store),
            user,
            format,
            quiet,
        })
    }

    fn notices(&self, notices: Vec<Notice>) {
        if self.quiet {
            return;
        }
        // Error notices repeat the returned error, which main reports
        for notice in notices.iter().filter(|n| n.level == NoticeLevel::Success) {
            println!("{}", render::notice(notice));
        }
    }
}

fn handle_login(provider: &dyn IdentityProvider) -> anyhow::Result<()> {
    provider.sign_in();
    let Some(user) = provider.current_identity() else {
        bail!("sign-in failed; see the log for details");
    };
    println!("Signed in as {}", meditrack::shell::badge(&user));
    Ok(())
}

fn handle_whoami(provider: Arc<dyn IdentityProvider>, format: OutputFormat) -> anyhow::Result<()> {
    let shell = Shell::new(provider);
    if format == OutputFormat::Json {
        println!("{}", render::json(&shell.identity()?)?);
    } else {
        println!("{}", shell.render_badge()?);
    }
    Ok(())
}

async fn handle_open(ctx: &Context, provider: Arc<dyn IdentityProvider>, page: Page) -> anyhow::Result<()> {
    let mut shell = Shell::new(provider);
    shell.select(page);
    println!("{}", shell.render()?);
    println!();

    match page {
        Page::Dashboard => {
            handle_dashboard(ctx, &DashboardCommand { json: false, days: None }).await
        }
        Page::Patients => handle_patients(ctx, PatientsCommand::List { search: None }).await,
        Page::Reflections => handle_reflections(ctx, ReflectionsCommand::List).await,
        Page::Goals => {
            handle_goals(
                ctx,
                GoalsCommand::List {
                    pending: false,
                    completed: false,
                },
            )
            .await
        }
    }
}

async fn handle_patients(ctx: &Context, cmd: PatientsCommand) -> anyhow::Result<()> {
    let rules = FormRules::from_config(&ctx.config)?;
    let mut view = PatientsView::new(Arc::clone(&ctx.store), ctx.user.clone(), rules);

    match cmd {
        PatientsCommand::List { search } => {
            view.load().await?;
            if let Some(term) = search {
                view.set_search(term);
            }
            println!("{}", render::patients(&view.visible(), ctx.format)?);
        }
        PatientsCommand::Show { id } => {
            let patient = view.get(&RecordId::from(id)).await?;
            println!("{}", render::patient(&patient, ctx.format)?);
        }
        PatientsCommand::Add(args) => {
            let created = view
                .create(&PatientForm::from(args), Local::now().naive_local())
                .await?;
            ctx.notices(view.take_notices());
            println!("{}", created.id);
        }
        PatientsCommand::Edit { id, changes } => {
            view.update(&RecordId::from(id), &PatientPatch::from(changes))
                .await?;
        }
        PatientsCommand::Delete { id, yes } => {
            view.load().await?;
            let deleted = view
                .delete(&RecordId::from(id), &StdinConfirm { assume_yes: yes })
                .await?;
            if !deleted && !ctx.quiet {
                println!("Cancelled.");
            }
        }
    }

    ctx.notices(view.take_notices());
    Ok(())
}

async fn handle_goals(ctx: &Context, cmd: GoalsCommand) -> anyhow::Result<()> {
    let mut view = GoalsView::new(Arc::clone(&ctx.store), ctx.user.clone());

    match cmd {
        GoalsCommand::List { pending, completed } => {
            view.load().await?;
            let goals: Vec<&ProfessionalGoal> = if pending {
                view.pending().collect()
            } else if completed {
                view.completed().collect()
            } else {
                view.items().iter().collect()
            };
            println!("{}", render::goals(&goals, ctx.format)?);
        }
        GoalsCommand::Add { goal, target_date } => {
            let created = view.create(&GoalForm { goal, target_date }).await?;
            ctx.notices(view.take_notices());
            println!("{}", created.id);
        }
        GoalsCommand::Toggle { id } => {
            let status = view.toggle(&RecordId::from(id)).await?;
            if !ctx.quiet {
                println!("Now {status}.");
            }
        }
        GoalsCommand::Delete { id, yes } => {
            view.load().await?;
            let deleted = view
                .delete(&RecordId::from(id), &StdinConfirm { assume_yes: yes })
                .await?;
            if !deleted && !ctx.quiet {
                println!("Cancelled.");
            }
        }
    }

    ctx.notices(view.take_notices());
    Ok(())
}

async fn handle_reflections(ctx: &Context, cmd: ReflectionsCommand) -> anyhow::Result<()> {
    let mut view = ReflectionsView::new(Arc::clone(&ctx.store), ctx.user.clone());

    match cmd {
        ReflectionsCommand::List => {
            view.load().await?;
            println!("{}", render::reflections(view.items(), ctx.format)?);
        }
        ReflectionsCommand::Add(args) => {
            let created = view
                .create(&ReflectionForm::from(args), Local::now().date_naive())
                .await?;
            ctx.notices(view.take_notices());
            println!("{}", created.id);
        }
        ReflectionsCommand::Delete { id, yes } => {
            view.load().await?;
            let deleted = view
                .delete(&RecordId::from(id), &StdinConfirm { assume_yes: yes })
                .await?;
            if !deleted && !ctx.quiet {
                println!("Cancelled.");
            }
        }
    }

    ctx.notices(view.take_notices());
    Ok(())
}

async fn handle_dashboard(ctx: &Context, cmd: &DashboardCommand) -> anyhow::Result<()> {
    let days = cmd.days.unwrap_or(ctx.config.journal.histogram_days);
    if days == 0 {
        bail!("--days must be at least 1");
    }

    let mut dashboard = Dashboard::new(Arc::clone(&ctx.store), ctx.user.clone(), days);
    let stats = dashboard.load(Local::now().date_naive()).await?;
    if cmd.json || ctx.format == OutputFormat::Json {
        println!("{}", render::json(stats)?);
    } else {
        print!("{}", render::dashboard(stats));
    }
    Ok(())
}

async fn handle_watch(ctx: &Context, collection: Collection) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Document>>();
    let subscription = ctx
        .store
        .subscribe(
            collection,
            ctx.user.owner(),
            Box::new(move |documents| {
                let _ = tx.send(documents);
            }),
        )
        .await?;

    if !ctx.quiet {
        eprintln!("Watching {collection}; press Ctrl-C to stop.");
    }

    loop {
        tokio::select! {
            Some(documents) = rx.recv() => {
                println!("--- {} ({} records) ---", Local::now().format("%H:%M:%S"), documents.len());
                println!("{}", render_snapshot(collection, documents, ctx.format)?);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn render_snapshot(
    collection: Collection,
    documents: Vec<Document>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let rendered = match collection {
        Collection::Patients => {
            let patients: Vec<PatientConsultation> = decode_all(documents);
            render::patients(&patients.iter().collect::<Vec<_>>(), format)?
        }
        Collection::ProfessionalGoals => {
            let goals: Vec<ProfessionalGoal> = decode_all(documents);
            render::goals(&goals.iter().collect::<Vec<_>>(), format)?
        }
        Collection::Reflections => {
            let reflections: Vec<Reflection> = decode_all(documents);
            render::reflections(&reflections, format)?
        }
    };
    Ok(rendered)
}

fn handle_status(config: &Config, provider: &dyn IdentityProvider, json: bool) -> anyhow::Result<()> {
    let store = SqliteStore::from_config(config).context("failed to open the journal database")?;
    let stats = store.stats()?;
    let user = provider.current_identity();

    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "read_only": store.is_read_only(),
            "schema_version": stats.schema_version,
            "db_size_bytes": stats.db_size_bytes,
            "patients": stats.patients,
            "goals": stats.goals,
            "reflections": stats.reflections,
            "signed_in": user.as_ref().map(|u| u.id.as_str()),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("meditrack status");
        println!("----------------");
        println!("Database:      {}", store.path().display());
        println!("Read-only:     {}", store.is_read_only());
        println!("Schema:        v{}", stats.schema_version);
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Consultations: {}", stats.patients);
        println!("Goals:         {}", stats.goals);
        println!("Reflections:   {}", stats.reflections);
        match user {
            Some(user) => println!("Signed in:     {}", meditrack::shell::badge(&user)),
            None => println!("Signed in:     no"),
        }
    }
    Ok(())
}

fn handle_config_show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Storage]");
    println!("  Database path:      {}", config.database_path().display());
    println!("  Read-only:          {}", config.storage.read_only);
    println!();
    println!("[Identity]");
    println!(
        "  Id:                 {}",
        config.identity.id.as_deref().unwrap_or("(generated at sign-in)")
    );
    println!(
        "  Display name:       {}",
        config.identity.display_name.as_deref().unwrap_or("-")
    );
    println!("  Email:              {}", config.identity.email.as_deref().unwrap_or("-"));
    println!("  Session file:       {}", config.session_path().display());
    println!();
    println!("[Journal]");
    println!("  Default category:   {}", config.journal.default_category);
    println!(
        "  Default duration:   {} min",
        config.journal.default_duration_minutes
    );
    println!("  Histogram days:     {}", config.journal.histogram_days);
    println!();
    println!("[Privacy]");
    println!("  Identifier checks:  {}", config.privacy.check_identifiers);
    println!(
        "  Identifier patterns: {}",
        config.privacy.identifier_patterns.len()
    );
    Ok(())
}
