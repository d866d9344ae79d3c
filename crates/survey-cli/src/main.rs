mod host;
mod local;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use host::{
    PromptContext, RenderMode, TakePresenter, Verbosity, parse_answer, parse_answers_file,
};
use local::{DryRunSink, FileSource, enqueue, read_queue, write_queue};
use survey_client::{
    CancellationToken, CannedSurvey, ClientConfig, MemoryQueue, ResponseService, ResponseSink,
    Submission, SurveyService, SurveySource,
};
use survey_session::{NextOutcome, QuestionView, SessionError, SurveySession};
use survey_spec::{
    AnswerReport, AnswerValue, ResponseData, ResponseProperties, Survey, VisibilityMode,
    validate_answers,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based survey host",
    long_about = "Takes surveys in a text shell and fetches, validates and syncs survey responses"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a survey page by page in the terminal.
    Take(TakeArgs),
    /// Fetch a survey definition and print it as normalized JSON.
    Fetch {
        #[command(flatten)]
        target: SurveyTarget,
        #[command(flatten)]
        api: ApiArgs,
        /// Serve the bundled product feedback survey when the API is unreachable.
        #[arg(long)]
        fallback: bool,
    },
    /// List the surveys of an organization.
    List {
        /// Organization id.
        #[arg(long, env = "SURVEY_ORG_ID")]
        org: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Validate an answers file against a survey definition.
    Validate {
        /// Path to the survey JSON.
        #[arg(long, value_name = "SURVEY")]
        survey_file: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Deliver responses saved to an offline queue file.
    Sync {
        /// Offline queue file written by `take --queue`.
        #[arg(long, value_name = "QUEUE")]
        queue: PathBuf,
        /// Drop delivered entries from the queue file.
        #[arg(long)]
        prune: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Print the JSON schema of the survey model.
    Schema,
}

#[derive(Args)]
struct SurveyTarget {
    /// Organization id.
    #[arg(long, env = "SURVEY_ORG_ID")]
    org: String,
    /// Survey id.
    #[arg(long = "survey", env = "SURVEY_ID", value_name = "ID")]
    survey_id: String,
}

#[derive(Args)]
struct ApiArgs {
    /// JSON file with client settings (defaults to SURVEY_* environment variables).
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Base URL of the survey API.
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
    /// API key sent as `x-api-key`.
    #[arg(long)]
    api_key: Option<String>,
    /// Bearer token sent as `Authorization`.
    #[arg(long)]
    token: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Maximum submission attempts.
    #[arg(long)]
    retries: Option<u32>,
    /// Base delay between submission attempts in milliseconds.
    #[arg(long, value_name = "MS")]
    retry_delay_ms: Option<u64>,
}

impl ApiArgs {
    fn resolve(&self) -> CliResult<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_str(&fs::read_to_string(path)?)?,
            None => ClientConfig::from_env()?,
        };
        if let Some(api_url) = &self.api_url {
            config.base_url = api_url.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(retries) = self.retries {
            config.retry_count = retries;
        }
        if let Some(retry_delay_ms) = self.retry_delay_ms {
            config.retry_delay_ms = retry_delay_ms;
        }
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "client config");
        Ok(config)
    }
}

#[derive(Args)]
struct TakeArgs {
    #[command(flatten)]
    target: SurveyTarget,
    /// Read the survey from a local JSON file instead of the API.
    #[arg(long, value_name = "SURVEY")]
    survey_file: Option<PathBuf>,
    /// Optional JSON file containing initial answers.
    #[arg(long, value_name = "ANSWERS")]
    answers: Option<PathBuf>,
    /// Print the submission instead of sending it.
    #[arg(long)]
    dry_run: bool,
    /// Save the response to this offline queue file when submission fails.
    #[arg(long, value_name = "QUEUE")]
    queue: Option<PathBuf>,
    /// Treat questions and pages with a `visibleIf` condition as hidden.
    #[arg(long)]
    hide_conditional: bool,
    /// Serve the bundled product feedback survey when the API is unreachable.
    #[arg(long)]
    fallback: bool,
    /// Respondent email attached to the response.
    #[arg(long)]
    email: Option<String>,
    /// Respondent user id attached to the response.
    #[arg(long)]
    user_id: Option<String>,
    /// Show the full page rendering before prompting.
    #[arg(long, alias = "debug")]
    verbose: bool,
    /// Also print the submitted answers as JSON.
    #[arg(long)]
    answers_json: bool,
    /// Render output mode for each page.
    #[arg(long, value_enum, default_value_t = RenderMode::Text)]
    format: RenderMode,
    #[command(flatten)]
    api: ApiArgs,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Take(args) => run_take(args).await,
        Command::Fetch {
            target,
            api,
            fallback,
        } => run_fetch(target, api, fallback).await,
        Command::List { org, api } => run_list(org, api).await,
        Command::Validate {
            survey_file,
            answers,
        } => run_validate(survey_file, answers),
        Command::Sync { queue, prune, api } => run_sync(queue, prune, api).await,
        Command::Schema => run_schema(),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn survey_service(config: &ClientConfig, fallback: bool) -> CliResult<SurveyService> {
    let service = SurveyService::from_config(config);
    if fallback {
        Ok(service.with_fallback(Arc::new(CannedSurvey::product_feedback()?)))
    } else {
        Ok(service)
    }
}

async fn run_take(args: TakeArgs) -> CliResult<()> {
    let source: Arc<dyn SurveySource> = match &args.survey_file {
        Some(path) => Arc::new(FileSource::load(path)?),
        None => Arc::new(survey_service(&args.api.resolve()?, args.fallback)?),
    };
    let sink: Arc<dyn ResponseSink> = if args.dry_run {
        Arc::new(DryRunSink)
    } else {
        Arc::new(ResponseService::from_config(&args.api.resolve()?))
    };
    let initial = match &args.answers {
        Some(path) => parse_answers_file(&fs::read_to_string(path)?)?,
        None => ResponseData::new(),
    };
    let properties = respondent_properties(&args);
    let visibility = if args.hide_conditional {
        VisibilityMode::Hidden
    } else {
        VisibilityMode::Visible
    };

    let mut session = SurveySession::new(
        args.target.org.clone(),
        args.target.survey_id.clone(),
        source,
        sink,
    )
    .with_initial_responses(initial)
    .with_visibility(visibility);
    if let Some(properties) = properties.clone() {
        session = session.with_properties(properties);
    }

    session.start().await?;
    let mut presenter = TakePresenter::new(
        Verbosity::from_verbose(args.verbose),
        args.format,
        args.answers_json,
    );

    loop {
        let view = session.page_view();
        presenter.show_page(&view);

        let mut go_back = false;
        let total = view.questions.len();
        for (position, question) in view.questions.iter().enumerate() {
            let prompt = PromptContext::new(question, position + 1, total);
            match prompt_question(&prompt, question, &presenter)? {
                PromptInput::Answer(value) => session.set_response(&question.name, value),
                PromptInput::Keep => {}
                PromptInput::Back => {
                    go_back = true;
                    break;
                }
            }
        }
        if go_back {
            session.previous_page()?;
            continue;
        }

        match session.next_page().await {
            Ok(NextOutcome::Advanced) => {}
            Ok(NextOutcome::Submitted(result)) => {
                presenter.show_completion(&session.page_view(), &result, session.responses());
                return Ok(());
            }
            Err(SessionError::Validation { errors }) => presenter.show_validation(&errors),
            Err(SessionError::Submission(message)) => {
                let Some(queue) = &args.queue else {
                    return Err(format!("submission failed: {message}").into());
                };
                let mut submission = Submission::new(
                    args.target.survey_id.clone(),
                    args.target.org.clone(),
                    session.responses().clone(),
                );
                if let Some(properties) = properties {
                    submission = submission.with_properties(properties);
                }
                let entry = enqueue(queue, &submission)?;
                warn!(error = %message, entry = %entry.id, "submission failed, response queued");
                println!(
                    "Submission failed ({message}); saved response {} to {}",
                    entry.id,
                    queue.display()
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn respondent_properties(args: &TakeArgs) -> Option<ResponseProperties> {
    if args.email.is_none() && args.user_id.is_none() {
        return None;
    }
    Some(ResponseProperties {
        email: args.email.clone(),
        user_id: args.user_id.clone(),
        ..ResponseProperties::default()
    })
}

enum PromptInput {
    Answer(AnswerValue),
    Keep,
    Back,
}

fn prompt_question(
    prompt: &PromptContext,
    question: &QuestionView,
    presenter: &TakePresenter,
) -> CliResult<PromptInput> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("survey aborted: input closed".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("survey aborted by user".into());
        }
        if trimmed.eq_ignore_ascii_case("back") {
            return Ok(PromptInput::Back);
        }

        match parse_answer(question, trimmed) {
            Ok(Some(value)) => return Ok(PromptInput::Answer(value)),
            Ok(None) => return Ok(PromptInput::Keep),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

async fn run_fetch(target: SurveyTarget, api: ApiArgs, fallback: bool) -> CliResult<()> {
    let service = survey_service(&api.resolve()?, fallback)?;
    let survey = service
        .fetch_survey(&target.org, &target.survey_id, &CancellationToken::new())
        .await?;
    println!("{}", serde_json::to_string_pretty(&survey)?);
    Ok(())
}

async fn run_list(org: String, api: ApiArgs) -> CliResult<()> {
    let service = SurveyService::from_config(&api.resolve()?);
    let surveys = service.fetch_surveys(&org, &CancellationToken::new()).await?;
    if surveys.is_empty() {
        println!("No surveys found for organization {org}.");
    }
    for survey in &surveys {
        println!(
            "{}\t{}\t{}",
            survey.id,
            survey.status.as_str(),
            survey.display_title()
        );
    }
    Ok(())
}

fn run_validate(survey_path: PathBuf, answers_path: PathBuf) -> CliResult<()> {
    let survey = load_survey(&survey_path)?;
    let answers = parse_answers_file(&fs::read_to_string(answers_path)?)?;

    let report = validate_answers(&survey.definition, &answers);
    println!(
        "Validation result: {}",
        if report.valid { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn load_survey(path: &Path) -> CliResult<Survey> {
    let source = FileSource::load(path)?;
    Ok(source.survey("", "")?)
}

fn describe_validation(report: &AnswerReport) {
    if !report.errors.is_empty() {
        println!("Errors:");
        for issue in &report.errors {
            println!("  {} - {} ({})", issue.question, issue.message, issue.code);
        }
    }
    if !report.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            report.missing_required.join(", ")
        );
    }
    if !report.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            report.unknown_fields.join(", ")
        );
    }
}

async fn run_sync(queue_path: PathBuf, prune: bool, api: ApiArgs) -> CliResult<()> {
    let queue = MemoryQueue::from_entries(read_queue(&queue_path)?);
    let service = ResponseService::from_config(&api.resolve()?);
    let report = service.sync_queue(&queue, &CancellationToken::new()).await;
    if prune {
        queue.remove_synced();
    }
    write_queue(&queue_path, &queue.entries())?;

    println!("Synced: {}, failed: {}", report.successful, report.failed);
    for result in report.results.iter().filter(|result| !result.success) {
        println!(
            "  error: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if report.failed > 0 {
        Err(format!("{} response(s) failed to sync", report.failed).into())
    } else {
        Ok(())
    }
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(Survey);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
