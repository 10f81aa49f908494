use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tracing::Level;

use glucoview::api::{self, AuthApi, Credentials, GlucoseApi};
use glucoview::chart::{point_time_label, resolve_timezone};
use glucoview::config::{AppConfig, CONFIG_KEYS};
use glucoview::error::{FetchError, GlucoseError};
use glucoview::fallback::{DayOutcome, DaySource, FallbackOutcome};
use glucoview::logging::{init_logging, LogFormat};
use glucoview::models::{DaySeries, RollingWindow, WindowSelector};
use glucoview::navigation::parse_custom_date;
use glucoview::pipeline::{ChartView, GlucosePipeline};
use glucoview::session::{GlucoseSession, GlucoseState, SessionStore};
use glucoview::GlucoseBand;

/// Glucoview - Glucose Chart CLI
///
/// Fetches a day of glucose readings from the habits API, falling back to
/// earlier days when the requested one is empty, and renders the chart
/// points, statistics and time axis in the terminal.
#[derive(Parser)]
#[command(name = "glucoview")]
#[command(version)]
#[command(about = "Glucose time-series chart CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Also write JSON logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the bearer token and user id
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Fetch and render the glucose chart
    Chart {
        /// Rolling window in hours (6, 12, 24) or "custom"
        #[arg(short, long)]
        window: Option<String>,

        /// Day to chart (YYYY-MM-DD); implies a custom window
        #[arg(short, long)]
        date: Option<String>,

        /// Bearer token from a previous login
        #[arg(long, env = "GLUCOVIEW_TOKEN", hide_env_values = true)]
        token: Option<String>,

        #[arg(long, env = "GLUCOVIEW_USER_ID")]
        user_id: Option<String>,

        /// Highlight the point at this index
        #[arg(short, long)]
        selected: Option<usize>,

        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Configure application settings
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Set a configuration value (KEY=VALUE)
        #[arg(short, long)]
        set: Option<String>,

        /// Get a configuration value
        #[arg(short, long)]
        get: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<GlucoseError>() {
            Some(err) => {
                let level = err.severity().to_tracing_level();
                if level == Level::ERROR {
                    tracing::error!(error = %err);
                } else if level == Level::WARN {
                    tracing::warn!(error = %err);
                } else {
                    tracing::info!(error = %err);
                }
                eprintln!("{} {}", "✗".red().bold(), err.user_message().red());
            }
            None => eprintln!("{} {:#}", "✗".red().bold(), e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let mut config = AppConfig::load_or_default(Some(&config_path));

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    if let Some(file) = cli.log_file {
        log_config.file_path = Some(file);
    }
    init_logging(&log_config)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {}", log_config.level.as_str()).dimmed());
    }

    match cli.command {
        Commands::Login { email, password } => login(&config, &email, &password).await,

        Commands::Chart {
            window,
            date,
            token,
            user_id,
            selected,
            format,
        } => {
            let credentials = Credentials::from_parts(token, user_id.or_else(|| config.api.user_id.clone()))?;
            let request = ChartRequest::resolve(&config, window.as_deref(), date.as_deref())?;
            chart(&config, credentials, request, selected, format, cli.verbose > 0).await
        }

        Commands::Config { list, set, get } => {
            if list {
                println!("{}", format!("Configuration ({})", config_path.display()).bold());
                for key in CONFIG_KEYS {
                    println!("  {} = {}", key.cyan(), config.get_value(key)?);
                }
            } else if let Some(key_value) = set {
                let (key, value) = key_value
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", key_value))?;
                config.set_value(key.trim(), value)?;
                config
                    .save_to_file(&config_path)
                    .with_context(|| "Failed to save configuration")?;
                println!("{} {} = {}", "✓".green(), key.trim(), config.get_value(key.trim())?);
            } else if let Some(key) = get {
                println!("{}", config.get_value(&key)?);
            } else {
                bail!("Use --list, --get KEY or --set KEY=VALUE");
            }
            Ok(())
        }
    }
}

async fn login(config: &AppConfig, email: &str, password: &str) -> Result<()> {
    let client = api::build_client(&config.api)?;
    let auth = AuthApi::new(client, &config.api.base_url);

    let session = auth.login(email, password).await.map_err(GlucoseError::from)?;

    println!("{}", "✓ Logged in".green().bold());
    println!("  User:    {} <{}>", session.user.user, session.user.email);
    println!("  User id: {}", session.user.id);
    println!("  Token:   {}", session.token);
    println!(
        "{}",
        "Export GLUCOVIEW_TOKEN and GLUCOVIEW_USER_ID to use them with `glucoview chart`.".dimmed()
    );
    Ok(())
}

/// Window plus the day the lookback starts from
struct ChartRequest {
    window: WindowSelector,
    start: NaiveDate,
}

impl ChartRequest {
    fn resolve(config: &AppConfig, window: Option<&str>, date: Option<&str>) -> Result<Self> {
        let tz = resolve_timezone(&config.display.default_timezone);
        let today = Utc::now().with_timezone(&tz).date_naive();

        let custom_date = date.map(|d| parse_custom_date(d, today)).transpose()?;

        let window = match (window.map(str::trim), custom_date) {
            (Some(w), date) if w.eq_ignore_ascii_case("custom") || w.eq_ignore_ascii_case("otro") => {
                WindowSelector::Custom(date.unwrap_or(today))
            }
            (Some(w), None) => WindowSelector::Rolling(w.parse::<RollingWindow>().map_err(|e| anyhow!(e))?),
            (Some(_), Some(_)) => bail!("--date can only be combined with --window custom"),
            (None, Some(date)) => WindowSelector::Custom(date),
            (None, None) => WindowSelector::Rolling(config.default_window()?),
        };

        // Rolling windows always search from today
        let start = match window {
            WindowSelector::Custom(date) => date,
            WindowSelector::Rolling(_) => today,
        };

        Ok(ChartRequest { window, start })
    }
}

/// Reports each requested day on a spinner
struct SpinnerSource<S> {
    inner: S,
    spinner: ProgressBar,
}

impl<S: DaySource> DaySource for SpinnerSource<S> {
    async fn fetch_day(&self, date: NaiveDate) -> std::result::Result<DaySeries, FetchError> {
        self.spinner.set_message(format!("Fetching glucose data for {}", date));
        self.inner.fetch_day(date).await
    }
}

async fn chart(
    config: &AppConfig,
    credentials: Credentials,
    request: ChartRequest,
    selected: Option<usize>,
    format: OutputFormat,
    show_attempts: bool,
) -> Result<()> {
    let client = api::build_client(&config.api)?;
    let gateway = GlucoseApi::new(client, &config.api.base_url, credentials)
        .with_redaction(config.logging.filter_sensitive);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|e| anyhow!("Invalid progress template: {}", e))?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let store = SessionStore::new(GlucoseState::new(request.start));
    let session = GlucoseSession::new(
        SpinnerSource {
            inner: gateway,
            spinner: spinner.clone(),
        },
        store,
        config.fallback_search(),
    );

    let outcome = match request.window {
        WindowSelector::Custom(date) => session.load_with_fallback(date).await,
        WindowSelector::Rolling(rolling) => session.load_for_window(rolling, request.start).await,
    };
    spinner.finish_and_clear();
    let outcome = outcome?;

    if show_attempts {
        print_attempts(&outcome);
    }

    outcome.into_result()?;

    let mut state = GlucoseState::clone(&session.store().snapshot());
    if state.series.timezone.trim().is_empty() {
        state.timezone = config.display.default_timezone.clone();
    }
    let pipeline = GlucosePipeline::new(config.series_filter(), config.downsampler());
    let view = pipeline.render(&state, Utc::now(), selected);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Table => print_view(&view),
    }
    Ok(())
}

fn print_attempts(outcome: &FallbackOutcome) {
    for attempt in outcome.attempts() {
        let line = match &attempt.outcome {
            DayOutcome::Data { readings } => format!("  {} {} readings", attempt.date, readings).green(),
            DayOutcome::Empty => format!("  {} no data", attempt.date).dimmed(),
            DayOutcome::Failed { message } => format!("  {} {}", attempt.date, message).yellow(),
        };
        eprintln!("{}", line);
    }
}

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "mg/dL")]
    value: String,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Key")]
    important: String,
}

fn paint(text: &str, band: GlucoseBand) -> ColoredString {
    match band {
        GlucoseBand::Low => text.red(),
        GlucoseBand::Normal => text.cyan(),
        GlucoseBand::High => text.yellow(),
    }
}

fn print_view(view: &ChartView) {
    let tz = resolve_timezone(&view.timezone);

    println!(
        "{}",
        format!("Glucose {} ({})", view.date, view.window).bold()
    );
    println!(
        "  Source: {}   Timezone: {}",
        if view.glucose_source.is_empty() { "-" } else { view.glucose_source.as_str() },
        view.timezone
    );
    println!(
        "  Min {}  Max {}  Promedio {} {}  Picos {}  Bajos {}",
        view.stats.min,
        view.stats.max,
        paint(&view.stats.average.to_string(), view.trend.band).bold(),
        paint(view.trend.symbol, view.trend.band),
        view.stats.spike_count,
        view.stats.low_count,
    );

    if view.is_empty() {
        println!("{}", "No readings inside the selected window.".yellow());
        return;
    }

    let rows: Vec<PointRow> = view
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| PointRow {
            index,
            time: point_time_label(point, tz).unwrap_or_else(|| point.date.clone()),
            value: if point.show_strip {
                format!("{} ◀", point.text)
            } else {
                point.text.clone()
            },
            band: point.band.label().to_string(),
            important: if point.important { "✓".to_string() } else { String::new() },
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!(
        "{}",
        format!(
            "  {} of {} readings shown · axis {}–{} mg/dL",
            view.points.len(),
            view.readings_in_window,
            view.y_min,
            view.y_max
        )
        .dimmed()
    );
    println!("{}", format!("  {}", view.labels.join(" ")).dimmed());
}
