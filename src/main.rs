use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;
use restpoll::durable::{DEFAULT_CONNECTION, DEFAULT_TASK_HUB, DurableFunction, FunctionApp};
use restpoll::http::{
    ContentType, Method, Outcome, Payload, Request, RequestConfig, ReqwestTransport,
};
use restpoll::listener::{Listener, LogListener, NoopListener};
use restpoll::response::{Body, Response};
use restpoll::retry::{RetryError, RetryPolicy, RetryableRequest};
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// restpoll - REST client with timed retries and durable function polling
///
/// Prints the body of the final response: text as-is, JSON pretty-printed,
/// binary content as a byte count. Exits non-zero when the request fails.
///
/// Examples:
///   restpoll send https://api.example.com/items -q page=2
///   restpoll retry https://api.example.com/health --max-attempts 10
///   restpoll durable --function orchestrators --endpoint Sequence
#[derive(Parser, Debug)]
#[command(author, version = env!("RESTPOLL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Per-attempt timeout in seconds (0 disables it)
    #[arg(
        long,
        env = "RESTPOLL_TIMEOUT",
        value_name = "SECS",
        default_value_t = 0,
        global = true
    )]
    timeout: u64,

    /// Only decode bodies whose Content-Type says JSON or XML
    #[arg(long, global = true)]
    no_auto_detect: bool,

    /// Log request and response summaries at info level
    #[arg(long, global = true)]
    logging: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send one request
    Send(SendArgs),

    /// Send a request and retry it until it succeeds
    Retry(RetryArgs),

    /// Start a durable function and poll it until it completes
    Durable(DurableArgs),
}

#[derive(clap::Args, Debug)]
struct SendArgs {
    /// Absolute URL of the request
    #[arg(value_name = "URL")]
    url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(clap::Args, Debug)]
struct RetryArgs {
    #[command(flatten)]
    send: SendArgs,

    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(clap::Args, Debug)]
struct DurableArgs {
    /// Function app account; localhost selects the local runtime
    #[arg(long, env = "RESTPOLL_ACCOUNT", default_value = "localhost")]
    account: String,

    /// Route prefix of the function app
    #[arg(long, default_value = "api")]
    route_prefix: String,

    /// Function name
    #[arg(long, default_value = "hello")]
    function: String,

    /// Function key sent in the `code` header
    #[arg(long, env = "RESTPOLL_FUNCTION_CODE", hide_env_values = true)]
    code: Option<String>,

    /// Durable task hub
    #[arg(long, default_value = DEFAULT_TASK_HUB)]
    task_hub: String,

    /// Storage connection name
    #[arg(long, default_value = DEFAULT_CONNECTION)]
    connection: String,

    /// Path appended to the function API, or an absolute URL
    #[arg(long, default_value = "")]
    endpoint: String,

    /// Host replacing the one resolved from the account
    #[arg(long, value_name = "URL")]
    host: Option<String>,

    #[command(flatten)]
    request: RequestArgs,

    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Query parameter (repeatable)
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE", value_parser = parse_query)]
    query: Vec<(String, String)>,

    /// Request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "KEY:VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Upload text
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Upload the contents of a file
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Content type of the upload: raw, text, json, xml, html or a MIME type
    #[arg(long, default_value = "json")]
    content_type: ContentType,
}

#[derive(clap::Args, Debug)]
struct PolicyArgs {
    /// Delay after the timeout before retrying
    #[arg(long, value_name = "SECS", default_value_t = 0.5)]
    retry_after: f64,

    /// Give up after this many attempts
    #[arg(long, value_name = "N")]
    max_attempts: Option<NonZeroU32>,

    /// Period of the retry clock
    #[arg(long, value_name = "MS", default_value_t = 100)]
    tick_ms: u64,
}

impl PolicyArgs {
    fn policy(&self) -> Result<RetryPolicy> {
        let retry_after = Duration::try_from_secs_f64(self.retry_after)
            .with_context(|| format!("Invalid --retry-after value: {}", self.retry_after))?;
        Ok(RetryPolicy {
            retry_after,
            max_attempts: self.max_attempts,
            tick: Duration::from_millis(self.tick_ms),
            ..RetryPolicy::default()
        })
    }
}

fn parse_query(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected KEY:VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty header name in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl Cli {
    fn config(&self, method: Method, endpoint: &str, args: &RequestArgs) -> RequestConfig {
        let mut config = RequestConfig::new(method, endpoint);
        config.timeout = self.timeout;
        config.auto_detect = !self.no_auto_detect;
        config.logging = self.logging;
        config.content_type = args.content_type;
        config.body = args.data.clone().unwrap_or_default();
        for (key, value) in &args.query {
            config.params.set(key.clone(), value.clone());
        }
        for (key, value) in &args.headers {
            config.headers.set(key.clone(), value.clone());
        }
        config
    }

    /// Per-attempt listener lines are only wanted with `--logging`.
    fn listener<E: 'static, S: 'static>(&self) -> Arc<dyn Listener<E, S>> {
        if self.logging {
            Arc::new(LogListener)
        } else {
            Arc::new(NoopListener)
        }
    }

    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn payload(args: &RequestArgs) -> Payload {
    args.file.clone().map(Payload::File).unwrap_or_default()
}

fn print_body<T: Serialize>(body: &Body<T>) -> Result<()> {
    match body {
        Body::Empty => {}
        Body::Text(text) => println!("{}", text),
        Body::Typed(value) => println!("{}", serde_json::to_string_pretty(value)?),
        Body::Binary(bytes) => println!("<{} bytes of binary data>", bytes.len()),
    }
    Ok(())
}

fn print_failure<E: Serialize>(response: &Response<E>) -> Result<()> {
    print_body(&response.body)?;
    if response.is_error {
        bail!("Request to {} failed: no response received", response.url);
    }
    bail!(
        "Request to {} failed with status {}",
        response.url,
        response.status_code
    )
}

fn finish<S: Serialize>(result: Result<Response<S>, RetryError<Value>>) -> Result<()> {
    match result {
        Ok(response) => print_body(&response.body),
        Err(RetryError::Exhausted {
            attempts,
            last_error,
        }) => {
            if let Some(response) = &last_error {
                print_body(&response.body)?;
            }
            bail!("Request did not succeed after {} attempts", attempts)
        }
        Err(e) => Err(e.into()),
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            token.cancel();
        }
    });
}

async fn send(cli: &Cli, args: &SendArgs) -> Result<()> {
    let request = Request::new(
        cli.config(args.method, &args.url, &args.request),
        ReqwestTransport::default(),
    );
    match request
        .send::<Value, Value>(&payload(&args.request))
        .await?
    {
        Outcome::Success(response) => print_body(&response.body),
        Outcome::Error(response) => print_failure(&response),
    }
}

async fn retry(cli: &Cli, args: &RetryArgs) -> Result<()> {
    let request = Request::new(
        cli.config(args.send.method, &args.send.url, &args.send.request),
        ReqwestTransport::default(),
    );
    let mut retryable: RetryableRequest<Value, Value> =
        RetryableRequest::new(request, args.policy.policy()?)
            .with_listener(cli.listener());
    cancel_on_ctrl_c(retryable.cancel_token());

    finish(retryable.send(payload(&args.send.request)).await)
}

async fn durable(cli: &Cli, args: &DurableArgs) -> Result<()> {
    let mut app = FunctionApp::new(&args.account, &args.function)
        .with_route_prefix(&args.route_prefix);
    if let Some(code) = &args.code {
        app.set_code(code);
    }
    if let Some(host) = &args.host {
        app = app.with_host(host);
    }

    let request = Request::new(
        cli.config(Method::Post, &args.endpoint, &args.request),
        ReqwestTransport::default(),
    );
    let mut function: DurableFunction<Value, Value> =
        DurableFunction::new(request, app, args.policy.policy()?)
            .with_task_hub(&args.task_hub)
            .with_connection(&args.connection)
            .with_listener(cli.listener());
    cancel_on_ctrl_c(function.cancel_token());

    finish(function.send(payload(&args.request)).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match &cli.command {
        Commands::Send(args) => send(&cli, args).await,
        Commands::Retry(args) => retry(&cli, args).await,
        Commands::Durable(args) => durable(&cli, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_send_parsing() {
        let cli = Cli::try_parse_from([
            "restpoll",
            "send",
            "http://example.com/items",
            "-X",
            "post",
            "-q",
            "page=2",
            "-H",
            "Accept: text/plain",
            "-d",
            "hello",
        ])
        .unwrap();
        match &cli.command {
            Commands::Send(args) => {
                assert_eq!(args.url, "http://example.com/items");
                assert_eq!(args.method, Method::Post);

                let config = cli.config(args.method, &args.url, &args.request);
                assert_eq!(config.params.get("page"), Some("2"));
                assert_eq!(config.headers.get("Accept"), Some("text/plain"));
                assert_eq!(config.body, "hello");
                assert_eq!(config.content_type, ContentType::Json);
                assert!(config.auto_detect);
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "restpoll",
            "--timeout",
            "3",
            "--no-auto-detect",
            "-vv",
            "send",
            "http://example.com",
        ])
        .unwrap();
        assert_eq!(cli.timeout, 3);
        assert!(cli.no_auto_detect);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn test_cli_retry_policy() {
        let cli = Cli::try_parse_from([
            "restpoll",
            "retry",
            "http://example.com",
            "--retry-after",
            "1.5",
            "--max-attempts",
            "4",
            "--tick-ms",
            "50",
        ])
        .unwrap();
        match cli.command {
            Commands::Retry(args) => {
                let policy = args.policy.policy().unwrap();
                assert_eq!(policy.retry_after, Duration::from_millis(1500));
                assert_eq!(policy.max_attempts, NonZeroU32::new(4));
                assert_eq!(policy.tick, Duration::from_millis(50));
            }
            _ => panic!("Expected Retry command"),
        }
    }

    #[test]
    fn test_cli_durable_defaults() {
        let cli = Cli::try_parse_from(["restpoll", "durable", "--account", "localhost"]).unwrap();
        match cli.command {
            Commands::Durable(args) => {
                assert_eq!(args.route_prefix, "api");
                assert_eq!(args.function, "hello");
                assert_eq!(args.task_hub, "SampleHubJs");
                assert_eq!(args.connection, "Storage");
                assert_eq!(args.endpoint, "");
                assert_eq!(args.policy.max_attempts, None);
            }
            _ => panic!("Expected Durable command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["restpoll", "send", "http://x", "-X", "PATCH"]).is_err());
        assert!(Cli::try_parse_from(["restpoll", "send", "http://x", "-H", "no-colon"]).is_err());
        assert!(Cli::try_parse_from(["restpoll", "send", "http://x", "-q", "novalue"]).is_err());
        assert!(
            Cli::try_parse_from(["restpoll", "retry", "http://x", "--max-attempts", "0"]).is_err()
        );
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["restpoll", "http://example.com"]).is_err());
    }

    #[test]
    fn test_parse_header_trims() {
        assert_eq!(
            parse_header(" X-Id :  42 "),
            Ok(("X-Id".to_string(), "42".to_string()))
        );
        assert!(parse_header(":value").is_err());
    }
}
