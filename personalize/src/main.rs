#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use rapleaf_personalize::{
    config::Config,
    lookup::{Attributes, LookupResult, PersonalizeClient, ProfileLookup, QueryRequest},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Query the Rapleaf Personalization API.
///
/// Prints one JSON object per lookup to stdout. A failed lookup is reported
/// in its own line and the remaining lookups still run.
#[derive(Debug, Parser)]
#[command(name = "rapleaf-lookup", version)]
struct Cli {
    /// Configuration file (default: rapleaf.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    query: Query,
}

#[derive(Debug, Subcommand)]
enum Query {
    /// Look up email addresses; reads one per line from stdin when none are given
    Email {
        emails: Vec<String>,
        /// Send the SHA-1 digest of each address instead of the address
        #[arg(long)]
        hash: bool,
    },
    /// Look up MD5 digests of email addresses
    Md5 {
        #[arg(required = true)]
        digests: Vec<String>,
    },
    /// Look up SHA-1 digests of email addresses
    Sha1 {
        #[arg(required = true)]
        digests: Vec<String>,
    },
    /// Look up a person by name and postal address
    Postal {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Look up a person by name and zip+4 code
    Zip {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        zip4: String,
        #[arg(long)]
        email: Option<String>,
    },
}

impl Query {
    fn into_requests(self) -> io::Result<Vec<QueryRequest>> {
        let requests = match self {
            Self::Email { emails, hash } => {
                let emails = if emails.is_empty() {
                    read_lines(io::stdin().lock())?
                } else {
                    emails
                };
                emails
                    .iter()
                    .map(|email| {
                        if hash {
                            QueryRequest::hashed_email(email)
                        } else {
                            QueryRequest::email(email)
                        }
                    })
                    .collect()
            }
            Self::Md5 { digests } => digests.iter().map(|d| QueryRequest::md5(d)).collect(),
            Self::Sha1 { digests } => digests.iter().map(|d| QueryRequest::sha1(d)).collect(),
            Self::Postal {
                first_name,
                last_name,
                street,
                city,
                state,
                email,
            } => vec![QueryRequest::name_and_postal(
                &first_name,
                &last_name,
                &street,
                &city,
                &state,
                email.as_deref(),
            )],
            Self::Zip {
                first_name,
                last_name,
                zip4,
                email,
            } => vec![QueryRequest::name_and_zip(
                &first_name,
                &last_name,
                &zip4,
                email.as_deref(),
            )],
        };
        Ok(requests)
    }
}

fn read_lines(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

/// One output line.
#[derive(Debug, Serialize)]
struct Outcome<'a> {
    query: &'a QueryRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Failure>,
}

#[derive(Debug, Serialize)]
struct Failure {
    status: Option<u16>,
    message: String,
}

impl<'a> Outcome<'a> {
    fn new(query: &'a QueryRequest, result: LookupResult) -> Self {
        match result {
            Ok(attributes) => Self {
                query,
                attributes: Some(attributes),
                error: None,
            },
            Err(err) => Self {
                query,
                attributes: None,
                error: Some(Failure {
                    status: err.status(),
                    message: err.to_string(),
                }),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Logs go to stderr; stdout carries the results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .with_writer(io::stderr)
        .init();

    let client = PersonalizeClient::from_config(&config.api)?;
    let requests = cli.query.into_requests()?;
    if requests.is_empty() {
        tracing::warn!("nothing to look up");
        return Ok(());
    }

    tracing::info!(count = requests.len(), base_url = %client.base_url(), "starting lookups");

    let failures = run_lookups(&client, &requests, &mut io::stdout().lock()).await?;

    tracing::info!(
        total = requests.len(),
        failed = failures,
        "lookups finished"
    );

    if failures == requests.len() {
        anyhow::bail!("all {failures} lookups failed");
    }
    Ok(())
}

/// Runs every lookup in order and writes one JSON line per outcome.
///
/// Returns the number of failed lookups.
async fn run_lookups<L, W>(
    lookup: &L,
    requests: &[QueryRequest],
    out: &mut W,
) -> anyhow::Result<usize>
where
    L: ProfileLookup + ?Sized,
    W: Write,
{
    let results = lookup.lookup_each(requests).await;
    let mut failures = 0usize;
    for (request, result) in requests.iter().zip(results) {
        let outcome = Outcome::new(request, result);
        if outcome.error.is_some() {
            failures += 1;
        }
        serde_json::to_writer(&mut *out, &outcome)?;
        writeln!(out)?;
    }
    Ok(failures)
}
