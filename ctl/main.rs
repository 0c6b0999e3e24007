#![forbid(unsafe_code)]

//! `nexus-ctl`: command-line companion for `nexus-research`.
//!
//! Talks to the server's HTTP API. Besides one-shot commands it offers an
//! interactive `run` mode that walks a topic through review to a saved
//! report.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

type CtlResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "nexus-ctl",
    about = "Command-line client for the nexus-research API",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the running server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a research session and print the plan for review.
    Start {
        /// Research topic.
        topic: String,
        /// Explicit session id.
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Approve the current plan or send revision feedback.
    Resume {
        /// Topic the session was started with.
        topic: String,
        /// Explicit session id.
        #[arg(long)]
        session_id: Option<String>,
        /// Approve the plan and produce the final report.
        #[arg(long, conflicts_with = "feedback")]
        approve: bool,
        /// Revision instruction.
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Clear every session on the server.
    Reset,

    /// Show the stored state of a session.
    Status {
        /// Session id.
        session_id: String,
    },

    /// Drop one session from the server.
    Discard {
        /// Session id.
        session_id: String,
    },

    /// Render a Markdown report to PDF via the server.
    Pdf {
        /// Markdown input file.
        #[arg(long)]
        input: PathBuf,
        /// PDF output file.
        #[arg(long, default_value = "final_report.pdf")]
        output: PathBuf,
    },

    /// Transcribe an audio file via the server.
    Transcribe {
        /// Audio file to upload.
        file: PathBuf,
        /// Session id sent with the upload.
        #[arg(long, default_value = "nexus-ctl")]
        session_id: String,
    },

    /// Interactive loop: topic, review rounds, then save the report.
    Run {
        /// Where to save the final report.
        #[arg(long, default_value = "report.md")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let client = Client::new();
    let server = args.server.trim_end_matches('/').to_owned();

    if let Err(err) = dispatch(&client, &server, args.command).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn dispatch(client: &Client, server: &str, command: Command) -> CtlResult<()> {
    match command {
        Command::Start { topic, session_id } => {
            let body = json!({ "topic": topic, "session_id": session_id });
            let result = post_json(client, &format!("{server}/api/start_research"), &body).await?;
            print_result(&result);
        }
        Command::Resume {
            topic,
            session_id,
            approve,
            feedback,
        } => {
            if !approve && feedback.is_none() {
                return Err("pass --approve or --feedback <text>".into());
            }
            let body = json!({
                "topic": topic,
                "session_id": session_id,
                "approved": approve.then_some(true),
                "feedback": feedback,
            });
            let result = post_json(client, &format!("{server}/api/resume"), &body).await?;
            print_result(&result);
        }
        Command::Reset => {
            let result = post_json(client, &format!("{server}/api/reset"), &json!({})).await?;
            println!("{}", text_field(&result, "message"));
        }
        Command::Status { session_id } => {
            let response = client
                .get(format!("{server}/api/sessions/{session_id}"))
                .send()
                .await?;
            let snapshot: Value = checked(response).await?.json().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Discard { session_id } => {
            let response = client
                .delete(format!("{server}/api/sessions/{session_id}"))
                .send()
                .await?;
            let result: Value = checked(response).await?.json().await?;
            println!("{}", text_field(&result, "message"));
        }
        Command::Pdf { input, output } => {
            let report = tokio::fs::read_to_string(&input).await?;
            let response = client
                .post(format!("{server}/api/generate_pdf"))
                .json(&json!({ "final_report": report }))
                .send()
                .await?;
            let pdf = checked(response).await?.bytes().await?;
            tokio::fs::write(&output, &pdf).await?;
            println!("Wrote {} bytes to {}", pdf.len(), output.display());
        }
        Command::Transcribe { file, session_id } => {
            let audio = tokio::fs::read(&file).await?;
            let name = file
                .file_name()
                .map_or_else(|| "audio".to_owned(), |n| n.to_string_lossy().into_owned());
            let form = Form::new()
                .part("file", Part::bytes(audio).file_name(name))
                .text("session_id", session_id);
            let response = client
                .post(format!("{server}/api/transcribe"))
                .multipart(form)
                .send()
                .await?;
            let result: Value = checked(response).await?.json().await?;
            println!("{}", text_field(&result, "transcript"));
        }
        Command::Run { output } => interactive(client, server, &output).await?,
    }
    Ok(())
}

/// Walk one topic through review rounds until the reviewer types `yes`.
async fn interactive(client: &Client, server: &str, output: &Path) -> CtlResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let topic = loop {
        prompt("Research topic: ").await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if !line.trim().is_empty() {
            break line.trim().to_owned();
        }
    };

    let mut result = post_json(
        client,
        &format!("{server}/api/start_research"),
        &json!({ "topic": topic }),
    )
    .await?;

    loop {
        println!("\n{}\n", text_field(&result, "message"));
        let awaiting = result
            .get("awaiting_decision")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !awaiting {
            let report = text_field(&result, "message");
            tokio::fs::write(output, report.as_bytes()).await?;
            println!("Saved report to {}", output.display());
            return Ok(());
        }

        prompt("Feedback ('yes' to approve): ").await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let feedback = line.trim();
        if feedback.is_empty() {
            continue;
        }
        let session_id = result.get("session_id").cloned().unwrap_or(Value::Null);
        result = post_json(
            client,
            &format!("{server}/api/resume"),
            &json!({ "topic": topic, "session_id": session_id, "feedback": feedback }),
        )
        .await?;
    }
}

async fn prompt(text: &str) -> CtlResult<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

async fn post_json(client: &Client, url: &str, body: &Value) -> CtlResult<Value> {
    let response = client.post(url).json(body).send().await?;
    Ok(checked(response).await?.json().await?)
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn checked(response: Response) -> CtlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("request failed");
    Err(format!("{status}: {message}").into())
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn print_result(result: &Value) {
    println!("{}", text_field(result, "message"));
    if let Some(id) = result.get("session_id").and_then(Value::as_str) {
        eprintln!("session: {id}");
    }
    if result
        .get("awaiting_decision")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        eprintln!("(awaiting review: use `nexus-ctl resume`)");
    }
}
