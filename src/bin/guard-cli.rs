use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, LOCATION, USER_AGENT};
use serde_json::json;

use portfolio_guard::security::injection::{has_sql_injection, sql_signature, validate_safe_input};
use portfolio_guard::security::sanitizer::{
    has_xss, sanitize_html, validate_and_sanitize_text, xss_signature,
};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Operator CLI for the portfolio guard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the input screens on a piece of text and print a JSON report
    Inspect {
        text: String,
    },
    /// Send a GET through a running guard and show how the gate answered
    Probe {
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,

        #[arg(short, long, default_value = "/")]
        path: String,

        /// User-Agent to send, e.g. a scanner name
        #[arg(long)]
        user_agent: Option<String>,

        /// Value for the `sessionId` cookie
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { text } => {
            let report = json!({
                "input": text,
                "has_xss": has_xss(&text),
                "xss_signature": xss_signature(&text),
                "has_sql_injection": has_sql_injection(&text),
                "sql_signature": sql_signature(&text),
                "text_verdict": validate_and_sanitize_text(&text),
                "sql_verdict": validate_safe_input(&text),
                "sanitized_html": sanitize_html(&text),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Probe {
            url,
            path,
            user_agent,
            session,
        } => {
            let mut headers = HeaderMap::new();
            if let Some(ua) = user_agent {
                headers.insert(USER_AGENT, HeaderValue::from_str(&ua)?);
            }
            if let Some(id) = session {
                headers.insert(COOKIE, HeaderValue::from_str(&format!("sessionId={id}"))?);
            }

            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            let res = client
                .get(format!("{}{}", url.trim_end_matches('/'), path))
                .headers(headers)
                .send()
                .await?;

            println!("Status: {}", res.status());
            if let Some(location) = res.headers().get(LOCATION) {
                println!("Location: {}", location.to_str().unwrap_or("<non-ascii>"));
            }
            if let Ok(text) = res.text().await {
                if !text.is_empty() {
                    println!("Body: {}", text);
                }
            }
        }
    }

    Ok(())
}
