//! tubesum-cli - command-line client for the Tubesum HTTP API
//!
//! # Subcommands
//! - `summarize <url> [--title] [--duration] [--json]` - summarize, then record usage
//! - `cached <video_id> [--json]`                       - show a cached summary
//! - `history [-n <limit>] [--json]`                    - recent summaries
//! - `clear`                                            - clear cache, history and usage
//! - `stats`                                            - time saved and videos summarized
//! - `settings show | set [--api-key] [--prompt] [--theme]`
//! - `status`                                           - show server health

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const DEFAULT_HISTORY_LIMIT: usize = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "tubesum-cli", version, about = "Summarize YouTube videos with Tubesum")]
struct Cli {
    /// Tubesum HTTP server URL (overrides TUBESUM_HTTP_URL env var)
    #[arg(long, env = "TUBESUM_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarize a video and record it in history
    Summarize {
        /// YouTube video URL (watch, youtu.be or shorts)
        url: String,

        /// Video title as shown on the page
        #[arg(long)]
        title: Option<String>,

        /// Video length in seconds, used for timestamps and time-saved stats
        #[arg(long)]
        duration: Option<u64>,

        /// Print the raw summary JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the cached summary for a video id
    Cached {
        video_id: String,

        #[arg(long)]
        json: bool,
    },

    /// List recent summaries, most recent first
    History {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Clear cached summaries, history and usage stats (settings are kept)
    Clear,

    /// Show time saved and videos summarized
    Stats,

    /// Read or update settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Show Tubesum server status
    Status,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    /// Print current settings (the API key is masked)
    Show,

    /// Update one or more settings
    Set {
        #[arg(long)]
        api_key: Option<String>,

        /// Custom system prompt for summaries
        #[arg(long)]
        prompt: Option<String>,

        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeArg {
    Dark,
    Light,
}

impl ThemeArg {
    fn as_str(self) -> &'static str {
        match self {
            ThemeArg::Dark => "dark",
            ThemeArg::Light => "light",
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub title: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub action_steps: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub data: Summary,
    pub video_id: String,
    pub video_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub summary_data: Summary,
    pub video_title: String,
}

#[derive(Debug, Deserialize)]
pub struct CachedResponse {
    pub data: Option<CacheEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub video_id: String,
    pub title: String,
    pub summary: Summary,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub time_saved: u64,
    pub videos_summarized: u64,
}

// ============================================================================
// Formatting
// ============================================================================

/// Human-readable summary block: title, summary, key concepts, action steps.
pub fn render_summary(title: &str, s: &Summary) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        out.push_str(&format!("{}\n\n", title));
    }
    out.push_str(s.summary.trim());
    out.push('\n');

    if !s.concepts.is_empty() {
        out.push_str("\nKey concepts:\n");
        for c in &s.concepts {
            out.push_str(&format!("  [{}] {}\n", c.timestamp, c.title));
        }
    }
    if !s.action_steps.is_empty() {
        out.push_str("\nAction steps:\n");
        for (i, step) in s.action_steps.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, step));
        }
    }
    out
}

/// `1h 5m`, `12m`, `45s`.
pub fn format_time_saved(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// One line per entry: date, video id, title.
pub fn render_history_line(item: &HistoryItem) -> String {
    let date = item.timestamp.get(..10).unwrap_or(&item.timestamp);
    format!("{}  {:<11}  {}", date, item.video_id, item.title)
}

/// Show the first and last four characters only.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and parse a JSON body, turning error statuses into the
/// server's error message.
fn send_json<T: serde::de::DeserializeOwned>(
    req: reqwest::blocking::RequestBuilder,
) -> anyhow::Result<T> {
    let resp = req.send().map_err(|e| anyhow::anyhow!("connection failed: {}", e))?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("no error message");
        anyhow::bail!("server returned {}: {}", status, msg);
    }
    Ok(resp.json()?)
}

fn do_summarize(
    server: &str,
    url: &str,
    title: Option<String>,
    duration: Option<u64>,
    json_output: bool,
) -> anyhow::Result<()> {
    // Generation can take a while for long videos
    let http = client(180)?;
    let body = serde_json::json!({
        "videoUrl": url,
        "title": title,
        "duration": duration,
    });
    let resp: SummarizeResponse = send_json(http.post(format!("{}/summarize", server)).json(&body))?;

    let usage = serde_json::json!({ "durationSeconds": duration });
    let _: serde_json::Value = send_json(http.post(format!("{}/usage", server)).json(&usage))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp.data)?);
    } else {
        let title = if resp.video_title.is_empty() {
            resp.video_id.as_str()
        } else {
            resp.video_title.as_str()
        };
        print!("{}", render_summary(title, &resp.data));
    }
    Ok(())
}

/// `{server}/cache/{video_id}` with the id percent-encoded as one path segment.
pub fn cache_url(server: &str, video_id: &str) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL cannot be a base: {}", server))?
        .pop_if_empty()
        .push("cache")
        .push(video_id);
    Ok(url)
}

fn do_cached(server: &str, video_id: &str, json_output: bool) -> anyhow::Result<()> {
    let http = client(10)?;
    let resp: CachedResponse = send_json(http.get(cache_url(server, video_id)?))?;

    match resp.data {
        Some(entry) if json_output => println!("{}", serde_json::to_string_pretty(&entry.summary_data)?),
        Some(entry) => print!("{}", render_summary(&entry.video_title, &entry.summary_data)),
        None => eprintln!("No cached summary for: {}", video_id),
    }
    Ok(())
}

fn do_history(server: &str, limit: usize, json_output: bool) -> anyhow::Result<()> {
    let http = client(10)?;
    let mut items: Vec<HistoryItem> = send_json(http.get(format!("{}/history", server)))?;
    items.truncate(limit);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        eprintln!("History is empty");
    } else {
        for item in &items {
            println!("{}", render_history_line(item));
        }
    }
    Ok(())
}

fn do_clear(server: &str) -> anyhow::Result<()> {
    let http = client(10)?;
    let _: serde_json::Value = send_json(http.delete(format!("{}/history", server)))?;
    println!("History, cache and stats cleared");
    Ok(())
}

fn do_stats(server: &str) -> anyhow::Result<()> {
    let http = client(10)?;
    let stats: Stats = send_json(http.get(format!("{}/stats", server)))?;
    println!("Videos summarized: {}", stats.videos_summarized);
    println!("Time saved:        {}", format_time_saved(stats.time_saved));
    Ok(())
}

fn do_settings(server: &str, command: SettingsCommand) -> anyhow::Result<()> {
    let http = client(10)?;
    let url = format!("{}/settings", server);

    match command {
        SettingsCommand::Show => {
            let s: serde_json::Value = send_json(http.get(&url))?;
            let key = s["apiKey"].as_str().map(mask_api_key);
            println!("API key:       {}", key.as_deref().unwrap_or("(not set)"));
            println!("Theme:         {}", s["theme"].as_str().unwrap_or("dark"));
            println!(
                "System prompt: {}",
                s["systemPrompt"].as_str().unwrap_or("(default)")
            );
        }
        SettingsCommand::Set { api_key, prompt, theme } => {
            let mut body = serde_json::Map::new();
            if let Some(k) = api_key {
                body.insert("apiKey".to_string(), k.into());
            }
            if let Some(p) = prompt {
                body.insert("systemPrompt".to_string(), p.into());
            }
            if let Some(t) = theme {
                body.insert("theme".to_string(), t.as_str().into());
            }
            if body.is_empty() {
                anyhow::bail!("nothing to set; pass --api-key, --prompt or --theme");
            }
            let _: serde_json::Value = send_json(http.put(&url).json(&body))?;
            println!("Settings saved");
        }
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let http = client(10)?;
    let url = format!("{}/health", server);

    match http.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Tubesum server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:        {}", body["backend"].as_str().unwrap_or("?"));
            println!("Generator:      {}", body["generator"].as_str().unwrap_or("?"));
            println!("Socket:         {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("tubesum-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("tubesum-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Summarize { url, title, duration, json } => {
            do_summarize(&server, &url, title, duration, json)
        }
        Commands::Cached { video_id, json } => do_cached(&server, &video_id, json),
        Commands::History { limit, json } => do_history(&server, limit, json),
        Commands::Clear => do_clear(&server),
        Commands::Stats => do_stats(&server),
        Commands::Settings { command } => do_settings(&server, command),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("tubesum-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
