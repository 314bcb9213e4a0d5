//! sessionctl - Command-line interface for sessiond
//!
//! Opens and releases application sessions and inspects the daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

/// sessionctl - Manage per-user application sessions
#[derive(Parser)]
#[command(name = "sessionctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the sessiond session daemon", long_about = None)]
struct Cli {
    /// sessiond API URL
    #[arg(short, long, env = "SESSIOND_URL", default_value = "http://127.0.0.1:8080")]
    api_url: String,

    /// User to act as
    #[arg(short, long, env = "USER")]
    user: Option<String>,

    /// Bearer token for admin commands
    #[arg(long, env = "SESSIOND_ADMIN_TOKEN")]
    admin_token: Option<String>,

    /// Header carrying the user name
    #[arg(long, default_value = "x-forwarded-user")]
    user_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get server health status
    Health,

    /// List launchable applications
    Apps,

    /// Open (or reuse) a session for an application
    Open {
        /// Application name
        app: String,
    },

    /// Release your session
    Release {
        /// Wait for the container to be removed
        #[arg(short, long)]
        wait: bool,
    },

    /// List published routes
    Routes,

    /// List all sessions (admin)
    Sessions,

    /// Terminate a user's session (admin)
    Kill {
        /// User whose session to release
        user: String,
    },

    /// List containers of the session image (admin)
    Containers,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    active_sessions: u64,
    runtime_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MappingResponse {
    route_name: String,
    app_name: String,
    target: Option<String>,
}

impl Cli {
    fn as_user(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let user = self
            .user
            .as_deref()
            .context("No user given (use --user or set USER)")?;
        Ok(request.header(self.user_header.as_str(), user))
    }

    fn as_admin(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .admin_token
            .as_deref()
            .context("No admin token given (use --admin-token or set SESSIOND_ADMIN_TOKEN)")?;
        Ok(request.bearer_auth(token))
    }
}

/// Send and turn error statuses into the server's message
fn send(request: RequestBuilder, what: &str) -> Result<Response> {
    let response = request
        .send()
        .with_context(|| format!("Failed to send {} request", what))?;

    if !response.status().is_success() {
        let status = response.status();
        let body: Value = response.json().unwrap_or(Value::Null);
        let message = body["message"].as_str().unwrap_or("Unknown error");
        anyhow::bail!("{} failed ({}): {}", what, status, message);
    }

    Ok(response)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.api_url.trim_end_matches('/');
    let api = format!("{}/api/v1", base);

    match &cli.command {
        Commands::Health => {
            let response = send(client.get(format!("{}/health", base)), "Health check")?;
            let health: HealthResponse = response.json().context("Failed to parse response")?;

            println!("{}", "sessiond Status".bright_cyan().bold());
            println!("{}", "=".repeat(40).bright_blue());
            println!(
                "{} {}",
                "Status:".cyan(),
                if health.status == "healthy" {
                    health.status.green()
                } else {
                    health.status.yellow()
                }
            );
            println!("{} {}", "Version:".cyan(), health.version);
            println!("{} {}s", "Uptime:".cyan(), health.uptime_seconds);
            println!("{} {}", "Active Sessions:".cyan(), health.active_sessions);
            println!(
                "{} {}",
                "Docker:".cyan(),
                health.runtime_version.as_deref().unwrap_or("unreachable")
            );
        }

        Commands::Apps => {
            let request = cli.as_user(client.get(format!("{}/apps", api)))?;
            let apps: Value = send(request, "Apps")?.json().context("Failed to parse response")?;

            println!("{}", "Applications:".bright_cyan().bold());
            for app in apps.as_array().context("Invalid response")? {
                let name = app["name"].as_str().unwrap_or("?");
                let display = app["display_name"].as_str().unwrap_or(name);
                println!("  {} {} ({})", "•".bright_blue(), display, name);
            }
        }

        Commands::Open { app } => {
            let request = cli.as_user(client.get(format!("{}/mapping/{}", api, app)))?;
            let mapping: MappingResponse = send(request, "Open")?
                .json()
                .context("Failed to parse response")?;

            println!("{} {}", "✓ Session ready:".green(), mapping.app_name);
            println!("{} {}", "  Route:".cyan(), mapping.route_name);
            if let Some(target) = mapping.target {
                println!("{} {}", "  Target:".cyan(), target);
            }
        }

        Commands::Release { wait } => {
            let request = cli
                .as_user(client.delete(format!("{}/session", api)))?
                .query(&[("wait", wait.to_string())]);
            send(request, "Release")?;

            println!("{}", "✓ Session released".green());
        }

        Commands::Routes => {
            let routes: Value = send(client.get(format!("{}/routes", api)), "Routes")?
                .json()
                .context("Failed to parse response")?;

            for route in routes.as_array().context("Invalid response")? {
                println!(
                    "  {} -> {}",
                    route["route_name"].as_str().unwrap_or("?").bright_cyan(),
                    route["target"].as_str().unwrap_or("?")
                );
            }
        }

        Commands::Sessions => {
            let request = cli.as_admin(client.get(format!("{}/admin/sessions", api)))?;
            let sessions: Value = send(request, "Sessions")?
                .json()
                .context("Failed to parse response")?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }

        Commands::Kill { user } => {
            let request = cli.as_admin(client.delete(format!("{}/admin/sessions/{}", api, user)))?;
            send(request, "Kill")?;

            println!("{} {}", "✓ Session terminated for".green(), user);
        }

        Commands::Containers => {
            let request = cli.as_admin(client.get(format!("{}/admin/containers", api)))?;
            let containers: Value = send(request, "Containers")?
                .json()
                .context("Failed to parse response")?;

            for container in containers.as_array().context("Invalid response")? {
                println!(
                    "  {} {} {}",
                    container["id"].as_str().unwrap_or("?"),
                    container["name"].as_str().unwrap_or("?").bright_cyan(),
                    container["state"].as_str().unwrap_or("unknown")
                );
            }
        }
    }

    Ok(())
}
