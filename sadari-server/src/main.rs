mod draw;
mod http;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use sadari_game::{Arcade, ArcadeSettings, Clock, SystemClock};
use sadari_game::settings::{DEFAULT_LADDER_TTL_SECS, DEFAULT_RATE_LIMIT};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// ASCII ladder and pairings
    Console,
    /// Config, mapping, and pairings as JSON
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sadari", version)]
#[command(about = "Ladder draws, shareable ladders, and mini-game leaderboards")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
        bind: String,

        /// Saves and score submissions allowed per client per minute
        #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = DEFAULT_RATE_LIMIT)]
        rate_limit: u32,

        /// Seconds a saved ladder stays retrievable
        #[arg(long, env = "LADDER_SAVE_TTL_SECONDS", default_value_t = DEFAULT_LADDER_TTL_SECS)]
        ladder_ttl: u64,

        /// Public origin used in share links
        #[arg(long, env = "SITE_URL")]
        site_url: Option<String>,

        /// Bearer token for admin resets; resets are refused when unset
        #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
        admin_token: Option<String>,
    },
    /// Draw a ladder locally
    Draw {
        /// Top labels (comma-separated)
        #[arg(long, default_value = "")]
        names: String,

        /// Bottom labels (comma-separated)
        #[arg(long, default_value = "")]
        results: String,

        /// Lane count when no labels are given
        #[arg(long, default_value_t = 4)]
        lanes: usize,

        #[arg(long, default_value_t = 18)]
        rows: u32,

        #[arg(long, default_value_t = 0.28)]
        density: f64,

        /// Replay a shared draw
        #[arg(long, allow_hyphen_values = true)]
        seed: Option<i64>,

        /// Trace one starting lane (1-based) through the ladder
        #[arg(long)]
        reveal: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        format: OutputFormat,

        /// Optional path to write the output instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Serve {
            bind,
            rate_limit,
            ladder_ttl,
            site_url,
            admin_token,
        } => {
            let settings = ArcadeSettings {
                save_rate_limit: rate_limit,
                submit_rate_limit: rate_limit,
                ladder_ttl_secs: ladder_ttl,
                site_url,
                admin_token,
                ..ArcadeSettings::default()
            }
            .normalized();
            settings.validate().context("invalid server settings")?;
            announce_banner(&bind, &settings);
            http::serve(Arcade::in_memory(settings), &bind)
                .await
                .with_context(|| format!("server on {bind} failed"))?;
        }
        Command::Draw {
            names,
            results,
            lanes,
            rows,
            density,
            seed,
            reveal,
            format,
            output,
        } => {
            let config = draw::draw(
                draw::split_csv(&names),
                draw::split_csv(&results),
                lanes,
                rows,
                density,
                seed,
                SystemClock.now_millis(),
            )?;
            let reveal = reveal
                .map(|lane| draw::reveal_lane(&config, lane))
                .transpose()?;
            let rendered = match format {
                OutputFormat::Console => draw::render_console(&config, reveal),
                OutputFormat::Json => {
                    draw::render_json(&config, reveal).context("encode draw")?
                }
            };
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("write {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

fn announce_banner(bind: &str, settings: &ArcadeSettings) {
    println!("{}", "🪜 Sadari Arcade".bright_cyan().bold());
    println!("{}", "================================".cyan());
    println!("listening on {}", bind.bright_green());
    println!(
        "rate limit {}/min, ladders kept {}s",
        settings.save_rate_limit, settings.ladder_ttl_secs
    );
    if settings.admin_token.is_none() {
        println!("{}", "⚠️  ADMIN_TOKEN unset: admin resets are disabled".yellow());
    }
}
