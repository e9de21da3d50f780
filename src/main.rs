use std::io::{self, Write};
use std::sync::Arc;

use chat_lanes::cli::{is_known_tone, Args, ReplCommand};
use chat_lanes::i18n::Text;
use chat_lanes::{
    AdmissionGate, ChatLanes, ChatMode, HttpTransport, Language, SessionStreamController,
    SilentProjector, StreamOutcome, Submission, TerminalProjector,
};
use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

fn user_line(mode: ChatMode, lang: Language, prompt: &str) -> String {
    let who = lang.text(Text::User);
    match mode.user_label(lang) {
        Some(label) => format!("{} {} {}", who.bold(), format!("({label})").dimmed(), prompt),
        None => format!("{} {}", who.bold(), prompt),
    }
}

async fn run_once(
    controller: &SessionStreamController,
    lanes: &mut ChatLanes,
    args: &Args,
    prompt: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let lang = controller.config().language;
    let session = lanes.get_mut(args.mode.lane());
    let submission = Submission::new(args.mode, prompt);

    if args.json {
        let summary = controller
            .submit(session, submission, &mut SilentProjector)
            .await?;
        let message = session.last_ai().map(|m| m.snapshot());
        let out = serde_json::json!({ "summary": summary, "message": message });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(summary.outcome == StreamOutcome::Completed);
    }

    println!("{}", user_line(args.mode, lang, prompt));
    let mut projector = TerminalProjector::new(io::stdout(), lang);
    let summary = controller.submit(session, submission, &mut projector).await?;
    Ok(summary.outcome == StreamOutcome::Completed)
}

async fn run_interactive(
    controller: &SessionStreamController,
    lanes: &mut ChatLanes,
    mut mode: ChatMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let lang = controller.config().language;
    let mut projector = TerminalProjector::new(io::stdout(), lang);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", format!("[{mode}]>").bright_cyan());
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::SwitchMode(next) => {
                mode = next;
                println!("{}", format!("mode: {mode} (lane: {})", mode.lane()).dimmed());
            }
            ReplCommand::Clear => {
                if let Err(e) = controller.clear_session(lanes.get_mut(mode.lane())) {
                    eprintln!("{}", e.to_string().red());
                } else {
                    println!("{}", format!("cleared {} lane", mode.lane()).dimmed());
                }
            }
            ReplCommand::Invalid(msg) => eprintln!("{}", msg.red()),
            ReplCommand::Prompt(prompt) => {
                println!("{}", user_line(mode, lang, &prompt));
                let session = lanes.get_mut(mode.lane());
                if let Err(rejected) = controller
                    .submit(session, Submission::new(mode, prompt), &mut projector)
                    .await
                {
                    eprintln!("{}", rejected.to_string().red());
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    if args.mode == ChatMode::Board && !is_known_tone(&config.default_tone) {
        warn!(tone = config.default_tone.as_str(), "unknown tone; backend will use balanced");
    }

    let transport = Arc::new(HttpTransport::new(&config)?);
    let controller = SessionStreamController::new(transport, AdmissionGate::new(), config);
    let mut lanes = ChatLanes::new();

    match args.prompt.clone() {
        Some(prompt) => {
            if !run_once(&controller, &mut lanes, &args, &prompt).await? {
                std::process::exit(1);
            }
        }
        None => run_interactive(&controller, &mut lanes, args.mode).await?,
    }
    Ok(())
}
