//! Counselor CLI Entry Point
//!
//! Runs the configured script as a text conversation on stdin/stdout, with
//! the offline generator and an in-memory store. `/perfil` prints the
//! fields collected so far and `/salir` quits.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use counselor_agent::{
    AgentError, Conversation, ConversationEvent, ConversationOptions, InMemoryProfileStore,
};
use counselor_config::{load_settings, Settings};
use counselor_core::{FieldName, ProfileRecord};
use counselor_llm::ScriptedGenerator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("COUNSELOR_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&settings);

    let script = settings.conversation.load_script()?;
    tracing::info!(
        environment = ?settings.environment,
        script = script.id(),
        questions = script.len(),
        "Starting counselor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let generator = Arc::new(ScriptedGenerator::new(script.clone()));
    let store = Arc::new(InMemoryProfileStore::new());
    let mut conversation = Conversation::new(
        script,
        generator,
        store,
        ConversationOptions::from(&settings.conversation),
    );
    spawn_event_logger(conversation.subscribe());

    let greeting = conversation.start().await?;
    println!("\n{}\n", greeting);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/salir" | "/exit" => break,
            "/perfil" | "/profile" => {
                print_profile(conversation.profile());
                continue;
            },
            text => match conversation.handle_user_input(text).await {
                Ok(outcome) => {
                    if let Some(err) = &outcome.persistence_error {
                        eprintln!("(no se pudo guardar el dato: {})", err);
                    }
                    println!("\n{}", outcome.reply);
                    println!(
                        "[{}/{}{}]\n",
                        outcome.progress.current,
                        conversation.script().len(),
                        if outcome.progress.completed { ", completo" } else { "" }
                    );
                },
                Err(AgentError::EmptyInput) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Turn failed");
                    eprintln!("Error: {}", e);
                },
            },
        }
    }

    print_profile(conversation.profile());
    tracing::info!(
        conversation_id = %conversation.id(),
        completed = conversation.is_complete(),
        "Counselor stopped"
    );
    Ok(())
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("counselor={},warn", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}

fn spawn_event_logger(mut rx: broadcast::Receiver<ConversationEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ConversationEvent::FieldCaptured(parsed)) => tracing::info!(
                    field = %parsed.field,
                    value = %parsed.value,
                    confidence = parsed.confidence,
                    "Field captured"
                ),
                Ok(ConversationEvent::FieldUpdated { field, previous, value }) => tracing::info!(
                    field = %field,
                    previous = ?previous,
                    value = %value,
                    "Field corrected"
                ),
                Ok(ConversationEvent::UpdateRejected { reason }) => {
                    tracing::info!(reason = %reason, "Correction rejected")
                },
                Ok(ConversationEvent::ParseMissed { field }) => {
                    tracing::info!(field = %field, "Answer not understood")
                },
                Ok(ConversationEvent::Completed) => tracing::info!("Script completed"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged")
                },
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn print_profile(profile: &ProfileRecord) {
    if profile.is_empty() {
        println!("(perfil vacío)");
        return;
    }

    println!("Perfil:");
    for (field, value) in profile.iter() {
        println!("  {}: {}", field.display_label(), value);
    }

    let expenses = profile.total_expenses();
    if let Some(income) = profile
        .get(FieldName::MonthlyIncome)
        .and_then(|v| v.as_currency())
    {
        if expenses > 0 {
            println!("  gastos: {}", expenses);
            println!("  disponible: {}", income - expenses);
        }
    }
}
