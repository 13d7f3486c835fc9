//! Live voice call demo.
//!
//! Requires audio hardware and `MODEL_API_KEY` in the environment (or a
//! `.env` file). Speak after the session reaches `listening`; Ctrl+C ends
//! the call.
//!
//! ```sh
//! cargo run -p aria-voice --example voice_call
//! ```

use aria_core::{Agent, CoreConfig, CoreServices, VoiceId};
use aria_tools::{ToolCredentials, ToolDispatcher};
use aria_voice::{SessionEvent, VoiceSessionController};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = CoreConfig::from_env()?;
    let services = CoreServices::new(config);

    let mut agent = Agent::new("demo", "Nova");
    agent.description = "a concise voice assistant".into();
    agent.persona = "You are Nova, a concise assistant.".into();
    agent.voice = VoiceId::Puck;

    let dispatcher = Arc::new(ToolDispatcher::for_agent(
        &agent,
        services.http.clone(),
        ToolCredentials::default(),
    ));

    let mut controller = VoiceSessionController::new(services, dispatcher);
    let mut events = controller.take_event_receiver().expect("fresh controller");
    let stop = controller.stop_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nending call…");
        stop.stop().await;
    });

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::State(state) => println!("[state] {}", state.as_str()),
                SessionEvent::PartialText(text) => print!("{text}"),
                SessionEvent::Error(kind) => eprintln!("[error] {}", kind.as_str()),
            }
        }
    });

    controller.run(&agent).await?;
    Ok(())
}
