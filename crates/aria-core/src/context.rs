//! Deterministic prompt assembly.
//!
//! The voice system instruction (items: persona, voice rules, tool
//! preambles, knowledge base, snapshots) is produced once at session open;
//! the text prompt additionally carries the recent transcript and the
//! current utterance. Both are pure functions of their inputs.

use crate::agent::{Agent, IntegrationKind};
use crate::snapshot::IntegrationSnapshot;
use crate::transcript::Transcript;

/// Rules injected only on the voice path. Latency beats completeness on a
/// live call.
const VOICE_RULES: &str = "\
Voice conversation rules:\n\
- Keep responses to 1-2 sentences; this is a live voice call.\n\
- If the user starts speaking, stop immediately and listen.\n\
- Prioritize answering quickly over answering exhaustively.\n";

const KNOWLEDGE_HEADER: &str =
    "Permanent knowledge base (documents uploaded to this agent):";

/// How many transcript turns the text prompt carries.
const HISTORY_TURNS: usize = 10;

/// Capability preamble for one tool kind. Each paragraph names the declared
/// tool so the model can select it.
fn tool_preamble(kind: IntegrationKind) -> Option<&'static str> {
    match kind {
        IntegrationKind::HttpRequest => Some(
            "You can call the tool `make_api_request` to issue a single HTTP \
             request (GET/POST/PUT/DELETE with optional headers and body). Use \
             it whenever the user asks for live data from a URL or API.",
        ),
        IntegrationKind::DomainCheck => Some(
            "You can call the tool `check_domain_availability` to check whether \
             a base name is available across common domain endings. Use it when \
             the user asks about domain names.",
        ),
        IntegrationKind::WebhookTrigger => Some(
            "You can call the tool `trigger_webhook` with a natural-language \
             `action` to fire one of this agent's bound webhooks. Use it when \
             the user asks to kick off an external automation.",
        ),
        IntegrationKind::Spreadsheet => Some(
            "You can call the tool `manage_spreadsheet` to read, write, append, \
             search, or clear the spreadsheet bound to this agent. Use it for \
             any tabular-data request.",
        ),
        IntegrationKind::NotesWorkspace => Some(
            "You can call the tool `manage_notes_workspace` to search, create, \
             or update pages and query databases in the bound notes workspace. \
             Use it when the user refers to their notes.",
        ),
        _ => None,
    }
}

fn push_persona(out: &mut String, agent: &Agent) {
    out.push_str(&format!("You are {}. {}\n", agent.name, agent.description));
    if !agent.persona.trim().is_empty() {
        out.push_str(agent.persona.trim());
        out.push('\n');
    }
    if !agent.instructions.trim().is_empty() {
        out.push_str(agent.instructions.trim());
        out.push('\n');
    }
}

fn push_tool_preambles(out: &mut String, agent: &Agent) {
    let mut wrote_any = false;
    for binding in agent.tool_bindings() {
        if let Some(preamble) = tool_preamble(binding.kind) {
            if !wrote_any {
                out.push('\n');
                wrote_any = true;
            }
            out.push_str(preamble);
            out.push('\n');
        }
    }
}

fn push_knowledge_base(out: &mut String, agent: &Agent) {
    if agent.documents.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(KNOWLEDGE_HEADER);
    out.push('\n');
    for doc in &agent.documents {
        out.push_str(&format!("=== {} ===\n{}\n", doc.name, doc.text));
    }
}

fn push_snapshots(out: &mut String, snapshots: &[IntegrationSnapshot]) {
    if snapshots.is_empty() {
        return;
    }
    out.push_str("\nRecent integration data:\n");
    for snap in snapshots {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            snap.kind.as_str(),
            snap.fetched_at.format("%Y-%m-%d %H:%M UTC"),
            snap.summary
        ));
    }
}

/// System instruction for the voice session (assembled once at open).
pub fn voice_system_instruction(agent: &Agent, snapshots: &[IntegrationSnapshot]) -> String {
    let mut out = String::new();
    push_persona(&mut out, agent);
    out.push('\n');
    out.push_str(VOICE_RULES);
    push_tool_preambles(&mut out, agent);
    push_knowledge_base(&mut out, agent);
    push_snapshots(&mut out, snapshots);
    out
}

/// Prompt for one text-path user message.
pub fn text_prompt(
    agent: &Agent,
    snapshots: &[IntegrationSnapshot],
    transcript: &Transcript,
    user_text: &str,
) -> String {
    let mut out = String::new();
    push_persona(&mut out, agent);
    push_tool_preambles(&mut out, agent);
    push_knowledge_base(&mut out, agent);
    push_snapshots(&mut out, snapshots);

    if !transcript.is_empty() {
        out.push_str("\nConversation so far:\n");
        for turn in transcript.recent(HISTORY_TURNS) {
            out.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.text));
        }
    }

    out.push_str(&format!("\nuser: {}\n", user_text));
    out
}
