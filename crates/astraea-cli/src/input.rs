//! Terminal input for the interactive review.
//!
//! The review gate takes an injected callback; this is the stdin-backed
//! implementation the CLI wires in. Prompts print to stdout, one decision
//! per line of input.

use std::io::{BufRead, Write};

use astraea_model::CorrectionType;
use astraea_review::{CorrectionRequest, ReviewInput, ReviewPrompt};

/// Build the stdin-backed input callback.
pub fn terminal_input<'a>() -> astraea_review::InputFn<'a> {
    Box::new(|prompt| {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        respond(prompt, &mut |question: &str| {
            print!("{question}");
            let _ = std::io::stdout().flush();
            lines
                .next()
                .and_then(Result::ok)
                .unwrap_or_default()
                .trim()
                .to_string()
        })
    })
}

fn respond(prompt: &ReviewPrompt, ask: &mut dyn FnMut(&str) -> String) -> ReviewInput {
    match prompt {
        ReviewPrompt::DomainAction { domain, table } => {
            println!("\n{table}");
            loop {
                let answer =
                    ask(&format!("[{domain}] approve-all / review / skip / quit (a/r/s/q): "));
                match answer.to_lowercase().as_str() {
                    "a" | "approve-all" => return ReviewInput::ApproveAll,
                    "r" | "review" => return ReviewInput::Review,
                    "s" | "skip" => return ReviewInput::SkipDomain,
                    "q" | "quit" => return ReviewInput::Quit,
                    _ => println!("unrecognised: {answer}"),
                }
            }
        }
        ReviewPrompt::HighBatch { domain, count } => loop {
            let answer = ask(&format!(
                "[{domain}] {count} high-confidence mapping(s): accept batch / review individually / quit (a/i/q): "
            ));
            match answer.to_lowercase().as_str() {
                "a" | "accept" => return ReviewInput::AcceptBatch,
                "i" | "individually" => return ReviewInput::ReviewIndividually,
                "q" | "quit" => return ReviewInput::Quit,
                _ => println!("unrecognised: {answer}"),
            }
        },
        ReviewPrompt::VariablePanel {
            domain,
            variable,
            panel,
        } => {
            println!("\n{panel}");
            loop {
                let answer = ask(&format!(
                    "[{domain}.{variable}] approve / correct / skip / quit (a/c/s/q): "
                ));
                match answer.to_lowercase().as_str() {
                    "a" | "approve" => return ReviewInput::Approve,
                    "s" | "skip" => return ReviewInput::SkipVariable,
                    "q" | "quit" => return ReviewInput::Quit,
                    "c" | "correct" => match collect_correction(ask) {
                        Some(request) => return ReviewInput::Correct(request),
                        None => println!("correction abandoned"),
                    },
                    _ => println!("unrecognised: {answer}"),
                }
            }
        }
    }
}

fn collect_correction(ask: &mut dyn FnMut(&str) -> String) -> Option<CorrectionRequest> {
    let kind = ask(
        "correction type (source_change/logic_change/pattern_change/ct_change/confidence_override/reject): ",
    );
    let correction_type: CorrectionType = kind.parse().ok()?;
    let reason = ask("reason: ");

    let mut request = CorrectionRequest::reject(reason);
    request.correction_type = correction_type;
    match correction_type {
        CorrectionType::SourceChange => {
            request.new_source_variable = Some(ask("new source variable: "));
        }
        CorrectionType::LogicChange => {
            request.new_logic = Some(ask("new mapping logic: "));
        }
        CorrectionType::PatternChange => {
            request.new_pattern = ask("new pattern: ").parse().ok();
            request.new_logic = Some(ask("new mapping logic: "));
        }
        CorrectionType::CtChange => {
            request.new_codelist_code = Some(ask("new codelist code: "));
        }
        CorrectionType::ConfidenceOverride => {
            request.new_confidence = ask("new confidence [0-1]: ").parse().ok();
        }
        CorrectionType::Reject | CorrectionType::Add => {}
    }
    Some(request)
}
