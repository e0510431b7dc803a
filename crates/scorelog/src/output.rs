use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use scorelog_frame::ScoreEvent;
use scorelog_relay::{HandlerError, RelayConfig, ScoreHandler};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn render_event(event: &ScoreEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SETTINGS", "SCORE", "REQUIRED", "SYMBOL", "SYMBOL SCORE"]);
            if event.symbol_results.is_empty() {
                table.add_row(vec![
                    event.settings_id.to_string(),
                    format!("{:.2}", event.score),
                    format!("{:.2}", event.required_score),
                    "-".to_string(),
                    "-".to_string(),
                ]);
            }
            for (i, result) in event.symbol_results.iter().enumerate() {
                let (settings, score, required) = if i == 0 {
                    (
                        event.settings_id.to_string(),
                        format!("{:.2}", event.score),
                        format!("{:.2}", event.required_score),
                    )
                } else {
                    (String::new(), String::new(), String::new())
                };
                table.add_row(vec![
                    settings,
                    score,
                    required,
                    result.id.to_string(),
                    format!("{:.2}", result.score),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Pretty => {
            let symbols: Vec<String> = event
                .symbol_results
                .iter()
                .map(|r| format!("{}:{:.2}", r.id, r.score))
                .collect();
            format!(
                "settings={} score={:.2}/{:.2} symbols=[{}]",
                event.settings_id,
                event.score,
                event.required_score,
                symbols.join(", ")
            )
        }
    }
}

/// Prints every event to stdout.
#[derive(Debug, Clone, Copy)]
pub struct PrintHandler {
    format: OutputFormat,
}

impl PrintHandler {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ScoreHandler for PrintHandler {
    fn name(&self) -> &str {
        "print"
    }

    fn invoke(&self, event: &ScoreEvent, _config: &RelayConfig) -> Result<(), HandlerError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", render_event(event, self.format))?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct EncodedFrame<'a> {
    size: usize,
    symbols: usize,
    hex: &'a str,
}

pub fn render_encoded(frame: &[u8], symbols: usize, format: OutputFormat) -> String {
    let hex = hex::encode(frame);
    match format {
        OutputFormat::Json => serde_json::to_string(&EncodedFrame {
            size: frame.len(),
            symbols,
            hex: &hex,
        })
        .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Table | OutputFormat::Pretty => hex,
    }
}
