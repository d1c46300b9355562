//! Dispatch of interpreter action lists.

use std::fmt::Write;

use serde::Deserialize;
use tabled::Tabled;

use praxis_core::{Action, DispatchReport, Engine, InterpreterResponse};

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

/// Either a bare action array or a full interpreter answer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActionFile {
    Actions(Vec<Action>),
    Response(InterpreterResponse),
}

impl ActionFile {
    fn into_actions(self) -> Result<Vec<Action>, CliError> {
        match self {
            Self::Actions(actions) => Ok(actions),
            Self::Response(response) if response.success => Ok(response.actions),
            Self::Response(response) => Err(CliError::Interpreter {
                message: response
                    .error
                    .unwrap_or_else(|| non_empty_or(&response.message, "no reason given")),
            }),
        }
    }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_owned()
    } else {
        text.to_owned()
    }
}

#[derive(Tabled)]
struct DeferredRow {
    #[tabled(rename = "Layer")]
    kind: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Action> for DeferredRow {
    fn from(a: &Action) -> Self {
        Self {
            kind: a.kind.to_string(),
            target: a.target.clone(),
            property: a.property.clone(),
            value: util::format_value(&a.value),
            description: a.description.clone(),
        }
    }
}

fn detail(report: &DispatchReport) -> String {
    let mut out = format!("Sent {} node action(s)", report.sent);
    if report.refused > 0 {
        let _ = write!(out, ", {} refused", report.refused);
    }
    if !report.deferred.is_empty() {
        let rows: Vec<DeferredRow> = report.deferred.iter().map(DeferredRow::from).collect();
        let _ = write!(
            out,
            "\n\nNot handled by the runtime ({}):\n{}",
            report.deferred.len(),
            output::render_table(&rows)
        );
    }
    out
}

pub async fn handle(engine: &Engine, args: &ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let raw = util::read_json_file(&args.file)?;
    let actions = serde_json::from_value::<ActionFile>(raw)
        .map_err(|e| CliError::Validation {
            field: "file".into(),
            reason: format!("expected an action array or interpreter response: {e}"),
        })?
        .into_actions()?;

    let report = engine.dispatch_actions(actions).await?;
    let out = output::render_single(global.output_format(), &report, detail, |r| r.sent.to_string())?;
    output::print_output(&out, global.quiet);

    if report.all_sent() {
        Ok(())
    } else {
        Err(CliError::Refused {
            operation: format!("{} node action(s)", report.refused),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_bare_action_arrays() {
        let file: ActionFile = serde_json::from_value(json!([
            { "type": "node", "target": "/a", "property": "gain", "value": 1 }
        ]))
        .unwrap();
        assert_eq!(file.into_actions().unwrap().len(), 1);
    }

    #[test]
    fn failed_responses_are_rejected() {
        let file: ActionFile = serde_json::from_value(json!({
            "success": false,
            "message": "",
            "error": "could not parse command"
        }))
        .unwrap();
        match file.into_actions() {
            Err(CliError::Interpreter { message }) => assert_eq!(message, "could not parse command"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
