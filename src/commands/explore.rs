use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::ExploreArgs;
use crate::commands::{open_dashboard, renderer};
use crate::dashboard::Dashboard;
use crate::model::StageRef;
use crate::render::ChartRenderer;

const HELP: &str = "\
commands:
  select <stage> <category>   select a bar on a stage's chart
  clear <stage>               clear a stage's selection
  click <stage> <json>        apply a raw click payload, e.g. {\"points\":[{\"x\":\"UI\"}]}
  show                        redraw every chart
  reset                       clear all selections
  help                        this text
  quit                        leave the session
<stage> is a 0-based index or a dimension name; quote names containing spaces.";

#[derive(Debug, Clone, PartialEq)]
pub enum ExploreCommand {
    Select { stage: StageRef, category: String },
    Clear { stage: StageRef },
    Click { stage: StageRef, payload: Value },
    Show,
    Reset,
    Help,
    Quit,
}

pub struct CommandParser {
    pattern: Regex,
}

impl CommandParser {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(
            r#"^\s*(?P<verb>[A-Za-z]+)(?:\s+(?P<stage>"[^"]*"|\S+))?(?:\s+(?P<rest>.*?))?\s*$"#,
        )
        .context("failed to compile command regex")?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, line: &str) -> Result<ExploreCommand> {
        let captures = self
            .pattern
            .captures(line)
            .with_context(|| format!("could not read command: {line}"))?;

        let verb = captures
            .name("verb")
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let stage = captures.name("stage").map(|m| StageRef::parse(m.as_str()));
        let rest = captures
            .name("rest")
            .map(|m| m.as_str().trim())
            .filter(|value| !value.is_empty());

        match (verb.as_str(), stage, rest) {
            ("select", Some(stage), Some(category)) => Ok(ExploreCommand::Select {
                stage,
                category: category.trim_matches('"').to_string(),
            }),
            ("select", _, _) => bail!("usage: select <stage> <category>"),
            ("clear", Some(stage), None) => Ok(ExploreCommand::Clear { stage }),
            ("clear", _, _) => bail!("usage: clear <stage>"),
            ("click", Some(stage), payload) => {
                let payload = match payload {
                    Some(raw) => serde_json::from_str(raw)
                        .with_context(|| format!("click payload is not JSON: {raw}"))?,
                    None => Value::Null,
                };
                Ok(ExploreCommand::Click { stage, payload })
            }
            ("click", None, _) => bail!("usage: click <stage> <json>"),
            ("show", None, None) => Ok(ExploreCommand::Show),
            ("reset", None, None) => Ok(ExploreCommand::Reset),
            ("help", _, _) => Ok(ExploreCommand::Help),
            ("quit" | "exit", None, None) => Ok(ExploreCommand::Quit),
            (other, _, _) => bail!("unknown command '{other}' (try 'help')"),
        }
    }
}

pub fn run(args: ExploreArgs) -> Result<()> {
    let mut dashboard = open_dashboard(&args.dashboard)?;
    let chart_renderer = renderer(args.format, &dashboard);

    let stdin = io::stdin();
    let mut output = io::BufWriter::new(io::stdout().lock());
    let commands = run_session(
        &mut dashboard,
        chart_renderer.as_ref(),
        stdin.lock(),
        &mut output,
    )?;
    output.flush()?;

    info!(commands, "explore session ended");
    Ok(())
}

pub fn run_session<R: BufRead>(
    dashboard: &mut Dashboard,
    chart_renderer: &dyn ChartRenderer,
    input: R,
    out: &mut dyn Write,
) -> Result<usize> {
    let parser = CommandParser::new()?;
    chart_renderer.render_dashboard(dashboard, out)?;
    out.flush()?;

    let mut handled = 0_usize;
    for line in input.lines() {
        let line = line.context("failed to read command input")?;
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let command = match parser.parse(&line) {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "command ignored");
                writeln!(out, "error: {err}")?;
                continue;
            }
        };

        handled += 1;
        match apply_command(dashboard, command) {
            Ok(Step::Redraw) => chart_renderer.render_dashboard(dashboard, out)?,
            Ok(Step::Help) => writeln!(out, "{HELP}")?,
            Ok(Step::Quit) => break,
            Err(err) => {
                warn!(error = %err, "command ignored");
                writeln!(out, "error: {err}")?;
            }
        }
        out.flush()?;
    }

    Ok(handled)
}

enum Step {
    Redraw,
    Help,
    Quit,
}

fn apply_command(dashboard: &mut Dashboard, command: ExploreCommand) -> Result<Step> {
    match command {
        ExploreCommand::Select { stage, category } => {
            let stage = dashboard.resolve_stage(&stage)?;
            dashboard.select(stage, Some(category));
        }
        ExploreCommand::Clear { stage } => {
            let stage = dashboard.resolve_stage(&stage)?;
            dashboard.select(stage, None);
        }
        ExploreCommand::Click { stage, payload } => {
            let stage = dashboard.resolve_stage(&stage)?;
            dashboard.handle_click(stage, &payload);
        }
        ExploreCommand::Reset => {
            dashboard.reset();
        }
        ExploreCommand::Show => {}
        ExploreCommand::Help => return Ok(Step::Help),
        ExploreCommand::Quit => return Ok(Step::Quit),
    }
    Ok(Step::Redraw)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::config::VariantConfig;
    use crate::dataset::read_dataset;
    use crate::filter::StalePolicy;
    use crate::render::TextRenderer;

    fn parser() -> CommandParser {
        CommandParser::new().expect("regex should compile")
    }

    #[test]
    fn parses_quoted_stage_names_and_multiword_categories() {
        assert_eq!(
            parser().parse(r#"select "Feature Type" Login Page"#).expect("valid"),
            ExploreCommand::Select {
                stage: StageRef::Name("Feature Type".to_string()),
                category: "Login Page".to_string(),
            }
        );
        assert_eq!(
            parser().parse("  CLEAR 2 ").expect("valid"),
            ExploreCommand::Clear {
                stage: StageRef::Index(2)
            }
        );
    }

    #[test]
    fn parses_click_payloads() {
        assert_eq!(
            parser()
                .parse(r#"click 0 {"points": [{"x": "UI"}]}"#)
                .expect("valid"),
            ExploreCommand::Click {
                stage: StageRef::Index(0),
                payload: json!({"points": [{"x": "UI"}]}),
            }
        );
        assert_eq!(
            parser().parse("click 1").expect("valid"),
            ExploreCommand::Click {
                stage: StageRef::Index(1),
                payload: Value::Null,
            }
        );
        assert!(parser().parse("click 1 {not json").is_err());
    }

    #[test]
    fn rejects_incomplete_or_unknown_commands() {
        assert!(parser().parse("select 0").is_err());
        assert!(parser().parse("clear").is_err());
        assert!(parser().parse("drop 0").is_err());
        assert_eq!(parser().parse("exit").expect("valid"), ExploreCommand::Quit);
    }

    #[test]
    fn session_survives_bad_commands_and_stops_at_quit() {
        let dataset = read_dataset("Test Type,Defect\nUI,Crash\nUI,Hang\nAPI,Crash\n".as_bytes())
            .expect("csv should parse");
        let variant = VariantConfig {
            name: "session".to_string(),
            chain: vec!["Test Type".to_string(), "Defect".to_string()],
            titles: BTreeMap::new(),
            stale_policy: StalePolicy::Retain,
            gate_on_upstream: false,
            top_n: None,
        };
        let mut dashboard = Dashboard::new(dataset, variant).expect("dashboard should build");
        let renderer = TextRenderer { top_n: None };

        let input = "select 0 API\nselect Severity High\nbogus\nquit\nselect 0 UI\n";
        let mut out = Vec::new();
        let handled = run_session(&mut dashboard, &renderer, input.as_bytes(), &mut out)
            .expect("session should run");

        assert_eq!(handled, 3);
        assert_eq!(dashboard.machine().selection(0), Some("API"));
        let text = String::from_utf8(out).expect("utf8 output");
        assert!(text.contains("Defect Distribution for Test Type: API"));
        assert!(text.contains("error: unknown stage 'Severity'"));
        assert!(text.contains("error: unknown command 'bogus'"));
    }
}
