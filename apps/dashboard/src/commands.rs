//! Line commands read by the dashboard shell and their effect on the orchestrator.

use anyhow::{bail, Context, Result};
use client_core::{Lifecycle, Orchestrator};
use shared::domain::{MechanicId, ScenarioId, TaskId, TeamName, ViewName};

pub const HELP: &str = "\
commands:
  view <name>                   switch view (team-lead, management, mechanic, project)
  scenario <id>                 switch the active scenario
  refresh                       reload every initialized view
  team <name|->                 set or clear the team filter
  product <name|->              set or clear the product filter
  date <yyyy-mm-dd|->           set or clear the date filter
  assign <task> <mechanic>      assign a task in the active scenario
  generate <team> [mechanic..]  generate assignments for a team
  export                        print the export location of the active scenario
  status                        show the selection and module states
  quit                          tear down and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    View(ViewName),
    Scenario(ScenarioId),
    Refresh,
    Team(Option<TeamName>),
    Product(Option<String>),
    Date(Option<String>),
    Assign { task: TaskId, mechanic: MechanicId },
    Generate { team: TeamName, mechanics: Vec<MechanicId> },
    Export,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match (verb, rest.as_slice()) {
        ("view", [name]) => ShellCommand::View(ViewName::new(*name)),
        ("scenario", [id]) => ShellCommand::Scenario(ScenarioId::new(*id)),
        ("refresh", []) => ShellCommand::Refresh,
        ("team", [name]) => ShellCommand::Team(optional(name).map(TeamName::new)),
        // Team names carry spaces ("Mechanic Team 1").
        ("team", words) if !words.is_empty() => {
            ShellCommand::Team(Some(TeamName::new(words.join(" "))))
        }
        ("product", [name]) => ShellCommand::Product(optional(name).map(str::to_string)),
        ("date", [date]) => ShellCommand::Date(optional(date).map(str::to_string)),
        ("assign", [task, mechanic]) => ShellCommand::Assign {
            task: TaskId::new(*task),
            mechanic: MechanicId::new(*mechanic),
        },
        ("generate", [team, mechanics @ ..]) => ShellCommand::Generate {
            team: TeamName::new(*team),
            mechanics: mechanics.iter().map(|m| MechanicId::new(*m)).collect(),
        },
        ("export", []) => ShellCommand::Export,
        ("status", []) => ShellCommand::Status,
        ("help", _) | ("?", _) => ShellCommand::Help,
        ("quit", []) | ("exit", []) => ShellCommand::Quit,
        _ => bail!("unrecognized command '{}'; type `help`", line.trim()),
    };
    Ok(Some(command))
}

fn optional(word: &str) -> Option<&str> {
    (word != "-").then_some(word)
}

pub async fn execute(orchestrator: &Orchestrator, command: ShellCommand) -> Result<Reply> {
    let message = match command {
        ShellCommand::View(view) => {
            if orchestrator.switch_view(&view).await? {
                format!("view: {view}")
            } else {
                format!("view {view} is already active")
            }
        }
        ShellCommand::Scenario(scenario) => {
            if orchestrator.switch_scenario(&scenario) {
                format!("scenario: {scenario}")
            } else {
                format!("scenario {scenario} is already active")
            }
        }
        ShellCommand::Refresh => {
            orchestrator.refresh();
            "refreshing".to_string()
        }
        ShellCommand::Team(team) => {
            let label = team.as_ref().map_or("(all)".to_string(), ToString::to_string);
            orchestrator.set_team_filter(team);
            format!("team filter: {label}")
        }
        ShellCommand::Product(product) => {
            let label = product.clone().unwrap_or_else(|| "(all)".into());
            orchestrator.set_product_filter(product);
            format!("product filter: {label}")
        }
        ShellCommand::Date(date) => {
            let label = date.clone().unwrap_or_else(|| "(any)".into());
            orchestrator.set_date_filter(date);
            format!("date filter: {label}")
        }
        ShellCommand::Assign { task, mechanic } => {
            let result = orchestrator
                .assign_task(&task, &mechanic)
                .await
                .with_context(|| format!("assigning {task} to {mechanic}"))?;
            format!("assigned {task} to {mechanic}: {result}")
        }
        ShellCommand::Generate { team, mechanics } => {
            let result = orchestrator
                .generate_assignments(&team, None, mechanics)
                .await
                .with_context(|| format!("generating assignments for {team}"))?;
            format!("generated assignments for {team}: {result}")
        }
        ShellCommand::Export => format!("export: {}", orchestrator.export_current_scenario()),
        ShellCommand::Status => render_status(orchestrator),
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Quit => return Ok(Reply::Quit),
    };
    Ok(Reply::Message(message))
}

fn render_status(orchestrator: &Orchestrator) -> String {
    let status = orchestrator.status();
    let selection = &status.selection;
    let mut out = format!(
        "scenario: {}\nview: {}\nteam: {}",
        selection.scenario,
        selection
            .view
            .as_ref()
            .map_or("(none)".to_string(), ToString::to_string),
        selection
            .filters
            .team
            .as_ref()
            .map_or("(all)".to_string(), ToString::to_string),
    );
    for module in &status.modules {
        let lifecycle = match module.lifecycle {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Destroyed => "destroyed",
        };
        out.push_str(&format!(
            "\n  {:<12} {:<14}{}{}",
            module.view.as_str(),
            lifecycle,
            if module.visible { " visible" } else { "" },
            if module.loading { " loading" } else { "" },
        ));
    }
    out
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
