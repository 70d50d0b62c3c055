use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

name_newtype!(ScenarioId);
name_newtype!(ViewName);
name_newtype!(TeamName);
name_newtype!(TaskId);
name_newtype!(MechanicId);

pub const DEFAULT_SCENARIO: &str = "baseline";

impl Default for ScenarioId {
    fn default() -> Self {
        Self::new(DEFAULT_SCENARIO)
    }
}

/// Views the dashboard ships with, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    TeamLead,
    Management,
    Mechanic,
    Project,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::TeamLead,
        ViewKind::Management,
        ViewKind::Mechanic,
        ViewKind::Project,
    ];

    pub fn view_name(self) -> ViewName {
        ViewName::new(self.as_str())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::TeamLead => "team-lead",
            ViewKind::Management => "management",
            ViewKind::Mechanic => "mechanic",
            ViewKind::Project => "project",
        }
    }

    /// Module name reported in lifecycle events.
    pub fn module_name(self) -> &'static str {
        match self {
            ViewKind::TeamLead => "TeamLead",
            ViewKind::Management => "Management",
            ViewKind::Mechanic => "Mechanic",
            ViewKind::Project => "Project",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Production,
    #[serde(rename = "Quality Inspection")]
    QualityInspection,
    #[serde(rename = "Late Part")]
    LatePart,
    Rework,
}

impl TaskType {
    pub fn css_class(self) -> &'static str {
        match self {
            TaskType::Production => "production",
            TaskType::QualityInspection => "quality",
            TaskType::LatePart => "late-part",
            TaskType::Rework => "rework",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_kind_parses_tab_names() {
        assert_eq!(ViewKind::parse("team-lead"), Some(ViewKind::TeamLead));
        assert_eq!(ViewKind::parse("project"), Some(ViewKind::Project));
        assert_eq!(ViewKind::parse("TeamLead"), None);
    }

    #[test]
    fn scenario_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ScenarioId::new("scenario2")).expect("json");
        assert_eq!(json, "\"scenario2\"");
        assert_eq!(ScenarioId::default().as_str(), "baseline");
    }

    #[test]
    fn task_type_uses_display_labels_on_the_wire() {
        let parsed: TaskType = serde_json::from_str("\"Late Part\"").expect("json");
        assert_eq!(parsed, TaskType::LatePart);
        assert_eq!(parsed.css_class(), "late-part");
    }
}
