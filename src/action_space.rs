use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

pub type ActionName = String;

/// Argument schema and description of one action the agent may emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ActionSchema {
    pub name: ActionName,
    #[serde(default)]
    pub argument_names: Vec<String>,
    pub description: String,
}

/// A concrete action proposed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Action {
    pub name: ActionName,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl Action {
    pub fn new<I, S>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty()
    }

    pub fn signature(&self) -> ActionSignature {
        ActionSignature {
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arguments.join(", "))
    }
}

/// Exact-equality cache key for an action: name plus concrete arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionSignature {
    pub name: ActionName,
    pub arguments: Vec<String>,
}

/// An action joined with its schema description, as handed to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ActionCall {
    pub name: ActionName,
    pub arguments: Vec<String>,
    pub description: String,
}

impl ActionCall {
    pub fn new(action: &Action, schema: &ActionSchema) -> Self {
        Self {
            name: action.name.clone(),
            arguments: action.arguments.clone(),
            description: schema.description.clone(),
        }
    }
}

/// Read-only registry of the actions available in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionSpace {
    actions: BTreeMap<ActionName, ActionSchema>,
}

impl ActionSpace {
    pub fn new(schemas: impl IntoIterator<Item = ActionSchema>) -> Self {
        Self {
            actions: schemas
                .into_iter()
                .map(|schema| (schema.name.clone(), schema))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn schema(name: &str, argument_names: &[&str], description: &str) -> ActionSchema {
    ActionSchema {
        name: name.to_string(),
        argument_names: argument_names.iter().map(|arg| arg.to_string()).collect(),
        description: description.to_string(),
    }
}

/// Browser actions of a simplified web-navigation environment.
pub fn web_action_space() -> ActionSpace {
    ActionSpace::new([
        schema(
            "click",
            &["id"],
            "Click on the page element with the given id.",
        ),
        schema(
            "type",
            &["id", "content", "press_enter_after=0|1"],
            "Type content into the field with the given id. Enter is pressed afterwards unless press_enter_after is 0.",
        ),
        schema("hover", &["id"], "Hover over the element with the given id."),
        schema(
            "press",
            &["key_comb"],
            "Press a key combination on the keyboard, e.g. Ctrl+v.",
        ),
        schema(
            "scroll",
            &["direction=down|up"],
            "Scroll the page up or down.",
        ),
        schema("new_tab", &[], "Open a new, empty browser tab."),
        schema(
            "tab_focus",
            &["tab_index"],
            "Switch browser focus to the tab with the given index.",
        ),
        schema("close_tab", &[], "Close the active tab."),
        schema("goto", &["url"], "Navigate to the given URL."),
        schema("go_back", &[], "Navigate to the previously viewed page."),
        schema(
            "go_forward",
            &[],
            "Navigate forward again after a go_back.",
        ),
    ])
}
