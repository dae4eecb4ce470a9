mod block;
mod list;
mod mark;
mod table;

pub use block::ToggleBlockType;
pub use list::ToggleList;
pub use mark::ToggleMark;
pub use table::{GotoCell, InsertColumn, InsertRow, InsertTable, RemoveColumn, RemoveRow};

use std::collections::BTreeMap;

use tracing::debug;

use crate::state::EditorState;
use crate::transform::Transaction;

/// A structural editing command.
///
/// `apply` builds the transaction for the current state, or returns `None`
/// when the command does not apply there; `can_apply` is the side-effect-free
/// dry run menus use for enablement. Inapplicability is never an error.
pub trait Command {
    fn apply(&self, state: &EditorState) -> Option<Transaction>;

    fn can_apply(&self, state: &EditorState) -> bool {
        self.apply(state).is_some()
    }
}

/// Accumulates named commands before the registry freezes.
///
/// Like the schema builder, this is a pre-session extension point: menus and
/// keybinding layers resolve commands by name against the frozen registry.
#[derive(Default)]
pub struct CommandRegistryBuilder {
    commands: BTreeMap<String, Box<dyn Command>>,
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &str, command: Box<dyn Command>) -> Self {
        self.commands.insert(name.to_string(), command);
        self
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: self.commands,
        }
    }
}

/// The frozen name-to-command table.
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(Box::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn can_apply(&self, name: &str, state: &EditorState) -> bool {
        self.get(name).is_some_and(|c| c.can_apply(state))
    }

    /// Build the named command's transaction, or `None` when it is unknown
    /// or inapplicable.
    pub fn apply(&self, name: &str, state: &EditorState) -> Option<Transaction> {
        let Some(command) = self.get(name) else {
            debug!(name, "unknown command");
            return None;
        };
        let tr = command.apply(state);
        if tr.is_none() {
            debug!(name, "command not applicable");
        }
        tr
    }
}

/// The registry pre-loaded with the standard table, list, and block commands.
pub fn default_commands() -> CommandRegistryBuilder {
    let mut builder = CommandRegistryBuilder::new()
        .register("insert_row_before", Box::new(InsertRow { after: false }))
        .register("insert_row_after", Box::new(InsertRow { after: true }))
        .register(
            "insert_column_before",
            Box::new(InsertColumn { after: false }),
        )
        .register("insert_column_after", Box::new(InsertColumn { after: true }))
        .register("remove_row", Box::new(RemoveRow))
        .register("remove_column", Box::new(RemoveColumn))
        .register("goto_next_cell", Box::new(GotoCell { forward: true }))
        .register("goto_prev_cell", Box::new(GotoCell { forward: false }))
        .register("insert_table", Box::new(InsertTable::default()))
        .register(
            "toggle_bullet_list",
            Box::new(ToggleList {
                list_type: "bullet_list".to_string(),
            }),
        )
        .register(
            "toggle_ordered_list",
            Box::new(ToggleList {
                list_type: "ordered_list".to_string(),
            }),
        )
        .register("set_paragraph", Box::new(ToggleBlockType::paragraph()))
        .register("set_code_block", Box::new(ToggleBlockType::code_block()))
        .register("toggle_blockquote", Box::new(ToggleBlockType::blockquote()))
        .register("toggle_em", Box::new(ToggleMark::new("em")))
        .register("toggle_strong", Box::new(ToggleMark::new("strong")))
        .register("toggle_strike", Box::new(ToggleMark::new("strike")))
        .register("toggle_code", Box::new(ToggleMark::new("code")));
    for level in 1..=6 {
        builder = builder.register(
            &format!("set_heading_{level}"),
            Box::new(ToggleBlockType::heading(level)),
        );
    }
    builder
}
