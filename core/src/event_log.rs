//! Event logs and their comparison views.
//!
//! An event log owns a list of named configurations. At most two of them are
//! shown side by side, and one of those is the current one that filter
//! actions apply to. Configuration state itself lives in the
//! [`ConfigurationRegistry`](crate::configuration::ConfigurationRegistry);
//! this module only tracks ids.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::configuration::ConfigurationId;
use crate::error::EventLogError;

pub type EventLogId = u64;

/// Name given to the configuration created when a log is loaded.
pub const DEFAULT_CONFIGURATION_NAME: &str = "Default";

/// Number of configurations that can be compared at once.
pub const MAX_SIDE_BY_SIDE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationEntry {
    pub name: String,
    pub id: ConfigurationId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLog {
    id: EventLogId,
    data: Value,
    configurations: Vec<ConfigurationEntry>,
    side_by_side: Vec<ConfigurationId>,
    current: ConfigurationId,
}

impl EventLog {
    /// A freshly loaded log showing only its default configuration.
    pub fn new(id: EventLogId, data: Value, default_configuration: ConfigurationId) -> Self {
        Self {
            id,
            data,
            configurations: vec![ConfigurationEntry {
                name: DEFAULT_CONFIGURATION_NAME.to_string(),
                id: default_configuration,
            }],
            side_by_side: vec![default_configuration],
            current: default_configuration,
        }
    }

    pub fn id(&self) -> EventLogId {
        self.id
    }

    /// Bootstrap data as returned by the backend.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn configurations(&self) -> &[ConfigurationEntry] {
        &self.configurations
    }

    pub fn side_by_side(&self) -> &[ConfigurationId] {
        &self.side_by_side
    }

    pub fn current(&self) -> ConfigurationId {
        self.current
    }

    pub fn contains(&self, id: ConfigurationId) -> bool {
        self.configurations.iter().any(|entry| entry.id == id)
    }

    pub fn in_side_by_side(&self) -> bool {
        self.side_by_side.len() > 1
    }

    pub fn selected_configuration(&self) -> Option<&ConfigurationEntry> {
        self.configurations
            .iter()
            .find(|entry| entry.id == self.current)
    }

    /// Register an already created configuration under `name`. When only one
    /// configuration is shown, the new one fills the second slot and becomes
    /// current.
    pub fn add_configuration(&mut self, name: impl Into<String>, id: ConfigurationId) {
        self.configurations.push(ConfigurationEntry {
            name: name.into(),
            id,
        });
        if !self.in_side_by_side() {
            self.side_by_side.push(id);
            self.current = id;
        }
    }

    /// Show configuration `id` in `slot` and make it current.
    pub fn set_configuration_view(
        &mut self,
        slot: usize,
        id: ConfigurationId,
    ) -> Result<(), EventLogError> {
        if slot >= MAX_SIDE_BY_SIDE || slot > self.side_by_side.len() {
            return Err(EventLogError::InvalidSlot { slot });
        }
        if !self.contains(id) {
            return Err(EventLogError::ForeignConfiguration { id });
        }
        let shown_elsewhere = self
            .side_by_side
            .iter()
            .enumerate()
            .any(|(other, shown)| other != slot && *shown == id);
        if shown_elsewhere {
            return Err(EventLogError::AlreadyShown { id });
        }

        if slot == self.side_by_side.len() {
            self.side_by_side.push(id);
        } else {
            self.side_by_side[slot] = id;
        }
        self.current = id;
        Ok(())
    }

    /// Make the other compared configuration current. No-op outside
    /// side-by-side view.
    pub fn switch_view(&mut self) -> ConfigurationId {
        if let [first, second] = self.side_by_side[..] {
            self.current = if self.current == first { second } else { first };
        }
        self.current
    }

    /// Remove `id` from this log's list and views. The configuration state
    /// itself stays registered.
    pub fn delete_configuration(&mut self, id: ConfigurationId) -> Result<(), EventLogError> {
        if !self.contains(id) {
            return Err(EventLogError::ForeignConfiguration { id });
        }
        if self.configurations.len() == 1 {
            return Err(EventLogError::LastConfiguration);
        }

        self.configurations.retain(|entry| entry.id != id);
        self.side_by_side.retain(|shown| *shown != id);
        if self.side_by_side.is_empty() {
            // Non-empty: the last configuration can't be deleted.
            if let Some(first) = self.configurations.first() {
                self.side_by_side.push(first.id);
            }
        }
        if self.current == id
            && let Some(first) = self.side_by_side.first()
        {
            self.current = *first;
        }
        tracing::debug!(
            event_log_id = self.id,
            configuration_id = id,
            current = self.current,
            "configuration removed from event log"
        );
        Ok(())
    }
}

/// Loaded event logs plus the cursor on the active one.
#[derive(Debug, Clone, Default)]
pub struct EventLogState {
    active: Option<EventLogId>,
    logs: BTreeMap<EventLogId, EventLog>,
}

impl EventLogState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_id(&self) -> Option<EventLogId> {
        self.active
    }

    pub fn active(&self) -> Option<&EventLog> {
        self.active.and_then(|id| self.logs.get(&id))
    }

    pub fn active_mut(&mut self) -> Result<&mut EventLog, EventLogError> {
        let id = self.active.ok_or(EventLogError::NoActiveEventLog)?;
        self.logs
            .get_mut(&id)
            .ok_or(EventLogError::NotLoaded { id })
    }

    pub fn get(&self, id: EventLogId) -> Option<&EventLog> {
        self.logs.get(&id)
    }

    pub fn is_loaded(&self, id: EventLogId) -> bool {
        self.logs.contains_key(&id)
    }

    pub fn logs(&self) -> impl Iterator<Item = &EventLog> {
        self.logs.values()
    }

    /// Store a loaded log. An already loaded log with the same id is kept.
    pub fn insert(&mut self, log: EventLog) -> &mut EventLog {
        self.logs.entry(log.id).or_insert(log)
    }

    pub fn activate(&mut self, id: EventLogId) -> Result<(), EventLogError> {
        if !self.is_loaded(id) {
            return Err(EventLogError::NotLoaded { id });
        }
        self.active = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn log() -> EventLog {
        EventLog::new(7, json!({"name": "orders"}), 1)
    }

    #[test]
    fn new_log_shows_default_configuration() {
        let log = log();
        assert_eq!(
            log.configurations(),
            &[ConfigurationEntry {
                name: "Default".into(),
                id: 1
            }]
        );
        assert_eq!(log.side_by_side(), &[1]);
        assert_eq!(log.current(), 1);
        assert!(!log.in_side_by_side());
        assert_eq!(log.data()["name"], "orders");
    }

    #[test]
    fn first_added_configuration_fills_second_slot() {
        let mut log = log();
        log.add_configuration("B", 2);
        assert!(log.in_side_by_side());
        assert_eq!(log.side_by_side(), &[1, 2]);
        assert_eq!(log.current(), 2);
        assert_eq!(log.selected_configuration().map(|c| c.name.as_str()), Some("B"));

        // Already comparing: the view is left alone.
        log.add_configuration("C", 3);
        assert_eq!(log.side_by_side(), &[1, 2]);
        assert_eq!(log.current(), 2);
        assert_eq!(log.configurations().len(), 3);
    }

    #[test]
    fn switch_view_toggles_between_slots() {
        let mut log = log();
        assert_eq!(log.switch_view(), 1);

        log.add_configuration("B", 2);
        assert_eq!(log.switch_view(), 1);
        assert_eq!(log.switch_view(), 2);
    }

    #[test]
    fn set_configuration_view_validates_slot_and_id() {
        let mut log = log();
        log.add_configuration("B", 2);
        log.add_configuration("C", 3);

        log.set_configuration_view(0, 3).expect("set view");
        assert_eq!(log.side_by_side(), &[3, 2]);
        assert_eq!(log.current(), 3);

        assert_eq!(
            log.set_configuration_view(1, 3),
            Err(EventLogError::AlreadyShown { id: 3 })
        );
        assert_eq!(
            log.set_configuration_view(2, 1),
            Err(EventLogError::InvalidSlot { slot: 2 })
        );
        assert_eq!(
            log.set_configuration_view(0, 99),
            Err(EventLogError::ForeignConfiguration { id: 99 })
        );
        // Re-selecting what a slot already shows only moves the cursor.
        log.set_configuration_view(1, 2).expect("same slot");
        assert_eq!(log.current(), 2);
    }

    #[test]
    fn delete_falls_back_to_remaining_slot() {
        let mut log = log();
        log.add_configuration("B", 2);

        log.delete_configuration(2).expect("delete");
        assert_eq!(log.side_by_side(), &[1]);
        assert_eq!(log.current(), 1);
        assert!(!log.contains(2));

        assert_eq!(
            log.delete_configuration(1),
            Err(EventLogError::LastConfiguration)
        );
    }

    #[test]
    fn delete_of_only_shown_configuration_shows_first_remaining() {
        let mut log = log();
        log.add_configuration("B", 2);
        log.add_configuration("C", 3);
        log.delete_configuration(2).expect("delete B");
        log.delete_configuration(1).expect("delete Default");

        assert_eq!(log.side_by_side(), &[3]);
        assert_eq!(log.current(), 3);
    }

    #[test]
    fn state_tracks_active_log() {
        let mut state = EventLogState::new();
        assert!(state.active().is_none());
        assert_eq!(state.active_mut().err(), Some(EventLogError::NoActiveEventLog));
        assert_eq!(state.activate(7), Err(EventLogError::NotLoaded { id: 7 }));

        state.insert(log());
        state.activate(7).expect("activate");
        assert_eq!(state.active().map(EventLog::id), Some(7));

        // A second insert for the same id keeps the loaded one.
        state.insert(EventLog::new(7, Value::Null, 9));
        assert_eq!(state.active().map(EventLog::current), Some(1));
    }
}
