use std::collections::{HashMap, HashSet};

/// Interface name whose members are mail list entries.
pub const MAIL_ITEM: &str = "MailItem";

/// Static table of abstract interfaces and their concrete kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PossibleTypes {
    interfaces: HashMap<String, HashSet<String>>,
}

impl PossibleTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table used by the network cache.
    pub fn mail_items() -> Self {
        let mut table = Self::new();
        table.insert(MAIL_ITEM, ["Conversation", "MessageInfo", "MsgWithGroupInfo"]);
        table
    }

    /// Adds concrete kinds to an interface, creating it if absent.
    pub fn insert<I, K>(&mut self, interface: impl Into<String>, kinds: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.interfaces
            .entry(interface.into())
            .or_default()
            .extend(kinds.into_iter().map(Into::into));
    }

    /// True when `kind` is a declared member of `interface`.
    pub fn contains(&self, interface: &str, kind: &str) -> bool {
        self.interfaces
            .get(interface)
            .is_some_and(|kinds| kinds.contains(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::{MAIL_ITEM, PossibleTypes};

    #[test]
    fn mail_item_members() {
        let table = PossibleTypes::mail_items();
        assert!(table.contains(MAIL_ITEM, "Conversation"));
        assert!(table.contains(MAIL_ITEM, "MsgWithGroupInfo"));
        assert!(!table.contains(MAIL_ITEM, "Folder"));
        assert!(!table.contains("Unknown", "Conversation"));
    }

    #[test]
    fn insert_extends_existing_interface() {
        let mut table = PossibleTypes::new();
        table.insert("Node", ["A"]);
        table.insert("Node", ["B"]);
        assert!(table.contains("Node", "A"));
        assert!(table.contains("Node", "B"));
    }
}
