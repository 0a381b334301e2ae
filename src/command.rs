//! Router commands produced by a sync plan.

use std::fmt;

/// One configuration command in the router CLI dialect.
///
/// Commands only describe a change; [`Router`](crate::router::Router)
/// implementations carry them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Declare a new object-group.
    CreateGroup {
        /// Group name.
        group: String,
    },
    /// Set the group's description.
    SetDescription {
        /// Group name.
        group: String,
        /// New description.
        description: String,
    },
    /// Add a domain to the group.
    Include {
        /// Group name.
        group: String,
        /// Lowercase domain.
        domain: String,
    },
    /// Remove a domain from the group.
    Exclude {
        /// Group name.
        group: String,
        /// Lowercase domain.
        domain: String,
    },
    /// Delete the group.
    RemoveGroup {
        /// Group name.
        group: String,
    },
    /// Route the group's DNS answers through an interface.
    Route {
        /// Group name.
        group: String,
        /// Outgoing interface.
        interface: String,
    },
    /// Disable the route emitted immediately before this command.
    DisableRoute {
        /// Group of the preceding route.
        group: String,
        /// Interface of the preceding route.
        interface: String,
    },
    /// Delete a route.
    RemoveRoute {
        /// Group name.
        group: String,
        /// Outgoing interface.
        interface: String,
    },
}

impl Command {
    /// Name of the object-group the command touches.
    #[must_use]
    pub fn group(&self) -> &str {
        match self {
            Self::CreateGroup { group }
            | Self::SetDescription { group, .. }
            | Self::Include { group, .. }
            | Self::Exclude { group, .. }
            | Self::RemoveGroup { group }
            | Self::Route { group, .. }
            | Self::DisableRoute { group, .. }
            | Self::RemoveRoute { group, .. } => group,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateGroup { group } => write!(f, "object-group fqdn {group}"),
            Self::SetDescription { group, description } => {
                write!(f, "object-group fqdn {group} description {}", cli_quote(description))
            }
            Self::Include { group, domain } => {
                write!(f, "object-group fqdn {group} include {domain}")
            }
            Self::Exclude { group, domain } => {
                write!(f, "no object-group fqdn {group} include {domain}")
            }
            Self::RemoveGroup { group } => write!(f, "no object-group fqdn {group}"),
            Self::Route { group, interface } => {
                write!(f, "dns-proxy route object-group {group} {interface} auto")
            }
            Self::DisableRoute { .. } => f.write_str("dns-proxy route disable"),
            Self::RemoveRoute { group, interface } => {
                write!(f, "no dns-proxy route object-group {group} {interface}")
            }
        }
    }
}

/// Double-quotes `text` when the CLI would otherwise split it.
#[must_use]
pub fn cli_quote(text: &str) -> String {
    if text.is_empty() || text.contains(char::is_whitespace) {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}
