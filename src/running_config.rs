//! Parser for the router's running configuration.
//!
//! Only the pieces the sync touches are modelled; every other line is inert
//! context:
//!
//! ```text
//! object-group fqdn domain-list0
//!     description Youtube
//!     include youtube.com
//! !
//! dns-proxy
//!     route object-group domain-list0 Wireguard0 auto
//!     route disable
//! !
//! ```
//!
//! A bare `route disable` applies to the closest route statement before it
//! within the current block, no matter what unrelated lines sit in between.

use crate::command::cli_quote;

/// An `object-group fqdn` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectGroup {
    /// Group name, unique within the configuration.
    pub name: String,
    /// First `description` line, without surrounding quotes.
    pub description: Option<String>,
    /// Domains from `include` lines, lowercase, in configuration order.
    pub members: Vec<String>,
}

impl ObjectGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            members: Vec::new(),
        }
    }

    /// The description, if present and not blank.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// A `dns-proxy route object-group <group> <interface> auto` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    /// Routed object-group.
    pub group: String,
    /// Outgoing interface.
    pub interface: String,
    /// Whether a `disable` applies to this route.
    pub disabled: bool,
}

/// Non-fatal conditions found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// A group has no description or a blank one.
    EmptyDescription {
        /// Group name.
        group: String,
    },
    /// A group has more than one description; the first one wins.
    MultipleDescriptions {
        /// Group name.
        group: String,
    },
    /// A `route disable` with no route before it in the current block.
    StrayDisable {
        /// 1-based line number.
        line: usize,
    },
}

/// Structured view of one running-configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    /// Object-groups in declaration order.
    pub groups: Vec<ObjectGroup>,
    /// Route bindings in declaration order, one per (group, interface).
    pub routes: Vec<RouteBinding>,
    /// Conditions worth reporting; never fatal.
    pub warnings: Vec<ParseWarning>,
}

impl ParsedConfig {
    /// Parses a running-configuration dump.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser::default();
        for (index, line) in text.lines().enumerate() {
            parser.line(index + 1, line);
        }
        parser.finish()
    }

    /// Looks up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ObjectGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Looks up the binding of `group` to `interface`.
    #[must_use]
    pub fn route(&self, group: &str, interface: &str) -> Option<&RouteBinding> {
        self.routes
            .iter()
            .find(|r| r.group == group && r.interface == interface)
    }

    /// All bindings of `group`, in declaration order.
    pub fn routes_for<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a RouteBinding> + 'a {
        self.routes.iter().filter(move |r| r.group == group)
    }

    /// Renders the modelled subset back into configuration text.
    ///
    /// Parsing the output yields the same groups and routes.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for group in &self.groups {
            out.push_str(&format!("object-group fqdn {}\n", group.name));
            if let Some(description) = &group.description {
                out.push_str(&format!("    description {}\n", cli_quote(description)));
            }
            for member in &group.members {
                out.push_str(&format!("    include {member}\n"));
            }
            out.push_str("!\n");
        }
        for route in &self.routes {
            out.push_str(&format!(
                "dns-proxy route object-group {} {} auto\n",
                route.group, route.interface
            ));
            if route.disabled {
                out.push_str("dns-proxy route disable\n");
            }
        }
        if !self.routes.is_empty() {
            out.push_str("!\n");
        }
        out
    }
}

/// Where the parser currently is.
#[derive(Debug, Clone, Copy, Default)]
enum State {
    #[default]
    Outside,
    /// Inside the block of `groups[index]`.
    InGroup { index: usize, descriptions: usize },
    /// After a route statement; `last` is the binding a bare `disable` targets.
    Routes { last: usize },
}

/// Classified configuration line.
enum Line<'a> {
    Separator,
    GroupDecl(&'a str),
    Description(&'a str),
    Member(&'a str),
    Route {
        group: &'a str,
        interface: &'a str,
        disabled: bool,
    },
    Disable,
    Other,
}

fn classify(trimmed: &str) -> Line<'_> {
    if trimmed == "!" {
        return Line::Separator;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    match tokens.as_slice() {
        ["object-group", "fqdn", name] => Line::GroupDecl(*name),
        ["description", ..] => Line::Description(
            trimmed
                .strip_prefix("description")
                .map_or("", str::trim),
        ),
        ["include", domain] => Line::Member(*domain),
        ["dns-proxy", "route", rest @ ..] | ["route", rest @ ..] => match rest {
            ["disable"] => Line::Disable,
            ["object-group", group, interface, flags @ ..] => Line::Route {
                group: *group,
                interface: *interface,
                disabled: flags.contains(&"disable"),
            },
            _ => Line::Other,
        },
        _ => Line::Other,
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

#[derive(Default)]
struct Parser {
    config: ParsedConfig,
    state: State,
}

impl Parser {
    fn line(&mut self, number: usize, raw: &str) {
        let raw = raw.trim_end();
        let trimmed = raw.trim_start();
        if trimmed.is_empty() {
            return;
        }
        let indented = trimmed.len() != raw.len();

        match (classify(trimmed), self.state) {
            (Line::Separator, _) => {
                self.close_group();
                self.state = State::Outside;
            }
            (Line::GroupDecl(name), _) => {
                self.close_group();
                self.open_group(name);
            }
            (Line::Description(text), State::InGroup { index, descriptions }) => {
                let group = &mut self.config.groups[index];
                if descriptions == 0 {
                    group.description = Some(unquote(text).trim().to_string());
                }
                self.state = State::InGroup {
                    index,
                    descriptions: descriptions + 1,
                };
            }
            (Line::Member(domain), State::InGroup { index, .. }) => {
                self.config.groups[index].members.push(domain.to_lowercase());
            }
            (
                Line::Route {
                    group,
                    interface,
                    disabled,
                },
                _,
            ) => {
                self.close_group();
                let last = self.bind_route(group, interface, disabled);
                self.state = State::Routes { last };
            }
            (Line::Disable, State::Routes { last }) => {
                let route = &mut self.config.routes[last];
                route.disabled = true;
                tracing::debug!(
                    group = %route.group,
                    interface = %route.interface,
                    line = number,
                    "Route disabled"
                );
            }
            (Line::Disable, _) => {
                tracing::debug!(line = number, "Ignoring disable without a preceding route");
                self.config.warnings.push(ParseWarning::StrayDisable { line: number });
            }
            (_, State::InGroup { .. }) if !indented => {
                self.close_group();
                self.state = State::Outside;
            }
            _ => {}
        }
    }

    fn open_group(&mut self, name: &str) {
        let existing = self.config.groups.iter().position(|g| g.name == name);
        let index = existing.unwrap_or_else(|| {
            self.config.groups.push(ObjectGroup::new(name));
            self.config.groups.len() - 1
        });
        let descriptions = usize::from(self.config.groups[index].description.is_some());
        self.state = State::InGroup {
            index,
            descriptions,
        };
    }

    fn close_group(&mut self) {
        let State::InGroup {
            index,
            descriptions,
        } = self.state
        else {
            return;
        };
        self.state = State::Outside;

        let group = &self.config.groups[index];
        let name = group.name.clone();
        if group.description().is_none() {
            self.push_warning(ParseWarning::EmptyDescription { group: name });
        } else if descriptions > 1 {
            self.push_warning(ParseWarning::MultipleDescriptions { group: name });
        }
    }

    fn push_warning(&mut self, warning: ParseWarning) {
        if !self.config.warnings.contains(&warning) {
            self.config.warnings.push(warning);
        }
    }

    fn bind_route(&mut self, group: &str, interface: &str, disabled: bool) -> usize {
        let routes = &mut self.config.routes;
        if let Some(index) = routes
            .iter()
            .position(|r| r.group == group && r.interface == interface)
        {
            routes[index].disabled = disabled;
            return index;
        }
        routes.push(RouteBinding {
            group: group.to_string(),
            interface: interface.to_string(),
            disabled,
        });
        routes.len() - 1
    }

    fn finish(mut self) -> ParsedConfig {
        self.close_group();
        self.config
    }
}
