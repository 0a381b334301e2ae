//! # keenetic-geosite-sync
//!
//! Keep a Keenetic router's DNS-routing object-groups in sync with
//! community-maintained [v2fly geosite] domain lists.
//!
//! Every `object-group fqdn` whose name starts with a configured prefix is
//! treated as managed. Its description names the remote list (`Youtube` maps
//! to the `youtube` list), and a run rewrites the group's `include` lines so
//! they match that list, with all of its `include:` references expanded.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use keenetic_geosite_sync::{HttpFetcher, NdmcRouter, SyncConfig, sync};
//!
//! let config = SyncConfig::new("domain-list")
//!     .with_route_interface("Wireguard0")
//!     .with_dry_run(false);
//!
//! let outcome = sync::run(&config, &HttpFetcher::new()?, &NdmcRouter::new()).await?;
//! print!("{}", outcome.plan.report);
//! ```
//!
//! ## Splitting
//!
//! Object-groups have a limited capacity. A list with more domains than
//! `max_entries_per_group` is spread over `<name>`, `<name>-2`, `<name>-3`,
//! ... Added groups copy the route `disable` flag of the group before them.
//!
//! ## Teardown
//!
//! [`sync::drop_all`] removes every managed group and route without
//! contacting the list source.
//!
//! [v2fly geosite]: https://github.com/v2fly/domain-list-community

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod domain_list;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod report;
pub mod router;
pub mod running_config;
pub mod slug;
pub mod sync;
pub mod util;

pub use command::Command;
pub use config::SyncConfig;
pub use domain_list::{DomainListResolver, DomainRule, ResolvedDomainSet, parse_domain_list};
pub use engine::{ListOutcome, ListState, LogicalList, SyncPlan, plan_drop, plan_sync};
pub use error::{Result, SyncError, TransportError};
pub use fetch::{HttpFetcher, TextFetcher};
pub use report::Report;
pub use router::{NdmcRouter, Router};
pub use running_config::ParsedConfig;
pub use slug::slugify;
pub use sync::RunOutcome;
