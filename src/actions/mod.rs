//! Resolution of duplicate groups.
//!
//! - [`keep`]: keep policies and survivor ordering
//! - [`link`]: per-file delete/link/shortcut operations with scan-snapshot checks
//! - [`resolve`]: the executor walking all groups, honoring dry-run
//!
//! ```no_run
//! use dupelink::actions::{KeepPolicy, LinkAction, ResolveConfig, Resolver};
//!
//! let resolver = Resolver::new(
//!     ResolveConfig::new(KeepPolicy::Oldest, LinkAction::Hardlink).with_dry_run(true),
//! );
//! let report = resolver.resolve(Vec::new());
//! assert_eq!(report.applied, 0);
//! ```

pub mod keep;
pub mod link;
pub mod resolve;

pub use keep::{order_group, KeepPolicy};
pub use link::{
    remove_member, replace_with_hardlink, replace_with_shortcut, replace_with_symlink,
    temp_sibling, ActionError, FileSnapshot, LinkAction, ShortcutCreator, UrlShortcut,
};
pub use resolve::{Outcome, ResolutionEvent, ResolutionReport, ResolveConfig, Resolver};
