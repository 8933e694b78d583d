//! Request routing: path templates, conditional guards and the route table.

mod path;
mod router;
mod when;

pub use path::PathMatcher;
pub use router::{Route, RouteMatch, RouteMatcher, Router};
pub use when::{WhenCondition, WhenRule};
