mod client;
mod geoapify;
mod geoapify_response;
mod nominatim;
mod nominatim_response;
mod resolver;

pub use client::new_client;
pub use geoapify::Geoapify;
pub use nominatim::Nominatim;
pub use resolver::{ResolveError, Resolver};

#[cfg(test)]
pub use resolver::StubResolver;
