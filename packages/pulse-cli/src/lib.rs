use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("CARGO_PKG_NAME"));

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

/// Log filter for `directive`, or `info` when the directive does not parse.
pub fn env_filter(directive: &str) -> EnvFilter {
	EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global fmt subscriber. Later calls are ignored.
pub fn init_tracing(directive: &str) {
	let _ = tracing_subscriber::fmt().with_env_filter(env_filter(directive)).try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_directives_fall_back_to_info() {
		assert_eq!(env_filter("pulse_agent=verbose").to_string(), "info");
		assert_eq!(env_filter("pulse_agent=debug").to_string(), "pulse_agent=debug");
	}
}
