//! CLI subcommands.

#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod build;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod common;
#[expect(
    unreachable_pub,
    reason = "binary crate — pub inside private module is fine"
)]
pub mod dry_run;
